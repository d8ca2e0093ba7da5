//! Beat map loading
//!
//! Reads the binary map produced by the offline beat detector and fills
//! one [`Layer`] per enabled lane.
//!
//! Records are expected latest-first. Each record is inserted at the
//! front of its lane, so the lanes come out in ascending time order
//! without sorting. The reader trusts this ordering and does not check it.

mod parser;

pub use parser::{encode_records, parse_records, RawRecord, RECORD_SIZE};

use crate::layer::{LayerId, LayerMask, Layers};
use crate::Result;
use log::{debug, info};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Builds lanes from a beat map
#[derive(Debug, Clone, Copy)]
pub struct BeatMapReader {
    enabled: LayerMask,
    prune_unused: bool,
}

impl BeatMapReader {
    /// Reader for the given enabled lanes, keeping empty lanes
    pub fn new(enabled: LayerMask) -> Self {
        BeatMapReader {
            enabled,
            prune_unused: false,
        }
    }

    /// Drop enabled lanes that end up with no beats
    pub fn prune_unused(mut self, prune: bool) -> Self {
        self.prune_unused = prune;
        self
    }

    /// Build lanes from an in-memory map
    pub fn read(&self, data: &[u8]) -> Result<Layers> {
        let records = parse_records(data)?;
        let mut layers = Layers::new(self.enabled);
        let mut dropped = 0usize;

        for rec in records {
            let target = LayerId::from_tag(rec.tag).and_then(|id| layers.get_mut(id));
            match target {
                Some(layer) => layer.insert_beat_front(f64::from(rec.time)),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!("Discarded {dropped} records for unknown or disabled lanes");
        }

        for id in LayerId::ALL {
            let count = match layers.get_mut(id) {
                Some(layer) => layer.count_beats(),
                None => continue,
            };
            if count == 0 && self.prune_unused {
                layers.remove(id);
                debug!("{id}: no beats, lane pruned");
            } else {
                info!("{id}: {count} beats");
            }
        }
        info!("Total: {}", layers.total_beats());

        Ok(layers)
    }

    /// Build lanes from a byte stream, reading it to the end
    pub fn read_from<R: Read>(&self, mut reader: R) -> Result<Layers> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.read(&data)
    }

    /// Load a map file from disk
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Layers> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| format!("Failed to read beat map '{}': {}", path.display(), e))?;
        self.read(&data)
    }
}

impl Default for BeatMapReader {
    fn default() -> Self {
        Self::new(LayerMask::all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RizumuError;

    fn map(records: &[(u8, f32)]) -> Vec<u8> {
        let raw: Vec<RawRecord> = records
            .iter()
            .map(|&(tag, time)| RawRecord { tag, time })
            .collect();
        encode_records(&raw)
    }

    #[test]
    fn test_counts_per_layer() {
        let data = map(&[
            (b'B', 9.0),
            (b'A', 8.0),
            (b'A', 6.0),
            (b'C', 5.0),
            (b'A', 1.0),
        ]);
        let layers = BeatMapReader::default().read(&data).unwrap();

        assert_eq!(layers.get(LayerId::A).unwrap().num_beats_total(), 3);
        assert_eq!(layers.get(LayerId::B).unwrap().num_beats_total(), 1);
        assert_eq!(layers.get(LayerId::C).unwrap().num_beats_total(), 1);
        assert_eq!(layers.total_beats(), 5);
    }

    #[test]
    fn test_lanes_come_out_ascending() {
        let data = map(&[(b'A', 3.0), (b'A', 2.0), (b'A', 1.0)]);
        let layers = BeatMapReader::default().read(&data).unwrap();
        let times: Vec<f64> = layers.get(LayerId::A).unwrap().beats().map(|b| b.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_disabled_and_unknown_tags_dropped() {
        let data = map(&[(b'X', 4.0), (b'B', 3.0), (b'A', 2.0)]);
        let reader = BeatMapReader::new(LayerMask::from_letters("A").unwrap());
        let layers = reader.read(&data).unwrap();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers.total_beats(), 1);
        assert!(layers.get(LayerId::B).is_none());
    }

    #[test]
    fn test_prune_policy() {
        let data = map(&[(b'A', 1.0)]);
        let enabled = LayerMask::from_letters("AB").unwrap();

        let kept = BeatMapReader::new(enabled).read(&data).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.get(LayerId::B).unwrap().num_beats_total(), 0);

        let pruned = BeatMapReader::new(enabled)
            .prune_unused(true)
            .read(&data)
            .unwrap();
        assert_eq!(pruned.len(), 1);
        assert!(pruned.get(LayerId::B).is_none());
    }

    #[test]
    fn test_truncated_map_is_error() {
        let mut data = map(&[(b'A', 1.0)]);
        data.extend_from_slice(&[b'A', 0x00]);
        let result = BeatMapReader::default().read(&data);
        assert!(matches!(result, Err(RizumuError::MalformedMap { .. })));
    }

    #[test]
    fn test_read_from_stream() {
        let data = map(&[(b'F', 2.0), (b'F', 1.0)]);
        let layers = BeatMapReader::default()
            .read_from(std::io::Cursor::new(data))
            .unwrap();
        assert_eq!(layers.get(LayerId::F).unwrap().remaining(), 2);
    }
}
