//! Beat map record parser
//!
//! A map file is a flat run of 5-byte records: one ASCII lane tag
//! followed by a native-endian IEEE-754 `f32` beat time. There is no
//! header and no record count; end of input ends the map.

use nom::number::complete::{f32 as time_f32, u8 as tag_u8};
use nom::number::Endianness;
use nom::sequence::pair;
use nom::IResult;

use crate::{Result, RizumuError};

/// Size of one record in bytes
pub const RECORD_SIZE: usize = 5;

/// A record exactly as stored, before the lane tag is validated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    /// Lane tag byte
    pub tag: u8,
    /// Beat time in seconds
    pub time: f32,
}

fn record(input: &[u8]) -> IResult<&[u8], RawRecord> {
    let (input, (tag, time)) = pair(tag_u8, time_f32(Endianness::Native))(input)?;
    Ok((input, RawRecord { tag, time }))
}

/// Parse every record in `data`.
///
/// A trailing partial record fails with [`RizumuError::MalformedMap`].
pub fn parse_records(data: &[u8]) -> Result<Vec<RawRecord>> {
    let mut records = Vec::with_capacity(data.len() / RECORD_SIZE);
    let mut rest = data;

    while !rest.is_empty() {
        match record(rest) {
            Ok((next, parsed)) => {
                records.push(parsed);
                rest = next;
            }
            Err(_) => {
                return Err(RizumuError::MalformedMap {
                    offset: data.len() - rest.len(),
                    remaining: rest.len(),
                });
            }
        }
    }

    Ok(records)
}

/// Serialize records in the given order, native endian.
pub fn encode_records(records: &[RawRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * RECORD_SIZE);
    for rec in records {
        out.push(rec.tag);
        out.extend_from_slice(&rec.time.to_ne_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert!(parse_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_single_record() {
        let mut data = vec![b'C'];
        data.extend_from_slice(&1.5f32.to_ne_bytes());
        let records = parse_records(&data).unwrap();
        assert_eq!(records, vec![RawRecord { tag: b'C', time: 1.5 }]);
    }

    #[test]
    fn test_parse_keeps_file_order() {
        let input = [
            RawRecord { tag: b'A', time: 4.0 },
            RawRecord { tag: b'Z', time: 3.0 },
            RawRecord { tag: b'B', time: 2.5 },
        ];
        let records = parse_records(&encode_records(&input)).unwrap();
        assert_eq!(records, input.to_vec());
    }

    #[test]
    fn test_truncated_record() {
        let mut data = encode_records(&[RawRecord { tag: b'A', time: 2.0 }]);
        data.push(b'B');
        data.extend_from_slice(&[0, 0]);

        match parse_records(&data) {
            Err(RizumuError::MalformedMap { offset, remaining }) => {
                assert_eq!(offset, 5);
                assert_eq!(remaining, 3);
            }
            other => panic!("expected MalformedMap, got {other:?}"),
        }
    }

    #[test]
    fn test_lone_tag_byte_is_malformed() {
        assert!(matches!(
            parse_records(&[b'A']),
            Err(RizumuError::MalformedMap { offset: 0, .. })
        ));
    }
}
