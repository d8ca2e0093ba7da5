//! Lanes and beats
//!
//! A beat map has up to six parallel lanes ("layers"), tagged `A` to `F`
//! in the map file. Each lane owns two queues:
//! - `beats`: pending beats, ascending by time, front = soonest
//! - `shadows`: missed beats kept around for fade-out, front = oldest
//!
//! A beat lives in at most one of the two queues. Lanes are stored in a
//! fixed array indexed by [`LayerId`], so "every lane" loops are bounded
//! at compile time.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Number of lanes a beat map can address
pub const LAYER_COUNT: usize = 6;

/// Lane identifier. The discriminant is the ASCII tag byte used in map files.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    FromPrimitive,
    Serialize,
    Deserialize,
)]
pub enum LayerId {
    /// Lane `A`
    A = 0x41,
    /// Lane `B`
    B = 0x42,
    /// Lane `C`
    C = 0x43,
    /// Lane `D`
    D = 0x44,
    /// Lane `E`
    E = 0x45,
    /// Lane `F`
    F = 0x46,
}

impl LayerId {
    /// All lanes in display order
    pub const ALL: [LayerId; LAYER_COUNT] = [
        LayerId::A,
        LayerId::B,
        LayerId::C,
        LayerId::D,
        LayerId::E,
        LayerId::F,
    ];

    /// Decode a map-file tag byte. Unknown tags yield `None`.
    pub fn from_tag(tag: u8) -> Option<Self> {
        FromPrimitive::from_u8(tag)
    }

    /// Parse a lane letter (case-insensitive)
    pub fn from_char(c: char) -> Option<Self> {
        if !c.is_ascii() {
            return None;
        }
        Self::from_tag(c.to_ascii_uppercase() as u8)
    }

    /// Tag byte as stored in map files
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Lane letter
    pub fn as_char(self) -> char {
        self.tag() as char
    }

    /// Position in [`LayerId::ALL`]
    pub fn index(self) -> usize {
        (self.tag() - b'A') as usize
    }

    /// Lane colour (RGB)
    pub fn color(self) -> (u8, u8, u8) {
        match self {
            LayerId::A => (255, 128, 128),
            LayerId::B => (255, 255, 128),
            LayerId::C => (128, 255, 128),
            LayerId::D => (128, 255, 255),
            LayerId::E => (128, 128, 255),
            LayerId::F => (255, 128, 255),
        }
    }

    fn flag(self) -> LayerMask {
        LayerMask::from_bits_truncate(1 << self.index())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

bitflags! {
    /// Set of enabled lanes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LayerMask: u8 {
        /// Lane `A`
        const A = 1 << 0;
        /// Lane `B`
        const B = 1 << 1;
        /// Lane `C`
        const C = 1 << 2;
        /// Lane `D`
        const D = 1 << 3;
        /// Lane `E`
        const E = 1 << 4;
        /// Lane `F`
        const F = 1 << 5;
    }
}

impl LayerMask {
    /// Parse a string of lane letters such as `"ADF"`.
    /// Returns `None` if any character is not a lane letter.
    pub fn from_letters(letters: &str) -> Option<Self> {
        letters
            .chars()
            .filter(|c| !c.is_whitespace())
            .try_fold(LayerMask::empty(), |mask, c| {
                LayerId::from_char(c).map(|id| mask | id.flag())
            })
    }

    /// Check whether a lane is in the set
    pub fn has(self, id: LayerId) -> bool {
        self.contains(id.flag())
    }

    /// Add a lane to the set
    pub fn with(self, id: LayerId) -> Self {
        self | id.flag()
    }

    /// Lanes in the set, in display order
    pub fn layers(self) -> impl Iterator<Item = LayerId> {
        LayerId::ALL.into_iter().filter(move |id| self.has(*id))
    }

    /// Sorted lane letters, e.g. `"ACD"`
    pub fn to_letters(self) -> String {
        self.layers().map(LayerId::as_char).collect()
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::all()
    }
}

/// One scheduled beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatRecord {
    /// Lane the beat belongs to
    pub layer: LayerId,
    /// Beat time in seconds from the start of the track
    pub time: f64,
}

/// A lane with its pending beats and missed-beat shadows
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    key: Option<char>,
    beats: VecDeque<BeatRecord>,
    shadows: VecDeque<BeatRecord>,
    num_beats_total: usize,
}

impl Layer {
    /// Create an empty lane
    pub fn new(id: LayerId) -> Self {
        Layer {
            id,
            key: None,
            beats: VecDeque::new(),
            shadows: VecDeque::new(),
            num_beats_total: 0,
        }
    }

    /// Lane identifier
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Lane colour
    pub fn color(&self) -> (u8, u8, u8) {
        self.id.color()
    }

    /// Bound input key, if any
    pub fn key(&self) -> Option<char> {
        self.key
    }

    /// Bind (or unbind) the input key
    pub fn set_key(&mut self, key: Option<char>) {
        self.key = key;
    }

    /// Insert a beat in front of the queue.
    ///
    /// Map files are stored latest-first, so front insertion while reading
    /// leaves the queue in ascending order.
    pub fn insert_beat_front(&mut self, time: f64) {
        self.beats.push_front(BeatRecord {
            layer: self.id,
            time,
        });
    }

    /// Freeze the beat total. Called once when loading completes.
    pub fn count_beats(&mut self) -> usize {
        self.num_beats_total = self.beats.len();
        self.num_beats_total
    }

    /// Beats in the lane when it was loaded
    pub fn num_beats_total(&self) -> usize {
        self.num_beats_total
    }

    /// Pending beats left
    pub fn remaining(&self) -> usize {
        self.beats.len()
    }

    /// Soonest pending beat
    pub fn next_beat(&self) -> Option<&BeatRecord> {
        self.beats.front()
    }

    /// Remove and return the soonest pending beat
    pub fn pop_next_beat(&mut self) -> Option<BeatRecord> {
        self.beats.pop_front()
    }

    /// Pending beats, soonest first
    pub fn beats(&self) -> impl Iterator<Item = &BeatRecord> {
        self.beats.iter()
    }

    /// Move the soonest pending beat to the shadow queue.
    /// Returns the moved beat, or `None` if nothing is pending.
    pub fn shadow_next_beat(&mut self) -> Option<BeatRecord> {
        let beat = self.beats.pop_front()?;
        self.shadows.push_back(beat);
        Some(beat)
    }

    /// Shadows, oldest first
    pub fn shadows(&self) -> impl Iterator<Item = &BeatRecord> {
        self.shadows.iter()
    }

    /// Number of shadows currently kept
    pub fn shadow_count(&self) -> usize {
        self.shadows.len()
    }

    /// Oldest shadow
    pub fn oldest_shadow(&self) -> Option<&BeatRecord> {
        self.shadows.front()
    }

    /// Drop the oldest shadow
    pub fn pop_oldest_shadow(&mut self) -> Option<BeatRecord> {
        self.shadows.pop_front()
    }
}

/// Fixed-size lane table indexed by [`LayerId`]
#[derive(Debug, Clone)]
pub struct Layers {
    slots: [Option<Layer>; LAYER_COUNT],
}

impl Layers {
    /// Create a table with one empty lane per id in `mask`
    pub fn new(mask: LayerMask) -> Self {
        Layers {
            slots: std::array::from_fn(|i| {
                let id = LayerId::ALL[i];
                mask.has(id).then(|| Layer::new(id))
            }),
        }
    }

    /// Lane by id, if present
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.slots[id.index()].as_ref()
    }

    /// Mutable lane by id, if present
    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.slots[id.index()].as_mut()
    }

    /// Drop a lane from the session
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        self.slots[id.index()].take()
    }

    /// Present lanes in display order
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.slots.iter().flatten()
    }

    /// Present lanes in display order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.slots.iter_mut().flatten()
    }

    /// Number of present lanes
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True if no lane is present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set of present lanes
    pub fn mask(&self) -> LayerMask {
        self.iter()
            .fold(LayerMask::empty(), |mask, layer| mask.with(layer.id()))
    }

    /// Sum of per-lane beat totals
    pub fn total_beats(&self) -> usize {
        self.iter().map(Layer::num_beats_total).sum()
    }

    /// Pending beats across all lanes
    pub fn remaining_beats(&self) -> usize {
        self.iter().map(Layer::remaining).sum()
    }

    /// Attach keys from `bindings` to the present lanes
    pub fn bind_keys(&mut self, bindings: &KeyBindings) {
        for layer in self.iter_mut() {
            layer.set_key(bindings.key_for(layer.id()));
        }
    }

    /// Lane whose bound key is `key`
    pub fn layer_for_key(&self, key: char) -> Option<LayerId> {
        self.iter()
            .find(|layer| layer.key() == Some(key))
            .map(Layer::id)
    }
}

/// Key assignment per lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    keys: [Option<char>; LAYER_COUNT],
}

impl KeyBindings {
    /// Build from a string with one key per lane in `A..F` order,
    /// e.g. `"sdfjkl"`. A `-` leaves the lane unbound.
    pub fn from_keys(keys: &str) -> Option<Self> {
        let chars: Vec<char> = keys.chars().collect();
        if chars.len() != LAYER_COUNT {
            return None;
        }
        let mut bound = [None; LAYER_COUNT];
        for (slot, c) in bound.iter_mut().zip(chars) {
            *slot = (c != '-').then_some(c);
        }
        Some(KeyBindings { keys: bound })
    }

    /// Key bound to a lane
    pub fn key_for(&self, id: LayerId) -> Option<char> {
        self.keys[id.index()]
    }

    /// True if two lanes share a key
    pub fn has_duplicates(&self) -> bool {
        let bound: Vec<char> = self.keys.iter().flatten().copied().collect();
        bound
            .iter()
            .enumerate()
            .any(|(i, c)| bound[i + 1..].contains(c))
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            keys: [Some('s'), Some('d'), Some('f'), Some('j'), Some('k'), Some('l')],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_id_tags() {
        assert_eq!(LayerId::from_tag(b'A'), Some(LayerId::A));
        assert_eq!(LayerId::from_tag(b'F'), Some(LayerId::F));
        assert_eq!(LayerId::from_tag(b'G'), None);
        assert_eq!(LayerId::from_tag(0), None);
        assert_eq!(LayerId::from_char('c'), Some(LayerId::C));
        assert_eq!(LayerId::D.index(), 3);
    }

    #[test]
    fn test_layer_mask_letters() {
        let mask = LayerMask::from_letters("fa c").unwrap();
        assert!(mask.has(LayerId::A));
        assert!(mask.has(LayerId::C));
        assert!(mask.has(LayerId::F));
        assert!(!mask.has(LayerId::B));
        assert_eq!(mask.to_letters(), "ACF");
        assert!(LayerMask::from_letters("AZ").is_none());
    }

    #[test]
    fn test_front_insertion_orders_ascending() {
        let mut layer = Layer::new(LayerId::A);
        for t in [3.0, 2.0, 1.0] {
            layer.insert_beat_front(t);
        }
        assert_eq!(layer.count_beats(), 3);
        let times: Vec<f64> = layer.beats().map(|b| b.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_shadow_moves_beat_out_of_queue() {
        let mut layer = Layer::new(LayerId::B);
        layer.insert_beat_front(2.0);
        layer.insert_beat_front(1.0);
        layer.count_beats();

        let moved = layer.shadow_next_beat().unwrap();
        assert_eq!(moved.time, 1.0);
        assert_eq!(layer.remaining(), 1);
        assert_eq!(layer.shadow_count(), 1);
        assert!(layer.beats().all(|b| b.time != 1.0));
        assert_eq!(layer.num_beats_total(), 2);
    }

    #[test]
    fn test_empty_lane_has_nothing_to_pop() {
        let mut layer = Layer::new(LayerId::E);
        assert!(layer.next_beat().is_none());
        assert!(layer.pop_next_beat().is_none());
        assert!(layer.shadow_next_beat().is_none());
        assert!(layer.pop_oldest_shadow().is_none());
    }

    #[test]
    fn test_layers_table() {
        let mut layers = Layers::new(LayerMask::from_letters("BD").unwrap());
        assert_eq!(layers.len(), 2);
        assert!(layers.get(LayerId::A).is_none());
        layers.bind_keys(&KeyBindings::default());
        assert_eq!(layers.layer_for_key('j'), Some(LayerId::D));
        assert_eq!(layers.layer_for_key('s'), None);
        layers.remove(LayerId::B);
        assert_eq!(layers.mask().to_letters(), "D");
    }

    #[test]
    fn test_key_bindings() {
        let keys = KeyBindings::from_keys("as-qwe").unwrap();
        assert_eq!(keys.key_for(LayerId::A), Some('a'));
        assert_eq!(keys.key_for(LayerId::C), None);
        assert!(!keys.has_duplicates());
        assert!(KeyBindings::from_keys("aabcde").unwrap().has_duplicates());
        assert!(KeyBindings::from_keys("abc").is_none());
    }
}
