//! Slot ownership model

use std::cmp::Ordering;

/// Number of hash slots in a cluster
pub const SLOT_COUNT: u16 = 16384;

/// Highest valid slot index
pub const MAX_SLOT: u16 = SLOT_COUNT - 1;

/// One shard: a contiguous slot range, its master and its replicas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOwner {
    /// Master address (`host:port`)
    pub master: String,
    /// Replica addresses in the order the cluster reported them
    pub replicas: Vec<String>,
    /// First slot of the range (inclusive)
    pub slot_left_boundary: u16,
    /// Last slot of the range (inclusive)
    pub slot_right_boundary: u16,
}

impl SlotOwner {
    pub fn contains(&self, slot: u16) -> bool {
        (self.slot_left_boundary..=self.slot_right_boundary).contains(&slot)
    }

    pub fn slot_count(&self) -> usize {
        range_len(self.slot_left_boundary, self.slot_right_boundary)
    }

    fn cmp_slot(&self, slot: u16) -> Ordering {
        if slot < self.slot_left_boundary {
            Ordering::Greater
        } else if slot > self.slot_right_boundary {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }
}

/// Find the shard owning `slot` in a list sorted by left boundary
pub fn owner_for_slot(owners: &[SlotOwner], slot: u16) -> Option<&SlotOwner> {
    owners
        .binary_search_by(|o| o.cmp_slot(slot))
        .ok()
        .map(|i| &owners[i])
}

/// Find the shard owning `key`
pub fn owner_for_key<'a>(owners: &'a [SlotOwner], key: &[u8]) -> Option<&'a SlotOwner> {
    owner_for_slot(owners, slot_for_key(key))
}

/// Inclusive slot range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotRange {
    pub left: u16,
    pub right: u16,
}

impl SlotRange {
    pub fn new(left: u16, right: u16) -> Self {
        Self { left, right }
    }

    pub fn len(&self) -> usize {
        range_len(self.left, self.right)
    }

    pub fn contains(&self, slot: u16) -> bool {
        (self.left..=self.right).contains(&slot)
    }
}

/// Set of slot ranges owned by one node (or by the whole cluster)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedisSlots {
    pub ranges: Vec<SlotRange>,
}

impl RedisSlots {
    pub fn push(&mut self, range: SlotRange) {
        self.ranges.push(range);
    }

    /// Order ranges by left boundary
    pub fn sort(&mut self) {
        self.ranges.sort_by_key(|r| (r.left, r.right));
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Linear scan; works on unsorted sets too
    pub fn contains(&self, slot: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(slot))
    }

    pub fn slot_count(&self) -> usize {
        self.ranges.iter().map(SlotRange::len).sum()
    }

    /// True when the ranges tile `0..=MAX_SLOT` exactly: no gap, no overlap
    pub fn covers_all_slots(&self) -> bool {
        let mut ranges = self.ranges.clone();
        ranges.sort_by_key(|r| (r.left, r.right));

        let mut next: u32 = 0;
        for r in &ranges {
            if r.left as u32 != next || r.right < r.left {
                return false;
            }
            next = r.right as u32 + 1;
        }
        next == SLOT_COUNT as u32
    }
}

/// Slots in `left..=right`; an inverted range holds none
fn range_len(left: u16, right: u16) -> usize {
    right.checked_sub(left).map_or(0, |d| d as usize + 1)
}

/// Hash slot of a key, honouring `{hash tags}`
pub fn slot_for_key(key: &[u8]) -> u16 {
    if let Some(start) = key.iter().position(|&b| b == b'{') {
        if let Some(end) = key[start + 1..].iter().position(|&b| b == b'}') {
            if end > 0 {
                return crc16(&key[start + 1..start + 1 + end]) % SLOT_COUNT;
            }
        }
    }
    crc16(key) % SLOT_COUNT
}

/// CRC16/XMODEM as used for cluster key hashing
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(left: u16, right: u16, master: &str) -> SlotOwner {
        SlotOwner {
            master: master.to_string(),
            replicas: vec![],
            slot_left_boundary: left,
            slot_right_boundary: right,
        }
    }

    #[test]
    fn test_crc16() {
        // Known test vector: "123456789" -> 0x31C3
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_slot_for_key_hash_tag() {
        assert_eq!(slot_for_key(b"{user1000}.following"), slot_for_key(b"{user1000}.followers"));
        // Empty tag hashes the whole key
        assert_eq!(slot_for_key(b"{}foo"), crc16(b"{}foo") % SLOT_COUNT);
        assert_eq!(slot_for_key(b"foo"), 12182);
    }

    #[test]
    fn test_owner_lookup() {
        let owners = vec![
            owner(0, 5460, "a:1"),
            owner(5461, 10922, "b:1"),
            owner(10923, 16383, "c:1"),
        ];
        assert_eq!(owner_for_slot(&owners, 0).unwrap().master, "a:1");
        assert_eq!(owner_for_slot(&owners, 5461).unwrap().master, "b:1");
        assert_eq!(owner_for_slot(&owners, 16383).unwrap().master, "c:1");
        // "foo" hashes to 12182
        assert_eq!(owner_for_key(&owners, b"foo").unwrap().master, "c:1");
        assert!(owners[1].contains(10922));
        assert_eq!(owners[0].slot_count(), 5461);
    }

    #[test]
    fn test_owner_lookup_with_gap() {
        let owners = vec![owner(0, 99, "a:1"), owner(200, 16383, "b:1")];
        assert!(owner_for_slot(&owners, 150).is_none());
    }

    #[test]
    fn test_inverted_range_counts_do_not_underflow() {
        let inverted = owner(10, 5, "a:1");
        assert_eq!(inverted.slot_count(), 0);
        assert!(!inverted.contains(7));
        assert_eq!(SlotRange::new(10, 5).len(), 0);
        let slots = RedisSlots {
            ranges: vec![SlotRange::new(10, 5)],
        };
        assert_eq!(slots.slot_count(), 0);
        assert!(!slots.covers_all_slots());
    }

    #[test]
    fn test_full_coverage() {
        let mut slots = RedisSlots::default();
        slots.push(SlotRange::new(10923, 16383));
        slots.push(SlotRange::new(0, 5460));
        slots.push(SlotRange::new(5461, 10922));
        assert!(slots.covers_all_slots());
        assert_eq!(slots.slot_count(), SLOT_COUNT as usize);

        slots.sort();
        assert_eq!(slots.ranges[0], SlotRange::new(0, 5460));
        assert!(slots.contains(5461));
    }

    #[test]
    fn test_coverage_detects_gap_and_overlap() {
        let gap = RedisSlots {
            ranges: vec![SlotRange::new(0, 100), SlotRange::new(102, MAX_SLOT)],
        };
        assert!(!gap.covers_all_slots());

        let overlap = RedisSlots {
            ranges: vec![SlotRange::new(0, 100), SlotRange::new(100, MAX_SLOT)],
        };
        assert!(!overlap.covers_all_slots());

        let short = RedisSlots {
            ranges: vec![SlotRange::new(0, 100)],
        };
        assert!(!short.covers_all_slots());
        assert!(!RedisSlots::default().covers_all_slots());
    }
}
