//! The 128-bit cell identifier: a `partition` half that selects a trunk and
//! a `hash` half that indexes within it.

/// `(partition, hash)`. `partition` is the high 64 bits of the conceptual
/// 128-bit id, `hash` the low 64 bits — see the data model in the crate's
/// design notes for why the split lives at the word boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId {
    pub partition: u64,
    pub hash: u64,
}

impl CellId {
    pub fn new(partition: u64, hash: u64) -> Self {
        Self { partition, hash }
    }

    pub fn from_u128(id: u128) -> Self {
        Self { partition: (id >> 64) as u64, hash: id as u64 }
    }

    pub fn as_u128(&self) -> u128 {
        ((self.partition as u128) << 64) | self.hash as u128
    }
}

impl From<u128> for CellId {
    fn from(id: u128) -> Self {
        Self::from_u128(id)
    }
}

impl From<CellId> for u128 {
    fn from(id: CellId) -> Self {
        id.as_u128()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u128() {
        let id = CellId::new(0xdead_beef, 0xcafe_babe);
        assert_eq!(CellId::from_u128(id.as_u128()), id);
    }
}
