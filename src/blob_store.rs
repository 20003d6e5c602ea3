//! Reference-counted, de-duplicating store for variable-size cell values.
//!
//! Cells of reference kind hold an index into this store. Entries are never
//! removed, so an index stays valid for the lifetime of the store; releasing
//! a reference only lowers the entry's count.

use allocative::Allocative;

use crate::data_type::DataType;

/// One stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Allocative)]
pub struct BlobEntry {
    data_type: DataType,
    reference_count: u32,
    bytes: Vec<u8>,
}

impl BlobEntry {
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Logical length of the payload.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes allocated for the payload.
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    fn matches(&self, data_type: DataType, bytes: &[u8]) -> bool {
        self.data_type == data_type && self.bytes == bytes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Allocative)]
pub struct BlobStore {
    entries: Vec<BlobEntry>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` and returns the entry index. An equal payload of the
    /// same type is shared: its count goes up and its index is returned.
    pub fn add(&mut self, data_type: DataType, bytes: &[u8]) -> u64 {
        if let Some(index) = self.find(data_type, bytes) {
            self.entries[index as usize].reference_count += 1;
            return index;
        }
        self.entries.push(BlobEntry {
            data_type,
            reference_count: 1,
            bytes: bytes.to_vec(),
        });
        (self.entries.len() - 1) as u64
    }

    /// Index of an entry equal to `bytes`, without touching counts.
    pub fn find(&self, data_type: DataType, bytes: &[u8]) -> Option<u64> {
        self.entries
            .iter()
            .position(|entry| entry.matches(data_type, bytes))
            .map(|index| index as u64)
    }

    /// # Panics
    /// Panics if `index` was not returned by [BlobStore::add].
    pub fn at(&self, index: u64) -> &BlobEntry {
        &self.entries[index as usize]
    }

    pub fn get(&self, index: u64) -> Option<&BlobEntry> {
        self.entries.get(index as usize)
    }

    /// Drops one reference. The entry itself stays in place.
    pub fn release(&mut self, index: u64) {
        if let Some(entry) = self.entries.get_mut(index as usize) {
            entry.reference_count = entry.reference_count.saturating_sub(1);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlobEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
