//! Per-row metadata record: an optional null bitmap followed by an optional
//! status word.
//!
//! ```text
//! [null bitmap: 0, 4 or 8 bytes LE][status: 0 or 4 bytes LE]
//! ```
//!
//! Bit `i` of the null bitmap set means column `i` is null.

use allocative::Allocative;
use bitflags::bitflags;
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

/// Null bitmap width, chosen once per table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Allocative,
)]
#[serde(rename_all = "lowercase")]
pub enum NullTracking {
    /// No null bitmap, every cell holds a value.
    #[default]
    Off,
    /// 32-bit bitmap, up to 32 columns.
    Narrow,
    /// 64-bit bitmap, up to 64 columns.
    Wide,
}

impl NullTracking {
    /// Number of columns the bitmap can address.
    pub const fn width(self) -> usize {
        match self {
            Self::Off => 0,
            Self::Narrow => 32,
            Self::Wide => 64,
        }
    }

    pub const fn bytes(self) -> usize {
        self.width() / 8
    }

    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

bitflags! {
    /// Row status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RowState: u32 {
        const IN_USE = 0b01;
        const DELETED = 0b10;
    }
}

const STATUS_SIZE: usize = 4;

/// Describes the metadata record of a table and reads/writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Allocative)]
pub struct MetaLayout {
    null_tracking: NullTracking,
    row_status: bool,
}

impl MetaLayout {
    pub fn new(null_tracking: NullTracking, row_status: bool) -> Self {
        Self {
            null_tracking,
            row_status,
        }
    }

    pub fn null_tracking(&self) -> NullTracking {
        self.null_tracking
    }

    pub fn tracks_nulls(&self) -> bool {
        self.null_tracking.is_enabled()
    }

    pub fn tracks_status(&self) -> bool {
        self.row_status
    }

    /// Bytes of metadata per row, 0 when nothing is tracked.
    pub fn stride(&self) -> usize {
        self.null_tracking.bytes() + if self.row_status { STATUS_SIZE } else { 0 }
    }

    fn nulls<'a>(&self, meta: &'a [u8]) -> &'a BitSlice<u8, Lsb0> {
        meta[..self.null_tracking.bytes()].view_bits::<Lsb0>()
    }

    pub fn is_null(&self, meta: &[u8], column: usize) -> bool {
        self.nulls(meta)
            .get(column)
            .is_some_and(|bit| *bit)
    }

    pub fn set_null(&self, meta: &mut [u8], column: usize, null: bool) {
        debug_assert!(column < self.null_tracking.width());
        let bits = meta[..self.null_tracking.bytes()].view_bits_mut::<Lsb0>();
        bits.set(column, null);
    }

    /// Marks every column of the row null in one write.
    pub fn set_all_null(&self, meta: &mut [u8]) {
        meta[..self.null_tracking.bytes()].fill(0xff);
    }

    pub fn clear_nulls(&self, meta: &mut [u8]) {
        meta[..self.null_tracking.bytes()].fill(0);
    }

    /// The raw bitmap widened to `u64`.
    pub fn null_mask(&self, meta: &[u8]) -> u64 {
        if !self.tracks_nulls() {
            return 0;
        }
        self.nulls(meta).load_le::<u64>()
    }

    pub fn state(&self, meta: &[u8]) -> RowState {
        if !self.row_status {
            return RowState::empty();
        }
        let at = self.null_tracking.bytes();
        let mut word = [0u8; STATUS_SIZE];
        word.copy_from_slice(&meta[at..at + STATUS_SIZE]);
        RowState::from_bits_truncate(u32::from_le_bytes(word))
    }

    pub fn set_state(&self, meta: &mut [u8], set: RowState, clear: RowState) {
        if !self.row_status {
            return;
        }
        let state = (self.state(meta) - clear) | set;
        let at = self.null_tracking.bytes();
        meta[at..at + STATUS_SIZE].copy_from_slice(&state.bits().to_le_bytes());
    }
}
