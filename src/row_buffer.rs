//! Single-allocation row storage.
//!
//! ```text
//! [row 0][row 1] ... [row reserved-1][meta 0][meta 1] ... [meta reserved-1]
//! ```
//!
//! Rows are `row_stride` bytes each and metadata records `meta_stride` bytes
//! each. The metadata region always starts right after the last reserved row
//! slot, so it moves whenever the buffer grows.

use allocative::Allocative;

#[derive(Debug, Clone, Default, PartialEq, Allocative)]
pub struct RowBuffer {
    data: Vec<u8>,
    row_stride: usize,
    meta_stride: usize,
    reserved: usize,
    len: usize,
    grow_by: Option<usize>,
}

impl RowBuffer {
    /// Creates an empty buffer. Nothing is allocated until rows are reserved.
    pub fn new(row_stride: usize, meta_stride: usize, grow_by: Option<usize>) -> Self {
        Self {
            data: Vec::new(),
            row_stride,
            meta_stride,
            reserved: 0,
            len: 0,
            grow_by,
        }
    }

    /// Number of rows holding data.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of row slots the allocation can hold.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn meta_stride(&self) -> usize {
        self.meta_stride
    }

    /// Size of the allocation in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn meta_base(&self) -> usize {
        self.row_stride * self.reserved
    }

    /// Grows the allocation to hold `target` rows. Never shrinks.
    ///
    /// Row data is copied verbatim; the metadata region is copied to its new
    /// position after the enlarged row region and the added tail is zeroed.
    pub fn reserve(&mut self, target: usize) {
        if target <= self.reserved {
            return;
        }
        let mut data = vec![0u8; (self.row_stride + self.meta_stride) * target];

        let rows = self.meta_base();
        data[..rows].copy_from_slice(&self.data[..rows]);

        let meta_len = self.meta_stride * self.reserved;
        let new_meta_base = self.row_stride * target;
        data[new_meta_base..new_meta_base + meta_len]
            .copy_from_slice(&self.data[rows..rows + meta_len]);

        tracing::trace!(
            old_reserved = self.reserved,
            new_reserved = target,
            bytes = data.len(),
            "row buffer grown"
        );
        self.data = data;
        self.reserved = target;
    }

    /// Reserved row count to allocate when `needed` rows must fit.
    fn grow_target(&self, needed: usize) -> usize {
        match self.grow_by {
            Some(step) => self.reserved + (needed - self.reserved).max(step),
            None => needed + needed / 2,
        }
    }

    /// Appends `count` blank rows (zeroed data and metadata) and returns the
    /// index of the first one.
    pub fn push_rows(&mut self, count: usize) -> usize {
        let first = self.len;
        let needed = self.len + count;
        if needed > self.reserved {
            self.reserve(self.grow_target(needed));
        }

        // slots past `len` may hold stale bytes left behind by `erase`
        let rs = self.row_stride;
        self.data[first * rs..needed * rs].fill(0);
        let ms = self.meta_stride;
        let base = self.meta_base();
        self.data[base + first * ms..base + needed * ms].fill(0);

        self.len = needed;
        first
    }

    /// # Panics
    /// Panics if `index >= reserved`.
    pub fn row(&self, index: usize) -> &[u8] {
        assert!(index < self.reserved, "row {index} out of range");
        let start = index * self.row_stride;
        &self.data[start..start + self.row_stride]
    }

    pub fn row_mut(&mut self, index: usize) -> &mut [u8] {
        assert!(index < self.reserved, "row {index} out of range");
        let start = index * self.row_stride;
        &mut self.data[start..start + self.row_stride]
    }

    pub fn meta(&self, index: usize) -> &[u8] {
        assert!(index < self.reserved, "row {index} out of range");
        let start = self.meta_base() + index * self.meta_stride;
        &self.data[start..start + self.meta_stride]
    }

    pub fn meta_mut(&mut self, index: usize) -> &mut [u8] {
        assert!(index < self.reserved, "row {index} out of range");
        let start = self.meta_base() + index * self.meta_stride;
        &mut self.data[start..start + self.meta_stride]
    }

    /// Removes `count` rows starting at `from`, shifting later rows and their
    /// metadata left. The allocation keeps its size.
    ///
    /// # Panics
    /// Panics if `from + count > len`.
    pub fn erase(&mut self, from: usize, count: usize) {
        assert!(
            from + count <= self.len,
            "erase {from}..{} out of range ({} rows)",
            from + count,
            self.len
        );
        if count == 0 {
            return;
        }
        let rs = self.row_stride;
        self.data
            .copy_within((from + count) * rs..self.len * rs, from * rs);

        let ms = self.meta_stride;
        let base = self.meta_base();
        self.data.copy_within(
            base + (from + count) * ms..base + self.len * ms,
            base + from * ms,
        );
        self.len -= count;
    }

    /// Exchanges the data and metadata of two rows.
    pub fn swap(&mut self, a: usize, b: usize) {
        assert!(a < self.len && b < self.len, "swap {a}, {b} out of range");
        if a == b {
            return;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        let rs = self.row_stride;
        let (head, tail) = self.data.split_at_mut(high * rs);
        head[low * rs..(low + 1) * rs].swap_with_slice(&mut tail[..rs]);

        let ms = self.meta_stride;
        let base = self.meta_base();
        let (head, tail) = self.data.split_at_mut(base + high * ms);
        head[base + low * ms..base + (low + 1) * ms].swap_with_slice(&mut tail[..ms]);
    }

    /// Drops every row and releases the allocation.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.reserved = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(rows: usize) -> RowBuffer {
        let mut buffer = RowBuffer::new(4, 4, None);
        buffer.push_rows(rows);
        for i in 0..rows {
            buffer.row_mut(i).copy_from_slice(&(i as u32).to_le_bytes());
            buffer.meta_mut(i).copy_from_slice(&(100 + i as u32).to_le_bytes());
        }
        buffer
    }

    fn row_value(buffer: &RowBuffer, i: usize) -> (u32, u32) {
        (
            u32::from_le_bytes(buffer.row(i).try_into().unwrap()),
            u32::from_le_bytes(buffer.meta(i).try_into().unwrap()),
        )
    }

    #[test]
    fn test_push_grows() {
        let mut buffer = RowBuffer::new(8, 0, None);
        assert_eq!(buffer.push_rows(3), 0);
        assert_eq!(buffer.len(), 3);
        assert!(buffer.reserved() >= 3);
        assert_eq!(buffer.push_rows(2), 3);
        assert_eq!(buffer.byte_len(), buffer.reserved() * 8);
    }

    #[test]
    fn test_grow_by_step() {
        let mut buffer = RowBuffer::new(4, 0, Some(10));
        buffer.push_rows(1);
        assert_eq!(buffer.reserved(), 10);
        buffer.push_rows(10);
        assert_eq!(buffer.reserved(), 20);
        buffer.push_rows(25);
        assert_eq!(buffer.reserved(), 36);
    }

    #[test]
    fn test_reserve_moves_metadata() {
        let mut buffer = filled(5);
        buffer.reserve(50);
        assert_eq!(buffer.reserved(), 50);
        for i in 0..5 {
            assert_eq!(row_value(&buffer, i), (i as u32, 100 + i as u32));
        }
        // fresh metadata slots are zero
        assert_eq!(buffer.meta(49), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_erase_shifts_rows_and_meta() {
        let mut buffer = filled(6);
        let reserved = buffer.reserved();
        buffer.erase(1, 2);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.reserved(), reserved);
        let rows: Vec<_> = (0..4).map(|i| row_value(&buffer, i)).collect();
        assert_eq!(rows, vec![(0, 100), (3, 103), (4, 104), (5, 105)]);
    }

    #[test]
    fn test_push_after_erase_is_blank() {
        let mut buffer = filled(4);
        buffer.erase(2, 2);
        let index = buffer.push_rows(1);
        assert_eq!(row_value(&buffer, index), (0, 0));
    }

    #[test]
    fn test_swap_involution() {
        let mut buffer = filled(4);
        buffer.swap(0, 3);
        assert_eq!(row_value(&buffer, 0), (3, 103));
        assert_eq!(row_value(&buffer, 3), (0, 100));
        buffer.swap(3, 0);
        assert_eq!(row_value(&buffer, 0), (0, 100));
        assert_eq!(row_value(&buffer, 3), (3, 103));
    }

    #[test]
    #[should_panic]
    fn test_erase_out_of_range() {
        let mut buffer = filled(2);
        buffer.erase(1, 2);
    }

    #[test]
    fn test_clear() {
        let mut buffer = filled(3);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.reserved(), 0);
        assert_eq!(buffer.byte_len(), 0);
    }
}
