//! Append-only pool of column names and aliases.
//!
//! Each record is stored as `[len: u16 LE][utf8 bytes]`. The offset handed
//! out by [NamePool::add] points at the text, just past the length prefix, so
//! a real name never lives at offset 0 and 0 can mean "no name".

use allocative::Allocative;

/// Pool growth step in bytes.
const GROW_BY: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq, Allocative)]
pub struct NamePool {
    data: Vec<u8>,
}

impl NamePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name` and returns its offset. Names longer than `u16::MAX`
    /// bytes are cut at the last char boundary that fits.
    pub fn add(&mut self, name: &str) -> u32 {
        let mut end = name.len().min(usize::from(u16::MAX));
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let text = &name.as_bytes()[..end];

        let needed = self.data.len() + 2 + text.len();
        if needed > self.data.capacity() {
            let extra = (needed - self.data.len()).max(GROW_BY);
            self.data.reserve(extra);
        }

        self.data
            .extend_from_slice(&(text.len() as u16).to_le_bytes());
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(text);
        offset
    }

    /// Returns the name stored at `offset`, `None` for the 0 sentinel or an
    /// offset this pool never handed out.
    pub fn get(&self, offset: u32) -> Option<&str> {
        let offset = offset as usize;
        if offset < 2 || offset > self.data.len() {
            return None;
        }
        let len = u16::from_le_bytes([self.data[offset - 2], self.data[offset - 1]]) as usize;
        let bytes = self.data.get(offset..offset + len)?;
        std::str::from_utf8(bytes).ok()
    }

    /// Total bytes used, length prefixes included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_never_zero() {
        let mut pool = NamePool::new();
        let first = pool.add("id");
        let second = pool.add("name");

        assert_eq!(first, 2);
        assert_eq!(second, 2 + 2 + 2);
        assert_eq!(pool.get(first), Some("id"));
        assert_eq!(pool.get(second), Some("name"));
        assert_eq!(pool.get(0), None);
    }

    #[test]
    fn test_offsets_survive_growth_and_clone() {
        let mut pool = NamePool::new();
        let offsets: Vec<u32> = (0..200).map(|i| pool.add(&format!("column_{i}"))).collect();
        let copy = pool.clone();

        for (i, offset) in offsets.iter().enumerate() {
            assert_eq!(copy.get(*offset), Some(format!("column_{i}").as_str()));
        }
    }

    #[test]
    fn test_empty_name() {
        let mut pool = NamePool::new();
        let offset = pool.add("");
        assert_eq!(pool.get(offset), Some(""));
        assert_eq!(pool.len(), 2);
    }
}
