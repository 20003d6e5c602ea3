use allocative::Allocative;
use bitflags::bitflags;

use crate::data_type::DataType;
use crate::error::{Result, TableError};
use crate::name_pool::NamePool;

/// Slot alignment inside a row.
pub const SLOT_ALIGN: usize = 4;
/// Size of the length prefix of length-prefixed cells.
pub const LENGTH_PREFIX: usize = 4;
/// Size of a blob store index held by reference cells.
pub const REFERENCE_SIZE: usize = 8;

bitflags! {
    /// Physical flags of a column.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColumnFlags: u32 {
        /// Cell holds a 4-byte length followed by up to `max_size` payload bytes.
        const LENGTH_PREFIXED = 0b0001;
        /// Cell holds an index into the blob store.
        const REFERENCE = 0b0010;
        /// Column is part of the table key.
        const KEY = 0b0100;
    }
}

/// How a column's cells are physically stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Fixed,
    LengthPrefixed,
    Reference,
}

/// Column definition used to build a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub alias: Option<String>,
    pub data_type: DataType,
    /// Capacity for variable-size values. 0 stores values in the blob store.
    pub max_size: usize,
    /// Only [ColumnFlags::REFERENCE] and [ColumnFlags::KEY] are honored here;
    /// the layout flags are decided by the catalog.
    pub flags: ColumnFlags,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            data_type,
            max_size: 0,
            flags: ColumnFlags::empty(),
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Forces variable-size values into the blob store even when `max_size` is set.
    pub fn reference(mut self) -> Self {
        self.flags |= ColumnFlags::REFERENCE;
        self
    }

    pub fn key(mut self) -> Self {
        self.flags |= ColumnFlags::KEY;
        self
    }
}

/// Descriptor of one column inside a [ColumnCatalog].
#[derive(Debug, Clone, Copy, PartialEq, Allocative)]
pub struct Column {
    /// The semantic type of the column.
    pub logical_type: DataType,
    /// The type used to lay out the value, usually equal to `logical_type`.
    pub storage_type: DataType,
    #[allocative(skip)]
    pub flags: ColumnFlags,
    /// Position of the slot within a row, assigned when the layout is computed.
    pub byte_offset: usize,
    pub max_size: usize,
    /// Inline size for fixed types, 0 otherwise.
    pub primitive_size: usize,
    pub name_offset: u32,
    pub alias_offset: u32,
}

impl Column {
    pub fn cell_kind(&self) -> CellKind {
        if self.flags.contains(ColumnFlags::REFERENCE) {
            CellKind::Reference
        } else if self.flags.contains(ColumnFlags::LENGTH_PREFIXED) {
            CellKind::LengthPrefixed
        } else {
            CellKind::Fixed
        }
    }

    /// Bytes this column occupies in a row, before alignment.
    pub fn slot_size(&self) -> usize {
        match self.cell_kind() {
            CellKind::Fixed => self.primitive_size,
            CellKind::LengthPrefixed => LENGTH_PREFIX + self.max_size,
            CellKind::Reference => REFERENCE_SIZE,
        }
    }

    pub fn is_key(&self) -> bool {
        self.flags.contains(ColumnFlags::KEY)
    }
}

const fn align_up(value: usize) -> usize {
    (value + SLOT_ALIGN - 1) & !(SLOT_ALIGN - 1)
}

/// Ordered list of column descriptors plus the pool holding their names.
#[derive(Debug, Clone, Default, PartialEq, Allocative)]
pub struct ColumnCatalog {
    columns: Vec<Column>,
    names: NamePool,
    row_stride: usize,
    laid_out: bool,
}

impl ColumnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column and returns its index.
    ///
    /// # Errors
    /// - [TableError::AlreadyPrepared] once the layout has been computed.
    /// - [TableError::DuplicateColumn] if a named column with the same name exists.
    pub fn add(&mut self, def: &ColumnDef) -> Result<usize> {
        if self.laid_out {
            return Err(TableError::AlreadyPrepared);
        }
        if !def.name.is_empty() && self.find_index(&def.name).is_some() {
            return Err(TableError::DuplicateColumn(def.name.clone()));
        }

        let name_offset = if def.name.is_empty() {
            0
        } else {
            self.names.add(&def.name)
        };
        let alias_offset = match def.alias.as_deref() {
            Some(alias) if !alias.is_empty() => self.names.add(alias),
            _ => 0,
        };

        self.columns.push(Column {
            logical_type: def.data_type,
            storage_type: def.data_type,
            flags: def.flags & (ColumnFlags::REFERENCE | ColumnFlags::KEY),
            byte_offset: 0,
            max_size: def.max_size,
            primitive_size: def.data_type.primitive_size().unwrap_or(0),
            name_offset,
            alias_offset,
        });
        Ok(self.columns.len() - 1)
    }

    /// Decides each column's cell kind, assigns 4-byte aligned offsets in
    /// declaration order and returns the resulting row stride.
    pub fn compute_layout(&mut self) -> usize {
        let mut offset = 0;
        for column in &mut self.columns {
            if !column.storage_type.is_fixed() {
                if column.max_size == 0 || column.flags.contains(ColumnFlags::REFERENCE) {
                    column.flags.remove(ColumnFlags::LENGTH_PREFIXED);
                    column.flags.insert(ColumnFlags::REFERENCE);
                } else {
                    column.flags.insert(ColumnFlags::LENGTH_PREFIXED);
                }
            } else {
                column.flags.remove(ColumnFlags::REFERENCE | ColumnFlags::LENGTH_PREFIXED);
            }
            column.byte_offset = offset;
            offset += align_up(column.slot_size());
        }
        self.row_stride = offset;
        self.laid_out = true;
        self.row_stride
    }

    pub fn is_laid_out(&self) -> bool {
        self.laid_out
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// # Panics
    /// Panics if `index` is out of range.
    pub fn get(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.columns
            .get(index)
            .and_then(|column| self.names.get(column.name_offset))
    }

    pub fn alias(&self, index: usize) -> Option<&str> {
        self.columns
            .get(index)
            .and_then(|column| self.names.get(column.alias_offset))
    }

    pub fn find_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| self.names.get(column.name_offset) == Some(name))
    }

    pub fn find_alias(&self, alias: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| self.names.get(column.alias_offset) == Some(alias))
    }

    /// Returns the first column whose name matches the glob `pattern`.
    ///
    /// # Errors
    /// Returns [TableError::Pattern] if `pattern` is not a valid glob.
    pub fn find_wildcard(&self, pattern: &str) -> Result<Option<usize>> {
        let pattern = glob::Pattern::new(pattern)?;
        Ok(self.columns.iter().position(|column| {
            self.names
                .get(column.name_offset)
                .is_some_and(|name| pattern.matches(name))
        }))
    }

    /// Gives column `index` a new name. The old name stays in the pool.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<()> {
        self.check_index(index)?;
        if let Some(existing) = self.find_index(name) {
            if existing != index {
                return Err(TableError::DuplicateColumn(name.to_string()));
            }
            return Ok(());
        }
        self.columns[index].name_offset = self.names.add(name);
        Ok(())
    }

    pub fn set_alias(&mut self, index: usize, alias: &str) -> Result<()> {
        self.check_index(index)?;
        self.columns[index].alias_offset = self.names.add(alias);
        Ok(())
    }

    /// Rebuilds the definitions this catalog was created from.
    pub fn to_defs(&self) -> Vec<ColumnDef> {
        (0..self.columns.len())
            .map(|index| {
                let column = &self.columns[index];
                ColumnDef {
                    name: self.name(index).unwrap_or_default().to_string(),
                    alias: self.alias(index).map(str::to_string),
                    data_type: column.logical_type,
                    max_size: column.max_size,
                    flags: column.flags & (ColumnFlags::REFERENCE | ColumnFlags::KEY),
                }
            })
            .collect()
    }

    pub fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.columns.len() {
            return Err(TableError::ColumnOutOfRange {
                index,
                count: self.columns.len(),
            });
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.names.clear();
        self.row_stride = 0;
        self.laid_out = false;
    }
}
