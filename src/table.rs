use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

use allocative::{Allocative, Key, Visitor};

use crate::arguments::Arguments;
use crate::blob_store::{BlobEntry, BlobStore};
use crate::column::{CellKind, Column, ColumnCatalog, ColumnDef, LENGTH_PREFIX, REFERENCE_SIZE};
use crate::error::{Result, TableError};
use crate::options::TableOptions;
use crate::parser::ColumnSpecParser;
use crate::row_buffer::RowBuffer;
use crate::row_meta::{MetaLayout, RowState};
use crate::tokenizer::Tokenizer;
use crate::value::Value;

/// In-place sorting strategy used by [Table::sort].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortAlgorithm {
    /// One swap per position: scan the remainder for the extremum.
    #[default]
    Selection,
    /// Adjacent swaps, stopping after a pass without swaps.
    Bubble,
}

/// How columns of a source table are matched to columns of a destination.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnMapping {
    /// Column `i` feeds column `i`, over the shorter of both column lists.
    #[default]
    Position,
    /// Columns with equal names are paired; unmatched columns are skipped.
    Name,
    /// Explicit `(from, to)` index pairs.
    Explicit(Vec<(usize, usize)>),
}

impl ColumnMapping {
    fn resolve(&self, from: &Table, to: &Table) -> Result<Vec<(usize, usize)>> {
        match self {
            Self::Position => Ok((0..from.column_count().min(to.column_count()))
                .map(|i| (i, i))
                .collect()),
            Self::Name => {
                let source = from.columns();
                let target = to.columns();
                Ok((0..source.len())
                    .filter_map(|i| {
                        let name = source.name(i)?;
                        target.find_index(name).map(|j| (i, j))
                    })
                    .collect())
            }
            Self::Explicit(pairs) => {
                for &(from_col, to_col) in pairs {
                    from.columns().check_index(from_col)?;
                    to.columns().check_index(to_col)?;
                }
                Ok(pairs.clone())
            }
        }
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

/// Zero-extends up to four little-endian bytes.
fn read_narrow(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word[..bytes.len()].copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

/// True when `a` must come after `b` in the requested order.
fn out_of_order(a: &Value, b: &Value, ascending: bool) -> bool {
    match a.sort_cmp(b) {
        Some(Ordering::Greater) => ascending,
        Some(Ordering::Less) => !ascending,
        _ => false,
    }
}

/// A fixed-row-stride table stored in a single allocation.
///
/// Columns are defined first, then [Table::prepare] computes the row layout
/// and allocates storage. After that rows can be added and cells read and
/// written. Every row is `row_stride` bytes; each column owns a slot at a
/// fixed offset holding either the value itself, a length-prefixed payload,
/// or an index into the table's blob store.
///
/// The column catalog lives behind a shared handle so several tables can use
/// one schema ([Table::with_shared_columns]); a table is therefore not `Send`.
///
/// # Example
/// ```
/// # use rowtable::{ColumnDef, DataType, Table, TableOptions, Value};
/// let mut table = Table::create(
///     &[
///         ColumnDef::new("a", DataType::Int32),
///         ColumnDef::new("b", DataType::Utf8).with_max_size(10),
///     ],
///     TableOptions::default(),
/// )
/// .unwrap();
///
/// table.row_add_values(&[Value::Int32(5), Value::from("hello")]).unwrap();
/// assert_eq!(table.cell_get(0, 0), Value::Int32(5));
/// assert_eq!(table.cell_get(0, 1).as_string(), "hello");
/// ```
#[derive(Debug, Default)]
pub struct Table {
    columns: Rc<RefCell<ColumnCatalog>>,
    rows: RowBuffer,
    meta: MetaLayout,
    blobs: BlobStore,
    options: TableOptions,
    properties: Arguments,
    prepared: bool,
}

impl Clone for Table {
    /// Deep copy: the clone gets its own column catalog even if this table
    /// shares one.
    fn clone(&self) -> Self {
        Self {
            columns: Rc::new(RefCell::new(self.columns.borrow().clone())),
            rows: self.rows.clone(),
            meta: self.meta,
            blobs: self.blobs.clone(),
            options: self.options,
            properties: self.properties.clone(),
            prepared: self.prepared,
        }
    }
}

impl Allocative for Table {
    fn visit<'a, 'b: 'a>(&self, visitor: &'a mut Visitor<'b>) {
        let mut visitor = visitor.enter_self_sized::<Self>();
        visitor.visit_field(Key::new("rows"), &self.rows);
        visitor.visit_field(Key::new("blobs"), &self.blobs);
        {
            let columns = self.columns.borrow();
            visitor.visit_field(Key::new("columns"), &*columns);
        }
        visitor.exit();
    }
}

impl Table {
    /// Creates an empty, unprepared table with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TableOptions) -> Self {
        Self {
            meta: MetaLayout::new(options.null_tracking, options.row_status),
            options,
            ..Self::default()
        }
    }

    /// Creates a table with `defs` as columns and prepares it.
    pub fn create(defs: &[ColumnDef], options: TableOptions) -> Result<Self> {
        let mut table = Self::with_options(options);
        table.column_add_many(defs)?;
        table.prepare()?;
        Ok(table)
    }

    /// Creates a prepared, empty table that shares `other`'s column catalog.
    /// Renaming a column through either table is visible in both.
    ///
    /// # Errors
    /// Returns [TableError::NotPrepared] if `other`'s layout is not computed yet.
    pub fn with_shared_columns(other: &Table) -> Result<Self> {
        if !other.columns().is_laid_out() {
            return Err(TableError::NotPrepared);
        }
        let mut table = Self::with_options(other.options);
        table.columns = Rc::clone(&other.columns);
        table.prepare()?;
        Ok(table)
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn ensure_prepared(&self) -> Result<()> {
        if self.prepared {
            Ok(())
        } else {
            Err(TableError::NotPrepared)
        }
    }

    // --- Column catalog ---

    /// Read access to the column catalog.
    pub fn columns(&self) -> Ref<'_, ColumnCatalog> {
        self.columns.borrow()
    }

    /// Returns true if both tables use the same catalog instance.
    pub fn shares_columns_with(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.columns, &other.columns)
    }

    pub fn column_count(&self) -> usize {
        self.columns.borrow().len()
    }

    /// # Panics
    /// Panics if `index` is out of range.
    pub fn column(&self, index: usize) -> Column {
        *self.columns.borrow().get(index)
    }

    pub fn column_get_name(&self, index: usize) -> Option<String> {
        self.columns.borrow().name(index).map(str::to_string)
    }

    pub fn column_get_alias(&self, index: usize) -> Option<String> {
        self.columns.borrow().alias(index).map(str::to_string)
    }

    pub fn column_find(&self, name: &str) -> Option<usize> {
        self.columns.borrow().find_index(name)
    }

    /// Like [Table::column_find], failing with [TableError::ColumnNotFound].
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.column_find(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn column_find_alias(&self, alias: &str) -> Option<usize> {
        self.columns.borrow().find_alias(alias)
    }

    pub fn column_find_wildcard(&self, pattern: &str) -> Result<Option<usize>> {
        self.columns.borrow().find_wildcard(pattern)
    }

    pub fn column_rename(&mut self, index: usize, name: &str) -> Result<()> {
        self.columns.borrow_mut().rename(index, name)
    }

    pub fn column_set_alias(&mut self, index: usize, alias: &str) -> Result<()> {
        self.columns.borrow_mut().set_alias(index, alias)
    }

    /// Appends a column to an unprepared table and returns its index.
    ///
    /// # Errors
    /// - [TableError::AlreadyPrepared] after [Table::prepare]; use
    ///   [Table::column_add_prepared] instead.
    /// - [TableError::DuplicateColumn] if the name is taken.
    pub fn column_add(&mut self, def: ColumnDef) -> Result<usize> {
        if self.prepared {
            return Err(TableError::AlreadyPrepared);
        }
        self.columns.borrow_mut().add(&def)
    }

    pub fn column_add_many(&mut self, defs: &[ColumnDef]) -> Result<()> {
        for def in defs {
            self.column_add(def.clone())?;
        }
        Ok(())
    }

    /// Adds a column to a prepared table by building a new table with the
    /// extended schema, copying every row into it and replacing `self`.
    /// On an unprepared table this is [Table::column_add].
    ///
    /// If the catalog was shared, this table moves to its own catalog and the
    /// other tables keep the old schema.
    ///
    /// # Errors
    /// Fails like [Table::column_add] and [Table::prepare]; `self` is left
    /// untouched on error.
    pub fn column_add_prepared(&mut self, def: ColumnDef) -> Result<usize> {
        if !self.prepared {
            return self.column_add(def);
        }
        let old_count = self.column_count();
        let mut defs = self.columns().to_defs();
        defs.push(def);

        let mut rebuilt = Self::with_options(self.options);
        rebuilt.column_add_many(&defs)?;
        rebuilt.prepare()?;

        let count = self.row_count();
        rebuilt.rows.reserve(self.rows.reserved());
        rebuilt.rows.push_rows(count);
        for row in 0..count {
            rebuilt.rows.meta_mut(row).copy_from_slice(self.rows.meta(row));
            if rebuilt.meta.tracks_nulls() {
                rebuilt
                    .meta
                    .set_null(rebuilt.rows.meta_mut(row), old_count, false);
            }
            for col in 0..old_count {
                if self.cell_is_null(row, col) || self.is_blank_reference(row, col) {
                    continue;
                }
                let value = self.cell_get(row, col);
                let column = rebuilt.column(col);
                rebuilt.write_cell(row, col, &column, &value)?;
            }
        }
        rebuilt.properties = std::mem::take(&mut self.properties);
        *self = rebuilt;

        tracing::debug!(
            columns = old_count + 1,
            rows = count,
            "table rebuilt with added column"
        );
        Ok(old_count)
    }

    /// Adds the columns described by `spec`, e.g.
    /// `"int32 id key, string(10) name as n, rstring body"`, and returns how
    /// many were added.
    ///
    /// Columns are added one by one as they are parsed: when a later entry
    /// fails, the earlier ones stay added.
    pub fn column_add_parse(&mut self, spec: &str) -> Result<usize> {
        let tokens = Tokenizer::new(spec).tokenize()?;
        let mut parser = ColumnSpecParser::new(tokens);
        let mut added = 0;
        while let Some(def) = parser.next_def()? {
            if self.prepared {
                self.column_add_prepared(def)?;
            } else {
                self.column_add(def)?;
            }
            added += 1;
        }
        Ok(added)
    }

    // --- Lifecycle ---

    /// Computes the row layout and allocates storage for
    /// `options.initial_capacity` rows.
    ///
    /// # Errors
    /// - [TableError::AlreadyPrepared] if called twice.
    /// - [TableError::NoColumns] without columns.
    /// - [TableError::TooManyColumns] if null tracking is on and there are
    ///   more columns than the bitmap has bits.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Err(TableError::AlreadyPrepared);
        }
        let (count, laid_out) = {
            let columns = self.columns.borrow();
            (columns.len(), columns.is_laid_out())
        };
        if count == 0 {
            return Err(TableError::NoColumns);
        }
        let width = self.meta.null_tracking().width();
        if self.meta.tracks_nulls() && count > width {
            return Err(TableError::TooManyColumns { count, width });
        }

        let row_stride = if laid_out {
            self.columns.borrow().row_stride()
        } else {
            self.columns.borrow_mut().compute_layout()
        };
        self.rows = RowBuffer::new(row_stride, self.meta.stride(), self.options.grow_by);
        self.rows.reserve(self.options.initial_capacity);
        self.prepared = true;

        tracing::debug!(
            columns = count,
            row_stride,
            meta_stride = self.meta.stride(),
            reserved = self.rows.reserved(),
            "table prepared"
        );
        Ok(())
    }

    /// Drops all rows, columns, blobs and properties and returns the table to
    /// the unprepared state. A shared catalog is detached, not cleared.
    pub fn clear(&mut self) {
        self.columns = Rc::default();
        self.rows.clear();
        self.blobs.clear();
        self.properties.clear();
        self.prepared = false;
    }

    // --- Rows ---

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn reserved_row_count(&self) -> usize {
        self.rows.reserved()
    }

    pub fn row_stride(&self) -> usize {
        self.rows.row_stride()
    }

    pub fn meta_stride(&self) -> usize {
        self.rows.meta_stride()
    }

    pub fn reserve(&mut self, rows: usize) -> Result<()> {
        self.ensure_prepared()?;
        self.rows.reserve(rows);
        Ok(())
    }

    /// Appends `count` blank rows and returns the index of the first one.
    /// With row-status tracking the new rows are marked in use.
    pub fn row_add(&mut self, count: usize) -> Result<usize> {
        self.ensure_prepared()?;
        let first = self.rows.push_rows(count);
        if self.meta.tracks_status() {
            for row in first..first + count {
                self.meta
                    .set_state(self.rows.meta_mut(row), RowState::IN_USE, RowState::empty());
            }
        }
        Ok(first)
    }

    /// Appends one row holding `values`, one per column. Every value must have
    /// the column's exact type (or be null when nulls are tracked); nothing is
    /// added when one does not.
    pub fn row_add_values(&mut self, values: &[Value]) -> Result<usize> {
        self.ensure_prepared()?;
        self.check_row_width(values.len())?;
        for (col, value) in values.iter().enumerate() {
            self.check_value(&self.column(col), value)?;
        }
        let row = self.row_add(1)?;
        for (col, value) in values.iter().enumerate() {
            self.store(row, col, value, false)?;
        }
        Ok(row)
    }

    /// Like [Table::row_add_values], converting each value to its column type.
    /// Values that do not convert are dropped. Nothing is added when a
    /// converted value does not fit its column.
    pub fn row_add_values_convert(&mut self, values: &[Value]) -> Result<usize> {
        self.ensure_prepared()?;
        self.check_row_width(values.len())?;
        let mut writes = Vec::with_capacity(values.len());
        for (col, value) in values.iter().enumerate() {
            if let Some(converted) = self.convert_for(col, value)? {
                writes.push((col, converted));
            }
        }
        self.row_add_writes(writes)
    }

    /// Appends one row filled from name/value pairs. Names without a matching
    /// column are ignored; columns without a value stay blank. Every value is
    /// checked (and converted, with `convert`) before the row is added.
    pub fn row_add_arguments(&mut self, arguments: &Arguments, convert: bool) -> Result<usize> {
        self.ensure_prepared()?;
        let mut writes = Vec::with_capacity(arguments.len());
        for (name, value) in arguments.iter() {
            let Some(col) = self.column_find(name) else {
                continue;
            };
            if convert {
                if let Some(converted) = self.convert_for(col, value)? {
                    writes.push((col, converted));
                }
            } else {
                self.check_value(&self.column(col), value)?;
                writes.push((col, value.clone()));
            }
        }
        self.row_add_writes(writes)
    }

    /// Adds one row and writes values that were already checked against
    /// their columns.
    fn row_add_writes(&mut self, writes: Vec<(usize, Value)>) -> Result<usize> {
        let row = self.row_add(1)?;
        for (col, value) in writes {
            self.store(row, col, &value, false)?;
        }
        Ok(row)
    }

    fn check_row_width(&self, found: usize) -> Result<()> {
        let expected = self.column_count();
        if found != expected {
            return Err(TableError::ColumnCountMismatch { expected, found });
        }
        Ok(())
    }

    /// Reads every cell of `row`.
    pub fn row_get(&self, row: usize) -> Vec<Value> {
        (0..self.column_count())
            .map(|col| self.cell_get(row, col))
            .collect()
    }

    /// Reads `row` into a bag keyed by column name. Unnamed columns are keyed
    /// by their index.
    pub fn row_get_arguments(&self, row: usize) -> Arguments {
        let mut arguments = Arguments::new();
        for col in 0..self.column_count() {
            let name = self.column_get_name(col).unwrap_or_else(|| col.to_string());
            arguments.append(name, self.cell_get(row, col));
        }
        arguments
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.row_count()).map(|row| self.row_get(row))
    }

    /// Raw bytes of a row.
    pub fn row_bytes(&self, row: usize) -> &[u8] {
        self.check_row(row);
        self.rows.row(row)
    }

    /// Removes `count` rows starting at `from`. Later rows move up; the
    /// allocation is not shrunk and blob references are not released.
    ///
    /// # Panics
    /// Panics if `from + count > row_count`.
    pub fn erase(&mut self, from: usize, count: usize) {
        self.rows.erase(from, count);
    }

    pub fn row_remove(&mut self, row: usize) {
        self.erase(row, 1);
    }

    /// Exchanges two rows, data and metadata.
    ///
    /// # Panics
    /// Panics if either row is out of range.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.rows.swap(a, b);
    }

    fn check_row(&self, row: usize) {
        assert!(
            row < self.rows.len(),
            "row {row} out of range ({} rows)",
            self.rows.len()
        );
    }

    fn check_cell(&self, row: usize, col: usize) {
        self.check_row(row);
        let count = self.column_count();
        assert!(col < count, "column {col} out of range ({count} columns)");
    }

    // --- Null and status metadata ---

    /// Returns false when the table does not track nulls.
    pub fn cell_is_null(&self, row: usize, col: usize) -> bool {
        self.check_cell(row, col);
        self.meta.tracks_nulls() && self.meta.is_null(self.rows.meta(row), col)
    }

    pub fn cell_set_null(&mut self, row: usize, col: usize) -> Result<()> {
        self.set_null_bit(row, col, true)
    }

    pub fn cell_set_not_null(&mut self, row: usize, col: usize) -> Result<()> {
        self.set_null_bit(row, col, false)
    }

    fn set_null_bit(&mut self, row: usize, col: usize, null: bool) -> Result<()> {
        if !self.meta.tracks_nulls() {
            return Err(TableError::NullsNotTracked);
        }
        self.check_cell(row, col);
        self.meta.set_null(self.rows.meta_mut(row), col, null);
        Ok(())
    }

    /// Marks every column of rows `row..row + count` null.
    pub fn row_set_null(&mut self, row: usize, count: usize) -> Result<()> {
        if !self.meta.tracks_nulls() {
            return Err(TableError::NullsNotTracked);
        }
        if count > 0 {
            self.check_row(row + count - 1);
        }
        for r in row..row + count {
            self.meta.set_all_null(self.rows.meta_mut(r));
        }
        Ok(())
    }

    /// The null bitmap of `row`, 0 when nulls are not tracked.
    pub fn row_null_mask(&self, row: usize) -> u64 {
        self.check_row(row);
        self.meta.null_mask(self.rows.meta(row))
    }

    pub fn row_state(&self, row: usize) -> RowState {
        self.check_row(row);
        self.meta.state(self.rows.meta(row))
    }

    /// True if the row is in use and not deleted. Without row-status tracking
    /// every row is in use.
    pub fn row_is_use(&self, row: usize) -> bool {
        if !self.meta.tracks_status() {
            self.check_row(row);
            return true;
        }
        let state = self.row_state(row);
        state.contains(RowState::IN_USE) && !state.contains(RowState::DELETED)
    }

    pub fn row_set_state(&mut self, row: usize, set: RowState, clear: RowState) -> Result<()> {
        if !self.meta.tracks_status() {
            return Err(TableError::RowStatusNotTracked);
        }
        self.check_row(row);
        self.meta.set_state(self.rows.meta_mut(row), set, clear);
        Ok(())
    }

    /// Soft delete: flags the row deleted and no longer in use.
    pub fn row_delete(&mut self, row: usize) -> Result<()> {
        self.row_set_state(row, RowState::DELETED, RowState::IN_USE)
    }

    pub fn count_used_rows(&self) -> usize {
        (0..self.row_count())
            .filter(|&row| self.row_is_use(row))
            .count()
    }

    pub fn count_free_rows(&self) -> usize {
        self.row_count() - self.count_used_rows()
    }

    /// First row at or after `start` that is not in use.
    pub fn find_first_free_row(&self, start: usize) -> Option<usize> {
        if !self.meta.tracks_status() {
            return None;
        }
        (start..self.row_count()).find(|&row| !self.row_is_use(row))
    }

    // --- Cells ---

    /// Reads a cell. Null cells read as [Value::Null]; slots never written
    /// read as the empty value of the column type.
    ///
    /// # Panics
    /// Panics if `row` or `col` is out of range.
    pub fn cell_get(&self, row: usize, col: usize) -> Value {
        self.check_cell(row, col);
        if self.meta.tracks_nulls() && self.meta.is_null(self.rows.meta(row), col) {
            return Value::Null;
        }
        let column = self.column(col);
        self.read_cell(row, &column)
    }

    fn read_cell(&self, row: usize, column: &Column) -> Value {
        let slot = &self.rows.row(row)[column.byte_offset..column.byte_offset + column.slot_size()];
        match column.cell_kind() {
            CellKind::Fixed => {
                Value::from_fixed_bytes(column.storage_type, slot).unwrap_or(Value::Null)
            }
            CellKind::LengthPrefixed => {
                let len = (read_narrow(&slot[..LENGTH_PREFIX]) as usize).min(column.max_size);
                Value::from_payload(column.storage_type, &slot[LENGTH_PREFIX..LENGTH_PREFIX + len])
                    .unwrap_or(Value::Null)
            }
            CellKind::Reference => match read_u64(slot).checked_sub(1) {
                Some(index) => self
                    .blobs
                    .get(index)
                    .and_then(|entry| Value::from_payload(entry.data_type(), entry.bytes()))
                    .unwrap_or(Value::Null),
                None => Value::empty(column.storage_type),
            },
        }
    }

    /// Blob store index held by a reference cell, `None` for other kinds or
    /// a cell never written.
    pub fn cell_blob_index(&self, row: usize, col: usize) -> Option<u64> {
        self.check_cell(row, col);
        let column = self.column(col);
        if column.cell_kind() != CellKind::Reference {
            return None;
        }
        read_u64(&self.rows.row(row)[column.byte_offset..]).checked_sub(1)
    }

    /// A reference cell never written. Copies leave the target slot blank
    /// rather than storing an empty blob.
    fn is_blank_reference(&self, row: usize, col: usize) -> bool {
        self.column(col).cell_kind() == CellKind::Reference && self.cell_blob_index(row, col).is_none()
    }

    /// Writes a value whose type is exactly the column's type. Writing
    /// [Value::Null] marks the cell null.
    ///
    /// # Errors
    /// - [TableError::TypeMismatch] on any other type, or on null when the
    ///   table does not track nulls.
    /// - [TableError::ValueTooLarge] when a payload exceeds a length-prefixed
    ///   column's capacity.
    pub fn cell_set(&mut self, row: usize, col: usize, value: &Value) -> Result<()> {
        self.check_cell(row, col);
        let column = self.column(col);
        self.check_value(&column, value)?;
        if value.is_null() {
            self.meta.set_null(self.rows.meta_mut(row), col, true);
            return Ok(());
        }
        self.write_cell(row, col, &column, value)
    }

    /// Converts `value` to the column type and writes it. Returns whether
    /// anything was stored: a value that does not convert is dropped and the
    /// cell keeps its previous content. Null marks the cell null when nulls
    /// are tracked and is dropped otherwise.
    ///
    /// # Errors
    /// Only [TableError::ValueTooLarge], for a converted payload that does not fit.
    pub fn cell_set_convert(&mut self, row: usize, col: usize, value: &Value) -> Result<bool> {
        self.check_cell(row, col);
        match self.convert_for(col, value)? {
            Some(converted) => {
                self.store(row, col, &converted, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Converts `value` to the type of column `col` and checks that it fits.
    /// `None` means the value is dropped: it does not convert, or it is null
    /// and nulls are not tracked.
    fn convert_for(&self, col: usize, value: &Value) -> Result<Option<Value>> {
        if value.is_null() {
            return Ok(self.meta.tracks_nulls().then_some(Value::Null));
        }
        let column = self.column(col);
        match value.convert_to(column.logical_type) {
            Ok(converted) => {
                self.check_size(&column, &converted)?;
                Ok(Some(converted))
            }
            Err(err) => {
                tracing::trace!(column = col, error = %err, "value dropped");
                Ok(None)
            }
        }
    }

    fn check_value(&self, column: &Column, value: &Value) -> Result<()> {
        match value.data_type() {
            None if self.meta.tracks_nulls() => Ok(()),
            found if found != Some(column.logical_type) => Err(TableError::TypeMismatch {
                expected: column.logical_type,
                found,
            }),
            _ => self.check_size(column, value),
        }
    }

    fn check_size(&self, column: &Column, value: &Value) -> Result<()> {
        if column.cell_kind() != CellKind::LengthPrefixed {
            return Ok(());
        }
        let size = value.payload().map_or(0, <[u8]>::len);
        if size > column.max_size {
            return Err(TableError::ValueTooLarge {
                size,
                max_size: column.max_size,
            });
        }
        Ok(())
    }

    /// Writes a non-null value through the column's cell kind and clears the
    /// null bit.
    fn write_cell(&mut self, row: usize, col: usize, column: &Column, value: &Value) -> Result<()> {
        let mismatch = || TableError::TypeMismatch {
            expected: column.logical_type,
            found: value.data_type(),
        };
        let start = column.byte_offset;
        match column.cell_kind() {
            CellKind::Fixed => {
                let bytes = value.to_fixed_bytes().ok_or_else(mismatch)?;
                let bytes = bytes.as_slice();
                self.rows.row_mut(row)[start..start + bytes.len()].copy_from_slice(bytes);
            }
            CellKind::LengthPrefixed => {
                let payload = value.payload().ok_or_else(mismatch)?;
                if payload.len() > column.max_size {
                    return Err(TableError::ValueTooLarge {
                        size: payload.len(),
                        max_size: column.max_size,
                    });
                }
                let slot = &mut self.rows.row_mut(row)[start..start + LENGTH_PREFIX + payload.len()];
                slot[..LENGTH_PREFIX].copy_from_slice(&(payload.len() as u32).to_le_bytes());
                slot[LENGTH_PREFIX..].copy_from_slice(payload);
            }
            CellKind::Reference => {
                let payload = value.payload().ok_or_else(mismatch)?;
                let index = self.blobs.add(column.storage_type, payload);
                let slot = &mut self.rows.row_mut(row)[start..start + REFERENCE_SIZE];
                let previous = read_u64(slot);
                slot.copy_from_slice(&(index + 1).to_le_bytes());
                if let Some(previous) = previous.checked_sub(1) {
                    self.blobs.release(previous);
                }
            }
        }
        if self.meta.tracks_nulls() {
            self.meta.set_null(self.rows.meta_mut(row), col, false);
        }
        Ok(())
    }

    /// Bulk-copy write: converts when asked, otherwise writes as-is, mapping
    /// null to a null cell (or a blank one when nulls are not tracked).
    fn store(&mut self, row: usize, col: usize, value: &Value, convert: bool) -> Result<()> {
        if convert {
            return self.cell_set_convert(row, col, value).map(|_| ());
        }
        if value.is_null() {
            if self.meta.tracks_nulls() {
                self.meta.set_null(self.rows.meta_mut(row), col, true);
            }
            return Ok(());
        }
        self.cell_set(row, col, value)
    }

    // --- Blob store ---

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    pub fn blob_at(&self, index: u64) -> Option<&BlobEntry> {
        self.blobs.get(index)
    }

    // --- Properties ---

    pub fn properties(&self) -> &Arguments {
        &self.properties
    }

    pub fn property_set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.set(name, value);
    }

    pub fn property_get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Heap bytes owned by the table: row buffer, blob payloads and catalog.
    pub fn allocated_bytes(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }

    // --- Append / plant ---

    /// Appends every row of `other`, column by position, types matching exactly.
    pub fn append(&mut self, other: &Table) -> Result<()> {
        self.append_with(other, &ColumnMapping::Position, false)
    }

    /// Appends every row of `other` through `mapping`.
    ///
    /// Without `convert`, mapped columns must have equal types. With it each
    /// cell is converted and values that do not convert are dropped.
    /// Unmapped destination columns stay blank.
    pub fn append_with(&mut self, other: &Table, mapping: &ColumnMapping, convert: bool) -> Result<()> {
        self.ensure_prepared()?;
        let count = other.row_count();

        if *mapping == ColumnMapping::Position && !convert && self.same_layout(other) {
            let first = self.rows.push_rows(count);
            for src in 0..count {
                other.transfer_row(src, self, first + src);
            }
            tracing::debug!(rows = count, "appended rows by raw copy");
            return Ok(());
        }

        let pairs = mapping.resolve(other, self)?;
        if !convert {
            self.check_pair_types(other, &pairs)?;
        }
        let carry_status = self.meta.tracks_status() && other.meta.tracks_status();
        let first = self.row_add(count)?;
        for src in 0..count {
            for &(from, to) in &pairs {
                if other.is_blank_reference(src, from) {
                    continue;
                }
                let value = other.cell_get(src, from);
                self.store(first + src, to, &value, convert)?;
            }
            if carry_status {
                self.row_set_state(first + src, other.row_state(src), RowState::all())?;
            }
        }
        tracing::debug!(rows = count, columns = pairs.len(), convert, "appended rows");
        Ok(())
    }

    /// Copies values of `other` into existing rows of `self`, source row `i`
    /// landing on row `row_offset + i`. Rows past the end of `self` are not
    /// created. Returns the number of rows written.
    pub fn plant(
        &mut self,
        other: &Table,
        mapping: &ColumnMapping,
        row_offset: usize,
        convert: bool,
    ) -> Result<usize> {
        self.ensure_prepared()?;
        let pairs = mapping.resolve(other, self)?;
        if !convert {
            self.check_pair_types(other, &pairs)?;
        }
        let count = other
            .row_count()
            .min(self.row_count().saturating_sub(row_offset));
        for src in 0..count {
            for &(from, to) in &pairs {
                let value = other.cell_get(src, from);
                self.store(row_offset + src, to, &value, convert)?;
            }
        }
        Ok(count)
    }

    fn check_pair_types(&self, other: &Table, pairs: &[(usize, usize)]) -> Result<()> {
        for &(from, to) in pairs {
            let expected = self.column(to).logical_type;
            let found = other.column(from).logical_type;
            if expected != found {
                return Err(TableError::TypeMismatch {
                    expected,
                    found: Some(found),
                });
            }
        }
        Ok(())
    }

    /// Both tables lay out rows and metadata identically, so row bytes can
    /// be copied as-is.
    fn same_layout(&self, other: &Table) -> bool {
        if self.meta != other.meta || self.row_stride() != other.row_stride() {
            return false;
        }
        if self.shares_columns_with(other) {
            return true;
        }
        let ours = self.columns();
        let theirs = other.columns();
        ours.len() == theirs.len()
            && ours.iter().zip(theirs.iter()).all(|(a, b)| {
                a.storage_type == b.storage_type
                    && a.cell_kind() == b.cell_kind()
                    && a.byte_offset == b.byte_offset
                    && a.max_size == b.max_size
            })
    }

    /// Copies row `src` into row `dst` of a table with the same layout and
    /// re-adds referenced blobs to the target's store.
    fn transfer_row(&self, src: usize, target: &mut Table, dst: usize) {
        target.rows.row_mut(dst).copy_from_slice(self.rows.row(src));
        target.rows.meta_mut(dst).copy_from_slice(self.rows.meta(src));

        let columns = self.columns();
        for column in columns.iter().filter(|c| c.cell_kind() == CellKind::Reference) {
            let start = column.byte_offset;
            let handle = read_u64(&self.rows.row(src)[start..]);
            let rehomed = match handle.checked_sub(1).and_then(|index| self.blobs.get(index)) {
                Some(entry) => target.blobs.add(entry.data_type(), entry.bytes()) + 1,
                None => 0,
            };
            target.rows.row_mut(dst)[start..start + REFERENCE_SIZE]
                .copy_from_slice(&rehomed.to_le_bytes());
        }
    }

    // --- Harvest ---

    /// Values of one column over `from..from + count`, clamped to the row count.
    pub fn harvest_column(&self, col: usize, from: usize, count: usize) -> Vec<Value> {
        let end = from.saturating_add(count).min(self.row_count());
        (from..end).map(|row| self.cell_get(row, col)).collect()
    }

    /// Selected cells, row-major. `None` selects every row or column.
    pub fn harvest_values(&self, rows: Option<&[usize]>, columns: Option<&[usize]>) -> Vec<Value> {
        let rows = self.select_rows(rows);
        let columns = self.select_columns(columns);
        rows.iter()
            .flat_map(|&row| columns.iter().map(move |&col| self.cell_get(row, col)))
            .collect()
    }

    pub fn harvest_arguments(&self, row: usize) -> Arguments {
        self.row_get_arguments(row)
    }

    /// Builds a new table from the selected rows and columns, in selection
    /// order. Null state, row status and properties are carried over.
    pub fn harvest_table(&self, rows: Option<&[usize]>, columns: Option<&[usize]>) -> Result<Table> {
        self.ensure_prepared()?;
        let rows = self.select_rows(rows);
        let columns = self.select_columns(columns);
        let defs = self.columns().to_defs();

        let mut table = Self::with_options(self.options);
        for &col in &columns {
            self.columns().check_index(col)?;
            table.column_add(defs[col].clone())?;
        }
        table.prepare()?;
        table.rows.reserve(rows.len());

        let first = table.row_add(rows.len())?;
        for (i, &src) in rows.iter().enumerate() {
            let dst = first + i;
            for (to, &from) in columns.iter().enumerate() {
                if self.is_blank_reference(src, from) {
                    continue;
                }
                let value = self.cell_get(src, from);
                table.store(dst, to, &value, false)?;
            }
            if self.meta.tracks_status() {
                table.row_set_state(dst, self.row_state(src), RowState::all())?;
            }
        }
        table.properties = self.properties.clone();
        Ok(table)
    }

    fn select_rows(&self, rows: Option<&[usize]>) -> Vec<usize> {
        rows.map_or_else(|| (0..self.row_count()).collect(), <[usize]>::to_vec)
    }

    fn select_columns(&self, columns: Option<&[usize]>) -> Vec<usize> {
        columns.map_or_else(|| (0..self.column_count()).collect(), <[usize]>::to_vec)
    }

    // --- Search ---

    /// First row in `start..start + count` whose cell equals `value`.
    ///
    /// Fixed-size columns searched with a value of the column type compare
    /// raw slot bytes; everything else goes through [Value] equality.
    pub fn find(&self, col: usize, start: usize, count: usize, value: &Value) -> Option<usize> {
        let column = self.column(col);
        let end = start.saturating_add(count).min(self.row_count());
        let typed = value.data_type() == Some(column.logical_type);

        if column.cell_kind() == CellKind::Fixed && typed {
            let needle = value.to_fixed_bytes()?;
            let needle = needle.as_slice();
            let offset = column.byte_offset;
            let live = |row: usize| {
                !(self.meta.tracks_nulls() && self.meta.is_null(self.rows.meta(row), col))
            };

            if value.is_64() {
                let target = read_u64(needle);
                return (start..end)
                    .find(|&row| live(row) && read_u64(&self.rows.row(row)[offset..]) == target);
            }
            if needle.len() <= 4 {
                let width = needle.len();
                let target = read_narrow(needle);
                return (start..end).find(|&row| {
                    live(row) && read_narrow(&self.rows.row(row)[offset..offset + width]) == target
                });
            }
            return (start..end).find(|&row| {
                live(row) && &self.rows.row(row)[offset..offset + needle.len()] == needle
            });
        }

        (start..end).find(|&row| self.cell_get(row, col) == *value)
    }

    /// Binary search over `start..start + count`, which must already be
    /// sorted on `col` in the given order. Returns any row holding `value`.
    pub fn find_sorted(
        &self,
        col: usize,
        ascending: bool,
        start: usize,
        count: usize,
        value: &Value,
    ) -> Option<usize> {
        let mut low = start;
        let mut high = start.saturating_add(count).min(self.row_count());
        while low < high {
            let mid = low + (high - low) / 2;
            let ordering = self.cell_get(mid, col).sort_cmp(value)?;
            let ordering = if ascending { ordering } else { ordering.reverse() };
            match ordering {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Like [Table::find_sorted], returning the first and last row (inclusive)
    /// of the run of rows equal to `value`.
    pub fn find_range(
        &self,
        col: usize,
        ascending: bool,
        start: usize,
        count: usize,
        value: &Value,
    ) -> Option<(usize, usize)> {
        let hit = self.find_sorted(col, ascending, start, count, value)?;
        let end = start.saturating_add(count).min(self.row_count());

        let matches = |row: usize| self.cell_get(row, col).sort_cmp(value) == Some(Ordering::Equal);

        let mut first = hit;
        while first > start && matches(first - 1) {
            first -= 1;
        }
        let mut last = hit;
        while last + 1 < end && matches(last + 1) {
            last += 1;
        }
        Some((first, last))
    }

    // --- Sort ---

    /// Sorts rows `from..from + count` on `col` in place. Whole rows move,
    /// so other columns follow their key. Neither algorithm is stable.
    pub fn sort(
        &mut self,
        col: usize,
        ascending: bool,
        from: usize,
        count: usize,
        algorithm: SortAlgorithm,
    ) {
        let end = from.saturating_add(count).min(self.row_count());
        if end <= from + 1 {
            return;
        }
        match algorithm {
            SortAlgorithm::Selection => {
                for i in from..end {
                    let mut pick = i;
                    let mut pick_value = self.cell_get(i, col);
                    for j in i + 1..end {
                        let candidate = self.cell_get(j, col);
                        if out_of_order(&pick_value, &candidate, ascending) {
                            pick = j;
                            pick_value = candidate;
                        }
                    }
                    if pick != i {
                        self.rows.swap(i, pick);
                    }
                }
            }
            SortAlgorithm::Bubble => {
                let mut limit = end;
                loop {
                    let mut swapped = false;
                    for j in from + 1..limit {
                        if out_of_order(&self.cell_get(j - 1, col), &self.cell_get(j, col), ascending) {
                            self.rows.swap(j - 1, j);
                            swapped = true;
                        }
                    }
                    limit -= 1;
                    if !swapped || limit <= from + 1 {
                        break;
                    }
                }
            }
        }
    }

    // --- Split / compare ---

    /// Splits the rows into consecutive tables of at most `max_rows` rows,
    /// each with its own copy of the column catalog.
    pub fn split(&self, max_rows: usize) -> Result<Vec<Table>> {
        self.split_into(max_rows, false)
    }

    /// Like [Table::split], but every part shares this table's catalog.
    pub fn split_shared(&self, max_rows: usize) -> Result<Vec<Table>> {
        self.split_into(max_rows, true)
    }

    fn split_into(&self, max_rows: usize, shared: bool) -> Result<Vec<Table>> {
        self.ensure_prepared()?;
        let step = max_rows.max(1);
        let mut parts = Vec::new();
        for start in (0..self.row_count()).step_by(step) {
            let count = step.min(self.row_count() - start);
            let mut part = if shared {
                Self::with_shared_columns(self)?
            } else {
                self.empty_copy()?
            };
            let first = part.rows.push_rows(count);
            for i in 0..count {
                self.transfer_row(start + i, &mut part, first + i);
            }
            part.properties = self.properties.clone();
            parts.push(part);
        }
        tracing::debug!(parts = parts.len(), max_rows = step, shared, "table split");
        Ok(parts)
    }

    /// A prepared table with a copy of this table's schema and no rows.
    fn empty_copy(&self) -> Result<Table> {
        let mut table = Self::with_options(self.options);
        table.columns = Rc::new(RefCell::new(self.columns().clone()));
        table.prepare()?;
        Ok(table)
    }

    /// Compares rows `from..from + count` of both tables cell by cell.
    /// False if the column counts differ or either table is too short.
    pub fn equal(&self, other: &Table, from: usize, count: usize) -> bool {
        let columns = self.column_count();
        if columns != other.column_count() {
            return false;
        }
        let end = from.saturating_add(count);
        if end > self.row_count() || end > other.row_count() {
            return false;
        }
        (from..end).all(|row| (0..columns).all(|col| self.cell_get(row, col) == other.cell_get(row, col)))
    }
}
