pub mod arguments;
pub mod blob_store;
pub mod column;
pub mod data_type;
pub mod error;
pub mod name_pool;
pub mod options;
pub mod parser;
pub mod row_buffer;
pub mod row_meta;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use arguments::Arguments;
pub use blob_store::{BlobEntry, BlobStore};
pub use column::{CellKind, Column, ColumnCatalog, ColumnDef, ColumnFlags};
pub use data_type::DataType;
pub use error::{Result, TableError};
pub use options::TableOptions;
pub use parser::parse_column_specs;
pub use row_meta::{NullTracking, RowState};
pub use table::{ColumnMapping, SortAlgorithm, Table};
pub use value::Value;
