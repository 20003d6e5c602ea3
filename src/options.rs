use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::row_meta::NullTracking;

/// Rows reserved by `prepare` when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Table configuration, fixed when the table is created.
///
/// # Example
/// ```
/// # use rowtable::{NullTracking, TableOptions};
/// let options = TableOptions::from_json(r#"{ "null_tracking": "narrow", "grow_by": 64 }"#).unwrap();
/// assert_eq!(options.null_tracking, NullTracking::Narrow);
/// assert_eq!(options.grow_by, Some(64));
/// assert!(!options.row_status);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Null bitmap width, or no null tracking at all.
    pub null_tracking: NullTracking,
    /// Keep an in-use/deleted status word per row.
    pub row_status: bool,
    /// Rows reserved when the table is prepared.
    pub initial_capacity: usize,
    /// Fixed growth step in rows. `None` grows by half of the needed size.
    pub grow_by: Option<usize>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            null_tracking: NullTracking::Off,
            row_status: false,
            initial_capacity: DEFAULT_CAPACITY,
            grow_by: None,
        }
    }
}

impl TableOptions {
    pub fn with_null_tracking(mut self, null_tracking: NullTracking) -> Self {
        self.null_tracking = null_tracking;
        self
    }

    pub fn with_row_status(mut self, row_status: bool) -> Self {
        self.row_status = row_status;
        self
    }

    pub fn with_capacity(mut self, rows: usize) -> Self {
        self.initial_capacity = rows;
        self
    }

    pub fn with_grow_by(mut self, rows: usize) -> Self {
        self.grow_by = (rows > 0).then_some(rows);
        self
    }

    /// Reads options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
