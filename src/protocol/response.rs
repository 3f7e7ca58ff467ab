//! Rows responses.
//!
//! A graph response is a ROWS result with a single column per row. The column
//! is VARCHAR for textual formats and BLOB for the binary format.

use bytes::Bytes;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Binary blob
    Blob,
    /// UTF-8 text
    Varchar,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Column type
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Create a column spec.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Continuous paging metadata carried by each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuousPageMetadata {
    /// Stream the pages are delivered on
    pub stream_id: i16,
    /// Page sequence number, starting at 1
    pub page_number: i32,
    /// Whether this is the last page
    pub last: bool,
}

/// One page of rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowsPage {
    /// Column metadata
    pub columns: Vec<ColumnSpec>,
    /// Rows, each a list of nullable column values
    pub rows: Vec<Vec<Option<Bytes>>>,
    /// Paging state for the next page
    pub paging_state: Option<Bytes>,
    /// Continuous paging metadata
    pub continuous: Option<ContinuousPageMetadata>,
    /// Server warnings
    pub warnings: Vec<String>,
}

impl RowsPage {
    /// Create a page with one column.
    pub fn single_column(column: ColumnSpec, rows: Vec<Bytes>) -> Self {
        Self {
            columns: vec![column],
            rows: rows.into_iter().map(|r| vec![Some(r)]).collect(),
            ..Default::default()
        }
    }

    /// Attach continuous paging metadata.
    pub fn with_continuous(mut self, metadata: ContinuousPageMetadata) -> Self {
        self.continuous = Some(metadata);
        self
    }

    /// Attach a server warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the page has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether no page follows this one.
    pub fn is_last_page(&self) -> bool {
        match &self.continuous {
            Some(metadata) => metadata.last,
            None => self.paging_state.is_none(),
        }
    }
}
