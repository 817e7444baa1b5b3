//! Request and result value types carried between callers and endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Loosely typed key/value extras passed alongside requests and results.
pub type Bundle = serde_json::Map<String, serde_json::Value>;

/// Column values for insert and update requests.
pub type ContentValues = serde_json::Map<String, serde_json::Value>;

/// Bundle key carrying the requested thumbnail box as `{"width": .., "height": ..}`.
pub const EXTRA_SIZE: &str = "size";

/// Bundle key carrying image orientation in degrees for stream results.
pub const EXTRA_ORIENTATION: &str = "orientation";

/// Filtering and ordering arguments for a query.
///
/// Argument bundling is deliberately thin: endpoints interpret these fields
/// however their storage requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryArgs {
    /// Selection clause, if any
    pub selection: Option<String>,

    /// Positional arguments for the selection clause
    #[serde(default)]
    pub selection_args: Vec<String>,

    /// Sort order, if any
    pub sort_order: Option<String>,

    /// Endpoint-specific extras
    #[serde(default)]
    pub extras: Bundle,
}

impl QueryArgs {
    /// Create empty query arguments (select everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selection clause and its arguments
    pub fn with_selection<I, S>(mut self, selection: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = Some(selection.into());
        self.selection_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sort order
    pub fn with_sort_order(mut self, sort_order: impl Into<String>) -> Self {
        self.sort_order = Some(sort_order.into());
        self
    }
}

/// Access mode for opening a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `wt`
    WriteTruncate,
    /// `wa`
    WriteAppend,
    /// `rw`
    ReadWrite,
    /// `rwt`
    ReadWriteTruncate,
}

impl OpenMode {
    /// Whether the mode only reads.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Read)
    }

    /// Whether the mode permits reading.
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::ReadWriteTruncate)
    }

    /// Whether the mode permits writing.
    pub fn can_write(self) -> bool {
        !self.is_read_only()
    }

    /// Whether existing content is discarded on open.
    pub fn truncates(self) -> bool {
        matches!(self, Self::Write | Self::WriteTruncate | Self::ReadWriteTruncate)
    }

    /// Whether writes go to the end of existing content.
    pub fn appends(self) -> bool {
        matches!(self, Self::WriteAppend)
    }

    /// The short string form (`"r"`, `"rwt"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::WriteTruncate => "wt",
            Self::WriteAppend => "wa",
            Self::ReadWrite => "rw",
            Self::ReadWriteTruncate => "rwt",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMode(pub String);

impl fmt::Display for InvalidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid open mode: {:?}", self.0)
    }
}

impl std::error::Error for InvalidMode {}

impl FromStr for OpenMode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "wt" => Ok(Self::WriteTruncate),
            "wa" => Ok(Self::WriteAppend),
            "rw" => Ok(Self::ReadWrite),
            "rwt" => Ok(Self::ReadWriteTruncate),
            other => Err(InvalidMode(other.to_string())),
        }
    }
}

/// One step of a batch applied atomically by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    /// Insert a row
    Insert {
        /// Collection target
        target: Url,
        /// Row values
        values: ContentValues,
    },
    /// Update matching rows
    Update {
        /// Collection or item target
        target: Url,
        /// New values
        values: ContentValues,
        /// Row filter
        #[serde(default)]
        args: QueryArgs,
    },
    /// Delete matching rows
    Delete {
        /// Collection or item target
        target: Url,
        /// Row filter
        #[serde(default)]
        args: QueryArgs,
    },
}

impl BatchOperation {
    /// The target this step applies to.
    pub fn target(&self) -> &Url {
        match self {
            Self::Insert { target, .. } | Self::Update { target, .. } | Self::Delete { target, .. } => {
                target
            }
        }
    }
}

/// Outcome of one batch step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Target of an inserted row
    pub target: Option<Url>,
    /// Rows affected by an update or delete
    pub count: Option<u64>,
}

impl BatchResult {
    /// Result of an insert step.
    pub fn inserted(target: Url) -> Self {
        Self {
            target: Some(target),
            count: None,
        }
    }

    /// Result of an update or delete step.
    pub fn affected(count: u64) -> Self {
        Self {
            target: None,
            count: Some(count),
        }
    }
}
