use crate::core::value::ObjectId;
use std::fmt;
use std::io;

/// Universal error type for parsing operations.
///
/// Every variant that can be tied to a position in the source carries the
/// byte offset at which the parser noticed the violation. There is no
/// recovery path once one of these is returned: the caller must start a new
/// `load`/`parse` call.
#[derive(Debug)]
pub enum PDFError {
    /// A syntax violation: unexpected keyword, invalid xref record, bad
    /// escape, missing required dictionary key, invalid hex, and so on.
    Malformed { offset: usize, detail: String },

    /// End of source reached before an expected token or byte.
    Truncated { offset: usize },

    /// A referenced object is absent or free when one was required to
    /// resolve (e.g. `/Length`).
    UnresolvedReference { id: ObjectId },

    /// An indirect-object header's object number did not match what the
    /// cross-reference table expected to find there.
    InconsistentObject {
        id: ObjectId,
        expected: u32,
        found: u32,
    },

    /// A filter-specific decode failure.
    FilterError { filter_name: String, detail: String },

    /// Failure of the underlying byte source.
    Io(io::Error),
}

impl fmt::Display for PDFError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PDFError::Malformed { offset, detail } => {
                write!(f, "malformed PDF at offset {}: {}", offset, detail)
            }
            PDFError::Truncated { offset } => {
                write!(f, "truncated input at offset {}", offset)
            }
            PDFError::UnresolvedReference { id } => {
                write!(f, "unresolved reference {} {} R", id.number, id.generation)
            }
            PDFError::InconsistentObject { id, expected, found } => {
                write!(
                    f,
                    "object header mismatch at {} {} R: expected object number {}, found {}",
                    id.number, id.generation, expected, found
                )
            }
            PDFError::FilterError { filter_name, detail } => {
                write!(f, "filter {} failed: {}", filter_name, detail)
            }
            PDFError::Io(cause) => write!(f, "I/O error: {}", cause),
        }
    }
}

impl std::error::Error for PDFError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PDFError::Io(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<io::Error> for PDFError {
    fn from(cause: io::Error) -> Self {
        PDFError::Io(cause)
    }
}

impl PDFError {
    pub fn malformed(offset: usize, detail: impl Into<String>) -> Self {
        PDFError::Malformed {
            offset,
            detail: detail.into(),
        }
    }

    pub fn truncated(offset: usize) -> Self {
        PDFError::Truncated { offset }
    }

    pub fn unresolved(id: ObjectId) -> Self {
        PDFError::UnresolvedReference { id }
    }

    pub fn filter_error(filter_name: impl Into<String>, detail: impl Into<String>) -> Self {
        PDFError::FilterError {
            filter_name: filter_name.into(),
            detail: detail.into(),
        }
    }

    /// The byte offset this error is anchored to, when known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            PDFError::Malformed { offset, .. } => Some(*offset),
            PDFError::Truncated { offset } => Some(*offset),
            _ => None,
        }
    }
}

/// Result type alias used throughout the crate.
pub type PDFResult<T> = Result<T, PDFError>;
