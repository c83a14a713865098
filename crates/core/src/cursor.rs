//! Pagination cursors.
//!
//! Every source paginates differently. The core stores and hands back a
//! [`Cursor`] without looking inside; each adapter accepts only its own variant
//! and turns it into request parameters.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Opaque pagination position, tagged by idiom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cursor {
    /// Page number plus number of items consumed so far.
    PageOffset { page: u32, offset: u32 },
    /// Continuation token issued by the source (e.g. `nextPageToken`).
    OpaqueToken { token: String },
    /// Continuation cursor issued by the source (e.g. `after`).
    OpaqueCursor { cursor: String },
    /// Id or timestamp of the last item seen; the next page starts after it.
    Watermark { id: String },
}

impl Cursor {
    pub fn kind(&self) -> &'static str {
        match self {
            Cursor::PageOffset { .. } => "page_offset",
            Cursor::OpaqueToken { .. } => "opaque_token",
            Cursor::OpaqueCursor { .. } => "opaque_cursor",
            Cursor::Watermark { .. } => "watermark",
        }
    }

    /// `(page, offset)` for page-numbered sources; `first_page` when there is no cursor yet.
    pub fn page_offset(cursor: Option<&Cursor>, first_page: u32) -> Result<(u32, u32), SourceError> {
        match cursor {
            None => Ok((first_page, 0)),
            Some(Cursor::PageOffset { page, offset }) => Ok((*page, *offset)),
            Some(other) => Err(mismatch("page_offset", other)),
        }
    }

    pub fn token(cursor: Option<&Cursor>) -> Result<Option<&str>, SourceError> {
        match cursor {
            None => Ok(None),
            Some(Cursor::OpaqueToken { token }) => Ok(Some(token)),
            Some(other) => Err(mismatch("opaque_token", other)),
        }
    }

    pub fn opaque(cursor: Option<&Cursor>) -> Result<Option<&str>, SourceError> {
        match cursor {
            None => Ok(None),
            Some(Cursor::OpaqueCursor { cursor }) => Ok(Some(cursor)),
            Some(other) => Err(mismatch("opaque_cursor", other)),
        }
    }

    pub fn watermark(cursor: Option<&Cursor>) -> Result<Option<&str>, SourceError> {
        match cursor {
            None => Ok(None),
            Some(Cursor::Watermark { id }) => Ok(Some(id)),
            Some(other) => Err(mismatch("watermark", other)),
        }
    }
}

fn mismatch(expected: &str, found: &Cursor) -> SourceError {
    SourceError::InvalidCursor { expected: expected.to_string(), found: found.kind().to_string() }
}
