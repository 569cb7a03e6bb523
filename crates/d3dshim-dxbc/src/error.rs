use thiserror::Error;

/// Errors produced while parsing a `DXBC` container or one of its chunks.
///
/// Every variant carries a human-readable context string describing the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DxbcError {
    /// The fixed container header is truncated or has invalid values.
    #[error("malformed DXBC header: {context}")]
    MalformedHeader {
        /// What was wrong.
        context: String,
    },
    /// The chunk offset table points somewhere it must not.
    #[error("malformed DXBC chunk offsets: {context}")]
    MalformedOffsets {
        /// What was wrong.
        context: String,
    },
    /// A declared size or offset runs past the end of the data.
    #[error("DXBC data out of bounds: {context}")]
    OutOfBounds {
        /// What was wrong.
        context: String,
    },
    /// A chunk payload could not be decoded.
    #[error("invalid DXBC chunk: {context}")]
    InvalidChunk {
        /// What was wrong.
        context: String,
    },
}

impl DxbcError {
    pub(crate) fn malformed_header(context: impl Into<String>) -> Self {
        Self::MalformedHeader {
            context: context.into(),
        }
    }

    pub(crate) fn malformed_offsets(context: impl Into<String>) -> Self {
        Self::MalformedOffsets {
            context: context.into(),
        }
    }

    pub(crate) fn out_of_bounds(context: impl Into<String>) -> Self {
        Self::OutOfBounds {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_chunk(context: impl Into<String>) -> Self {
        Self::InvalidChunk {
            context: context.into(),
        }
    }

    /// Returns the context string without the variant prefix.
    pub fn context(&self) -> &str {
        match self {
            Self::MalformedHeader { context }
            | Self::MalformedOffsets { context }
            | Self::OutOfBounds { context }
            | Self::InvalidChunk { context } => context,
        }
    }
}
