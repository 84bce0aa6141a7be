// src/error.rs

/// Terminal failure kinds for building and writing a message.
///
/// For the negotiation kinds the `Display` text is the user-facing diagnostic
/// the host shows verbatim, so it must not change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("URI must contain only ASCII characters")]
    UnsupportedEncoding,

    #[error("Tag doesn't support NDEF.")]
    UnsupportedTag,

    #[error("Tag is read-only")]
    ReadOnlyTag,

    #[error("Tag capacity is {max} bytes, message is {size} bytes.")]
    CapacityExceeded { max: usize, size: usize },

    #[error("Failed to format tag.")]
    FormatFailure,

    #[error("Failed to write tag")]
    IoFailure,
}

/// Faults raised by the tag primitives themselves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// The tag left the field, or the reader reset it.
    #[error("tag was lost")]
    TagLost,

    #[error("tag i/o error: {0}")]
    Io(String),

    /// The tag answered, but not with anything we understand.
    #[error("unexpected tag response: {0}")]
    Protocol(String),
}

impl TagError {
    /// Lost tags and transport errors, as opposed to malformed responses.
    pub fn is_io(&self) -> bool {
        matches!(self, TagError::TagLost | TagError::Io(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
