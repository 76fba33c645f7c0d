use reqwest::StatusCode;
use slicefeed_types::SliceRangeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error returned by payload decoders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum JournalError {
    /// The caller passed an offset this journal cannot resume from.
    #[error("unsupported offset kind `{kind}`: only timestamp offsets or no offset are accepted")]
    InvalidOffsetKind { kind: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid slice range {min}..={max}")]
    InvalidSliceRange { min: i32, max: i32 },

    #[error(transparent)]
    InvalidSliceRanges(#[from] SliceRangeError),

    /// The producer sent something outside the protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("producer returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("event stream closed by producer")]
    StreamClosed,

    #[error("no payload decoder registered for type `{type_tag}`")]
    UnknownPayloadType { type_tag: String },

    #[error("failed to decode payload of type `{type_tag}`: {source}")]
    PayloadDecode {
        type_tag: String,
        #[source]
        source: BoxError,
    },
}

impl JournalError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Transport-level failures: the connection, not the content, went wrong.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::StreamClosed
        )
    }

    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }
}

pub type Result<T, E = JournalError> = std::result::Result<T, E>;
