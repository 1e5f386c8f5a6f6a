//! Error taxonomy for the consul client.
//!
//! Every failure the client can report is a [`ConsulError`].  Decode
//! failures never produce partial results: the decoder returns the
//! first error it meets, with the field name and the observed JSON type
//! where one applies.  Callers classify errors with [`ConsulError::kind`]
//! and map them to process exit codes with [`ConsulError::exit_code`].

use thiserror::Error;

use crate::json::JsonKind;

/// sysexits(3) codes used by the CLI.
pub mod exit {
    pub const OK: u8 = 0;
    pub const USAGE: u8 = 64;
    pub const SOFTWARE: u8 = 70;
    pub const TEMPFAIL: u8 = 75;
    pub const PROTOCOL: u8 = 76;
    pub const CONFIG: u8 = 78;
}

/// Coarse classification of a [`ConsulError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-2xx status or a failure inside the HTTP transport.
    Transport,
    /// The body was not valid JSON.
    Parse,
    /// The JSON root had the wrong structure or was unexpectedly empty.
    Shape,
    /// A named field held the wrong JSON type.
    FieldType,
    /// A numeric field overflowed or an encoded field did not decode.
    Range,
    /// A string failed a sub-pattern such as `host:port`.
    Format,
    /// Invalid operator input (arguments, configuration).
    Usage,
}

impl ErrorKind {
    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Parse => "parse",
            ErrorKind::Shape => "shape",
            ErrorKind::FieldType => "field_type",
            ErrorKind::Range => "range",
            ErrorKind::Format => "format",
            ErrorKind::Usage => "usage",
        }
    }
}

/// Errors produced while talking to a consul agent or decoding its replies.
#[derive(Debug, Error)]
pub enum ConsulError {
    /// The agent answered with a non-2xx status.
    #[error("consul agent returned error {status} for {url}")]
    Status { status: u16, url: String },

    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// JSON syntax error; carries the parser diagnostic.
    #[error("Parsing JSON failed: {0}")]
    Parse(String),

    /// Wrong root type, or an unexpectedly empty array/object.
    #[error("{0}")]
    Shape(String),

    /// A named field is present but has the wrong JSON type.
    #[error("{field}'s value is not a {expected}: {found}")]
    FieldType {
        field: &'static str,
        expected: JsonKind,
        found: JsonKind,
    },

    /// A field's content does not fit its target representation.
    #[error("{field} is not a valid {expected}: {text}")]
    Range {
        field: &'static str,
        expected: &'static str,
        text: String,
    },

    /// A string value does not match its expected pattern.
    #[error("{0}")]
    Format(String),

    /// Invalid operator input.
    #[error("{0}")]
    Usage(String),

    /// An inner error wrapped with collection-level context.
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<ConsulError>,
    },
}

impl ConsulError {
    /// Error for a JSON root that should have been an array.
    pub fn expected_array(found: JsonKind) -> Self {
        ConsulError::Shape(format!("Expected array, received {found} as input."))
    }

    /// Wrap `self` with a context prefix, preserving its kind.
    pub fn context(self, context: &'static str) -> Self {
        ConsulError::Context {
            context,
            source: Box::new(self),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsulError::Status { .. } | ConsulError::Transport { .. } => ErrorKind::Transport,
            ConsulError::Parse(_) => ErrorKind::Parse,
            ConsulError::Shape(_) => ErrorKind::Shape,
            ConsulError::FieldType { .. } => ErrorKind::FieldType,
            ConsulError::Range { .. } => ErrorKind::Range,
            ConsulError::Format(_) => ErrorKind::Format,
            ConsulError::Usage(_) => ErrorKind::Usage,
            ConsulError::Context { source, .. } => source.kind(),
        }
    }

    /// Process exit status for CLI flows.
    ///
    /// A non-2xx reply is a temporary failure, a reply that cannot be
    /// understood is a protocol error, and a transport that failed
    /// outright is a software error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConsulError::Status { .. } => exit::TEMPFAIL,
            ConsulError::Transport { .. } => exit::SOFTWARE,
            ConsulError::Usage(_) => exit::USAGE,
            ConsulError::Context { source, .. } => source.exit_code(),
            ConsulError::Parse(_)
            | ConsulError::Shape(_)
            | ConsulError::FieldType { .. }
            | ConsulError::Range { .. }
            | ConsulError::Format(_) => exit::PROTOCOL,
        }
    }
}

impl From<serde_json::Error> for ConsulError {
    fn from(err: serde_json::Error) -> Self {
        ConsulError::Parse(err.to_string())
    }
}
