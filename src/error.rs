//! Error types for the WSDL probe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// WSDL probe errors.
#[derive(Error, Debug)]
pub enum WsdlError {
    #[error("XML syntax error: {0}")]
    Syntax(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsafe document: {0}")]
    UnsafeDocument(String),

    #[error("Malformed WSDL grammar: {0}")]
    MalformedGrammar(String),

    #[error("No services declared in {0}")]
    NoServicesDeclared(String),

    #[error("Invalid WSDL document {uri}: {source}")]
    InvalidDocument {
        uri: String,
        #[source]
        source: Box<WsdlError>,
    },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Malformed endpoint '{address}': {source}")]
    MalformedEndpoint {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WsdlError {
    /// Get the code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Syntax(_) => ErrorCode::SyntaxError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::UnsafeDocument(_) => ErrorCode::UnsafeDocument,
            Self::MalformedGrammar(_) => ErrorCode::MalformedGrammar,
            Self::NoServicesDeclared(_) => ErrorCode::NoServicesDeclared,
            Self::InvalidDocument { .. } => ErrorCode::InvalidDocument,
            Self::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Self::MalformedEndpoint { .. } => ErrorCode::MalformedEndpoint,
            Self::Config(_) => ErrorCode::Config,
            Self::Io(_) => ErrorCode::Io,
        }
    }

    /// Build a malformed endpoint error for an address that failed to parse.
    pub fn malformed_endpoint(address: impl Into<String>, source: url::ParseError) -> Self {
        Self::MalformedEndpoint {
            address: address.into(),
            source,
        }
    }

    /// True when the document could not be read as a WSDL grammar at all.
    ///
    /// These are the failures a probe reports as "not XML".
    pub fn is_unreadable(&self) -> bool {
        matches!(
            self,
            Self::Syntax(_) | Self::Transport(_) | Self::UnsafeDocument(_) | Self::MalformedGrammar(_)
        )
    }
}

/// Result type for WSDL probe operations.
pub type Result<T> = std::result::Result<T, WsdlError>;

/// Stable error codes, used as structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Document is not well-formed XML
    SyntaxError,
    /// Document could not be retrieved
    TransportError,
    /// DOCTYPE or entity declarations present
    UnsafeDocument,
    /// Well-formed XML that is not a usable WSDL grammar
    MalformedGrammar,
    /// WSDL declares zero services
    NoServicesDeclared,
    /// Construction refused the document
    InvalidDocument,
    /// Operation name absent from the model
    UnknownOperation,
    /// Binding address is not a URL
    MalformedEndpoint,
    /// Bad configuration
    Config,
    /// IO failure
    Io,
}

impl ErrorCode {
    /// Get the string code for this error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::UnsafeDocument => "UNSAFE_DOCUMENT",
            Self::MalformedGrammar => "MALFORMED_GRAMMAR",
            Self::NoServicesDeclared => "NO_SERVICES_DECLARED",
            Self::InvalidDocument => "INVALID_DOCUMENT",
            Self::UnknownOperation => "UNKNOWN_OPERATION",
            Self::MalformedEndpoint => "MALFORMED_ENDPOINT",
            Self::Config => "CONFIG_ERROR",
            Self::Io => "IO_ERROR",
        }
    }
}
