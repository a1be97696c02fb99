//! Document retrieval.
//!
//! The probe only needs "give me the text behind this URI". Any failure to
//! get it, whatever the cause, is a `WsdlError::Transport`. Bytes that do
//! not decode in the document's charset are a `WsdlError::Syntax`.

use crate::config::FetchConfig;
use crate::error::{Result, WsdlError};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Something that can retrieve a document by URI.
pub trait DocumentSource: Send + Sync {
    /// Fetch the document at `uri` as text.
    fn fetch(&self, uri: &Url) -> Result<String>;
}

/// Blocking HTTP(S) retrieval.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    max_document_size: usize,
}

impl HttpSource {
    /// Create a source from fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WsdlError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_document_size: config.max_document_size,
        })
    }
}

impl DocumentSource for HttpSource {
    fn fetch(&self, uri: &Url) -> Result<String> {
        debug!(uri = %uri, "Fetching document");

        let response = self
            .client
            .get(uri.clone())
            .send()
            .map_err(|e| WsdlError::Transport(format!("GET {} failed: {}", uri, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WsdlError::Transport(format!("GET {} returned {}", uri, status)));
        }

        let charset = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_type_charset);

        if let Some(length) = response.content_length() {
            if length > self.max_document_size as u64 {
                return Err(WsdlError::Transport(format!(
                    "document size {} exceeds maximum {}",
                    length, self.max_document_size
                )));
            }
        }

        // Content-Length can be absent or wrong; cap the read itself.
        let mut body = Vec::new();
        response
            .take(self.max_document_size as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| WsdlError::Transport(format!("reading {} failed: {}", uri, e)))?;

        if body.len() > self.max_document_size {
            return Err(WsdlError::Transport(format!(
                "document exceeds maximum size {}",
                self.max_document_size
            )));
        }

        decode_document(&body, charset.as_deref())
    }
}

/// Decode a fetched document to text.
///
/// The charset is taken from the byte order mark, then the XML
/// declaration, then the transport `charset`, and defaults to UTF-8.
pub fn decode_document(bytes: &[u8], charset: Option<&str>) -> Result<String> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_length)) => (encoding, &bytes[bom_length..]),
        None => {
            let encoding = sniff_utf16(bytes)
                .or_else(|| declared_encoding(bytes))
                .or_else(|| charset.and_then(|label| Encoding::for_label(label.trim().as_bytes())))
                .unwrap_or(UTF_8);
            (encoding, bytes)
        }
    };

    debug!(encoding = encoding.name(), "Decoding document");

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(Cow::into_owned)
        .ok_or_else(|| WsdlError::Syntax(format!("document is not valid {}", encoding.name())))
}

/// UTF-16 without a byte order mark, recognised by `<?` in either byte order.
fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    match bytes {
        [b'<', 0, b'?', 0, ..] => Some(UTF_16LE),
        [0, b'<', 0, b'?', ..] => Some(UTF_16BE),
        _ => None,
    }
}

/// The `encoding` pseudo-attribute of a leading `<?xml ... ?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let rest = bytes.strip_prefix(b"<?xml")?;
    let end = rest.windows(2).take(512).position(|pair| pair == b"?>")?;
    let declaration = std::str::from_utf8(&rest[..end]).ok()?;

    let value = declaration
        .split_once("encoding")?
        .1
        .trim_start()
        .strip_prefix('=')?
        .trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = value[1..].split(quote).next()?;
    let encoding = Encoding::for_label(label.as_bytes())?;

    // An ASCII-readable declaration rules out UTF-16 whatever it claims.
    if encoding == UTF_16LE || encoding == UTF_16BE {
        Some(UTF_8)
    } else {
        Some(encoding)
    }
}

/// `charset` parameter of a Content-Type header value.
fn content_type_charset(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// In-memory documents keyed by URI.
#[derive(Default)]
pub struct MemorySource {
    documents: RwLock<HashMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the document served for `uri`.
    pub fn insert(&self, uri: &Url, document: impl Into<String>) {
        if let Ok(mut documents) = self.documents.write() {
            documents.insert(uri.to_string(), document.into());
        }
    }

    /// Stop serving `uri`.
    pub fn remove(&self, uri: &Url) {
        if let Ok(mut documents) = self.documents.write() {
            documents.remove(uri.as_str());
        }
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, uri: &Url) -> Result<String> {
        let documents = self
            .documents
            .read()
            .map_err(|_| WsdlError::Transport("document store poisoned".to_string()))?;
        documents
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| WsdlError::Transport(format!("{} not found", uri)))
    }
}
