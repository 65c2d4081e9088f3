//! Raw resource transport
//!
//! Downloads the bytes behind a URL. HTTP(S) goes through a blocking
//! `reqwest` client, `file://` URLs are read from disk. Transports never
//! retry; a missing resource is reported as `FetchError::NotFound`.

use reqwest::blocking::Client;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors that can occur while fetching a resource
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Resource does not exist at that location
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status other than 404
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    /// Network or IO failure
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Content too large
    #[error("Content too large: {size} bytes (max: {max})")]
    ContentTooLarge { size: u64, max: u64 },

    /// URL scheme without a transport
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }

    fn transport(url: &Url, err: impl ToString) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Maximum size of a single download (512 MB)
pub const MAX_CONTENT_SIZE: u64 = 512 * 1024 * 1024;

/// HTTP request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can turn a URL into bytes
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) transport
pub struct HttpTransport {
    client: Client,
    max_size: u64,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("depfetch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            max_size: MAX_CONTENT_SIZE,
        })
    }

    /// Create an HTTP transport with a custom size limit
    pub fn with_max_size(max_size: u64) -> Result<Self, FetchError> {
        let mut transport = Self::new()?;
        transport.max_size = max_size;
        Ok(transport)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_size {
                return Err(FetchError::ContentTooLarge {
                    size: len,
                    max: self.max_size,
                });
            }
        }

        // Read content with size limit
        let mut content = Vec::new();
        let mut reader = response.take(self.max_size + 1);
        reader
            .read_to_end(&mut content)
            .map_err(|e| FetchError::transport(url, e))?;

        if content.len() as u64 > self.max_size {
            return Err(FetchError::ContentTooLarge {
                size: content.len() as u64,
                max: self.max_size,
            });
        }

        Ok(content)
    }
}

/// `file://` transport
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::UnsupportedScheme(url.scheme().to_string()))?;

        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(url.to_string()))
            }
            Err(e) => Err(FetchError::transport(url, e)),
        }
    }
}

/// Dispatches on the URL scheme
pub struct DefaultTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl DefaultTransport {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpTransport::new()?,
            file: FileTransport,
        })
    }
}

impl Transport for DefaultTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        match url.scheme() {
            "http" | "https" => self.http.fetch(url),
            "file" => self.file.fetch(url),
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}
