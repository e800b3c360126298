//! The fetched resource handed over by the fetch layer.

/// One fetched resource: bytes plus the metadata the fetch layer recorded.
///
/// Owned by the caller and only ever borrowed by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    /// Raw response body.
    pub bytes: Vec<u8>,

    /// URL the content was fetched from.
    pub url: String,

    /// Base URL for resolving relative links (after redirects).
    pub base_url: String,

    /// Transport `Content-Type`, if the server sent one.
    pub content_type: Option<String>,

    /// Remaining transport headers, in received order.
    pub headers: Vec<(String, String)>,
}

impl RawDocument {
    /// Create a document whose base URL equals its URL.
    #[must_use]
    pub fn new(url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            bytes: bytes.into(),
            base_url: url.clone(),
            url,
            content_type: None,
            headers: Vec::new(),
        }
    }

    /// Set the declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set a base URL different from the fetch URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Add a transport header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup (first occurrence).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The effective declared content type: the explicit field, else the
    /// `Content-Type` header.
    #[must_use]
    pub fn declared_content_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.header("content-type"))
    }
}
