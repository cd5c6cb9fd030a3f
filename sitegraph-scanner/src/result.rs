use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified outcome of fetching one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    /// A 3xx response that was not (or could not be) followed.
    Redirect,
    ClientError,
    ServerError,
    NetworkError,
    Timeout,
}

impl FetchStatus {
    pub fn is_success(self) -> bool {
        matches!(self, FetchStatus::Success)
    }

    pub fn from_status_code(code: u16) -> Self {
        match code {
            200..=299 => FetchStatus::Success,
            300..=399 => FetchStatus::Redirect,
            400..=499 => FetchStatus::ClientError,
            _ => FetchStatus::ServerError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Redirect => "redirect",
            FetchStatus::ClientError => "client_error",
            FetchStatus::ServerError => "server_error",
            FetchStatus::NetworkError => "network_error",
            FetchStatus::Timeout => "timeout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FetchStatus::Success),
            "redirect" => Some(FetchStatus::Redirect),
            "client_error" => Some(FetchStatus::ClientError),
            "server_error" => Some(FetchStatus::ServerError),
            "network_error" => Some(FetchStatus::NetworkError),
            "timeout" => Some(FetchStatus::Timeout),
            _ => None,
        }
    }
}

/// Everything the scheduler needs to know about a fetch. Failures are
/// values here, never errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub status: FetchStatus,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    /// Where the request ended up after redirects, if that differs from `url`.
    pub final_url: Option<String>,
    /// Present only for [`FetchStatus::Success`].
    #[serde(skip)]
    pub body: Option<String>,
    pub response_time: Duration,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn success(url: String, status_code: u16, body: String) -> Self {
        Self {
            url,
            status: FetchStatus::Success,
            status_code: Some(status_code),
            content_type: None,
            final_url: None,
            body: Some(body),
            response_time: Duration::from_secs(0),
            error: None,
        }
    }

    /// A 2xx response whose body was not read, e.g. a PDF.
    pub fn without_body(url: String, status_code: u16) -> Self {
        Self {
            body: None,
            ..Self::success(url, status_code, String::new())
        }
    }

    pub fn http_failure(url: String, status_code: u16) -> Self {
        Self {
            url,
            status: FetchStatus::from_status_code(status_code),
            status_code: Some(status_code),
            content_type: None,
            final_url: None,
            body: None,
            response_time: Duration::from_secs(0),
            error: None,
        }
    }

    pub fn with_error(url: String, status: FetchStatus, error: String) -> Self {
        Self {
            url,
            status,
            status_code: None,
            content_type: None,
            final_url: None,
            body: None,
            response_time: Duration::from_secs(0),
            error: Some(error),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// True when the body should be handed to the link extractor.
    pub fn is_html(&self) -> bool {
        is_html_content_type(self.content_type.as_deref())
    }
}

/// Whether a response with this `Content-Type` is parsed for links. A
/// missing content type is treated as HTML.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.starts_with("text/html") || ct.starts_with("application/xhtml+xml")
    })
}
