use crate::error::Result;
use crate::normalize::NormalizedUrl;
use crate::result::{FetchResult, FetchStatus, is_html_content_type};
use futures::future::BoxFuture;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default identifying user agent.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "sitegraph/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/trapdoorsec/sitegraph)"
);

/// Retrieves page content for the scheduler.
///
/// Implementations must never fail past this boundary: every outcome,
/// including transport errors and timeouts, is a [`FetchResult`].
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a NormalizedUrl) -> BoxFuture<'a, FetchResult>;
}

/// [`Fetch`] over HTTP with a per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration, max_redirects: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()?;

        Ok(Self { client })
    }

    /// The underlying client, shared with the robots.txt and sitemap readers.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn fetch_url(&self, url: &str) -> FetchResult {
        debug!("Fetching {}", url);
        let start = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Self::classify_error(url, e, start.elapsed()),
        };

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let final_url = Some(response.url().as_str())
            .filter(|u| *u != url)
            .map(|u| u.to_string());

        let mut result = if !response.status().is_success() {
            FetchResult::http_failure(url.to_string(), status_code)
        } else if !is_html_content_type(content_type.as_deref()) {
            // Links only come out of HTML, so the body is never downloaded.
            debug!("Not reading {} body of {}", content_type.as_deref().unwrap_or("?"), url);
            FetchResult::without_body(url.to_string(), status_code)
        } else {
            match response.text().await {
                Ok(body) => FetchResult::success(url.to_string(), status_code, body),
                Err(e) => {
                    let mut failed = Self::classify_error(url, e, start.elapsed());
                    failed.status_code = Some(status_code);
                    return failed;
                }
            }
        };

        result.content_type = content_type;
        result.final_url = final_url;
        result.response_time = start.elapsed();
        result
    }

    fn classify_error(url: &str, error: reqwest::Error, elapsed: Duration) -> FetchResult {
        let status = if error.is_timeout() {
            FetchStatus::Timeout
        } else if error.is_redirect() {
            FetchStatus::Redirect
        } else {
            FetchStatus::NetworkError
        };
        debug!("Fetch of {} failed ({}): {}", url, status.as_str(), error);

        let mut result = FetchResult::with_error(url.to_string(), status, error.to_string());
        result.response_time = elapsed;
        result
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a NormalizedUrl) -> BoxFuture<'a, FetchResult> {
        Box::pin(self.fetch_url(url.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(DEFAULT_USER_AGENT, Duration::from_millis(500), 5).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> NormalizedUrl {
        NormalizedUrl::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>hi</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let result = fetcher().fetch(&url(&server, "/page")).await;

        assert_eq!(result.status, FetchStatus::Success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.content_type.as_deref(), Some("text/html"));
        assert!(result.body.unwrap().contains("hi"));
        assert!(result.final_url.is_none());
    }

    #[tokio::test]
    async fn test_non_html_body_is_not_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(vec![0u8; 64 * 1024]),
            )
            .mount(&server)
            .await;

        let result = fetcher().fetch(&url(&server, "/report.pdf")).await;

        assert_eq!(result.status, FetchStatus::Success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.content_type.as_deref(), Some("application/pdf"));
        assert!(result.body.is_none());
    }

    #[tokio::test]
    async fn test_client_and_server_errors_have_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let missing = fetcher().fetch(&url(&server, "/missing")).await;
        assert_eq!(missing.status, FetchStatus::ClientError);
        assert_eq!(missing.status_code, Some(404));
        assert!(missing.body.is_none());

        let broken = fetcher().fetch(&url(&server, "/broken")).await;
        assert_eq!(broken.status, FetchStatus::ServerError);
        assert_eq!(broken.status_code, Some(503));
        assert!(broken.body.is_none());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let start = Instant::now();
        let result = fetcher().fetch(&url(&server, "/slow")).await;

        assert_eq!(result.status, FetchStatus::Timeout);
        assert!(result.body.is_none());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = NormalizedUrl::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let result = fetcher().fetch(&target).await;

        assert_eq!(result.status, FetchStatus::NetworkError);
        assert!(result.body.is_none());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_follows_redirects_and_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&url(&server, "/old")).await;

        assert_eq!(result.status, FetchStatus::Success);
        assert_eq!(result.final_url, Some(format!("{}/new", server.uri())));
    }

    #[tokio::test]
    async fn test_redirect_loop_is_classified_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/loop", server.uri())),
            )
            .mount(&server)
            .await;

        let result = fetcher().fetch(&url(&server, "/loop")).await;

        assert_eq!(result.status, FetchStatus::Redirect);
        assert!(result.body.is_none());
    }
}
