use crate::normalize::NormalizedUrl;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use tracing::{debug, info};

/// Politeness check consulted before every fetch when enabled.
pub trait RobotsRules: Send + Sync {
    fn can_fetch(&self, url: &NormalizedUrl) -> bool;
}

/// robots.txt of the crawl origin.
#[derive(Debug, Clone)]
pub struct RobotsTxt {
    body: Option<String>,
    agent: String,
}

impl RobotsTxt {
    /// Rules parsed from `body`, matched for the product token of `user_agent`.
    pub fn new(body: impl Into<String>, user_agent: &str) -> Self {
        Self {
            body: Some(body.into()),
            agent: product_token(user_agent),
        }
    }

    /// Rules for a site without a usable robots.txt: everything is allowed.
    pub fn missing(user_agent: &str) -> Self {
        Self {
            body: None,
            agent: product_token(user_agent),
        }
    }

    /// Download `/robots.txt` from the root's origin. Any failure, including
    /// a non-2xx status, yields [`RobotsTxt::missing`].
    pub async fn fetch(client: &Client, root: &NormalizedUrl, user_agent: &str) -> Self {
        let Some(robots_url) = root.origin_path("/robots.txt") else {
            return Self::missing(user_agent);
        };

        match client.get(robots_url.as_str()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    info!("Loaded robots.txt from {} ({} bytes)", robots_url, body.len());
                    Self::new(body, user_agent)
                }
                Err(e) => {
                    debug!("Could not read robots.txt body: {}", e);
                    Self::missing(user_agent)
                }
            },
            Ok(response) => {
                debug!("No robots.txt at {} (HTTP {})", robots_url, response.status());
                Self::missing(user_agent)
            }
            Err(e) => {
                debug!("Could not fetch robots.txt: {}", e);
                Self::missing(user_agent)
            }
        }
    }

    /// `Sitemap:` declarations, in file order.
    pub fn sitemaps(&self) -> Vec<String> {
        let Some(body) = &self.body else {
            return Vec::new();
        };
        body.lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case("sitemap")
                    .then(|| value.trim().to_string())
            })
            .filter(|v| !v.is_empty())
            .collect()
    }
}

impl RobotsRules for RobotsTxt {
    fn can_fetch(&self, url: &NormalizedUrl) -> bool {
        match &self.body {
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.agent, url.as_str())
            }
            None => true,
        }
    }
}

/// `sitegraph/0.1.0 (+https://...)` matches robots groups as `sitegraph`.
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .filter(|t| !t.is_empty())
        .unwrap_or("*")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const ROBOTS: &str = "User-agent: *\n\
                          Disallow: /private\n\
                          \n\
                          User-agent: sitegraph\n\
                          Disallow: /admin\n\
                          Allow: /admin/public\n\
                          \n\
                          Sitemap: https://example.com/sitemap.xml\n\
                          sitemap: https://example.com/news-sitemap.xml\n";

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::parse(s).unwrap()
    }

    #[test]
    fn test_specific_agent_group_applies() {
        let robots = RobotsTxt::new(ROBOTS, "sitegraph/0.1.0 (+https://example.com)");

        assert!(!robots.can_fetch(&url("https://example.com/admin/users")));
        assert!(robots.can_fetch(&url("https://example.com/admin/public/page")));
        // The `*` group does not apply when a specific group matches.
        assert!(robots.can_fetch(&url("https://example.com/private")));
    }

    #[test]
    fn test_wildcard_group_for_other_agents() {
        let robots = RobotsTxt::new(ROBOTS, "otherbot/2.0");

        assert!(!robots.can_fetch(&url("https://example.com/private/x")));
        assert!(robots.can_fetch(&url("https://example.com/admin")));
    }

    #[test]
    fn test_missing_allows_everything() {
        let robots = RobotsTxt::missing("sitegraph/0.1.0");
        assert!(robots.can_fetch(&url("https://example.com/anything")));
        assert!(robots.sitemaps().is_empty());
    }

    #[test]
    fn test_sitemap_declarations() {
        let robots = RobotsTxt::new(ROBOTS, "sitegraph");
        assert_eq!(
            robots.sitemaps(),
            vec![
                "https://example.com/sitemap.xml",
                "https://example.com/news-sitemap.xml"
            ]
        );
    }

    #[test]
    fn test_product_token() {
        assert_eq!(product_token("sitegraph/0.1.0 (+https://x)"), "sitegraph");
        assert_eq!(product_token("plainbot"), "plainbot");
        assert_eq!(product_token(""), "*");
    }

    #[tokio::test]
    async fn test_fetch_from_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /x\n"))
            .mount(&server)
            .await;

        let root = url(&format!("{}/deep/page", server.uri()));
        let robots = RobotsTxt::fetch(&Client::new(), &root, "sitegraph").await;

        assert!(!robots.can_fetch(&url(&format!("{}/x/y", server.uri()))));
        assert!(robots.can_fetch(&url(&format!("{}/y", server.uri()))));
    }

    #[tokio::test]
    async fn test_fetch_404_allows_everything() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = url(&server.uri());
        let robots = RobotsTxt::fetch(&Client::new(), &root, "sitegraph").await;

        assert!(robots.can_fetch(&url(&format!("{}/x", server.uri()))));
    }
}
