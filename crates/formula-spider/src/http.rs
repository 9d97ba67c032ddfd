use crate::error::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use reqwest::header::{REFERER, USER_AGENT};
use std::time::Duration;
use tracing::{error, trace};

pub use reqwest::Client as HttpClient;

/// Browsers to pose as; one is picked per request.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (X11; Linux x86_64; rv:88.0) Gecko/20100101 Firefox/88.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.77 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36",
];

const REFERERS: [&str; 4] = [
    "https://au.finance.yahoo.com",
    "https://finance.yahoo.com",
    "https://www.google.com",
    "https://duckduckgo.com",
];

/// Source of raw page markup.
///
/// The batch scraper is generic over this trait, so pages can come from the network
/// ([`HttpFetcher`]) or from memory in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body as text.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`Fetcher`] over HTTP, randomizing the `User-Agent` and `Referer` of every request.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let (user_agent, referer) = random_identity();
        trace!("GET {url} as \"{user_agent}\" from {referer}");

        let body = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(REFERER, referer)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                error!("failed to fetch {url}, error({err})");
                err
            })?
            .text()
            .await?;

        Ok(body)
    }
}

/// The default client: browser-like headers, compressed bodies, a 30 second timeout.
pub fn build_client() -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    let client = reqwest::ClientBuilder::new()
        .default_headers(headers)
        .gzip(true)
        .timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

fn random_identity() -> (&'static str, &'static str) {
    let mut rng = rand::thread_rng();
    let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    let referer = REFERERS.choose(&mut rng).copied().unwrap_or(REFERERS[0]);
    (user_agent, referer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_comes_from_the_pools() {
        for _ in 0..20 {
            let (user_agent, referer) = random_identity();
            assert!(USER_AGENTS.contains(&user_agent));
            assert!(REFERERS.contains(&referer));
        }
    }

    #[test]
    fn client_builds() {
        assert!(HttpFetcher::new().is_ok());
    }
}
