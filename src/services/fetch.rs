// src/services/fetch.rs

//! Rate-limited, retried page fetching.
//!
//! All fetches of one crawl share a bounded permit pool, so the portal
//! never sees more than `crawler.max_concurrent` in-flight requests.
//! Transient failures are retried with capped exponential backoff plus
//! jitter; throttling responses force a longer mandatory wait; responses
//! that look like a login page are surfaced as an auth challenge instead
//! of being retried blindly.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use rand::Rng;
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::services::parse::PageContent;

/// Create the crawl's shared HTTP client.
///
/// The cookie store carries the portal session established by the
/// authenticator; fetcher and authenticator must use the same client.
pub fn create_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Performs bounded, retried HTTP fetches using the session's client.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    pool: Arc<Semaphore>,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    rate_limit_backoff: Duration,
    request_delay: Duration,
}

impl PageFetcher {
    pub fn new(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            pool: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Fetch a page, holding one pool permit for the request's duration.
    ///
    /// Retries transient network failures up to the configured bound.
    /// Auth challenges are never retried here; the crawler maps them to a
    /// session renewal followed by a single re-fetch.
    pub async fn fetch(&self, url: &Url) -> Result<PageContent> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|_| AppError::crawl("fetcher", "worker pool closed"))?;

        let mut attempt: u32 = 0;
        loop {
            let result = self.try_fetch(url).await;

            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match result {
                Ok(page) => return Ok(page),
                Err(error @ AppError::Network { .. }) if attempt < self.max_retries => {
                    let delay = with_jitter(backoff_delay(
                        attempt,
                        self.backoff_base,
                        self.backoff_cap,
                    ));
                    log::debug!(
                        "retrying {url} after {}ms (attempt {}): {error}",
                        delay.as_millis(),
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AppError::RateLimited { .. }) if attempt < self.max_retries => {
                    log::warn!(
                        "portal throttled {url}, backing off {}ms",
                        self.rate_limit_backoff.as_millis()
                    );
                    tokio::time::sleep(with_jitter(self.rate_limit_backoff)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Open a download as a byte stream, holding a pool permit for the
    /// stream's whole lifetime.
    ///
    /// The response is classified like a page fetch before any bytes are
    /// handed out, so throttling and expired-session redirects surface as
    /// typed errors instead of streaming a login page into file content.
    pub async fn download(&self, url: &Url) -> Result<impl Stream<Item = Result<Bytes>> + use<>> {
        let permit = self
            .pool
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::crawl("fetcher", "worker pool closed"))?;

        let mut attempt: u32 = 0;
        let response = loop {
            match self.try_download(url).await {
                Ok(response) => break response,
                Err(error @ AppError::Network { .. }) if attempt < self.max_retries => {
                    let delay = with_jitter(backoff_delay(
                        attempt,
                        self.backoff_base,
                        self.backoff_cap,
                    ));
                    log::debug!(
                        "retrying download {url} after {}ms: {error}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AppError::RateLimited { .. }) if attempt < self.max_retries => {
                    tokio::time::sleep(with_jitter(self.rate_limit_backoff)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        };

        Ok(response
            .bytes_stream()
            .map_err(AppError::from)
            .map(move |chunk| {
                let _ = &permit;
                chunk
            }))
    }

    async fn try_download(&self, url: &Url) -> Result<reqwest::Response> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(error) => return Err(AppError::network(url.as_str(), error)),
        };
        classify_status(url, response.status())?;
        // An expired session redirects the download to the SSO login.
        if looks_like_login(response.url(), "") {
            return Err(AppError::AuthChallenge {
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn try_fetch(&self, url: &Url) -> Result<PageContent> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(error) => return Err(AppError::network(url.as_str(), error)),
        };
        classify_status(url, response.status())?;

        let final_url = response.url().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => return Err(AppError::network(url.as_str(), error)),
        };

        // An expired session answers dispatch URLs with the login page.
        if looks_like_login(&final_url, &body) {
            return Err(AppError::AuthChallenge {
                url: url.to_string(),
            });
        }

        Ok(PageContent::new(final_url, body))
    }
}

/// Map throttling and auth statuses to their typed errors.
fn classify_status(url: &Url, status: StatusCode) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(AppError::RateLimited {
            url: url.to_string(),
        });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AppError::AuthChallenge {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(AppError::network(
            url.as_str(),
            format!("unexpected status {status}"),
        ));
    }
    Ok(())
}

/// Exponential backoff delay for a retry attempt, without jitter.
fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).min(cap)
}

/// Add up to 50% random jitter on top of a delay.
fn with_jitter(delay: Duration) -> Duration {
    let half = (delay.as_millis() / 2) as u64;
    if half == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=half))
}

/// Whether a response was redirected to (or renders) the SSO login.
fn looks_like_login(final_url: &Url, body: &str) -> bool {
    if final_url.path().contains("/Shibboleth.sso") {
        return true;
    }
    if final_url
        .query()
        .is_some_and(|q| q.contains("sso=shib") || q.contains("again=yes"))
    {
        return true;
    }
    body.contains("name=\"j_username\"")
}
