use std::time::Duration;
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, Proxy, Response};
use tokio_util::sync::CancellationToken;
use crate::downloader::Transfer;
use crate::errors::{AppError, Result};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// HTTP connection pool used for every byte transfer.
///
/// There is no overall request timeout: a stalled transfer only ends when the
/// owning job is canceled.
pub struct HttpPool {
    client: Client,
    max_connections: usize,
    retry_delay: Duration,
}

impl HttpPool {
    pub fn new(max_connections: usize) -> Result<Self> {
        let client = Self::builder(max_connections).build()?;

        Ok(Self {
            client,
            max_connections,
            retry_delay: RETRY_DELAY,
        })
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Result<Self> {
        let proxy = Proxy::all(proxy_url)?;
        self.client = Self::builder(self.max_connections).proxy(proxy).build()?;
        Ok(self)
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }

    fn builder(max_connections: usize) -> ClientBuilder {
        ClientBuilder::new()
            .pool_max_idle_per_host(max_connections)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .connect_timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .gzip(true)
            .brotli(true)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
    }

    /// Sends the request, retrying only failures to connect.
    async fn send_with_retry<F>(&self, url: &str, cancel: &CancellationToken, build: F) -> Result<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Canceled),
                sent = build().send() => sent,
            };

            match sent {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    return Err(AppError::Network(format!("HTTP error {} for {}", response.status(), url)));
                }
                Err(e) if e.is_connect() && attempt < MAX_RETRIES => {
                    log::warn!("[HTTP] Attempt {} of {} failed: {}", attempt, MAX_RETRIES, e);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(AppError::Canceled),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) if e.is_connect() => {
                    return Err(AppError::Network(format!("Could not reach {}: {}", url, e)));
                }
                Err(e) => return Err(AppError::Http(e)),
            }
        }
    }
}

#[async_trait::async_trait]
impl Transfer for HttpPool {
    async fn probe_size(&self, url: &str, cancel: &CancellationToken) -> Result<u64> {
        let response = self.send_with_retry(url, cancel, || self.client.head(url)).await?;

        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or_else(|| AppError::Network(format!("No content length reported for {}", url)))
    }

    async fn fetch_bytes(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<Vec<u8>> {
        let response = self.send_with_retry(url, cancel, || self.client.get(url)).await?;

        let reserve = response.content_length().unwrap_or(0).min(MAX_PREALLOCATION);
        let mut data = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Canceled),
                next = stream.next() => next,
            };

            match next {
                Some(chunk) => {
                    data.extend_from_slice(&chunk?);
                    if cancel.is_cancelled() {
                        return Err(AppError::Canceled);
                    }
                    on_progress(data.len() as u64);
                }
                None => break,
            }
        }

        log::debug!("[HTTP] Fetched {} bytes from {}", data.len(), url);
        Ok(data)
    }
}
