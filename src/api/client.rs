use std::time::Duration;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use crate::api::{Album, ArtistResults, CatalogApi, ReleaseCategory, ReleasePage, SignedUrl};
use crate::errors::{AppError, Result};
use crate::validation::InputValidator;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Catalog client for the `/api/*` routes of the proxy server.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    country: Option<String>,
}

impl HttpCatalog {
    pub fn new(base_url: &str, country: Option<String>) -> Result<Self> {
        InputValidator::new().validate_api_base(base_url)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .user_agent("qobuz-dl/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            country,
        })
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn get(&self, route: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}/api/{}", self.base_url, route));
        match &self.country {
            Some(country) => request.header("Token-Country", country),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<T> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Network(format!("Catalog request failed with {}: {}", status, body)));
            }
            let bytes = response.bytes().await?;
            let envelope: Envelope<T> = serde_json::from_slice(&bytes)
                .map_err(|e| AppError::Api(format!("Unexpected catalog response: {}", e)))?;
            Ok(envelope.data)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Canceled),
            result = exchange => result,
        }
    }
}

#[async_trait::async_trait]
impl CatalogApi for HttpCatalog {
    async fn album(&self, album_id: &str, cancel: &CancellationToken) -> Result<Album> {
        log::debug!("Fetching album {}", album_id);
        let request = self.get("get-album").query(&[("album_id", album_id)]);
        self.fetch(request, cancel).await
    }

    async fn artist(&self, artist_id: u64, cancel: &CancellationToken) -> Result<ArtistResults> {
        log::debug!("Fetching artist {}", artist_id);
        let request = self.get("get-artist").query(&[("artist_id", artist_id)]);
        self.fetch(request, cancel).await
    }

    async fn releases(
        &self,
        artist_id: u64,
        category: ReleaseCategory,
        offset: usize,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<ReleasePage> {
        log::debug!("Fetching {} of artist {} from offset {}", category.label(), artist_id, offset);
        let request = self.get("get-releases").query(&[
            ("artist_id", artist_id.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
            ("release_type", category.api_value().to_string()),
        ]);
        self.fetch(request, cancel).await
    }

    async fn track_url(&self, track_id: u64, quality: &str, cancel: &CancellationToken) -> Result<String> {
        let request = self.get("download-music").query(&[
            ("track_id", track_id.to_string()),
            ("quality", quality.to_string()),
        ]);
        let signed: SignedUrl = self.fetch(request, cancel).await?;
        Ok(signed.url)
    }
}
