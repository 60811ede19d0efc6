// src/services/fetcher.rs

//! Page fetching.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::FetchConfig;
use crate::utils::http::create_async_client;

/// Retrieves the body of a page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` once. Transport failures and non-2xx statuses are
    /// `AppError::Fetch`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetcher backed by a `reqwest` client with connect and read timeouts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self::with_client(create_async_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(
                url,
                format!("Invalid http code: {}", status.as_u16()),
            ));
        }

        response.text().await.map_err(|e| AppError::fetch(url, e))
    }
}
