//! HTTP client for the marketplace seller API.
//!
//! Every call authenticates with HTTP Basic (API key and secret) and identifies the
//! seller in the User-Agent. Listings are fetched page by page: the first page tells
//! how many pages exist, the rest are fetched concurrently under a semaphore.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::MarketplaceConfig;
use crate::marketplace::models::{
    Claim, DateWindow, PackageStatusUpdate, Page, RemotePages, RemoteProduct, ShipmentPackage,
    WebhookRegistered, WebhookRegistration,
};
use crate::marketplace::{MarketplaceApi, MarketplaceError};

type Query = Vec<(&'static str, String)>;

pub struct MarketplaceClient {
    http: Client,
    config: MarketplaceConfig,
}

impl MarketplaceClient {
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("{} - SelfIntegration", config.seller_id))
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn seller_path(&self, area: &str, resource: &str) -> String {
        format!("integration/{area}/sellers/{}/{resource}", self.config.seller_id)
    }

    /// Send a request, retrying throttling, server errors and transport failures with exponential backoff.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, MarketplaceError> {
        let mut attempt: u32 = 0;
        loop {
            let request = build().basic_auth(&self.config.api_key, Some(&self.config.api_secret));
            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(status) || attempt >= self.config.max_retries {
                        let body = response.text().await.unwrap_or_default();
                        return Err(MarketplaceError::Status { status: status.as_u16(), body });
                    }
                    format!("HTTP {status}")
                }
                Err(e) => {
                    if attempt >= self.config.max_retries { return Err(e.into()); }
                    e.to_string()
                }
            };
            let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
            warn!(attempt = attempt + 1, max_retries = self.config.max_retries, ?delay, error = %failure, "marketplace request failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_page<T: DeserializeOwned>(&self, path: &str, query: &Query, page: u32) -> Result<Page<T>, MarketplaceError> {
        let url = self.url(path);
        let page_param = page.to_string();
        let size = self.config.page_size.to_string();
        let response = self
            .send(|| self.http.get(&url).query(query).query(&[("page", page_param.as_str()), ("size", size.as_str())]))
            .await?;
        let body = response.json::<Page<T>>().await?;
        debug!(path, page, items = body.content.len(), total_pages = body.total_pages, "fetched page");
        Ok(body)
    }

    /// Fetch every page of a listing. A failed first page fails the call; later failures are reported per page.
    async fn fetch_all<T: DeserializeOwned>(&self, path: &str, query: Query) -> Result<RemotePages<T>, MarketplaceError> {
        let first = self.fetch_page::<T>(path, &query, 0).await?;
        let total_pages = first.total_pages.max(1);
        let mut items = first.content;

        let semaphore = Semaphore::new(self.config.max_concurrency.max(1));
        let fetches = (1..total_pages).map(|page| {
            let semaphore = &semaphore;
            let query = &query;
            async move {
                let _permit = semaphore.acquire().await.ok();
                (page, self.fetch_page::<T>(path, query, page).await)
            }
        });

        let mut failed_pages = Vec::new();
        for (page, result) in join_all(fetches).await {
            match result {
                Ok(body) => items.extend(body.content),
                Err(e) => {
                    warn!(path, page, error = %e, "giving up on page");
                    failed_pages.push(page);
                }
            }
        }
        Ok(RemotePages { items, total_pages, failed_pages })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn window_query(window: DateWindow) -> Query {
    vec![
        ("startDate", window.start.timestamp_millis().to_string()),
        ("endDate", window.end.timestamp_millis().to_string()),
    ]
}

#[async_trait]
impl MarketplaceApi for MarketplaceClient {
    async fn fetch_orders(&self, window: DateWindow) -> Result<RemotePages<ShipmentPackage>, MarketplaceError> {
        let mut query = window_query(window);
        query.push(("orderByField", "PackageLastModifiedDate".to_string()));
        query.push(("orderByDirection", "DESC".to_string()));
        self.fetch_all(&self.seller_path("order", "orders"), query).await
    }

    async fn fetch_products(&self) -> Result<RemotePages<RemoteProduct>, MarketplaceError> {
        self.fetch_all(&self.seller_path("product", "products"), vec![]).await
    }

    async fn fetch_claims(&self, window: DateWindow) -> Result<RemotePages<Claim>, MarketplaceError> {
        self.fetch_all(&self.seller_path("order", "claims"), window_query(window)).await
    }

    async fn update_package_status(&self, package_id: i64, update: &PackageStatusUpdate) -> Result<(), MarketplaceError> {
        let url = self.url(&self.seller_path("order", &format!("shipment-packages/{package_id}")));
        self.send(|| self.http.put(&url).json(update)).await?;
        Ok(())
    }

    async fn register_webhook(&self, registration: &WebhookRegistration) -> Result<WebhookRegistered, MarketplaceError> {
        let url = self.url(&self.seller_path("webhook", "webhooks"));
        let response = self.send(|| self.http.post(&url).json(registration)).await?;
        Ok(response.json().await?)
    }
}
