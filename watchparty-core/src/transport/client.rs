//! Media Server HTTP Client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use tracing::{debug, instrument, warn};

use super::types::*;
use super::SessionTransport;
use crate::catalog::{Catalog, CatalogItem, Collection};
use crate::error::{CatalogError, TransportError};
use crate::sync::{LiveSession, PlaystateCommand};

/// Default media server address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8096";

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands should land quickly or not at all
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the media server's session and library API
#[derive(Debug, Clone)]
pub struct MediaServerClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MediaServerClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8096`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let http = Client::builder()
            .connect_timeout(CONNECTION_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Set the API key sent with every request
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional authentication
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);

        if let Some(key) = &self.api_key {
            req = req.header("X-Emby-Token", key);
        }

        req
    }

    /// Map connection failures and auth errors, pass other responses through
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Response, TransportError> {
        let resp = req.send().await.map_err(|e| {
            if e.is_connect() {
                warn!("Connection error: {:?}", e);
                TransportError::NotReachable
            } else {
                TransportError::Http(e)
            }
        })?;

        match resp.status().as_u16() {
            401 | 403 => Err(TransportError::Unauthorized),
            _ => Ok(resp),
        }
    }

    /// Check the server is reachable and the key is accepted
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn ping(&self) -> Result<(), TransportError> {
        debug!("Checking media server connection");
        let resp = self.send(self.request(Method::GET, "/System/Info")).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!("HTTP {}", resp.status().as_u16())))
        }
    }
}

#[async_trait]
impl SessionTransport for MediaServerClient {
    async fn send_command(&self, session_id: &str, command: PlaystateCommand) -> Result<(), TransportError> {
        let path = format!("/Sessions/{}/Playing/{}", session_id, command.as_str());
        let mut req = self.request(Method::POST, &path);
        if let PlaystateCommand::SeekTo(ms) = command {
            req = req.query(&[("SeekPositionTicks", ms_to_ticks(ms))]);
        }

        let resp = self.send(req).await?;
        match resp.status().as_u16() {
            200..=299 => Ok(()),
            404 => Err(TransportError::SessionNotFound(session_id.to_string())),
            code => Err(TransportError::Rejected(format!("HTTP {}", code))),
        }
    }

    async fn live_sessions(&self) -> Result<Vec<LiveSession>, TransportError> {
        let sessions: Vec<SessionInfo> = self
            .send(self.request(Method::GET, "/Sessions"))
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(sessions.into_iter().filter_map(SessionInfo::into_live).collect())
    }
}

#[async_trait]
impl Catalog for MediaServerClient {
    async fn item(&self, item_id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        let req = self
            .request(Method::GET, "/Items")
            .query(&[("Ids", item_id), ("Fields", "Path")]);
        let resp = self
            .send(req)
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        // Unknown or malformed IDs come back as 400/404 rather than an empty list
        if matches!(resp.status().as_u16(), 400 | 404) {
            return Ok(None);
        }

        let items: ItemsResponse = resp.error_for_status()?.json().await?;
        Ok(items.items.into_iter().next().map(CatalogItem::from))
    }

    async fn collections(&self) -> Result<Vec<Collection>, CatalogError> {
        let folders: Vec<VirtualFolder> = self
            .send(self.request(Method::GET, "/Library/VirtualFolders"))
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?
            .error_for_status()?
            .json()
            .await?;

        Ok(folders.into_iter().map(Collection::from).collect())
    }
}
