use futures::future::join_all;
use tracing::{debug, info, warn};
use url::{Origin, Url};

use crate::api::RemoteApi;
use crate::error::{CacheError, EngineError};
use crate::models::{HttpRequest, HttpResponse};

use super::CacheStorage;

/// Root document served for offline navigations.
const ROOT_DOCUMENT: &str = "/index.html";

/// Placeholder page served when the root document is not cached either.
const OFFLINE_DOCUMENT: &str = "/offline.html";

/// How a request is resolved. Selected once per request by [`Strategy::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Remote API calls: try the network, fall back to the data store.
    NetworkFirst,
    /// Shell assets and navigations: serve the shell store, fall back to the
    /// network.
    CacheFirst,
}

impl Strategy {
    pub fn select(request: &HttpRequest, api_origin: &Origin) -> Self {
        match Url::parse(&request.url) {
            Ok(url) if url.origin() == *api_origin => Strategy::NetworkFirst,
            _ => Strategy::CacheFirst,
        }
    }
}

/// Outcome of install-time priming.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Resolves requests against the shell and data stores.
pub struct ContentCache {
    storage: CacheStorage,
    shell_store: String,
    data_store: String,
    api_origin: Origin,
    app_base: Url,
    manifest: Vec<String>,
}

impl ContentCache {
    pub fn new(
        storage: CacheStorage,
        shell_store: impl Into<String>,
        data_store: impl Into<String>,
        api_base_url: &str,
        app_base_url: &str,
        manifest: Vec<String>,
    ) -> Result<Self, EngineError> {
        let api_origin = Url::parse(api_base_url)
            .map_err(|e| EngineError::Config(format!("api_base_url {}: {}", api_base_url, e)))?
            .origin();
        let app_base = Url::parse(app_base_url)
            .map_err(|e| EngineError::Config(format!("app_base_url {}: {}", app_base_url, e)))?;

        Ok(Self {
            storage,
            shell_store: shell_store.into(),
            data_store: data_store.into(),
            api_origin,
            app_base,
            manifest,
        })
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn shell_store(&self) -> &str {
        &self.shell_store
    }

    pub fn data_store(&self) -> &str {
        &self.data_store
    }

    /// Absolute URL of a shell asset path.
    pub fn asset_url(&self, path: &str) -> String {
        self.app_base
            .join(path)
            .map(String::from)
            .unwrap_or_else(|_| path.to_string())
    }

    pub fn strategy_for(&self, request: &HttpRequest) -> Strategy {
        Strategy::select(request, &self.api_origin)
    }

    /// Answer a request. Never fails: every miss ends in a fallback response.
    pub async fn resolve(&self, remote: &dyn RemoteApi, request: &HttpRequest) -> HttpResponse {
        match self.strategy_for(request) {
            Strategy::NetworkFirst => self.network_first(remote, request).await,
            Strategy::CacheFirst => self.cache_first(remote, request).await,
        }
    }

    async fn network_first(&self, remote: &dyn RemoteApi, request: &HttpRequest) -> HttpResponse {
        let key = request.identity();
        match remote.fetch(request).await {
            Ok(response) => {
                if request.is_read() && response.is_success() {
                    if let Err(e) = self.storage.put(&self.data_store, &key, &response) {
                        warn!(key = %key, error = %e, "Failed to store API response");
                    }
                }
                response
            }
            Err(e) => {
                debug!(key = %key, error = %e, "API unreachable, trying data store");
                match self.cached(&self.data_store, &key) {
                    Some(cached) => cached,
                    None => HttpResponse::offline(),
                }
            }
        }
    }

    async fn cache_first(&self, remote: &dyn RemoteApi, request: &HttpRequest) -> HttpResponse {
        let key = request.identity();
        if let Some(cached) = self.cached(&self.shell_store, &key) {
            return cached;
        }

        match remote.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(key = %key, error = %e, "Asset unreachable");
                if request.accepts_document() {
                    self.offline_document()
                } else {
                    HttpResponse::not_found()
                }
            }
        }
    }

    fn offline_document(&self) -> HttpResponse {
        [ROOT_DOCUMENT, OFFLINE_DOCUMENT]
            .iter()
            .find_map(|path| {
                let key = HttpRequest::get(self.asset_url(path)).identity();
                self.cached(&self.shell_store, &key)
            })
            .unwrap_or_else(HttpResponse::offline)
    }

    /// Store lookup that treats an unreadable store as a miss.
    fn cached(&self, store: &str, key: &str) -> Option<HttpResponse> {
        match self.storage.lookup(store, key) {
            Ok(Some(entry)) => {
                debug!(store, key, age_minutes = entry.age_minutes(), "Cache hit");
                Some(entry.data)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(store, key, error = %e, "Failed to read cache store");
                None
            }
        }
    }

    /// Populate the shell store from the asset manifest. Assets that cannot
    /// be fetched are logged and skipped.
    pub async fn prime(&self, remote: &dyn RemoteApi) -> Result<InstallReport, CacheError> {
        self.storage.open(&self.shell_store)?;

        let requests: Vec<HttpRequest> = self
            .manifest
            .iter()
            .map(|path| HttpRequest::get(self.asset_url(path)))
            .collect();
        let responses = join_all(requests.iter().map(|request| remote.fetch(request))).await;

        let mut report = InstallReport::default();
        for ((path, request), response) in self.manifest.iter().zip(&requests).zip(responses) {
            let outcome = match response {
                Ok(response) if response.is_success() => self
                    .storage
                    .put(&self.shell_store, &request.identity(), &response)
                    .map_err(|e| e.to_string()),
                Ok(response) => Err(format!("status {}", response.status)),
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(()) => report.cached.push(path.clone()),
                Err(reason) => {
                    warn!(asset = %path, reason = %reason, "Failed to cache shell asset, continuing");
                    report.failed.push(path.clone());
                }
            }
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Shell store primed"
        );
        Ok(report)
    }

    /// Delete every store that is not the active shell or data store.
    /// Returns the names removed.
    pub fn purge_stale(&self) -> Result<Vec<String>, CacheError> {
        let mut removed = Vec::new();
        for name in self.storage.keys()? {
            if name == self.shell_store || name == self.data_store {
                continue;
            }
            if self.storage.delete(&name)? {
                info!(store = %name, "Removed stale cache store");
                removed.push(name);
            }
        }
        Ok(removed)
    }
}
