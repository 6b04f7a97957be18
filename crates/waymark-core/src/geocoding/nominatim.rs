//! Reverse geocoding against a Nominatim-compatible HTTP endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::models::LatLon;

use super::{GeocodingService, LookupRequest, LookupToken};

// ============================================================================
// Constants
// ============================================================================

/// Public OpenStreetMap instance.
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// Nominatim's usage policy requires an identifying agent.
pub const DEFAULT_USER_AGENT: &str = concat!("waymark/", env!("CARGO_PKG_VERSION"));

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Geocoder returned status {0}")]
    Status(u16),

    #[error("No async runtime available to run lookups")]
    NoRuntime,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Address from a reverse geocoding response body. Errors and missing
/// names become an empty string, which the repository shows as "not found".
fn parse_address(body: &str) -> String {
    match serde_json::from_str::<ReverseResponse>(body) {
        Ok(ReverseResponse {
            error: Some(error), ..
        }) => {
            debug!(%error, "Geocoder reported no match");
            String::new()
        }
        Ok(response) => response
            .display_name
            .map(|name| name.trim().to_string())
            .unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Unparseable geocoder response");
            String::new()
        }
    }
}

/// Settings for `NominatimGeocoder`.
#[derive(Debug, Clone)]
pub struct NominatimSettings {
    pub base_url: String,
    pub user_agent: String,
    pub language: Option<String>,
}

impl Default for NominatimSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: None,
        }
    }
}

type TaskMap = Arc<Mutex<HashMap<LatLon, (LookupToken, AbortHandle)>>>;

/// Runs each lookup as a Tokio task; cancelling a coordinate aborts its task.
pub struct NominatimGeocoder {
    client: Client,
    settings: NominatimSettings,
    runtime: Handle,
    tasks: TaskMap,
}

impl NominatimGeocoder {
    /// Must be called from within a Tokio runtime.
    pub fn new(settings: NominatimSettings) -> Result<Self, GeocodeError> {
        let runtime = Handle::try_current().map_err(|_| GeocodeError::NoRuntime)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            settings,
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    #[cfg(test)]
    fn running_count(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    fn reverse_url(base_url: &str) -> String {
        format!("{}/reverse", base_url.trim_end_matches('/'))
    }

    fn query(point: LatLon, language: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("format", "jsonv2".to_string()),
            ("lat", point.latitude.to_string()),
            ("lon", point.longitude.to_string()),
        ];
        if let Some(language) = language {
            query.push(("accept-language", language.to_string()));
        }
        query
    }

    async fn fetch(
        client: &Client,
        settings: &NominatimSettings,
        point: LatLon,
    ) -> Result<String, GeocodeError> {
        let response = client
            .get(Self::reverse_url(&settings.base_url))
            .query(&Self::query(point, settings.language.as_deref()))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(parse_address(&body))
    }
}

impl GeocodingService for NominatimGeocoder {
    fn lookup(&self, request: LookupRequest) {
        let point = request.point();
        let token = request.token();
        let client = self.client.clone();
        let settings = self.settings.clone();
        let tasks = self.tasks.clone();

        // Held across the spawn so the entry is in place before the task
        // can look for it on completion.
        let mut running = match self.tasks.lock() {
            Ok(running) => running,
            Err(poisoned) => poisoned.into_inner(),
        };
        let handle = self.runtime.spawn(async move {
            let address = match Self::fetch(&client, &settings, point).await {
                Ok(address) => address,
                Err(e) => {
                    warn!(%point, error = %e, "Reverse geocoding failed");
                    String::new()
                }
            };
            if let Ok(mut tasks) = tasks.lock() {
                if matches!(tasks.get(&point), Some((t, _)) if *t == token) {
                    tasks.remove(&point);
                }
            }
            request.complete(address);
        });

        if let Some((_, previous)) = running.insert(point, (token, handle.abort_handle())) {
            previous.abort();
        }
    }

    fn cancel(&self, point: LatLon) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some((token, handle)) = tasks.remove(&point) {
                debug!(%point, token = token.0, "Aborting geocoder task");
                handle.abort();
            }
        }
    }
}
