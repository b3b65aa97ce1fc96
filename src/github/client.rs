use std::collections::HashMap;
use std::sync::Arc;

use octocrab::Octocrab;
use tokio::sync::RwLock;

use crate::github::error::{GatewayError, GatewayResult};

/// Manages per-host `Octocrab` instances, built lazily from an
/// already-resolved token (see [`crate::github::auth::detect_auth`]).
///
/// The teacher's version of this type cached GraphQL/REST responses with
/// `moka`; the gateway here has no response cache (the store is the cache),
/// so only the per-host instance map survives. It's wrapped in a
/// `tokio::sync::RwLock` rather than requiring `&mut self`, since the
/// gateway is shared across concurrently-running sync tasks.
pub struct GitHubClient {
    instances: RwLock<HashMap<String, Arc<Octocrab>>>,
    token: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            token,
        }
    }

    /// Get or create an Octocrab instance for the given host.
    pub async fn octocrab_for(&self, host: &str) -> GatewayResult<Arc<Octocrab>> {
        if let Some(instance) = self.instances.read().await.get(host) {
            return Ok(Arc::clone(instance));
        }

        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get(host) {
            return Ok(Arc::clone(instance));
        }

        let builder = if host == "github.com" {
            Octocrab::builder().personal_token(self.token.clone())
        } else {
            Octocrab::builder()
                .personal_token(self.token.clone())
                .base_uri(format!("https://{host}/api/v3"))
                .map_err(|e| GatewayError::Transport(format!("setting GHE base URI: {e}")))?
        };

        let instance = Arc::new(
            builder
                .build()
                .map_err(|e| GatewayError::Transport(format!("building octocrab instance: {e}")))?,
        );
        instances.insert(host.to_owned(), Arc::clone(&instance));
        Ok(instance)
    }
}
