//! Shared state handed to every handler.

use std::sync::Arc;

use bitfit_oauth::ApiClient;
use url::Url;

use crate::auth::ProxyCredentials;

/// Cheap-to-clone handle on the upstream client and the gate credentials.
#[derive(Debug, Clone)]
pub struct ProxyState {
    api: ApiClient,
    credentials: Arc<ProxyCredentials>,
    max_body_size: usize,
}

impl ProxyState {
    pub fn new(api: ApiClient, credentials: ProxyCredentials, max_body_size: usize) -> Self {
        Self {
            api,
            credentials: Arc::new(credentials),
            max_body_size,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn upstream(&self) -> &Url {
        self.api.base_url()
    }

    pub fn credentials(&self) -> &ProxyCredentials {
        &self.credentials
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}
