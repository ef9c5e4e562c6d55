//! OAuth2 token lifecycle and transparent-refresh transport for the Fitbit Web API.
//!
//! A long-running process holds one access/refresh token pair; every request
//! made through an [`ApiClient`] gets a bearer token that is guaranteed not
//! to expire mid-flight, refreshing and persisting the pair on demand.
//!
//! # Components
//!
//! - [`token`] — `TokenRecord` and the provider/persisted JSON codec
//! - [`store`] — single-record persistence (file, or in-memory for tests)
//! - [`oauth`] — refresh-token grant against the token endpoint
//! - [`token_manager`] — load, proactive refresh under a per-manager lock, persist
//! - [`transport`] — `Authorizer` capability and the decorate-and-delegate transport
//! - [`client`] — profile and sleep log fetches

pub mod client;
pub mod error;
pub mod oauth;
pub mod store;
pub mod token;
pub mod token_manager;
pub mod transport;

pub use client::{ApiClient, ApiResponse, Connection, DEFAULT_TIMEOUT, build_http_client};
pub use error::{OAuthError, Result};
pub use oauth::{DEFAULT_API_URL, OAuth2Refresher, TokenRefresher};
pub use store::{FileTokenStore, MemoryTokenStore, TOKEN_FILE, TokenStore};
pub use token::{ClientCredentials, TokenRecord};
pub use token_manager::{DEFAULT_LOOKAHEAD, TokenManager, TokenManagerOptions, TokenState};
pub use transport::{Authorizer, AuthorizingTransport, HttpTransport};
