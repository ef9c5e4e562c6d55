//! Configuration for the bitfit tools.
//!
//! Values come from three layers, highest precedence first:
//! 1. Command-line flags
//! 2. `BIT_FIT_<KEY>` environment variables
//! 3. A JSON config file (`--config` / `BIT_FIT_CONFIG`) whose keys match the
//!    flag names
//!
//! The first two are resolved by the CLI into a [`Settings`]; [`Settings::or`]
//! layers the file underneath. The typed accessors in [`resolved`] then
//! validate what each command needs.

pub mod error;
pub mod paths;
pub mod resolved;
pub mod settings;

pub use error::{ConfigError, Result};
pub use paths::{config_dir, log_dir};
pub use resolved::{
    BasicCredentials, DEFAULT_CERT_FILE, DEFAULT_KEY_FILE, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
    DEFAULT_TOKENS_FILE, ListenerSettings, OAuthSettings, ProxyClientSettings, TlsFiles,
    parse_listen_addr,
};
pub use settings::Settings;
