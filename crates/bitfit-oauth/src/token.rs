//! Token records and their two JSON wire shapes.
//!
//! The token endpoint answers with `access_token`/`refresh_token`/`expires_in`
//! (relative seconds), while this crate persists `Access`/`Refresh`/`Expiration`
//! (absolute RFC 3339). [`decode`] accepts either shape without being told
//! which one it is looking at; [`encode`] always produces the persisted shape.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::error::{OAuthError, Result};

/// Indentation used for every JSON document this crate writes.
const JSON_INDENT: &[u8] = b"    ";

/// An access/refresh token pair and the instant the access token stops working.
///
/// A record with an empty `access` is "not yet initialized" and is always
/// treated as expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRecord {
    #[serde(rename = "Access")]
    pub access: String,
    #[serde(rename = "Refresh")]
    pub refresh: String,
    #[serde(rename = "Expiration")]
    pub expiration: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        access: impl Into<String>,
        refresh: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
            expiration,
        }
    }

    /// A record holding only a refresh token, to be exchanged before first use.
    pub fn uninitialized(refresh: impl Into<String>) -> Self {
        Self::new(String::new(), refresh, DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn is_initialized(&self) -> bool {
        !self.access.is_empty()
    }

    /// True when the access token is unusable at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_initialized() || self.expiration < now
    }

    /// True when the access token expires before `now + window`.
    pub fn expires_within(&self, window: TimeDelta, now: DateTime<Utc>) -> bool {
        match now.checked_add_signed(window) {
            Some(horizon) => !self.is_initialized() || self.expiration < horizon,
            None => true,
        }
    }
}

/// OAuth2 client id and secret. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Union of the provider response and the persisted record.
#[derive(Debug, Default, Deserialize)]
struct WireTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,

    #[serde(default, rename = "Access", alias = "access")]
    access: Option<String>,
    #[serde(default, rename = "Refresh", alias = "refresh")]
    refresh: Option<String>,
    #[serde(default, rename = "Expiration", alias = "expiration")]
    expiration: Option<DateTime<Utc>>,
}

/// Decode either JSON shape into a [`TokenRecord`], using the current time
/// to resolve a relative `expires_in`.
pub fn decode(bytes: &[u8]) -> Result<TokenRecord> {
    decode_at(bytes, Utc::now())
}

/// Decode with an explicit clock.
///
/// A non-empty `errors` array wins over any token fields and is surfaced as
/// [`OAuthError::Provider`]. Otherwise persisted-shape values take priority
/// over provider-shape values. An `Expiration` of `0001-01-01T00:00:00Z` (the
/// zero time other writers emit) or of the Unix epoch (what [`encode`] writes
/// for an unknown expiration) counts as absent; any other instant is kept,
/// including ones before 1970. When neither an absolute `Expiration` nor a
/// positive `expires_in` is present, the expiration is the Unix epoch so the
/// record is refreshed before its first use.
pub fn decode_at(bytes: &[u8], now: DateTime<Utc>) -> Result<TokenRecord> {
    let wire: WireTokens = serde_json::from_slice(bytes)?;

    if let Some(first) = wire.errors.as_deref().and_then(<[_]>::first) {
        let message = first
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string());
        return Err(OAuthError::Provider(message));
    }

    let access = non_empty(wire.access)
        .or_else(|| non_empty(wire.access_token))
        .unwrap_or_default();
    let refresh = non_empty(wire.refresh)
        .or_else(|| non_empty(wire.refresh_token))
        .ok_or_else(|| OAuthError::Decode("missing refresh token".to_string()))?;

    let expiration = match (wire.expiration, wire.expires_in) {
        (Some(at), _) if !is_unset_expiration(at) => at,
        (_, Some(secs)) if secs > 0 => expiration_after(now, secs)?,
        _ => DateTime::<Utc>::UNIX_EPOCH,
    };

    Ok(TokenRecord {
        access,
        refresh,
        expiration,
    })
}

/// Encode a record in the persisted shape with four-space indentation.
pub fn encode(record: &TokenRecord) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(JSON_INDENT));
    record.serialize(&mut ser)?;
    Ok(out)
}

/// Re-indent an arbitrary JSON document, keeping key order.
pub fn indent_json(raw: &[u8]) -> Result<String> {
    let value: serde_json::Value = serde_json::from_slice(raw).map_err(|e| {
        OAuthError::Decode(format!(
            "could not format '{}': {}",
            String::from_utf8_lossy(raw),
            e
        ))
    })?;

    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(JSON_INDENT));
    value.serialize(&mut ser)?;
    String::from_utf8(out).map_err(|e| OAuthError::Decode(e.to_string()))
}

fn is_unset_expiration(at: DateTime<Utc>) -> bool {
    let zero_time = NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc());
    at == DateTime::<Utc>::UNIX_EPOCH || Some(at) == zero_time
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn expiration_after(now: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            OAuthError::Decode(format!("could not convert expires_in {secs} to an instant"))
        })
}
