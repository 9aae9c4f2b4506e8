//! Identity-provider redirect contract.
//!
//! Outbound: `<provider>/?canisterId=<assets canister>&mobile=1`.
//! Inbound: `<scheme>://auth#<base64 of {"key": .., "delegation": ..}>`.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;
use url::Url;

use crate::error::{OpendError, Result};

/// Credential strings carried by a provider callback, in stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub key: String,
    pub delegation: String,
}

#[derive(Deserialize)]
struct RawPayload {
    key: serde_json::Value,
    delegation: serde_json::Value,
}

/// Build the URL that starts a login at the identity provider.
pub fn login_url(provider: &str, assets_canister_id: &str) -> Result<Url> {
    let mut url = Url::parse(provider)
        .map_err(|e| OpendError::Validation(format!("identity provider url: {e}")))?;
    if url.path().is_empty() {
        url.set_path("/");
    }
    url.query_pairs_mut()
        .append_pair("canisterId", assets_canister_id)
        .append_pair("mobile", "1");
    Ok(url)
}

/// Prefix every callback for `scheme` starts with.
pub fn callback_prefix(scheme: &str) -> String {
    format!("{scheme}://auth#")
}

pub fn is_auth_callback(url: &str, scheme: &str) -> bool {
    url.starts_with(&callback_prefix(scheme))
}

/// Decode the fragment of a callback URL.
pub fn parse_callback(url: &str, scheme: &str) -> Result<CallbackPayload> {
    let fragment = url
        .strip_prefix(&callback_prefix(scheme))
        .ok_or_else(|| OpendError::Callback(format!("not a {scheme}://auth callback")))?;
    if fragment.is_empty() {
        return Err(OpendError::Callback("callback has no payload".into()));
    }

    let fragment = percent_decode(fragment);
    let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(fragment.as_bytes()).ok())
        .ok_or_else(|| OpendError::Callback("payload is not base64".into()))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| OpendError::Callback("payload is not UTF-8".into()))?;

    let raw: RawPayload = serde_json::from_str(&text)
        .map_err(|e| OpendError::Callback(format!("payload is not {{key, delegation}}: {e}")))?;

    Ok(CallbackPayload {
        key: stored_form(raw.key)?,
        delegation: stored_form(raw.delegation)?,
    })
}

/// Encode a payload the way the provider bridge does.
pub fn encode_callback(scheme: &str, key: &str, delegation: &str) -> String {
    let data = serde_json::json!({ "key": key, "delegation": delegation }).to_string();
    format!("{}{}", callback_prefix(scheme), STANDARD.encode(data))
}

fn stored_form(value: serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Ok(s),
        serde_json::Value::Null | serde_json::Value::String(_) => {
            Err(OpendError::Callback("payload field is empty".into()))
        }
        other => Ok(other.to_string()),
    }
}

// Some OS intent paths hand the fragment over percent-encoded.
fn percent_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    let escaped = s.replace('+', "%2B");
    url::form_urlencoded::parse(format!("x={escaped}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| s.to_string())
}
