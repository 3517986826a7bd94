//! Location helpers for authentication responses
//!
//! Providers return implicit-flow responses in the URI fragment:
//!
//! ```text
//! https://app.com/#state=abc&id_token=...&access_token=...&token_type=Bearer&expires_in=3600
//! ```
//!
//! The presence of a non-empty `state` in the fragment is the only signal
//! used to decide that the current page is such a response.  After the
//! response is consumed the credential parameters are scrubbed from the
//! location so they do not linger in browser history.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::BrowsingContext;
use crate::error::{OidcWebError, Result};

/// Fragment parameters removed by [`strip_auth_params`] (exact, case-sensitive).
pub const AUTH_RESPONSE_PARAMS: [&str; 5] =
    ["id_token", "access_token", "state", "token_type", "expires_in"];

/// Which part of a URI carries the `state` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriPart {
    /// The `#fragment`; used for authentication responses.
    #[default]
    Fragment,
    /// The `?query`; used for authorization requests.
    Query,
}

/// Returns the current URI of `context`.
pub fn current_location(context: &dyn BrowsingContext) -> Option<String> {
    context.current_uri()
}

/// Extracts the `state` parameter from the fragment or query of `uri`.
///
/// Returns `None` when `uri` cannot be parsed or carries no `state`.
///
/// # Examples
///
/// ```
/// use oidc_web::browser::location::{state_from_uri, UriPart};
///
/// let response = "https://app.com/#state=abc&id_token=xyz";
/// assert_eq!(state_from_uri(response, UriPart::Fragment).as_deref(), Some("abc"));
///
/// let request = "https://oidc.example.com/authorize?client_id=c&state=def";
/// assert_eq!(state_from_uri(request, UriPart::Query).as_deref(), Some("def"));
///
/// assert!(state_from_uri("not a uri", UriPart::Fragment).is_none());
/// ```
pub fn state_from_uri(uri: &str, part: UriPart) -> Option<String> {
    let url = match Url::parse(uri) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(error = %e, "Cannot read state from unparseable uri");
            return None;
        }
    };

    match part {
        UriPart::Fragment => {
            let fragment = url.fragment().unwrap_or_default();
            url::form_urlencoded::parse(fragment.as_bytes())
                .find(|(key, _)| key == "state")
                .map(|(_, value)| value.into_owned())
        }
        UriPart::Query => url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned()),
    }
}

/// Returns `true` when the current location looks like an authentication
/// response, i.e. its fragment carries a non-empty `state`.
pub fn current_uri_has_auth_response(context: &dyn BrowsingContext) -> bool {
    current_location(context)
        .and_then(|uri| state_from_uri(&uri, UriPart::Fragment))
        .is_some_and(|state| !state.is_empty())
}

/// Removes [`AUTH_RESPONSE_PARAMS`] from the fragment of `uri`.
///
/// Remaining fragment parameters keep their order.  If nothing remains the
/// fragment is dropped entirely.  A URI without a fragment comes back
/// unchanged (modulo URL normalization), so the function is idempotent.
///
/// # Examples
///
/// ```
/// use oidc_web::browser::location::strip_auth_params;
///
/// let uri = "https://app.com/#state=abc&id_token=xyz&access_token=123&token_type=Bearer&expires_in=3600";
/// assert_eq!(strip_auth_params(uri).unwrap(), "https://app.com/");
///
/// let uri = "https://app.com/#tab=2&state=abc&view=list";
/// assert_eq!(strip_auth_params(uri).unwrap(), "https://app.com/#tab=2&view=list");
/// ```
pub fn strip_auth_params(uri: &str) -> Result<String> {
    let mut url =
        Url::parse(uri).map_err(|e| OidcWebError::InvalidUri(format!("{uri}: {e}")))?;

    let fragment = match url.fragment() {
        Some(fragment) if !fragment.is_empty() => fragment.to_string(),
        _ => return Ok(url.to_string()),
    };

    let kept: Vec<&str> = fragment
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !AUTH_RESPONSE_PARAMS.contains(&key)
        })
        .collect();

    let remaining = kept.join("&");
    if remaining.is_empty() {
        url.set_fragment(None);
    } else {
        url.set_fragment(Some(&remaining));
    }

    Ok(url.to_string())
}

/// The current location with authentication parameters removed.
///
/// `None` outside a browsing context or when the location cannot be parsed.
pub fn current_location_no_auth(context: &dyn BrowsingContext) -> Option<String> {
    let current = current_location(context)?;
    match strip_auth_params(&current) {
        Ok(scrubbed) => Some(scrubbed),
        Err(e) => {
            tracing::warn!(error = %e, "Current location cannot be scrubbed");
            None
        }
    }
}

/// Rewrites the current location without its authentication parameters.
///
/// No-op outside a browsing context.
pub fn clear_auth_response_from_url(context: &dyn BrowsingContext) {
    if let Some(cleared) = current_location_no_auth(context) {
        context.replace_uri(&cleared);
    }
}

/// Navigates `context` to `uri`.  No-op outside a browsing context.
pub fn redirect_to(context: &dyn BrowsingContext, uri: &str) {
    tracing::info!(uri = %uri, "Redirecting browsing context");
    context.navigate_to(uri);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
