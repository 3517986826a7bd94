//! Browsing context abstraction
//!
//! The orchestrator reads the current location, rewrites it in place after a
//! response has been consumed, and navigates away to start a login.  Those
//! three operations are expressed by [`BrowsingContext`] so the orchestrator
//! can run against a real window binding, an in-memory stand-in, or nothing
//! at all.
//!
//! - [`NoBrowsingContext`] -- no window; every operation is a no-op and the
//!   current location is `None`.
//! - [`MemoryBrowsingContext`] -- tracks a location and records every
//!   replacement, navigation and popup request.
//!
//! The URI helpers built on top of a context live in [`location`].

use std::sync::Mutex;

pub mod location;

pub use location::UriPart;

/// The window the login flow runs in.
pub trait BrowsingContext: Send + Sync {
    /// The current URI, or `None` when there is no browsing context.
    fn current_uri(&self) -> Option<String>;

    /// Replaces the current URI in place (history rewrite, no reload).
    fn replace_uri(&self, uri: &str);

    /// Navigates the context to `uri`.
    fn navigate_to(&self, uri: &str);

    /// Opens the provider-selection popup.
    fn open_login_popup(&self) {
        tracing::debug!("Login popup is not supported by this browsing context");
    }
}

/// A browsing context that does not exist.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBrowsingContext;

impl BrowsingContext for NoBrowsingContext {
    fn current_uri(&self) -> Option<String> {
        None
    }

    fn replace_uri(&self, _uri: &str) {}

    fn navigate_to(&self, _uri: &str) {}
}

#[derive(Debug, Default)]
struct MemoryState {
    location: Option<String>,
    replacements: Vec<String>,
    navigations: Vec<String>,
    popups: usize,
}

/// In-memory browsing context.
///
/// Navigation updates the location, as a real window would once the new
/// document loads.
///
/// # Examples
///
/// ```
/// use oidc_web::browser::{BrowsingContext, MemoryBrowsingContext};
///
/// let context = MemoryBrowsingContext::new("https://app.com/");
/// context.navigate_to("https://oidc.example.com/authorize?state=abc");
///
/// assert_eq!(
///     context.last_navigation().as_deref(),
///     Some("https://oidc.example.com/authorize?state=abc")
/// );
/// ```
#[derive(Debug, Default)]
pub struct MemoryBrowsingContext {
    state: Mutex<MemoryState>,
}

impl MemoryBrowsingContext {
    /// Creates a context whose current location is `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                location: Some(location.into()),
                ..MemoryState::default()
            }),
        }
    }

    /// Creates a context without a location.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads `location` as if the user (or a provider redirect) opened it.
    pub fn set_location(&self, location: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.location = Some(location.into());
        }
    }

    /// All URIs written by [`BrowsingContext::replace_uri`], oldest first.
    pub fn replacements(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.replacements.clone())
            .unwrap_or_default()
    }

    /// All URIs navigated to, oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.navigations.clone())
            .unwrap_or_default()
    }

    /// The most recent navigation target.
    pub fn last_navigation(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.navigations.last().cloned())
    }

    /// Number of popup requests.
    pub fn popups_opened(&self) -> usize {
        self.state.lock().map(|s| s.popups).unwrap_or(0)
    }
}

impl BrowsingContext for MemoryBrowsingContext {
    fn current_uri(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.location.clone())
    }

    fn replace_uri(&self, uri: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.location = Some(uri.to_string());
            state.replacements.push(uri.to_string());
        }
    }

    fn navigate_to(&self, uri: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.location = Some(uri.to_string());
            state.navigations.push(uri.to_string());
        }
    }

    fn open_login_popup(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.popups += 1;
        }
    }
}
