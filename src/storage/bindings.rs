//! The three stores the login orchestrator keeps its state in
//!
//! | store      | namespace        | key                            | record                 |
//! |------------|------------------|--------------------------------|------------------------|
//! | clients    | `oidc.clients`   | `oidc.clients.<providerUri>`   | [`ClientRegistration`] |
//! | session    | `oidc.session`   | `oidc.session`                 | [`Session`]            |
//! | providers  | `oidc.providers` | `oidc.providers.<state>`       | provider URI string    |
//!
//! All three normally share a single medium.

use std::sync::Arc;

use crate::rp::ClientRegistration;
use crate::session::Session;
use crate::storage::{JsonStore, StorageMedium};

/// Namespace of the client registration store.
pub const CLIENTS_NAMESPACE: &str = "oidc.clients";

/// Namespace (and key) of the session store.
pub const SESSION_NAMESPACE: &str = "oidc.session";

/// Namespace of the provider-by-state correlation store.
pub const PROVIDERS_NAMESPACE: &str = "oidc.providers";

/// Client registrations keyed by provider URI.
pub fn client_store(medium: Arc<dyn StorageMedium>) -> JsonStore<ClientRegistration> {
    JsonStore::with_reconstruct(CLIENTS_NAMESPACE, medium, ClientRegistration::from_json)
}

/// The current session under a fixed key.
pub fn session_store(medium: Arc<dyn StorageMedium>) -> JsonStore<Session> {
    JsonStore::with_reconstruct(SESSION_NAMESPACE, medium, Session::from_json)
}

/// Provider URIs keyed by the `state` of the request that went to them.
pub fn provider_store(medium: Arc<dyn StorageMedium>) -> JsonStore<String> {
    JsonStore::new(PROVIDERS_NAMESPACE, medium)
}
