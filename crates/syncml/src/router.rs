//! Route computation and validation.
//!
//! A [`Router`] decides which local store pairs with which remote store. The
//! engine applies its output through
//! [`RemoteAdapter::set_route`](crate::RemoteAdapter::set_route), so the
//! router itself never touches storage.

use std::collections::HashSet;

use syncml_core::{best_store_candidate, is_compatible, Route, Store};
use syncml_store::AdapterRecord;

use crate::error::{Result, SyncmlError};

/// Policy for automatic routing.
pub trait Router: Send + Sync {
    /// Auto-mapped routes for every local store not pinned by the user.
    fn recalculate(&self, local_stores: &[Store], peer: &AdapterRecord) -> Vec<Route>;

    /// Check that every route of `peer` names stores that exist.
    fn validate(&self, local_stores: &[Store], peer: &AdapterRecord) -> Result<()>;
}

/// Default router: content-type compatibility first, then candidate ranking.
///
/// Manual routes and manual bindings are never touched. Each remaining local
/// store, in declaration order, takes the best compatible remote store not
/// already claimed; ties go to the remote store declared first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartRouter;

impl SmartRouter {
    pub fn new() -> Self {
        Self
    }
}

impl Router for SmartRouter {
    fn recalculate(&self, local_stores: &[Store], peer: &AdapterRecord) -> Vec<Route> {
        let mut pinned_local: HashSet<&str> = HashSet::new();
        let mut claimed_remote: HashSet<&str> = HashSet::new();

        for route in peer.routes.iter().filter(|r| !r.auto_mapped) {
            pinned_local.insert(&route.local_uri);
            claimed_remote.insert(&route.remote_uri);
        }
        for store in &peer.stores {
            if let Some(binding) = store.binding.as_ref().filter(|b| !b.auto_mapped) {
                pinned_local.insert(&binding.uri);
                claimed_remote.insert(&store.uri);
            }
        }

        let mut routes = Vec::new();
        for local in local_stores {
            if pinned_local.contains(local.uri.as_str()) {
                continue;
            }
            let candidates: Vec<Store> = peer
                .stores
                .iter()
                .filter(|s| !claimed_remote.contains(s.uri.as_str()))
                .filter(|s| is_compatible(&local.content_types, &s.content_types))
                .cloned()
                .collect();

            if let Some(best) = best_store_candidate(local, &candidates) {
                tracing::debug!(local = %local.uri, remote = %best.uri, peer = %peer.id, "auto route");
                routes.push(Route::new(&local.uri, &best.uri, true));
                if let Some(remote) = peer.stores.iter().find(|s| s.uri == best.uri) {
                    claimed_remote.insert(&remote.uri);
                }
            }
        }
        routes
    }

    fn validate(&self, local_stores: &[Store], peer: &AdapterRecord) -> Result<()> {
        for route in &peer.routes {
            if !local_stores.iter().any(|s| s.uri == route.local_uri) {
                return Err(SyncmlError::NotFound(format!(
                    "local store {} routed to {}",
                    route.local_uri, route.remote_uri
                )));
            }
            if !peer.stores.iter().any(|s| s.uri == route.remote_uri) {
                return Err(SyncmlError::NotFound(format!(
                    "remote store {} of peer {}",
                    route.remote_uri, peer.id
                )));
            }
        }
        Ok(())
    }
}
