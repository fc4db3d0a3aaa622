//! Process-wide Service/Link registry (spec §3.3, C2): the single source
//! of truth for "what services are online" and "what links exist",
//! grounded in the teacher's `TransportFactory`/connection-table pattern
//! generalized from a per-benchmark-run table to a process-lifetime one.
//!
//! IDs are never reused (spec §3.3 invariant 1); removing an entry drops
//! it from the map but never recycles its slot, since [`ServiceId`]/
//! [`LinkId`] issuance is independent of the map (see `ids.rs`).

use crate::ids::{LinkId, ServiceId};
use crate::link::Link;
use crate::service::Service;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Default)]
struct Tables {
    services: RwLock<HashMap<ServiceId, Arc<Service>>>,
    links: RwLock<HashMap<LinkId, Arc<Link>>>,
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::default)
}

pub fn insert_service(svc: Arc<Service>) {
    debug!(service_id = %svc.id(), uri = %svc.uri.canonical(), "service registered");
    tables().services.write().insert(svc.id(), svc);
}

pub fn remove_service(id: ServiceId) -> Option<Arc<Service>> {
    let removed = tables().services.write().remove(&id);
    if removed.is_some() {
        debug!(service_id = %id, "service removed");
    }
    removed
}

pub fn get_service(id: ServiceId) -> Option<Arc<Service>> {
    tables().services.read().get(&id).cloned()
}

pub fn insert_link(link: Arc<Link>) {
    debug!(link_id = %link.id(), "link registered");
    tables().links.write().insert(link.id(), link);
}

pub fn remove_link(id: LinkId) -> Option<Arc<Link>> {
    let removed = tables().links.write().remove(&id);
    if removed.is_some() {
        debug!(link_id = %id, "link removed");
    }
    removed
}

pub fn get_link(id: LinkId) -> Option<Arc<Link>> {
    tables().links.read().get(&id).cloned()
}

pub fn service_count() -> usize {
    tables().services.read().len()
}

pub fn link_count() -> usize {
    tables().links.read().len()
}

/// Test-only fault injection and introspection hooks (spec `IOC_TestHooks.h`
/// in `original_source/`), gated behind the `test-hooks` feature so release
/// builds never carry the surface.
#[cfg(feature = "test-hooks")]
pub mod test_hooks {
    use super::*;

    pub fn reset_all() {
        tables().services.write().clear();
        tables().links.write().clear();
    }

    pub fn all_link_ids() -> Vec<LinkId> {
        tables().links.read().keys().copied().collect()
    }

    pub fn all_service_ids() -> Vec<ServiceId> {
        tables().services.read().keys().copied().collect()
    }
}
