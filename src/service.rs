//! A bound, addressable endpoint capable of accepting Links (spec §3.1,
//! §3.2, C1).

use crate::config::{Capabilities, ServiceFlags, ServiceUri};
use crate::ids::{LinkId, ServiceId};
use crate::transport::ServiceBinding;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Service {
    id: ServiceId,
    pub uri: ServiceUri,
    pub capabilities: Capabilities,
    pub flags: ServiceFlags,
    pub binding: Arc<dyn ServiceBinding>,
    online: AtomicBool,
    /// Server-side Links produced by `accept_client` for this service —
    /// never client-side Links from `connect_service` (spec §3.2
    /// `offlineService` "invalidates all server-side Links it produced").
    links: RwLock<Vec<LinkId>>,
}

impl Service {
    pub fn new(
        id: ServiceId,
        uri: ServiceUri,
        capabilities: Capabilities,
        flags: ServiceFlags,
        binding: Arc<dyn ServiceBinding>,
    ) -> Self {
        Service {
            id,
            uri,
            capabilities,
            flags,
            binding,
            online: AtomicBool::new(true),
            links: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn mark_offline(&self) {
        self.online.store(false, Ordering::Release);
    }

    pub fn track_link(&self, id: LinkId) {
        self.links.write().push(id);
    }

    pub fn owned_links(&self) -> Vec<LinkId> {
        self.links.read().clone()
    }
}
