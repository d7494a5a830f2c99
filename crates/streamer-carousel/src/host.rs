//! `CarouselHost` (§6): the crate's one public surface for an external
//! caller — feed it raw sections and a carousel id, it drives the registry,
//! subscription queue and dispatcher, and forwards completed modules to an
//! [`ObjectCacheSink`] collaborator.

use std::sync::Arc;

use tracing::warn;

use crate::dispatch::{self, CompletedModule};
use crate::error::Error;
use crate::registry::CarouselRegistry;
use crate::subscription::{StreamRequest, StreamSubscription};

/// The out-of-scope object-cache/filesystem this crate hands assembled
/// modules to (§1 "only their interfaces to the core are specified").
pub trait ObjectCacheSink: Send + Sync {
    fn store_module(&self, carousel_id: u32, module_id: u16, data: Vec<u8>);
}

/// The out-of-scope PID/section filter layer (§1 "the ability to attach/
/// detach section filters on a PID"). [`CarouselHost::resolve_subscriptions`]
/// calls `attach` once per drained [`StreamRequest`].
pub trait SectionFeed: Send + Sync {
    fn attach(&self, carousel_id: u32, assoc_tag: u16);
}

/// Drives one demux's worth of carousel state: a registry, a pending
/// subscription queue, and a sink for finished modules.
pub struct CarouselHost {
    registry: CarouselRegistry,
    subscriptions: StreamSubscription,
    sink: Arc<dyn ObjectCacheSink>,
}

impl CarouselHost {
    pub fn new(sink: Arc<dyn ObjectCacheSink>) -> Self {
        Self { registry: CarouselRegistry::new(), subscriptions: StreamSubscription::new(), sink }
    }

    /// Feeds one raw section through the dispatcher (§4.4). Errors are
    /// logged and swallowed — a malformed or CRC-broken section never
    /// propagates past the host, matching every other carousel error path.
    pub fn process_section(&mut self, data: &[u8], carousel_id: u32) {
        match dispatch::process_section(&mut self.registry, &mut self.subscriptions, data, carousel_id) {
            Ok(completed) => self.deliver(completed),
            Err(e) => warn!(error = %e, "carousel section dropped"),
        }
    }

    fn deliver(&self, completed: Vec<CompletedModule>) {
        for module in completed {
            self.sink.store_module(module.carousel_id, module.module_id, module.data);
        }
    }

    /// Drains every pending PID filter request (§4.7) for the caller to
    /// resolve into demux filter attachments itself.
    pub fn drain_subscriptions(&mut self) -> Vec<StreamRequest> {
        self.subscriptions.drain()
    }

    /// Drains pending requests and resolves each through `feed` directly.
    pub fn resolve_subscriptions(&mut self, feed: &dyn SectionFeed) {
        for req in self.subscriptions.drain() {
            feed.attach(req.carousel_id, req.assoc_tag);
        }
    }

    pub fn has_pending_subscriptions(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &CarouselRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for CarouselHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarouselHost").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        stored: Mutex<Vec<(u32, u16, Vec<u8>)>>,
    }

    impl ObjectCacheSink for RecordingSink {
        fn store_module(&self, carousel_id: u32, module_id: u16, data: Vec<u8>) {
            self.stored.lock().unwrap().push((carousel_id, module_id, data));
        }
    }

    #[test]
    fn malformed_section_is_swallowed_not_panicked() {
        let sink = Arc::new(RecordingSink::default());
        let mut host = CarouselHost::new(sink);
        host.process_section(&[0u8; 2], 0);
        assert_eq!(host.registry().len(), crate::registry::MAXCAROUSELS);
    }
}
