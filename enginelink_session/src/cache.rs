use parking_lot::Mutex;

/// Client-side durable stash for the endpoint across reloads. Used only as an
/// initialization fallback when the identity layer has no value yet.
pub trait EndpointCache: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, endpoint: &str);
    fn clear(&self);
}

/// In-process cache. Hosts with real persistence supply their own impl.
#[derive(Debug, Default)]
pub struct MemoryEndpointCache {
    slot: Mutex<Option<String>>,
}

impl EndpointCache for MemoryEndpointCache {
    fn load(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    fn save(&self, endpoint: &str) {
        *self.slot.lock() = Some(endpoint.to_string());
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}
