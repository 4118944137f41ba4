use parking_lot::Mutex;
use crate::resource::Resource;

/// Supplies the attempt's current share of the queue. Pull-based: the attempt asks on every
/// headroom read and only caches the parent default.
pub trait HeadroomProvider: Send + Sync {
    fn headroom(&self) -> Resource;
}

/// Headroom set explicitly by the owner, e.g. a queue that recomputes it on every heartbeat.
#[derive(Default)]
pub struct FixedHeadroomProvider {
    headroom: Mutex<Resource>,
}

impl FixedHeadroomProvider {
    pub fn new(headroom: Resource) -> Self {
        Self {
            headroom: Mutex::new(headroom),
        }
    }

    pub fn set(&self, headroom: Resource) {
        *self.headroom.lock() = headroom;
    }
}

impl HeadroomProvider for FixedHeadroomProvider {
    fn headroom(&self) -> Resource {
        *self.headroom.lock()
    }
}
