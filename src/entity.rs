// Shared container for per-resource instances plus the synthetic "_Total".

use std::sync::{Arc, Mutex, MutexGuard};

/// Identity of the aggregate instance in every enumeration.
pub const TOTAL_ID: &str = "_Total";

/// Instances are shared with samplers and callers; identity is the Arc.
pub type Handle<T> = Arc<Mutex<T>>;

pub trait EntityInstance {
    fn id(&self) -> &str;
    fn is_total(&self) -> bool;
}

/// Something a background sampler drives at a fixed period.
pub trait SampleSource: Send {
    fn name(&self) -> &'static str;
    fn sample(&mut self);
}

/// Lock an instance, recovering the data if a previous holder panicked.
pub fn lock<T>(handle: &Mutex<T>) -> MutexGuard<'_, T> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct EntityEnumeration<T> {
    instances: Vec<Handle<T>>,
    total: Option<Handle<T>>,
}

impl<T> Default for EntityEnumeration<T> {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            total: None,
        }
    }
}

impl<T: EntityInstance> EntityEnumeration<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&mut self, total: T) -> Handle<T> {
        let handle = Arc::new(Mutex::new(total));
        self.total = Some(handle.clone());
        handle
    }

    pub fn total(&self) -> Option<Handle<T>> {
        self.total.clone()
    }

    pub fn add(&mut self, instance: T) -> Handle<T> {
        let handle = Arc::new(Mutex::new(instance));
        self.instances.push(handle.clone());
        handle
    }

    pub fn get(&self, id: &str) -> Option<Handle<T>> {
        self.instances.iter().find(|h| lock(h).id() == id).cloned()
    }

    pub fn get_at(&self, index: usize) -> Option<Handle<T>> {
        self.instances.get(index).cloned()
    }

    /// Remove every instance for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.instances.retain(|h| keep(&lock(h)));
    }

    pub fn remove(&mut self, id: &str) -> Option<Handle<T>> {
        let pos = self.instances.iter().position(|h| lock(h).id() == id)?;
        Some(self.instances.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Handle<T>> {
        self.instances.iter()
    }

    pub fn instances(&self) -> Vec<Handle<T>> {
        self.instances.clone()
    }
}
