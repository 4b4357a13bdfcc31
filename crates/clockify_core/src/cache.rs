use std::collections::HashMap;

/// One optional cached value, owned by a single manager.
#[derive(Debug, Clone)]
pub struct CacheSlot<T> {
    value: Option<T>,
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> CacheSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn store(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}

/// Cached values keyed by a scope such as a project id.
#[derive(Debug, Clone)]
pub struct ScopedCache<T> {
    slots: HashMap<String, T>,
}

impl<T> Default for ScopedCache<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<T> ScopedCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &str) -> Option<&T> {
        self.slots.get(scope)
    }

    pub fn store(&mut self, scope: &str, value: T) {
        self.slots.insert(scope.to_string(), value);
    }

    pub fn invalidate(&mut self, scope: &str) {
        self.slots.remove(scope);
    }

    pub fn invalidate_all(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
