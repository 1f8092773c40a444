use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::set::PropertySet;
use super::value::PropertyValue;

/// Intercepts reads and writes of one key.
///
/// `on_get` may substitute the stored value; `on_set` may transform the
/// incoming value or reject it with a reason.
pub trait PropertyHook: Send + Sync {
    fn on_get(
        &self,
        _set: &PropertySet,
        _key: &str,
        _index: usize,
        stored: &PropertyValue,
    ) -> PropertyValue {
        stored.clone()
    }

    fn on_set(
        &self,
        _set: &PropertySet,
        _key: &str,
        _index: usize,
        value: PropertyValue,
    ) -> Result<PropertyValue, String> {
        Ok(value)
    }
}

/// Told about every successful write to the keys it watches.
pub trait PropertyObserver: Send + Sync {
    fn property_changed(&self, set: &PropertySet, key: &str, index: usize);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HookId(u64);

/// Non-owning registrations, keyed by property name.
///
/// Entries whose target has been dropped are skipped on dispatch and pruned
/// on the next registration.
#[derive(Default)]
pub(crate) struct HookTable {
    next_id: u64,
    hooks: HashMap<String, (HookId, Weak<dyn PropertyHook>)>,
    observers: HashMap<String, Vec<(HookId, Weak<dyn PropertyObserver>)>>,
}

impl HookTable {
    fn allocate(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }

    fn prune(&mut self) {
        self.hooks.retain(|_, (_, hook)| hook.strong_count() > 0);
        for list in self.observers.values_mut() {
            list.retain(|(_, observer)| observer.strong_count() > 0);
        }
        self.observers.retain(|_, list| !list.is_empty());
    }

    pub(crate) fn set_hook(&mut self, key: &str, hook: &Arc<dyn PropertyHook>) -> HookId {
        self.prune();
        let id = self.allocate();
        self.hooks
            .insert(key.to_string(), (id, Arc::downgrade(hook)));
        id
    }

    pub(crate) fn add_observer(&mut self, key: &str, observer: &Arc<dyn PropertyObserver>) -> HookId {
        self.prune();
        let id = self.allocate();
        self.observers
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::downgrade(observer)));
        id
    }

    pub(crate) fn remove(&mut self, id: HookId) {
        self.hooks.retain(|_, (hook_id, _)| *hook_id != id);
        for list in self.observers.values_mut() {
            list.retain(|(observer_id, _)| *observer_id != id);
        }
    }

    pub(crate) fn hook(&self, key: &str) -> Option<Arc<dyn PropertyHook>> {
        self.hooks.get(key).and_then(|(_, hook)| hook.upgrade())
    }

    pub(crate) fn observers(&self, key: &str) -> Vec<Arc<dyn PropertyObserver>> {
        self.observers
            .get(key)
            .map(|list| list.iter().filter_map(|(_, o)| o.upgrade()).collect())
            .unwrap_or_default()
    }
}
