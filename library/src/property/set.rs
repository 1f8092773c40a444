use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::hook::{HookId, HookTable, PropertyHook, PropertyObserver};
use super::value::{Dimension, PropertyKind, PropertySpec, PropertyValue};
use super::PropertyError;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
struct Property {
    spec: PropertySpec,
    values: Vec<PropertyValue>,
}

/// Who is writing. Read-only keys only refuse writes coming from a plugin.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    Host,
    Plugin,
}

/// Keyed, kind-checked arrays of values.
///
/// Cloning copies the values only; hook and observer registrations belong to
/// the original set.
#[derive(Serialize, Deserialize, Default)]
pub struct PropertySet {
    properties: BTreeMap<String, Property>,
    #[serde(skip)]
    hooks: HookTable,
}

impl Clone for PropertySet {
    fn clone(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            hooks: HookTable::default(),
        }
    }
}

impl PartialEq for PropertySet {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
    }
}

impl fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.properties.iter().map(|(k, p)| (k, &p.values)))
            .finish()
    }
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = PropertySpec>) -> Result<Self, PropertyError> {
        let mut set = Self::new();
        for spec in specs {
            set.define(spec)?;
        }
        Ok(set)
    }

    /// Adds a key, replacing any earlier definition with the same name.
    pub fn define(&mut self, spec: PropertySpec) -> Result<(), PropertyError> {
        if let Some(bad) = spec.defaults.iter().find(|v| v.kind() != spec.kind) {
            return Err(PropertyError::TypeMismatch {
                key: spec.name.clone(),
                expected: spec.kind,
                found: bad.kind(),
            });
        }
        if let Dimension::Fixed(n) = spec.dimension {
            if spec.defaults.len() > n {
                return Err(PropertyError::DimensionMismatch {
                    key: spec.name.clone(),
                    expected: n,
                    found: spec.defaults.len(),
                });
            }
        }
        let values = spec.initial_values();
        self.properties
            .insert(spec.name.clone(), Property { spec, values });
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn spec(&self, key: &str) -> Result<&PropertySpec, PropertyError> {
        self.property(key).map(|p| &p.spec)
    }

    fn property(&self, key: &str) -> Result<&Property, PropertyError> {
        self.properties
            .get(key)
            .ok_or_else(|| PropertyError::UnknownKey(key.to_string()))
    }

    pub fn dimension(&self, key: &str) -> Result<usize, PropertyError> {
        self.property(key).map(|p| p.values.len())
    }

    pub fn get(&self, key: &str, index: usize) -> Result<PropertyValue, PropertyError> {
        let property = self.property(key)?;
        let stored = property
            .values
            .get(index)
            .ok_or(PropertyError::BadIndex {
                key: key.to_string(),
                index,
                dimension: property.values.len(),
            })?;
        Ok(match self.hooks.hook(key) {
            Some(hook) => hook.on_get(self, key, index, stored),
            None => stored.clone(),
        })
    }

    pub fn get_all(&self, key: &str) -> Result<Vec<PropertyValue>, PropertyError> {
        let n = self.dimension(key)?;
        (0..n).map(|i| self.get(key, i)).collect()
    }

    /// Stored value without running the get hook.
    pub fn get_raw(&self, key: &str, index: usize) -> Option<&PropertyValue> {
        self.properties.get(key).and_then(|p| p.values.get(index))
    }

    pub fn set(&mut self, key: &str, index: usize, value: PropertyValue) -> Result<(), PropertyError> {
        self.set_as(Access::Host, key, index, value)
    }

    pub fn set_as(
        &mut self,
        access: Access,
        key: &str,
        index: usize,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        let property = self.property(key)?;
        if access == Access::Plugin && property.spec.read_only {
            return Err(PropertyError::ReadOnly(key.to_string()));
        }
        if value.kind() != property.spec.kind {
            return Err(PropertyError::TypeMismatch {
                key: key.to_string(),
                expected: property.spec.kind,
                found: value.kind(),
            });
        }
        // Variable keys grow by appending right after their last element.
        let limit = match property.spec.dimension {
            Dimension::Fixed(n) => n,
            Dimension::Variable => property.values.len() + 1,
        };
        if index >= limit {
            return Err(PropertyError::BadIndex {
                key: key.to_string(),
                index,
                dimension: property.values.len(),
            });
        }

        let value = self.run_set_hook(key, index, value)?;
        let Some(property) = self.properties.get_mut(key) else {
            return Err(PropertyError::UnknownKey(key.to_string()));
        };
        if index == property.values.len() {
            property.values.push(value);
        } else {
            property.values[index] = value;
        }

        for observer in self.hooks.observers(key) {
            observer.property_changed(self, key, index);
        }
        Ok(())
    }

    fn run_set_hook(&self, key: &str, index: usize, value: PropertyValue) -> Result<PropertyValue, PropertyError> {
        match self.hooks.hook(key) {
            Some(hook) => hook
                .on_set(self, key, index, value)
                .map_err(|reason| PropertyError::Rejected {
                    key: key.to_string(),
                    reason,
                }),
            None => Ok(value),
        }
    }

    /// Replaces every element. Fixed keys require exactly their dimension.
    pub fn set_all(&mut self, key: &str, values: Vec<PropertyValue>) -> Result<(), PropertyError> {
        let spec = self.spec(key)?;
        let (dimension, kind) = (spec.dimension, spec.kind);
        if let Some(bad) = values.iter().find(|v| v.kind() != kind) {
            return Err(PropertyError::TypeMismatch {
                key: key.to_string(),
                expected: kind,
                found: bad.kind(),
            });
        }
        if let Dimension::Fixed(n) = dimension {
            if n != values.len() {
                return Err(PropertyError::DimensionMismatch {
                    key: key.to_string(),
                    expected: n,
                    found: values.len(),
                });
            }
        }

        // Every element passes the hook before anything is stored.
        let staged = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| self.run_set_hook(key, index, value))
            .collect::<Result<Vec<_>, _>>()?;
        let count = staged.len();
        let Some(property) = self.properties.get_mut(key) else {
            return Err(PropertyError::UnknownKey(key.to_string()));
        };
        property.values = staged;

        let observers = self.hooks.observers(key);
        for index in 0..count {
            for observer in &observers {
                observer.property_changed(self, key, index);
            }
        }
        Ok(())
    }

    /// Restores the declared defaults.
    pub fn reset(&mut self, key: &str) -> Result<(), PropertyError> {
        let Some(property) = self.properties.get_mut(key) else {
            return Err(PropertyError::UnknownKey(key.to_string()));
        };
        property.values = property.spec.initial_values();
        for observer in self.hooks.observers(key) {
            observer.property_changed(self, key, 0);
        }
        Ok(())
    }

    pub fn get_string(&self, key: &str, index: usize) -> Result<String, PropertyError> {
        self.typed(key, index, PropertyKind::String, |v| v.as_str().map(str::to_string))
    }

    pub fn get_int(&self, key: &str, index: usize) -> Result<i32, PropertyError> {
        self.typed(key, index, PropertyKind::Int, PropertyValue::as_int)
    }

    pub fn get_double(&self, key: &str, index: usize) -> Result<f64, PropertyError> {
        self.typed(key, index, PropertyKind::Double, PropertyValue::as_double)
    }

    pub fn get_pointer(&self, key: &str, index: usize) -> Result<usize, PropertyError> {
        self.typed(key, index, PropertyKind::Pointer, PropertyValue::as_pointer)
    }

    pub fn get_strings(&self, key: &str) -> Result<Vec<String>, PropertyError> {
        let n = self.dimension(key)?;
        (0..n).map(|i| self.get_string(key, i)).collect()
    }

    pub fn get_doubles(&self, key: &str) -> Result<Vec<f64>, PropertyError> {
        let n = self.dimension(key)?;
        (0..n).map(|i| self.get_double(key, i)).collect()
    }

    pub fn get_ints(&self, key: &str) -> Result<Vec<i32>, PropertyError> {
        let n = self.dimension(key)?;
        (0..n).map(|i| self.get_int(key, i)).collect()
    }

    fn typed<T>(
        &self,
        key: &str,
        index: usize,
        expected: PropertyKind,
        extract: impl FnOnce(&PropertyValue) -> Option<T>,
    ) -> Result<T, PropertyError> {
        let value = self.get(key, index)?;
        extract(&value).ok_or(PropertyError::TypeMismatch {
            key: key.to_string(),
            expected,
            found: value.kind(),
        })
    }

    pub fn set_string(&mut self, key: &str, index: usize, value: &str) -> Result<(), PropertyError> {
        self.set(key, index, value.into())
    }

    pub fn set_int(&mut self, key: &str, index: usize, value: i32) -> Result<(), PropertyError> {
        self.set(key, index, value.into())
    }

    pub fn set_double(&mut self, key: &str, index: usize, value: f64) -> Result<(), PropertyError> {
        self.set(key, index, value.into())
    }

    pub fn set_pointer(&mut self, key: &str, index: usize, value: usize) -> Result<(), PropertyError> {
        self.set(key, index, PropertyValue::Pointer(value))
    }

    pub fn set_strings<'a>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), PropertyError> {
        self.set_all(key, values.into_iter().map(PropertyValue::from).collect())
    }

    pub fn set_doubles(&mut self, key: &str, values: &[f64]) -> Result<(), PropertyError> {
        self.set_all(key, values.iter().map(|v| PropertyValue::from(*v)).collect())
    }

    pub fn set_ints(&mut self, key: &str, values: &[i32]) -> Result<(), PropertyError> {
        self.set_all(key, values.iter().map(|v| PropertyValue::Int(*v)).collect())
    }

    /// Defines the key when missing, then writes every element.
    pub fn put(&mut self, spec: PropertySpec) -> Result<(), PropertyError> {
        if self.contains(&spec.name) {
            let values = spec.initial_values();
            self.set_all(&spec.name, values)
        } else {
            self.define(spec)
        }
    }

    pub fn set_hook(&mut self, key: &str, hook: &Arc<dyn PropertyHook>) -> Result<HookId, PropertyError> {
        self.property(key)?;
        Ok(self.hooks.set_hook(key, hook))
    }

    pub fn add_observer(
        &mut self,
        key: &str,
        observer: &Arc<dyn PropertyObserver>,
    ) -> Result<HookId, PropertyError> {
        self.property(key)?;
        Ok(self.hooks.add_observer(key, observer))
    }

    pub fn remove_registration(&mut self, id: HookId) {
        self.hooks.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample() -> PropertySet {
        PropertySet::from_specs([
            PropertySpec::string("label", "blur"),
            PropertySpec::doubles("size", &[1.0, 2.0]),
            PropertySpec::strings("contexts", ["filter", "general"]),
            PropertySpec::int("version", 3).read_only(),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_returns_what_was_set() {
        let mut set = sample();
        set.set_double("size", 1, 4.5).unwrap();
        assert_eq!(set.get_double("size", 1).unwrap(), 4.5);
        assert_eq!(set.get_double("size", 0).unwrap(), 1.0);
        assert_eq!(set.get_strings("contexts").unwrap(), vec!["filter", "general"]);
    }

    #[test]
    fn test_fixed_dimension_rejects_out_of_range_index() {
        let mut set = sample();
        let err = set.set_double("size", 2, 1.0).unwrap_err();
        assert!(matches!(err, PropertyError::BadIndex { index: 2, dimension: 2, .. }));
        assert_eq!(set.dimension("size").unwrap(), 2);
    }

    #[test]
    fn test_variable_dimension_grows() {
        let mut set = sample();
        set.set_string("contexts", 2, "generator").unwrap();
        assert_eq!(set.dimension("contexts").unwrap(), 3);
        set.set_strings("contexts", ["reader"]).unwrap();
        assert_eq!(set.get_strings("contexts").unwrap(), vec!["reader"]);
    }

    #[test]
    fn test_variable_dimension_only_appends() {
        let mut set = sample();
        let err = set.set_string("contexts", 1000, "x").unwrap_err();
        assert!(matches!(err, PropertyError::BadIndex { index: 1000, dimension: 2, .. }));
        assert!(set.set_string("contexts", 3, "x").is_err());
        assert_eq!(set.dimension("contexts").unwrap(), 2);
        assert!(set.get_string("contexts", 500).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let mut set = sample();
        let err = set.set("label", 0, PropertyValue::Int(1)).unwrap_err();
        assert!(matches!(
            err,
            PropertyError::TypeMismatch { expected: PropertyKind::String, found: PropertyKind::Int, .. }
        ));
        assert!(set.get_int("label", 0).is_err());
    }

    #[test]
    fn test_unknown_key() {
        let set = sample();
        assert_eq!(
            set.get("missing", 0).unwrap_err(),
            PropertyError::UnknownKey("missing".to_string())
        );
    }

    #[test]
    fn test_read_only_only_applies_to_plugin_writes() {
        let mut set = sample();
        assert_eq!(
            set.set_as(Access::Plugin, "version", 0, 4.into()).unwrap_err(),
            PropertyError::ReadOnly("version".to_string())
        );
        set.set_int("version", 0, 4).unwrap();
        assert_eq!(set.get_int("version", 0).unwrap(), 4);
    }

    #[test]
    fn test_set_all_checks_fixed_dimension() {
        let mut set = sample();
        let err = set.set_doubles("size", &[1.0]).unwrap_err();
        assert!(matches!(err, PropertyError::DimensionMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut set = sample();
        set.set_double("size", 0, 9.0).unwrap();
        set.reset("size").unwrap();
        assert_eq!(set.get_doubles("size").unwrap(), vec![1.0, 2.0]);
    }

    struct Doubler;

    impl PropertyHook for Doubler {
        fn on_set(
            &self,
            _set: &PropertySet,
            _key: &str,
            _index: usize,
            value: PropertyValue,
        ) -> Result<PropertyValue, String> {
            match value.as_double() {
                Some(v) if v < 0.0 => Err("negative".to_string()),
                Some(v) => Ok((v * 2.0).into()),
                None => Ok(value),
            }
        }
    }

    #[test]
    fn test_hook_transforms_and_rejects() {
        let mut set = sample();
        let hook: Arc<dyn PropertyHook> = Arc::new(Doubler);
        set.set_hook("size", &hook).unwrap();
        set.set_double("size", 0, 3.0).unwrap();
        assert_eq!(set.get_double("size", 0).unwrap(), 6.0);
        assert!(matches!(
            set.set_double("size", 0, -1.0),
            Err(PropertyError::Rejected { .. })
        ));

        drop(hook);
        set.set_double("size", 0, 3.0).unwrap();
        assert_eq!(set.get_double("size", 0).unwrap(), 3.0);
    }

    struct RejectSecond;

    impl PropertyHook for RejectSecond {
        fn on_set(
            &self,
            _set: &PropertySet,
            _key: &str,
            index: usize,
            value: PropertyValue,
        ) -> Result<PropertyValue, String> {
            if index == 1 { Err("second slot is locked".to_string()) } else { Ok(value) }
        }
    }

    #[test]
    fn test_set_all_is_all_or_nothing() {
        let mut set = sample();
        let hook: Arc<dyn PropertyHook> = Arc::new(RejectSecond);
        set.set_hook("contexts", &hook).unwrap();
        let err = set.set_strings("contexts", ["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, PropertyError::Rejected { .. }));
        assert_eq!(set.get_strings("contexts").unwrap(), vec!["filter", "general"]);

        set.set_strings("contexts", ["reader"]).unwrap();
        assert_eq!(set.get_strings("contexts").unwrap(), vec!["reader"]);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, usize)>>);

    impl PropertyObserver for Recorder {
        fn property_changed(&self, _set: &PropertySet, key: &str, index: usize) {
            self.0.lock().unwrap().push((key.to_string(), index));
        }
    }

    #[test]
    fn test_observer_is_notified_after_set() {
        let mut set = sample();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn PropertyObserver> = recorder.clone();
        let id = set.add_observer("label", &observer).unwrap();
        set.set_string("label", 0, "sharpen").unwrap();
        set.remove_registration(id);
        set.set_string("label", 0, "invert").unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec![("label".to_string(), 0)]);
    }

    #[test]
    fn test_clone_drops_registrations() {
        let mut set = sample();
        let hook: Arc<dyn PropertyHook> = Arc::new(Doubler);
        set.set_hook("size", &hook).unwrap();
        let mut copy = set.clone();
        copy.set_double("size", 0, 3.0).unwrap();
        assert_eq!(copy.get_double("size", 0).unwrap(), 3.0);
        assert_ne!(copy, set);
    }

    #[test]
    fn test_pointers_are_persisted_as_null() {
        let mut set = PropertySet::from_specs([PropertySpec::pointer("data")]).unwrap();
        set.set_pointer("data", 0, 0xdead).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let restored: PropertySet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.get_pointer("data", 0).unwrap(), 0);
    }
}
