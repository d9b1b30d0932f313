//! String-keyed host maps
//!
//! A [`HostDictionary`] reads like a plain object to scripts: its keys are
//! properties, assignment inserts, `delete` removes and enumeration lists
//! the keys in order. The host keeps its own handle and sees every change.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;

use crate::reflect::templates::{missing, INHERITED};
use crate::reflect::{Exposure, MissingMemberPolicy};
use crate::template::{DispatchResult, HostObjectTemplate};
use crate::value::Value;

#[derive(Default)]
pub struct HostDictionary {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl HostDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Keys in ascending order
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the current entries
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.entries.read().clone()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HostDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl From<BTreeMap<String, Value>> for HostDictionary {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl fmt::Debug for HostDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.read().iter()).finish()
    }
}

/// Dictionaries: keys as properties
pub(crate) fn dictionary_template(
    exposure: Exposure,
    policy: MissingMemberPolicy,
) -> HostObjectTemplate {
    HostObjectTemplate::new(move |object| object.is::<HostDictionary>() && exposure.allows(object))
        .with_name("host-dictionary")
        .on_get_property(move |_, target, name| {
            let Some(dictionary) = target.downcast_ref::<HostDictionary>() else {
                return DispatchResult::NotHandled;
            };
            match dictionary.get(name) {
                Some(value) => DispatchResult::Handled(value),
                None if INHERITED.contains(&name) => DispatchResult::NotHandled,
                None => missing(policy, "dictionary", name),
            }
        })
        .on_set_property(|_, target, name, value| {
            match target.downcast_ref::<HostDictionary>() {
                Some(dictionary) => {
                    dictionary.insert(name, value);
                    DispatchResult::Handled(())
                }
                None => DispatchResult::NotHandled,
            }
        })
        .on_delete_property(|_, target, name| match target.downcast_ref::<HostDictionary>() {
            Some(dictionary) => DispatchResult::Handled(dictionary.remove(name).is_some()),
            None => DispatchResult::NotHandled,
        })
        .on_enumerate_properties(|_, target| {
            Ok(target
                .downcast_ref::<HostDictionary>()
                .map(HostDictionary::keys)
                .unwrap_or_default())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HostObject;

    #[test]
    fn test_entries_stay_sorted() {
        let dictionary: HostDictionary = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(dictionary.keys(), vec!["a", "b"]);
        assert_eq!(dictionary.insert("a", 3), Some(Value::Integer(1)));
        assert_eq!(dictionary.remove("b"), Some(Value::Integer(2)));
        assert_eq!(dictionary.remove("b"), None);
        assert_eq!(dictionary.len(), 1);
        assert_eq!(format!("{:?}", HostDictionary::new()), "{}");
    }

    #[test]
    fn test_template_selects_dictionaries() {
        let template = dictionary_template(Exposure::enabled(), MissingMemberPolicy::Ignore);
        assert!(template.matches(&HostObject::new(HostDictionary::new())));
        assert!(!template.matches(&HostObject::new(BTreeMap::<String, Value>::new())));
    }
}
