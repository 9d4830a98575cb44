//! Build-wide string properties.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};

/// Concurrent `String -> String` map. Writes are last-write-wins.
#[derive(Debug, Default)]
pub struct Properties {
    values: RwLock<HashMap<String, String>>,
}

impl Properties {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a property that some target (or the settings) must have set.
    pub fn get(&self, key: &str) -> Result<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MissingProperty {
                key: key.to_string(),
            })
    }

    /// Set `key`, replacing any earlier value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Returns `true` if some target or seed set `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// A sorted copy of every property.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn missing_key_is_an_error() {
        let props = Properties::new();
        assert!(matches!(props.get("nope"), Err(Error::MissingProperty { key }) if key == "nope"));
    }

    #[test]
    fn last_write_wins() {
        let props = Properties::new();
        props.set("k", "1");
        props.set("k", "2");
        assert_eq!(props.get("k").unwrap(), "2");
        assert!(props.contains("k"));
    }

    #[test]
    fn concurrent_writers_all_land() {
        let props = Properties::new();
        thread::scope(|s| {
            for i in 0..8 {
                let props = &props;
                s.spawn(move || props.set(format!("k{i}"), i.to_string()));
            }
        });
        assert_eq!(props.snapshot().len(), 8);
        assert_eq!(props.get("k5").unwrap(), "5");
    }
}
