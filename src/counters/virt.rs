//! In-memory counters and network interfaces

use super::{Counter, CounterSource, InterfaceSource, NetworkInterface};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

type CounterKey = (String, String, String);

#[derive(Default)]
struct Registry {
    instances: RwLock<HashMap<String, Vec<String>>>,
    values: RwLock<HashMap<CounterKey, f32>>,
    failing: RwLock<HashSet<String>>,
    /// (category, counter, instance); no counter refuses the whole instance
    refused: RwLock<HashSet<(String, Option<String>, String)>>,
    broken: RwLock<HashSet<(String, String)>>,
    open: AtomicUsize,
    released: AtomicUsize,
}

/// Counter source whose instances and values are set by the owner.
///
/// Clones share state, so a test can keep one clone and hand another to the
/// code under test.
#[derive(Clone, Default)]
pub struct VirtualCounters {
    registry: Arc<Registry>,
}

impl VirtualCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&self, category: &str, instance: &str) {
        if let Ok(mut map) = self.registry.instances.write() {
            map.entry(category.to_string())
                .or_default()
                .push(instance.to_string());
        }
    }

    pub fn remove_instance(&self, category: &str, instance: &str) {
        if let Ok(mut map) = self.registry.instances.write() {
            if let Some(list) = map.get_mut(category) {
                list.retain(|i| i != instance);
            }
        }
    }

    pub fn set_value(&self, category: &str, counter: &str, instance: &str, value: f32) {
        if let Ok(mut map) = self.registry.values.write() {
            map.insert(
                (
                    category.to_string(),
                    counter.to_string(),
                    instance.to_string(),
                ),
                value,
            );
        }
    }

    /// Make every query against `category` fail as if the category were missing
    pub fn fail_category(&self, category: &str) {
        if let Ok(mut set) = self.registry.failing.write() {
            set.insert(category.to_string());
        }
    }

    /// Make opening any counter of `instance` fail although it is still listed
    pub fn refuse_instance(&self, category: &str, instance: &str) {
        if let Ok(mut set) = self.registry.refused.write() {
            set.insert((category.to_string(), None, instance.to_string()));
        }
    }

    /// Make opening one counter of `instance` fail
    pub fn refuse_counter(&self, category: &str, counter: &str, instance: &str) {
        if let Ok(mut set) = self.registry.refused.write() {
            set.insert((category.to_string(), Some(counter.to_string()), instance.to_string()));
        }
    }

    /// Make every sample of `instance` fail with a parse error
    pub fn break_instance(&self, category: &str, instance: &str) {
        if let Ok(mut set) = self.registry.broken.write() {
            set.insert((category.to_string(), instance.to_string()));
        }
    }

    /// Counters currently open
    pub fn open_count(&self) -> usize {
        self.registry.open.load(Ordering::SeqCst)
    }

    /// Counters released so far
    pub fn release_count(&self) -> usize {
        self.registry.released.load(Ordering::SeqCst)
    }

    fn check_category(&self, category: &str) -> Result<()> {
        let failing = self
            .registry
            .failing
            .read()
            .map(|set| set.contains(category))
            .unwrap_or(false);
        if failing {
            return Err(Error::CounterCategoryMissing(category.to_string()));
        }
        Ok(())
    }
}

impl CounterSource for VirtualCounters {
    fn instance_names(&self, category: &str) -> Result<Vec<String>> {
        self.check_category(category)?;
        Ok(self
            .registry
            .instances
            .read()
            .ok()
            .and_then(|map| map.get(category).cloned())
            .unwrap_or_default())
    }

    fn instance_exists(&self, instance: &str, category: &str) -> Result<bool> {
        Ok(self
            .instance_names(category)?
            .iter()
            .any(|i| i == instance))
    }

    fn open(&self, category: &str, counter: &str, instance: &str) -> Result<Box<dyn Counter>> {
        let refused = self
            .registry
            .refused
            .read()
            .map(|set| {
                set.contains(&(category.to_string(), None, instance.to_string()))
                    || set.contains(&(
                        category.to_string(),
                        Some(counter.to_string()),
                        instance.to_string(),
                    ))
            })
            .unwrap_or(false);
        if refused || !self.instance_exists(instance, category)? {
            return Err(Error::CounterInstanceMissing {
                category: category.to_string(),
                instance: instance.to_string(),
            });
        }
        self.registry.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(VirtualCounter {
            registry: self.registry.clone(),
            key: (
                category.to_string(),
                counter.to_string(),
                instance.to_string(),
            ),
        }))
    }
}

struct VirtualCounter {
    registry: Arc<Registry>,
    key: CounterKey,
}

impl Counter for VirtualCounter {
    fn next_value(&mut self) -> Result<f32> {
        let (category, _, instance) = &self.key;
        let broken = self
            .registry
            .broken
            .read()
            .map(|set| set.contains(&(category.clone(), instance.clone())))
            .unwrap_or(false);
        if broken {
            return Err(Error::Parse(format!("{} unreadable", instance)));
        }
        Ok(self
            .registry
            .values
            .read()
            .ok()
            .and_then(|map| map.get(&self.key).copied())
            .unwrap_or(0.0))
    }
}

impl Drop for VirtualCounter {
    fn drop(&mut self) {
        self.registry.open.fetch_sub(1, Ordering::SeqCst);
        self.registry.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fixed list of network interfaces
#[derive(Default)]
pub struct VirtualInterfaces {
    interfaces: RwLock<Vec<NetworkInterface>>,
}

impl VirtualInterfaces {
    pub fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            interfaces: RwLock::new(interfaces),
        }
    }

    pub fn push(&self, interface: NetworkInterface) {
        if let Ok(mut list) = self.interfaces.write() {
            list.push(interface);
        }
    }
}

impl InterfaceSource for VirtualInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        Ok(self
            .interfaces
            .read()
            .map(|list| list.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::NETWORK_INTERFACE;

    #[test]
    fn test_missing_instance_cannot_open() {
        let counters = VirtualCounters::new();
        let err = counters
            .open(NETWORK_INTERFACE, "Bytes Sent/sec", "eth0")
            .err()
            .unwrap();
        assert!(matches!(err, Error::CounterInstanceMissing { .. }));
    }

    #[test]
    fn test_failing_category() {
        let counters = VirtualCounters::new();
        counters.fail_category(NETWORK_INTERFACE);
        assert!(counters.instance_names(NETWORK_INTERFACE).is_err());
    }

    #[test]
    fn test_refused_and_broken_instances() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "eth0");
        counters.add_instance(NETWORK_INTERFACE, "eth1");
        counters.refuse_instance(NETWORK_INTERFACE, "eth0");
        counters.break_instance(NETWORK_INTERFACE, "eth1");

        assert!(counters.instance_exists("eth0", NETWORK_INTERFACE).unwrap());
        assert!(counters.open(NETWORK_INTERFACE, "Bytes Sent/sec", "eth0").is_err());
        let mut counter = counters.open(NETWORK_INTERFACE, "Bytes Sent/sec", "eth1").unwrap();
        assert!(matches!(counter.next_value(), Err(Error::Parse(_))));

        counters.add_instance(NETWORK_INTERFACE, "eth2");
        counters.refuse_counter(NETWORK_INTERFACE, "Bytes Sent/sec", "eth2");
        assert!(counters.open(NETWORK_INTERFACE, "Bytes Sent/sec", "eth2").is_err());
        assert!(counters.open(NETWORK_INTERFACE, "Bytes Received/sec", "eth2").is_ok());
    }

    #[test]
    fn test_values_shared_between_clones() {
        let counters = VirtualCounters::new();
        let shared = counters.clone();
        counters.add_instance(NETWORK_INTERFACE, "eth0");
        let mut counter = shared.open(NETWORK_INTERFACE, "Bytes Sent/sec", "eth0").unwrap();
        assert_eq!(counter.next_value().unwrap(), 0.0);
        counters.set_value(NETWORK_INTERFACE, "Bytes Sent/sec", "eth0", 128.0);
        assert_eq!(counter.next_value().unwrap(), 128.0);
    }
}
