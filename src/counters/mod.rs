// OS performance counters and network interface enumeration
//
// Counters are addressed as (category, counter name, instance), the way OS
// performance-counter subsystems expose them. A `CounterHandle` exclusively
// owns one opened counter and releases it exactly once.
//
// Backends:
// - `virt`: in-memory counters and interfaces
// - `linux`: /proc/mounts + statvfs + /proc/diskstats, /sys/class/net

#[cfg(target_os = "linux")]
pub mod linux;

pub mod virt;

use crate::error::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Category holding one instance per logical volume
pub const LOGICAL_DISK: &str = "LogicalDisk";
/// Category holding one instance per network adapter
pub const NETWORK_INTERFACE: &str = "Network Interface";

pub const FREE_MEGABYTES: &str = "Free Megabytes";
pub const PERCENT_FREE_SPACE: &str = "% Free Space";
pub const DISK_READ_BYTES_PER_SEC: &str = "Disk Read Bytes/sec";
pub const DISK_WRITE_BYTES_PER_SEC: &str = "Disk Write Bytes/sec";
pub const BYTES_RECEIVED_PER_SEC: &str = "Bytes Received/sec";
pub const BYTES_SENT_PER_SEC: &str = "Bytes Sent/sec";

/// One opened counter
pub trait Counter: Send {
    /// Sample the counter. Rate counters return 0 on their first sample.
    fn next_value(&mut self) -> Result<f32>;
}

/// Performance-counter subsystem
pub trait CounterSource: Send + Sync {
    /// Instance names of a category; errors when the category is missing
    fn instance_names(&self, category: &str) -> Result<Vec<String>>;

    /// Whether an instance currently exists in a category
    fn instance_exists(&self, instance: &str, category: &str) -> Result<bool>;

    /// Open a counter
    fn open(&self, category: &str, counter: &str, instance: &str) -> Result<Box<dyn Counter>>;
}

/// Exclusively owned counter; `close()` releases it and is idempotent
pub struct CounterHandle {
    category: String,
    counter: String,
    instance: String,
    inner: Option<Box<dyn Counter>>,
}

impl CounterHandle {
    /// Open `counter` of `category` for `instance`
    pub fn open(
        source: &dyn CounterSource,
        category: &str,
        counter: &str,
        instance: &str,
    ) -> Result<Self> {
        let inner = source.open(category, counter, instance)?;
        Ok(Self {
            category: category.to_string(),
            counter: counter.to_string(),
            instance: instance.to_string(),
            inner: Some(inner),
        })
    }

    /// Next sample, `None` once the handle has been closed
    pub fn next_value(&mut self) -> Result<Option<f32>> {
        match self.inner.as_mut() {
            Some(counter) => counter.next_value().map(Some),
            None => Ok(None),
        }
    }

    /// Next sample, with a read failure logged and reported as no value
    pub fn sample(&mut self) -> Option<f32> {
        match self.next_value() {
            Ok(value) => value,
            Err(e) => {
                debug!(
                    "Counter {}/{}/{} unreadable: {}",
                    self.category, self.counter, self.instance, e
                );
                None
            }
        }
    }

    /// Release the underlying counter
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!(
                "Closed counter {}/{}/{}",
                self.category, self.counter, self.instance
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn counter(&self) -> &str {
        &self.counter
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl fmt::Debug for CounterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterHandle")
            .field("category", &self.category)
            .field("counter", &self.counter)
            .field("instance", &self.instance)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Operational status of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalStatus {
    Up,
    Down,
    Unknown,
}

/// Link type of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceType {
    Ethernet,
    Wireless80211,
    Loopback,
    Other,
}

/// Network interface as reported by the OS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Short name (e.g. "eth0", "Ethernet 2")
    pub name: String,
    /// Adapter description; joined against counter instance names
    pub description: String,
    pub status: OperationalStatus,
    pub interface_type: InterfaceType,
    /// MAC address bytes
    pub physical_address: Vec<u8>,
}

impl NetworkInterface {
    /// Up and Ethernet or Wi-Fi
    pub fn is_monitorable(&self) -> bool {
        self.status == OperationalStatus::Up
            && matches!(
                self.interface_type,
                InterfaceType::Ethernet | InterfaceType::Wireless80211
            )
    }

    /// MAC address as upper-case hex pairs joined by ':'
    pub fn formatted_address(&self) -> String {
        self.physical_address
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// OS network interface enumeration
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>>;
}

/// OS-level sources the core reads besides the hardware library
#[derive(Clone)]
pub struct OsSources {
    pub counters: Arc<dyn CounterSource>,
    pub interfaces: Arc<dyn InterfaceSource>,
}

impl OsSources {
    pub fn new(counters: Arc<dyn CounterSource>, interfaces: Arc<dyn InterfaceSource>) -> Self {
        Self {
            counters,
            interfaces,
        }
    }

    /// Linux procfs/sysfs sources
    #[cfg(target_os = "linux")]
    pub fn linux() -> Self {
        Self::new(
            Arc::new(linux::ProcCounters::new()),
            Arc::new(linux::SysfsInterfaces::new()),
        )
    }
}
