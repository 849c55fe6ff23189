//! # telemon
//!
//! Hardware telemetry aggregation. telemon polls sensor sources for the CPU,
//! GPUs, memory, drives, network adapters and mainboard, picks the right
//! sensor for each logical metric out of inconsistently named vendor data, and
//! exposes labeled, formatted readings to presentation layers.
//!
//! ## Layers
//!
//! - [`hardware`]: node/sensor traits plus in-memory and Linux backends
//! - [`counters`]: OS performance counters and network interfaces
//! - [`sensor`]: [`LabeledSensor`], a raw sensor with label, kind, rounding and alert
//! - [`select`]: tiered fallback search over a node and the mainboard
//! - [`monitor`]: one monitor per hardware class
//! - [`manager`]: [`MonitorManager`], owning every monitor and the refresh pass
//! - [`config`]: per-class parameters and TOML [`Settings`]
//! - [`session`]: [`TelemetrySession`], the open → monitor → close lifecycle
//!
//! ## Quick Start
//!
//! ```no_run
//! use telemon::{Settings, TelemetrySession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! let mut session = TelemetrySession::open_default(settings)?;
//!
//! for cpu in session.manager().cpu_monitors() {
//!     if let Some(temp) = cpu.package_temperature() {
//!         println!("{}", temp.text());
//!     }
//! }
//!
//! session.update()?;
//! let snapshot = session.snapshot();
//! println!("{}", serde_json::to_string_pretty(&snapshot)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing without hardware
//!
//! ```
//! use std::sync::Arc;
//! use telemon::counters::virt::{VirtualCounters, VirtualInterfaces};
//! use telemon::counters::OsSources;
//! use telemon::hardware::virt::{VirtualHardware, VirtualSensor};
//! use telemon::hardware::{HardwareHandle, HardwareType, SensorType};
//! use telemon::{MonitorConfig, MonitorManager};
//!
//! let cpu: HardwareHandle = Arc::new(
//!     VirtualHardware::new("Test CPU", HardwareType::Cpu)
//!         .with_sensor(VirtualSensor::new(SensorType::Load, 0, "CPU Total", Some(37.5))),
//! );
//! let sources = OsSources::new(
//!     Arc::new(VirtualCounters::new()),
//!     Arc::new(VirtualInterfaces::new(Vec::new())),
//! );
//! let manager = MonitorManager::new(vec![cpu], sources, MonitorConfig::defaults());
//!
//! let load = manager.cpu_monitors()[0].total_load().unwrap().text();
//! assert_eq!(load, "Load: 37.5%");
//! ```

pub mod config;
pub mod counters;
pub mod error;
pub mod hardware;
pub mod manager;
pub mod monitor;
pub mod select;
pub mod sensor;
pub mod session;
pub mod units;

pub use config::{ConfigParam, MonitorConfig, MonitorType, ParamKey, ParamValue, Settings};
pub use error::{Error, Result};
pub use manager::{MonitorFailure, MonitorManager, MonitorSnapshot, Snapshot};
pub use monitor::{DeviceMonitor, Monitor};
pub use sensor::{LabeledSensor, SensorReading};
pub use session::TelemetrySession;
pub use units::{DataKind, NO_VALUE};
