//! Monitor manager
//!
//! Owns one monitor per discovered hardware instance for each enabled class
//! and drives the refresh pass. The set of monitors is fixed at construction.
//! A monitor whose construction or refresh fails is logged, recorded in
//! [`MonitorManager::failures`] and skipped from then on; the rest of the pass
//! carries on.

use crate::config::{MonitorConfig, MonitorType};
use crate::counters::OsSources;
use crate::error::{Error, Result};
use crate::hardware::{self, HardwareHandle, HardwareType};
use crate::monitor::{
    CpuMonitor, CpuOptions, DeviceMonitor, DriveInfoMonitor, DriveMonitor, DriveOptions,
    GpuMonitor, GpuOptions, MainboardMonitor, MainboardOptions, NetworkMonitor, NetworkOptions,
    RamMonitor, RamOptions,
};
use crate::sensor::SensorReading;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A monitor that failed and was taken out of the refresh pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorFailure {
    pub monitor_type: MonitorType,
    pub name: String,
    pub reason: String,
}

/// Readings of one monitor at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub monitor_type: MonitorType,
    pub name: String,
    pub show_name: bool,
    pub readings: Vec<SensorReading>,
}

/// Readings of every active monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub monitors: Vec<MonitorSnapshot>,
}

impl Snapshot {
    /// Monitors of one class
    pub fn of_type(&self, monitor_type: MonitorType) -> impl Iterator<Item = &MonitorSnapshot> {
        self.monitors
            .iter()
            .filter(move |m| m.monitor_type == monitor_type)
    }
}

struct Entry {
    monitor: DeviceMonitor,
    disabled: bool,
}

pub struct MonitorManager {
    board: Option<HardwareHandle>,
    config: Vec<MonitorConfig>,
    entries: Vec<Entry>,
    failures: Vec<MonitorFailure>,
    disposed: bool,
}

impl MonitorManager {
    /// Build monitors for every enabled class over `hardware` (top-level
    /// nodes in enumeration order) and run the first refresh.
    pub fn new(hardware: Vec<HardwareHandle>, sources: OsSources, config: Vec<MonitorConfig>) -> Self {
        let config = MonitorConfig::check(Some(config));
        let board = hardware
            .iter()
            .find(|h| h.hardware_type() == HardwareType::Mainboard)
            .cloned();

        let mut manager = Self {
            board,
            config,
            entries: Vec::new(),
            failures: Vec::new(),
            disposed: false,
        };

        let of_type = |types: &[HardwareType]| -> Vec<HardwareHandle> {
            hardware
                .iter()
                .filter(|h| types.contains(&h.hardware_type()))
                .cloned()
                .collect()
        };
        let gpus: Vec<HardwareHandle> = hardware
            .iter()
            .filter(|h| h.hardware_type().is_gpu())
            .cloned()
            .collect();

        for record in manager.config.clone() {
            if !record.enabled {
                debug!("{} monitors disabled by configuration", record.monitor_type);
                continue;
            }
            let params = &record.params;

            match record.monitor_type {
                MonitorType::Cpu => {
                    for cpu in of_type(&[HardwareType::Cpu]) {
                        let result =
                            CpuMonitor::new(cpu.clone(), manager.board.clone(), CpuOptions::from_params(params))
                                .map(DeviceMonitor::Cpu);
                        manager.add(MonitorType::Cpu, cpu.name(), result);
                    }
                }
                MonitorType::Gpu => {
                    for gpu in &gpus {
                        let result = GpuMonitor::new(gpu.clone(), GpuOptions::from_params(params))
                            .map(DeviceMonitor::Gpu);
                        manager.add(MonitorType::Gpu, gpu.name(), result);
                    }
                }
                MonitorType::Ram => {
                    if let Some(ram) = of_type(&[HardwareType::Ram]).into_iter().next() {
                        let result =
                            RamMonitor::new(ram.clone(), manager.board.clone(), RamOptions::from_params(params))
                                .map(DeviceMonitor::Ram);
                        manager.add(MonitorType::Ram, ram.name(), result);
                    }
                }
                MonitorType::Hd => {
                    let options = DriveOptions::from_params(params);
                    for drive in of_type(&[HardwareType::Storage]) {
                        let result = DriveMonitor::new(drive.clone(), sources.counters.clone(), options.clone())
                            .map(DeviceMonitor::Drive);
                        manager.add(MonitorType::Hd, drive.name(), result);
                    }
                    let result = DriveInfoMonitor::new(sources.counters.clone(), options)
                        .map(DeviceMonitor::DriveInfo);
                    manager.add(MonitorType::Hd, "Logical Disks", result);
                }
                MonitorType::Network => {
                    let result = NetworkMonitor::new(&sources, NetworkOptions::from_params(params))
                        .map(DeviceMonitor::Network);
                    manager.add(MonitorType::Network, "Network", result);
                }
                MonitorType::Mainboard => match manager.board.clone() {
                    Some(board) => {
                        let monitor = MainboardMonitor::new(board, MainboardOptions::from_params(params));
                        manager.add(MonitorType::Mainboard, "Mainboard", Ok(DeviceMonitor::Mainboard(monitor)));
                    }
                    None => debug!("No mainboard node, skipping mainboard monitor"),
                },
            }
        }

        // stable: instances keep enumeration order within a class
        manager.entries.sort_by_key(|e| e.monitor.refresh_rank());
        info!(
            "Monitor manager ready: {} monitors, {} failed",
            manager.entries.len(),
            manager.failures.len()
        );

        manager.update();
        manager
    }

    fn add(&mut self, monitor_type: MonitorType, name: &str, result: Result<DeviceMonitor>) {
        match result {
            Ok(monitor) => {
                debug!("Added {} monitor '{}'", monitor_type, monitor.name());
                self.entries.push(Entry {
                    monitor,
                    disabled: false,
                });
            }
            Err(e) => self.record_failure(monitor_type, name, &e),
        }
    }

    fn record_failure(&mut self, monitor_type: MonitorType, name: &str, error: &Error) {
        warn!("{} monitor '{}' disabled: {}", monitor_type, name, error);
        self.failures.push(MonitorFailure {
            monitor_type,
            name: name.to_string(),
            reason: error.to_string(),
        });
    }

    /// Refresh the board once, then every active monitor in class order
    pub fn update(&mut self) {
        if self.disposed {
            debug!("Update after dispose ignored");
            return;
        }

        if let Some(board) = &self.board {
            if let Err(e) = hardware::update_tree(board.as_ref()) {
                warn!("Mainboard '{}' update failed: {}", board.name(), e);
            }
        }

        let mut failed = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.disabled) {
            if let Err(e) = entry.monitor.refresh() {
                entry.disabled = true;
                failed.push((entry.monitor.monitor_type(), entry.monitor.name().to_string(), e));
            }
        }
        for (monitor_type, name, error) in failed {
            self.record_failure(monitor_type, &name, &error);
        }
    }

    /// Release every monitor's counter handles; later calls do nothing
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for entry in &mut self.entries {
            entry.monitor.dispose();
        }
        self.disposed = true;
        debug!("Monitor manager disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn board(&self) -> Option<&HardwareHandle> {
        self.board.as_ref()
    }

    /// Effective configuration, sorted by order
    pub fn config(&self) -> &[MonitorConfig] {
        &self.config
    }

    /// Every monitor in refresh order, including disabled ones
    pub fn monitors(&self) -> impl Iterator<Item = &DeviceMonitor> {
        self.entries.iter().map(|e| &e.monitor)
    }

    /// Monitors still taking part in the refresh pass
    pub fn active_monitors(&self) -> impl Iterator<Item = &DeviceMonitor> {
        self.entries
            .iter()
            .filter(|e| !e.disabled)
            .map(|e| &e.monitor)
    }

    pub fn failures(&self) -> &[MonitorFailure] {
        &self.failures
    }

    pub fn cpu_monitors(&self) -> Vec<&CpuMonitor> {
        self.monitors()
            .filter_map(|m| match m {
                DeviceMonitor::Cpu(cpu) => Some(cpu),
                _ => None,
            })
            .collect()
    }

    pub fn gpu_monitors(&self) -> Vec<&GpuMonitor> {
        self.monitors()
            .filter_map(|m| match m {
                DeviceMonitor::Gpu(gpu) => Some(gpu),
                _ => None,
            })
            .collect()
    }

    pub fn ram_monitor(&self) -> Option<&RamMonitor> {
        self.monitors().find_map(|m| match m {
            DeviceMonitor::Ram(ram) => Some(ram),
            _ => None,
        })
    }

    pub fn drive_monitors(&self) -> Vec<&DriveMonitor> {
        self.monitors()
            .filter_map(|m| match m {
                DeviceMonitor::Drive(drive) => Some(drive),
                _ => None,
            })
            .collect()
    }

    pub fn drive_info_monitor(&self) -> Option<&DriveInfoMonitor> {
        self.monitors().find_map(|m| match m {
            DeviceMonitor::DriveInfo(info) => Some(info),
            _ => None,
        })
    }

    pub fn network_monitor(&self) -> Option<&NetworkMonitor> {
        self.monitors().find_map(|m| match m {
            DeviceMonitor::Network(network) => Some(network),
            _ => None,
        })
    }

    pub fn mainboard_monitor(&self) -> Option<&MainboardMonitor> {
        self.monitors().find_map(|m| match m {
            DeviceMonitor::Mainboard(board) => Some(board),
            _ => None,
        })
    }

    /// Current readings of every active monitor
    pub fn snapshot(&self) -> Snapshot {
        let monitors = self
            .active_monitors()
            .map(|m| {
                let monitor = m.as_monitor();
                MonitorSnapshot {
                    monitor_type: monitor.monitor_type(),
                    name: monitor.name().to_string(),
                    show_name: monitor.show_name(),
                    readings: monitor.readings(),
                }
            })
            .collect();

        Snapshot {
            taken_at: Utc::now(),
            monitors,
        }
    }
}

impl Drop for MonitorManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
