// Device monitors
//
// One monitor per discovered hardware instance. Each monitor runs its class's
// selection heuristics once at construction, keeping the chosen sensors in a
// single `SensorSet`; named slots (package temperature, core clocks, ...) are
// stored indices into that set, never separate copies.
//
// Classes:
// - `cpu`, `gpu`, `ram`, `mainboard`: hardware-sensor monitors
// - `drive`: storage node sensors plus logical-disk throughput counters
// - `drive_info`: logical-disk space usage from performance counters
// - `network`: NIC bandwidth from performance counters

pub mod cpu;
pub mod drive;
pub mod drive_info;
pub mod gpu;
pub mod mainboard;
pub mod network;
pub mod ram;

pub use cpu::{CpuMonitor, CpuOptions};
pub use drive::{DriveMonitor, DriveOptions};
pub use drive_info::{DriveInfo, DriveInfoMonitor};
pub use gpu::{GpuMonitor, GpuOptions};
pub use mainboard::{MainboardMonitor, MainboardOptions};
pub use network::{Bandwidth, NetworkMonitor, NetworkOptions, NicInfo};
pub use ram::{RamMonitor, RamOptions};

use crate::config::MonitorType;
use crate::error::Result;
use crate::hardware::{self, HardwareHandle};
use crate::sensor::{LabeledSensor, SensorReading};

/// Common contract of every device monitor
pub trait Monitor: Send {
    /// Display name, usually the hardware node name
    fn name(&self) -> &str;

    /// Configuration class this monitor belongs to
    fn monitor_type(&self) -> MonitorType;

    /// Whether presentation layers should print the name
    fn show_name(&self) -> bool;

    /// Re-read the underlying sources and every owned sensor
    fn refresh(&mut self) -> Result<()>;

    /// Labeled sensors owned by this monitor, in display order
    fn sensors(&self) -> &[LabeledSensor] {
        &[]
    }

    /// Point-in-time readings, including values that are not hardware sensors
    fn readings(&self) -> Vec<SensorReading> {
        self.sensors().iter().map(LabeledSensor::reading).collect()
    }

    /// Release OS resources (counter handles); must be safe to call twice
    fn dispose(&mut self) {}
}

/// Owned sensor collection bound to one hardware node
pub struct SensorSet {
    hardware: HardwareHandle,
    sensors: Vec<LabeledSensor>,
}

impl SensorSet {
    pub fn new(hardware: HardwareHandle) -> Self {
        Self {
            hardware,
            sensors: Vec::new(),
        }
    }

    pub fn hardware(&self) -> &HardwareHandle {
        &self.hardware
    }

    /// Add a sensor and return its slot
    pub fn push(&mut self, sensor: LabeledSensor) -> usize {
        self.sensors.push(sensor);
        self.sensors.len() - 1
    }

    pub fn get(&self, slot: Option<usize>) -> Option<&LabeledSensor> {
        slot.and_then(|i| self.sensors.get(i))
    }

    /// Sensors of several slots, in slot order
    pub fn collect<'a>(&'a self, slots: impl IntoIterator<Item = &'a usize>) -> Vec<&'a LabeledSensor> {
        slots
            .into_iter()
            .filter_map(|&i| self.sensors.get(i))
            .collect()
    }

    /// Update the node and its sub-nodes
    pub fn update_hardware(&self) -> Result<()> {
        hardware::update_tree(self.hardware.as_ref())
    }

    /// Re-read every owned sensor
    pub fn update_sensors(&mut self) {
        for sensor in &mut self.sensors {
            sensor.update();
        }
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.update_hardware()?;
        self.update_sensors();
        Ok(())
    }

    pub fn sensors(&self) -> &[LabeledSensor] {
        &self.sensors
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// A monitor of any class, as held by the manager
pub enum DeviceMonitor {
    Cpu(CpuMonitor),
    Gpu(GpuMonitor),
    Ram(RamMonitor),
    Drive(DriveMonitor),
    DriveInfo(DriveInfoMonitor),
    Network(NetworkMonitor),
    Mainboard(MainboardMonitor),
}

impl DeviceMonitor {
    pub fn as_monitor(&self) -> &dyn Monitor {
        match self {
            DeviceMonitor::Cpu(m) => m,
            DeviceMonitor::Gpu(m) => m,
            DeviceMonitor::Ram(m) => m,
            DeviceMonitor::Drive(m) => m,
            DeviceMonitor::DriveInfo(m) => m,
            DeviceMonitor::Network(m) => m,
            DeviceMonitor::Mainboard(m) => m,
        }
    }

    pub fn as_monitor_mut(&mut self) -> &mut dyn Monitor {
        match self {
            DeviceMonitor::Cpu(m) => m,
            DeviceMonitor::Gpu(m) => m,
            DeviceMonitor::Ram(m) => m,
            DeviceMonitor::Drive(m) => m,
            DeviceMonitor::DriveInfo(m) => m,
            DeviceMonitor::Network(m) => m,
            DeviceMonitor::Mainboard(m) => m,
        }
    }

    /// Position in the refresh pass; drives come before logical disks
    pub fn refresh_rank(&self) -> (u8, u8) {
        let sub = match self {
            DeviceMonitor::DriveInfo(_) => 1,
            _ => 0,
        };
        (self.monitor_type().refresh_rank(), sub)
    }

    pub fn name(&self) -> &str {
        self.as_monitor().name()
    }

    pub fn monitor_type(&self) -> MonitorType {
        self.as_monitor().monitor_type()
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.as_monitor_mut().refresh()
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        self.as_monitor().readings()
    }

    pub fn dispose(&mut self) {
        self.as_monitor_mut().dispose()
    }
}

impl std::fmt::Debug for DeviceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("type", &self.monitor_type())
            .field("name", &self.name())
            .finish()
    }
}
