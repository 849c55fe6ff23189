// Hardware enumeration abstraction
//
// The core consumes hardware through three traits:
// - `Computer`: opens/closes a hardware session and lists top-level nodes
// - `Hardware`: one node (CPU, GPU, board, Super I/O chip, drive) with
//   sub-nodes and sensors; `update()` re-reads every sensor of the node
// - `Sensor`: one typed, indexed, named reading with an optional value
//
// Backends:
// - `virt`: in-memory nodes with settable values
// - `linux`: sysfs/procfs (hwmon, cpufreq, /proc/stat, /proc/meminfo, /sys/block)

#[cfg(target_os = "linux")]
pub mod linux;

pub mod virt;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared handle to a sensor owned by a hardware node
pub type SensorHandle = Arc<dyn Sensor>;

/// Shared handle to a hardware node owned by the enumeration context
pub type HardwareHandle = Arc<dyn Hardware>;

/// Class of a raw sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    Temperature,
    Load,
    Clock,
    Voltage,
    Fan,
    Control, // PWM duty in percent
    Data,    // amounts in GB
    Level,
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorType::Temperature => "Temperature",
            SensorType::Load => "Load",
            SensorType::Clock => "Clock",
            SensorType::Voltage => "Voltage",
            SensorType::Fan => "Fan",
            SensorType::Control => "Control",
            SensorType::Data => "Data",
            SensorType::Level => "Level",
        };
        write!(f, "{}", name)
    }
}

/// Class of a hardware node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareType {
    Mainboard,
    SuperIo,
    Cpu,
    Ram,
    GpuNvidia,
    GpuAmd,
    GpuIntel,
    Storage,
}

impl HardwareType {
    /// Whether the node is a graphics adapter of any vendor
    pub fn is_gpu(&self) -> bool {
        matches!(
            self,
            HardwareType::GpuNvidia | HardwareType::GpuAmd | HardwareType::GpuIntel
        )
    }
}

/// One raw reading exposed by a hardware node
pub trait Sensor: Send + Sync {
    /// Sensor class
    fn sensor_type(&self) -> SensorType;

    /// Index within its class; meaning varies per class and vendor
    fn index(&self) -> u32;

    /// Raw sensor name (e.g. "CPU Core #1", "Fan #2")
    fn name(&self) -> &str;

    /// Current value, `None` when the source returned no data this tick
    fn value(&self) -> Option<f32>;
}

/// One hardware node
pub trait Hardware: Send + Sync {
    /// Node name (e.g. CPU model string, chip name)
    fn name(&self) -> &str;

    /// Node class
    fn hardware_type(&self) -> HardwareType;

    /// Re-read every sensor of this node (not of its sub-nodes)
    fn update(&self) -> Result<()>;

    /// Child nodes, e.g. Super I/O chips under a mainboard
    fn sub_hardware(&self) -> Vec<HardwareHandle>;

    /// Sensors of this node, in enumeration order
    fn sensors(&self) -> Vec<SensorHandle>;

    /// Logical volume instance names hosted by this node (storage only)
    fn volumes(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Hardware enumeration context; owns the session lifecycle of its nodes
pub trait Computer: Send {
    /// Open the hardware session and discover nodes
    fn open(&mut self) -> Result<()>;

    /// Close the hardware session
    fn close(&mut self);

    /// Top-level nodes, in enumeration order
    fn hardware(&self) -> Vec<HardwareHandle>;

    /// Top-level nodes of the given classes, in enumeration order
    fn hardware_of(&self, types: &[HardwareType]) -> Vec<HardwareHandle> {
        self.hardware()
            .into_iter()
            .filter(|h| types.contains(&h.hardware_type()))
            .collect()
    }
}

/// Update a node and each of its direct sub-nodes
pub fn update_tree(hardware: &dyn Hardware) -> Result<()> {
    hardware.update()?;
    for sub in hardware.sub_hardware() {
        sub.update()?;
    }
    Ok(())
}

/// Sensors of every direct sub-node, flattened in enumeration order
pub fn sub_hardware_sensors(hardware: &dyn Hardware) -> Vec<SensorHandle> {
    hardware
        .sub_hardware()
        .iter()
        .flat_map(|h| h.sensors())
        .collect()
}
