//! In-memory hardware nodes
//!
//! Nodes and sensors are assembled with builder methods and their values are
//! set directly, which makes them suitable both for feeding readings from a
//! foreign source and as test fixtures.

use super::{Computer, Hardware, HardwareHandle, HardwareType, Sensor, SensorHandle, SensorType};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Sensor whose value is set by the owner
#[derive(Debug)]
pub struct VirtualSensor {
    sensor_type: SensorType,
    index: u32,
    name: String,
    value: RwLock<Option<f32>>,
}

impl VirtualSensor {
    pub fn new(
        sensor_type: SensorType,
        index: u32,
        name: impl Into<String>,
        value: Option<f32>,
    ) -> Self {
        Self {
            sensor_type,
            index,
            name: name.into(),
            value: RwLock::new(value),
        }
    }

    /// Replace the current value; `None` simulates a tick without data
    pub fn set_value(&self, value: Option<f32>) {
        if let Ok(mut guard) = self.value.write() {
            *guard = value;
        }
    }
}

impl Sensor for VirtualSensor {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Option<f32> {
        self.value.read().ok().and_then(|v| *v)
    }
}

/// Hardware node backed by in-memory sensors
pub struct VirtualHardware {
    name: String,
    hardware_type: HardwareType,
    sensors: Vec<Arc<VirtualSensor>>,
    sub_hardware: Vec<HardwareHandle>,
    volumes: Vec<String>,
    updates: AtomicUsize,
    fail_updates: AtomicBool,
}

impl VirtualHardware {
    pub fn new(name: impl Into<String>, hardware_type: HardwareType) -> Self {
        Self {
            name: name.into(),
            hardware_type,
            sensors: Vec::new(),
            sub_hardware: Vec::new(),
            volumes: Vec::new(),
            updates: AtomicUsize::new(0),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn with_sensor(self, sensor: VirtualSensor) -> Self {
        self.with_shared_sensor(Arc::new(sensor))
    }

    /// Attach a sensor the caller keeps a handle to
    pub fn with_shared_sensor(mut self, sensor: Arc<VirtualSensor>) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn with_sub_hardware(mut self, hardware: HardwareHandle) -> Self {
        self.sub_hardware.push(hardware);
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volumes.push(volume.into());
        self
    }

    /// Find a sensor by raw name
    pub fn sensor(&self, name: &str) -> Option<Arc<VirtualSensor>> {
        self.sensors.iter().find(|s| s.name == name).cloned()
    }

    /// Make every following `update()` fail, or succeed again
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `update()` calls so far
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl Hardware for VirtualHardware {
    fn name(&self) -> &str {
        &self.name
    }

    fn hardware_type(&self) -> HardwareType {
        self.hardware_type
    }

    fn update(&self) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::HardwareUnavailable(format!(
                "{}: update failed",
                self.name
            )));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sub_hardware(&self) -> Vec<HardwareHandle> {
        self.sub_hardware.clone()
    }

    fn sensors(&self) -> Vec<SensorHandle> {
        self.sensors
            .iter()
            .map(|s| s.clone() as SensorHandle)
            .collect()
    }

    fn volumes(&self) -> Vec<String> {
        self.volumes.clone()
    }
}

/// Enumeration context over a fixed list of nodes
#[derive(Default)]
pub struct VirtualComputer {
    hardware: Vec<HardwareHandle>,
    open: bool,
}

impl VirtualComputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hardware(mut self, hardware: HardwareHandle) -> Self {
        self.hardware.push(hardware);
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Computer for VirtualComputer {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn hardware(&self) -> Vec<HardwareHandle> {
        self.hardware.clone()
    }
}
