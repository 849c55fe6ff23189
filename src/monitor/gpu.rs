//! GPU monitor
//!
//! GPU sensor layouts are normalized per vendor by the hardware layer, so
//! every slot is a fixed (class, index) pair on the GPU node with no board
//! fallback.

use super::{Monitor, SensorSet};
use crate::config::{ConfigParam, MonitorType, ParamKey, ParamsExt};
use crate::error::Result;
use crate::hardware::{HardwareHandle, SensorType};
use crate::select::{SearchContext, SensorQuery, Tier};
use crate::sensor::LabeledSensor;
use crate::units::DataKind;

#[derive(Debug, Clone, PartialEq)]
pub struct GpuOptions {
    pub show_name: bool,
    pub fahrenheit: bool,
    pub temp_alert: f64,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            show_name: true,
            fahrenheit: false,
            temp_alert: 0.0,
        }
    }
}

impl GpuOptions {
    pub fn from_params(params: &[ConfigParam]) -> Self {
        Self {
            show_name: params.get_bool(ParamKey::HardwareNames),
            fahrenheit: params.get_bool(ParamKey::UseFahrenheit),
            temp_alert: params.get_int(ParamKey::TempAlert) as f64,
        }
    }
}

pub struct GpuMonitor {
    name: String,
    options: GpuOptions,
    set: SensorSet,
    core_clock: Option<usize>,
    memory_clock: Option<usize>,
    core_load: Option<usize>,
    memory_load: Option<usize>,
    voltage: Option<usize>,
    temperature: Option<usize>,
    fan_percent: Option<usize>,
    fan_rpm: Option<usize>,
}

impl GpuMonitor {
    pub fn new(hardware: HardwareHandle, options: GpuOptions) -> Result<Self> {
        let mut set = SensorSet::new(hardware.clone());
        set.update_hardware()?;

        let ctx = SearchContext::new(hardware.as_ref(), None);
        let find = |role: &str, sensor_type: SensorType, index: u32| {
            ctx.select(role, &[Tier::own(SensorQuery::of(sensor_type).at(index))])
        };

        let core_clock = find("core clock", SensorType::Clock, 0)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Clock, "Core").rounded()));
        let memory_clock = find("memory clock", SensorType::Clock, 1)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Clock, "VRAM").rounded()));
        let core_load = find("core load", SensorType::Load, 0)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Percent, "Core")));
        let memory_load = find("memory load", SensorType::Load, 3)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Percent, "VRAM")));
        let voltage = find("voltage", SensorType::Voltage, 0)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Voltage, "Voltage")));
        let temperature = find("temperature", SensorType::Temperature, 0).map(|s| {
            set.push(
                LabeledSensor::temperature(s, "Temp", options.fahrenheit)
                    .with_alert(options.temp_alert),
            )
        });
        let fan_percent = find("fan control", SensorType::Control, 0)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Percent, "Fan")));
        let fan_rpm = find("fan", SensorType::Fan, 0)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Rpm, "Fan")));

        Ok(Self {
            name: hardware.name().to_string(),
            options,
            set,
            core_clock,
            memory_clock,
            core_load,
            memory_load,
            voltage,
            temperature,
            fan_percent,
            fan_rpm,
        })
    }

    pub fn core_clock(&self) -> Option<&LabeledSensor> {
        self.set.get(self.core_clock)
    }

    pub fn memory_clock(&self) -> Option<&LabeledSensor> {
        self.set.get(self.memory_clock)
    }

    pub fn core_load(&self) -> Option<&LabeledSensor> {
        self.set.get(self.core_load)
    }

    pub fn memory_load(&self) -> Option<&LabeledSensor> {
        self.set.get(self.memory_load)
    }

    pub fn voltage(&self) -> Option<&LabeledSensor> {
        self.set.get(self.voltage)
    }

    pub fn temperature(&self) -> Option<&LabeledSensor> {
        self.set.get(self.temperature)
    }

    pub fn fan_percent(&self) -> Option<&LabeledSensor> {
        self.set.get(self.fan_percent)
    }

    pub fn fan_rpm(&self) -> Option<&LabeledSensor> {
        self.set.get(self.fan_rpm)
    }
}

impl Monitor for GpuMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Gpu
    }

    fn show_name(&self) -> bool {
        self.options.show_name
    }

    fn refresh(&mut self) -> Result<()> {
        self.set.refresh()
    }

    fn sensors(&self) -> &[LabeledSensor] {
        self.set.sensors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::virt::{VirtualHardware, VirtualSensor};
    use crate::hardware::HardwareType;
    use std::sync::Arc;

    fn nvidia() -> VirtualHardware {
        let s = |t, i, n: &str, v| VirtualSensor::new(t, i, n, Some(v));
        VirtualHardware::new("NVIDIA GeForce GTX 1080", HardwareType::GpuNvidia)
            .with_sensor(s(SensorType::Clock, 0, "GPU Core", 1733.3))
            .with_sensor(s(SensorType::Clock, 1, "GPU Memory", 5005.0))
            .with_sensor(s(SensorType::Load, 0, "GPU Core", 37.0))
            .with_sensor(s(SensorType::Load, 1, "GPU Frame Buffer", 8.0))
            .with_sensor(s(SensorType::Load, 3, "GPU Memory", 21.5))
            .with_sensor(s(SensorType::Temperature, 0, "GPU Core", 66.0))
            .with_sensor(s(SensorType::Control, 0, "GPU Fan", 45.0))
            .with_sensor(s(SensorType::Fan, 0, "GPU", 1450.0))
    }

    #[test]
    fn test_fixed_index_slots() {
        let mut gpu = GpuMonitor::new(Arc::new(nvidia()), GpuOptions::default()).unwrap();
        gpu.refresh().unwrap();

        assert_eq!(gpu.core_clock().unwrap().text(), "Core: 1,733 MHz");
        assert_eq!(gpu.memory_clock().unwrap().text(), "VRAM: 5,005 MHz");
        assert_eq!(gpu.core_load().unwrap().text(), "Core: 37%");
        assert_eq!(gpu.memory_load().unwrap().raw_name(), "GPU Memory");
        assert_eq!(gpu.temperature().unwrap().text(), "Temp: 66 C");
        assert_eq!(gpu.fan_percent().unwrap().text(), "Fan: 45%");
        assert_eq!(gpu.fan_rpm().unwrap().text(), "Fan: 1,450 RPM");
        assert!(gpu.voltage().is_none());
        assert_eq!(gpu.sensors().len(), 7);
    }

    #[test]
    fn test_temperature_alert() {
        let options = GpuOptions {
            temp_alert: 65.0,
            ..GpuOptions::default()
        };
        let mut gpu = GpuMonitor::new(Arc::new(nvidia()), options).unwrap();
        gpu.refresh().unwrap();
        assert!(gpu.temperature().unwrap().is_alert());
        assert!(!gpu.core_load().unwrap().is_alert());
    }

    #[test]
    fn test_construction_fails_when_node_fails() {
        let hw = nvidia();
        hw.set_fail_updates(true);
        assert!(GpuMonitor::new(Arc::new(hw), GpuOptions::default()).is_err());
    }
}
