//! Mainboard monitor
//!
//! Every temperature, fan speed and fan duty sensor on the board's chips,
//! labeled by raw name. The manager updates the board node once per tick, so
//! this monitor only re-reads its sensors.

use super::{Monitor, SensorSet};
use crate::config::{ConfigParam, MonitorType, ParamKey, ParamsExt};
use crate::error::Result;
use crate::hardware::{self, HardwareHandle, SensorType};
use crate::sensor::LabeledSensor;
use crate::units::DataKind;

#[derive(Debug, Clone, PartialEq)]
pub struct MainboardOptions {
    pub show_name: bool,
    pub fahrenheit: bool,
    pub temp_alert: f64,
}

impl Default for MainboardOptions {
    fn default() -> Self {
        Self {
            show_name: true,
            fahrenheit: false,
            temp_alert: 0.0,
        }
    }
}

impl MainboardOptions {
    pub fn from_params(params: &[ConfigParam]) -> Self {
        Self {
            show_name: params.get_bool(ParamKey::HardwareNames),
            fahrenheit: params.get_bool(ParamKey::UseFahrenheit),
            temp_alert: params.get_int(ParamKey::TempAlert) as f64,
        }
    }
}

pub struct MainboardMonitor {
    name: String,
    options: MainboardOptions,
    set: SensorSet,
    temperatures: Vec<usize>,
    fan_rpm: Vec<usize>,
    fan_percent: Vec<usize>,
}

impl MainboardMonitor {
    pub fn new(board: HardwareHandle, options: MainboardOptions) -> Self {
        let chip_sensors = hardware::sub_hardware_sensors(board.as_ref());
        let mut set = SensorSet::new(board.clone());

        let temperatures: Vec<usize> = chip_sensors
            .iter()
            .filter(|s| s.sensor_type() == SensorType::Temperature)
            .map(|s| {
                set.push(
                    LabeledSensor::temperature(s.clone(), s.name(), options.fahrenheit)
                        .with_alert(options.temp_alert),
                )
            })
            .collect();

        let fan_rpm: Vec<usize> = chip_sensors
            .iter()
            .filter(|s| s.sensor_type() == SensorType::Fan)
            .map(|s| set.push(LabeledSensor::new(s.clone(), DataKind::Rpm, s.name())))
            .collect();

        let fan_percent: Vec<usize> = chip_sensors
            .iter()
            .filter(|s| s.sensor_type() == SensorType::Control && s.name().contains("Fan"))
            .map(|s| set.push(LabeledSensor::new(s.clone(), DataKind::Percent, s.name())))
            .collect();

        Self {
            name: board.name().to_string(),
            options,
            set,
            temperatures,
            fan_rpm,
            fan_percent,
        }
    }

    pub fn temperatures(&self) -> Vec<&LabeledSensor> {
        self.set.collect(&self.temperatures)
    }

    pub fn fan_rpm(&self) -> Vec<&LabeledSensor> {
        self.set.collect(&self.fan_rpm)
    }

    pub fn fan_percent(&self) -> Vec<&LabeledSensor> {
        self.set.collect(&self.fan_percent)
    }
}

impl Monitor for MainboardMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Mainboard
    }

    fn show_name(&self) -> bool {
        self.options.show_name
    }

    fn refresh(&mut self) -> Result<()> {
        self.set.update_sensors();
        Ok(())
    }

    fn sensors(&self) -> &[LabeledSensor] {
        self.set.sensors()
    }
}
