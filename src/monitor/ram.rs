//! RAM monitor

use super::{Monitor, SensorSet};
use crate::config::{ConfigParam, MonitorType, ParamKey, ParamsExt};
use crate::error::Result;
use crate::hardware::{HardwareHandle, SensorType};
use crate::select::{SearchContext, SensorQuery, Tier};
use crate::sensor::LabeledSensor;
use crate::units::DataKind;

#[derive(Debug, Clone, PartialEq)]
pub struct RamOptions {
    pub show_name: bool,
}

impl Default for RamOptions {
    fn default() -> Self {
        Self { show_name: true }
    }
}

impl RamOptions {
    pub fn from_params(params: &[ConfigParam]) -> Self {
        Self {
            show_name: params.get_bool(ParamKey::HardwareNames),
        }
    }
}

pub struct RamMonitor {
    name: String,
    options: RamOptions,
    set: SensorSet,
    clock: Option<usize>,
    voltage: Option<usize>,
    load: Option<usize>,
    used: Option<usize>,
    free: Option<usize>,
}

impl RamMonitor {
    pub fn new(
        hardware: HardwareHandle,
        board: Option<HardwareHandle>,
        options: RamOptions,
    ) -> Result<Self> {
        let mut set = SensorSet::new(hardware.clone());
        set.update_hardware()?;

        let ctx = SearchContext::new(hardware.as_ref(), board.as_deref());

        let clock = ctx
            .select("clock", &[Tier::own(SensorQuery::of(SensorType::Clock))])
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Clock, "Clock").rounded()));

        // memory voltage lives on the Super I/O chip when it is reported at all
        let voltage_tiers = [
            Tier::board_sub(SensorQuery::of(SensorType::Voltage).named("RAM")),
            Tier::own(SensorQuery::of(SensorType::Voltage)),
        ];
        let voltage = ctx
            .select("voltage", &voltage_tiers)
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Voltage, "Voltage")));

        let load = ctx
            .select("load", &[Tier::own(SensorQuery::of(SensorType::Load).at(0))])
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Percent, "Load")));
        let used = ctx
            .select("used", &[Tier::own(SensorQuery::of(SensorType::Data).at(0))])
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Gigabyte, "Used")));
        let free = ctx
            .select("free", &[Tier::own(SensorQuery::of(SensorType::Data).at(1))])
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Gigabyte, "Free")));

        Ok(Self {
            name: hardware.name().to_string(),
            options,
            set,
            clock,
            voltage,
            load,
            used,
            free,
        })
    }

    pub fn clock(&self) -> Option<&LabeledSensor> {
        self.set.get(self.clock)
    }

    pub fn voltage(&self) -> Option<&LabeledSensor> {
        self.set.get(self.voltage)
    }

    pub fn load(&self) -> Option<&LabeledSensor> {
        self.set.get(self.load)
    }

    pub fn used(&self) -> Option<&LabeledSensor> {
        self.set.get(self.used)
    }

    pub fn free(&self) -> Option<&LabeledSensor> {
        self.set.get(self.free)
    }
}

impl Monitor for RamMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Ram
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
