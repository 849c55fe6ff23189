//! CPU monitor
//!
//! Clocks and loads come from the CPU node, indexed per core (index 0 is the
//! aggregate). Temperature, fan and voltage fall back from the mainboard and
//! its Super I/O chips to the CPU node.

use super::{Monitor, SensorSet};
use crate::config::{ConfigParam, MonitorType, ParamKey, ParamsExt};
use crate::error::Result;
use crate::hardware::{HardwareHandle, SensorHandle, SensorType};
use crate::select::{self, SearchContext, SensorQuery, Tier};
use crate::sensor::LabeledSensor;
use crate::units::DataKind;
use log::debug;
use std::collections::BTreeMap;

/// Super I/O chips that report one aggregate CPU temperature and nothing
/// per core
const AGGREGATE_TEMPERATURE_CHIPS: &[&str] = &["IT8712F"];

/// CPU monitor settings
#[derive(Debug, Clone, PartialEq)]
pub struct CpuOptions {
    pub show_name: bool,
    pub fahrenheit: bool,
    pub all_core_clocks: bool,
    pub core_loads: bool,
    pub temp_alert: f64,
}

impl Default for CpuOptions {
    fn default() -> Self {
        Self {
            show_name: true,
            fahrenheit: false,
            all_core_clocks: true,
            core_loads: true,
            temp_alert: 0.0,
        }
    }
}

impl CpuOptions {
    pub fn from_params(params: &[ConfigParam]) -> Self {
        Self {
            show_name: params.get_bool(ParamKey::HardwareNames),
            fahrenheit: params.get_bool(ParamKey::UseFahrenheit),
            all_core_clocks: params.get_bool(ParamKey::AllCoreClocks),
            core_loads: params.get_bool(ParamKey::CoreLoads),
            temp_alert: params.get_int(ParamKey::TempAlert) as f64,
        }
    }
}

pub struct CpuMonitor {
    name: String,
    options: CpuOptions,
    set: SensorSet,
    core_clocks: BTreeMap<u32, usize>,
    total_load: Option<usize>,
    core_loads: BTreeMap<u32, usize>,
    package_temperature: Option<usize>,
    temperatures: Vec<usize>,
    fan_rpm: Option<usize>,
    fan_percent: Option<usize>,
    voltage: Option<usize>,
}

impl CpuMonitor {
    pub fn new(
        hardware: HardwareHandle,
        board: Option<HardwareHandle>,
        options: CpuOptions,
    ) -> Result<Self> {
        let mut monitor = Self {
            name: hardware.name().to_string(),
            options,
            set: SensorSet::new(hardware.clone()),
            core_clocks: BTreeMap::new(),
            total_load: None,
            core_loads: BTreeMap::new(),
            package_temperature: None,
            temperatures: Vec::new(),
            fan_rpm: None,
            fan_percent: None,
            voltage: None,
        };
        monitor.set.update_hardware()?;

        let ctx = SearchContext::new(hardware.as_ref(), board.as_deref());
        monitor.init_clocks(&ctx);
        monitor.init_loads(&ctx);
        monitor.init_temperatures(&ctx);
        monitor.init_fans(&ctx);
        monitor.init_voltage(&ctx);

        debug!(
            "CPU monitor '{}': {} sensors ({} core clocks, {} core loads, {} core temperatures)",
            monitor.name,
            monitor.set.len(),
            monitor.core_clocks.len(),
            monitor.core_loads.len(),
            monitor.temperatures.len()
        );
        Ok(monitor)
    }

    fn init_clocks(&mut self, ctx: &SearchContext<'_>) {
        let clocks = ctx.all(&Tier::own(SensorQuery::of(SensorType::Clock).named("CPU")));
        let by_index = select::by_index(&clocks);
        let max = by_index.keys().next_back().copied().unwrap_or(0);

        for index in 1..=max {
            let Some(sensor) = by_index.get(&index) else {
                continue;
            };
            if !self.options.all_core_clocks {
                let slot = self
                    .set
                    .push(LabeledSensor::new(sensor.clone(), DataKind::Clock, "Clock").rounded());
                self.core_clocks.insert(index - 1, slot);
                break;
            }
            let slot = self.set.push(
                LabeledSensor::new(sensor.clone(), DataKind::Clock, format!("Core {}", index - 1))
                    .rounded(),
            );
            self.core_clocks.insert(index - 1, slot);
        }
    }

    fn init_loads(&mut self, ctx: &SearchContext<'_>) {
        let loads = ctx.all(&Tier::own(SensorQuery::of(SensorType::Load)));
        let by_index = select::by_index(&loads);

        if let Some(total) = by_index.get(&0) {
            self.total_load = Some(
                self.set
                    .push(LabeledSensor::new(total.clone(), DataKind::Percent, "Load")),
            );
        }

        if !self.options.core_loads {
            return;
        }

        let max = by_index.keys().next_back().copied().unwrap_or(0);
        for index in 1..=max {
            if let Some(sensor) = by_index.get(&index) {
                let slot = self.set.push(LabeledSensor::new(
                    sensor.clone(),
                    DataKind::Percent,
                    format!("Core {}", index - 1),
                ));
                self.core_loads.insert(index - 1, slot);
            }
        }
    }

    fn temperature(&self, sensor: SensorHandle, label: impl Into<String>) -> LabeledSensor {
        LabeledSensor::temperature(sensor, label, self.options.fahrenheit)
            .with_alert(self.options.temp_alert)
    }

    fn init_temperatures(&mut self, ctx: &SearchContext<'_>) {
        let board_temperatures = ctx.all(&Tier::board_all(SensorQuery::of(SensorType::Temperature)));

        let aggregate_chip = ctx.board().is_some_and(|board| {
            board.sub_hardware().iter().any(|chip| {
                AGGREGATE_TEMPERATURE_CHIPS
                    .iter()
                    .any(|model| chip.name().contains(model))
            })
        });
        if aggregate_chip {
            if let Some(sensor) = board_temperatures.first() {
                debug!("{}: package temperature from aggregate board chip", self.name);
                let package = self.temperature(sensor.clone(), "Package");
                self.package_temperature = Some(self.set.push(package));
            }
            return;
        }

        let own = ctx.all(&Tier::own(SensorQuery::of(SensorType::Temperature)));
        match own.as_slice() {
            [] => {
                let board_cpu: Vec<&SensorHandle> = board_temperatures
                    .iter()
                    .filter(|s| s.name().contains("CPU"))
                    .collect();
                // several board-level CPU temperatures have no known per-core layout
                if let [sensor] = board_cpu.as_slice() {
                    let package = self.temperature((*sensor).clone(), "Package");
                    self.package_temperature = Some(self.set.push(package));
                }
            }
            [sensor] => {
                let package = self.temperature(sensor.clone(), "Package");
                self.package_temperature = Some(self.set.push(package));
            }
            sensors => {
                if let Some(package) = sensors.iter().find(|s| s.name().contains("Package")) {
                    let package = self.temperature(package.clone(), "Package");
                    self.package_temperature = Some(self.set.push(package));
                }
                for sensor in sensors.iter().filter(|s| !s.name().contains("Package")) {
                    let core = self.temperature(sensor.clone(), format!("Core {}", core_number(sensor)));
                    let slot = self.set.push(core);
                    self.temperatures.push(slot);
                }
            }
        }
    }

    fn init_fans(&mut self, ctx: &SearchContext<'_>) {
        let fan = ctx.select("fan", &fan_tiers(SensorType::Fan));
        if let Some(sensor) = fan {
            self.fan_rpm = Some(self.set.push(LabeledSensor::new(sensor, DataKind::Rpm, "Fan")));
        }

        let control = ctx.select("fan control", &fan_tiers(SensorType::Control));
        if let Some(sensor) = control {
            self.fan_percent = Some(self.set.push(LabeledSensor::new(sensor, DataKind::Percent, "Fan")));
        }
    }

    fn init_voltage(&mut self, ctx: &SearchContext<'_>) {
        let tiers = [
            Tier::board(SensorQuery::of(SensorType::Voltage).named("CPU")),
            Tier::board_sub(SensorQuery::of(SensorType::Voltage).named("CPU")),
            Tier::own(SensorQuery::of(SensorType::Voltage)),
        ];
        if let Some(sensor) = ctx.select("voltage", &tiers) {
            self.voltage = Some(self.set.push(LabeledSensor::new(sensor, DataKind::Voltage, "Voltage")));
        }
    }

    pub fn options(&self) -> &CpuOptions {
        &self.options
    }

    /// Per-core clocks in core order
    pub fn core_clocks(&self) -> Vec<&LabeledSensor> {
        self.set.collect(self.core_clocks.values())
    }

    /// Clock of one logical core, `None` for gaps in the index range
    pub fn core_clock(&self, core: u32) -> Option<&LabeledSensor> {
        self.set.get(self.core_clocks.get(&core).copied())
    }

    pub fn total_load(&self) -> Option<&LabeledSensor> {
        self.set.get(self.total_load)
    }

    /// Per-core loads in core order
    pub fn core_loads(&self) -> Vec<&LabeledSensor> {
        self.set.collect(self.core_loads.values())
    }

    pub fn core_load(&self, core: u32) -> Option<&LabeledSensor> {
        self.set.get(self.core_loads.get(&core).copied())
    }

    pub fn package_temperature(&self) -> Option<&LabeledSensor> {
        self.set.get(self.package_temperature)
    }

    /// Per-core temperatures, excluding the package
    pub fn temperatures(&self) -> Vec<&LabeledSensor> {
        self.set.collect(&self.temperatures)
    }

    pub fn fan_rpm(&self) -> Option<&LabeledSensor> {
        self.set.get(self.fan_rpm)
    }

    pub fn fan_percent(&self) -> Option<&LabeledSensor> {
        self.set.get(self.fan_percent)
    }

    pub fn voltage(&self) -> Option<&LabeledSensor> {
        self.set.get(self.voltage)
    }
}

/// CPU-named sensors on the board and its chips, then the CPU node, then any
/// sensor of the class on the board
fn fan_tiers(sensor_type: SensorType) -> [Tier; 4] {
    [
        Tier::board(SensorQuery::of(sensor_type).named("CPU")),
        Tier::board_sub(SensorQuery::of(sensor_type).named("CPU")),
        Tier::own(SensorQuery::of(sensor_type)),
        Tier::board_all(SensorQuery::of(sensor_type)),
    ]
}

/// Zero-based core number: "CPU Core #3" is core 2. Names without a "#N"
/// suffix use the raw index unchanged: temperature indices start at core 0,
/// unlike clocks and loads where index 0 is the bus clock or the total.
fn core_number(sensor: &SensorHandle) -> u32 {
    sensor
        .name()
        .rsplit_once('#')
        .and_then(|(_, n)| n.trim().parse::<u32>().ok())
        .and_then(|n| n.checked_sub(1))
        .unwrap_or_else(|| sensor.index())
}

impl Monitor for CpuMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Cpu
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
