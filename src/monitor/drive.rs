//! Physical drive monitor
//!
//! Temperature, remaining life and lifetime data come from the storage node.
//! Read and write throughput come from the logical-disk performance counters
//! of the first volume hosted on the drive.

use super::{Monitor, SensorSet};
use crate::config::{ConfigParam, MonitorType, ParamKey, ParamsExt};
use crate::counters::{
    CounterHandle, CounterSource, DISK_READ_BYTES_PER_SEC, DISK_WRITE_BYTES_PER_SEC, LOGICAL_DISK,
};
use crate::error::Result;
use crate::hardware::{HardwareHandle, SensorType};
use crate::select::{SearchContext, SensorQuery, Tier};
use crate::sensor::{LabeledSensor, SensorReading};
use crate::units::DataKind;
use log::debug;
use std::sync::Arc;

/// Settings shared by the physical and logical drive monitors
#[derive(Debug, Clone, PartialEq)]
pub struct DriveOptions {
    pub show_name: bool,
    pub fahrenheit: bool,
    /// Show used/free/throughput details per logical disk
    pub details: bool,
    /// Used-space percentage that raises an alert; 0 disables
    pub used_space_alert: f64,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            show_name: true,
            fahrenheit: false,
            details: false,
            used_space_alert: 0.0,
        }
    }
}

impl DriveOptions {
    pub fn from_params(params: &[ConfigParam]) -> Self {
        Self {
            show_name: params.get_bool(ParamKey::HardwareNames),
            fahrenheit: params.get_bool(ParamKey::UseFahrenheit),
            details: params.get_bool(ParamKey::DriveDetails),
            used_space_alert: params.get_int(ParamKey::UsedSpaceAlert) as f64,
        }
    }
}

pub struct DriveMonitor {
    name: String,
    options: DriveOptions,
    set: SensorSet,
    temperature: Option<usize>,
    remaining_life: Option<usize>,
    lifecycle_data: Vec<usize>,
    logical_name: Option<String>,
    counters: Arc<dyn CounterSource>,
    read_counter: Option<CounterHandle>,
    write_counter: Option<CounterHandle>,
    read_rate: Option<f64>,
    write_rate: Option<f64>,
}

impl DriveMonitor {
    pub fn new(
        hardware: HardwareHandle,
        counters: Arc<dyn CounterSource>,
        options: DriveOptions,
    ) -> Result<Self> {
        let mut set = SensorSet::new(hardware.clone());
        set.update_hardware()?;

        let ctx = SearchContext::new(hardware.as_ref(), None);
        let temperature = ctx
            .select("temperature", &[Tier::own(SensorQuery::of(SensorType::Temperature))])
            .map(|s| set.push(LabeledSensor::temperature(s, "Temp", options.fahrenheit)));
        let remaining_life = ctx
            .select(
                "remaining life",
                &[Tier::own(SensorQuery::of(SensorType::Level).exactly("Remaining Life"))],
            )
            .map(|s| set.push(LabeledSensor::new(s, DataKind::Percent, "Remaining life")));
        let lifecycle_data: Vec<usize> = ctx
            .all(&Tier::own(SensorQuery::of(SensorType::Data)))
            .into_iter()
            .map(|s| {
                let label = s.name().to_string();
                set.push(LabeledSensor::new(s, DataKind::Gigabyte, label))
            })
            .collect();

        let logical_name = hardware.volumes().into_iter().next();
        let (read_counter, write_counter) = match &logical_name {
            Some(volume) => (
                open_rate(counters.as_ref(), DISK_READ_BYTES_PER_SEC, volume),
                open_rate(counters.as_ref(), DISK_WRITE_BYTES_PER_SEC, volume),
            ),
            None => (None, None),
        };

        Ok(Self {
            name: hardware.name().to_string(),
            options,
            set,
            temperature,
            remaining_life,
            lifecycle_data,
            logical_name,
            counters,
            read_counter,
            write_counter,
            read_rate: None,
            write_rate: None,
        })
    }

    /// Volume instance the throughput counters are keyed by
    pub fn logical_name(&self) -> Option<&str> {
        self.logical_name.as_deref()
    }

    pub fn temperature(&self) -> Option<&LabeledSensor> {
        self.set.get(self.temperature)
    }

    pub fn remaining_life(&self) -> Option<&LabeledSensor> {
        self.set.get(self.remaining_life)
    }

    /// Lifetime counters (host reads/writes in GB), labeled by raw name
    pub fn lifecycle_data(&self) -> Vec<&LabeledSensor> {
        self.set.collect(&self.lifecycle_data)
    }

    /// Read throughput in kB/s
    pub fn read_rate(&self) -> Option<f64> {
        self.read_rate
    }

    /// Write throughput in kB/s
    pub fn write_rate(&self) -> Option<f64> {
        self.write_rate
    }

    /// Sample each throughput counter on its own; an unreadable one reports
    /// no value without failing the drive
    fn update_rates(&mut self) -> Result<()> {
        let Some(volume) = self.logical_name.as_deref() else {
            return Ok(());
        };
        if self.read_counter.is_none() && self.write_counter.is_none() {
            return Ok(());
        }
        if !self.counters.instance_exists(volume, LOGICAL_DISK)? {
            debug!("{}: volume {} is gone, keeping last rates", self.name, volume);
            return Ok(());
        }
        if let Some(read) = self.read_counter.as_mut() {
            self.read_rate = read.sample().map(|v| v as f64 / 1024.0);
        }
        if let Some(write) = self.write_counter.as_mut() {
            self.write_rate = write.sample().map(|v| v as f64 / 1024.0);
        }
        Ok(())
    }
}

pub(super) fn open_rate(source: &dyn CounterSource, counter: &str, volume: &str) -> Option<CounterHandle> {
    match CounterHandle::open(source, LOGICAL_DISK, counter, volume) {
        Ok(handle) => Some(handle),
        Err(e) => {
            debug!("No {} counter for volume {}: {}", counter, volume, e);
            None
        }
    }
}

impl Monitor for DriveMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Hd
    }

    fn show_name(&self) -> bool {
        self.options.show_name
    }

    fn refresh(&mut self) -> Result<()> {
        self.set.refresh()?;
        self.update_rates()
    }

    fn sensors(&self) -> &[LabeledSensor] {
        self.set.sensors()
    }

    fn readings(&self) -> Vec<SensorReading> {
        let mut readings: Vec<SensorReading> =
            self.set.sensors().iter().map(LabeledSensor::reading).collect();
        let has_rates = self.read_counter.is_some() || self.write_counter.is_some();
        if has_rates || self.read_rate.is_some() || self.write_rate.is_some() {
            readings.push(SensorReading::rate("Read", self.read_rate, true, false));
            readings.push(SensorReading::rate("Write", self.write_rate, true, false));
        }
        readings
    }

    fn dispose(&mut self) {
        for counter in [&mut self.read_counter, &mut self.write_counter]
            .into_iter()
            .flatten()
        {
            counter.close();
        }
    }
}
