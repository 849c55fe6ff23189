//! Logical disk monitor
//!
//! One [`DriveInfo`] per logical-disk counter instance, reporting used space
//! derived from the "Free Megabytes" and "% Free Space" counters.

use super::drive::{open_rate, DriveOptions};
use super::Monitor;
use crate::config::MonitorType;
use crate::counters::{
    CounterHandle, CounterSource, DISK_READ_BYTES_PER_SEC, DISK_WRITE_BYTES_PER_SEC,
    FREE_MEGABYTES, LOGICAL_DISK, PERCENT_FREE_SPACE,
};
use crate::error::Result;
use crate::sensor::SensorReading;
use crate::units;
use log::debug;
use std::sync::Arc;

/// Space and throughput of one logical disk
#[derive(Debug)]
pub struct DriveInfo {
    instance: String,
    label: String,
    show_details: bool,
    used_space_alert: f64,
    free_mb: CounterHandle,
    free_percent: CounterHandle,
    read: Option<CounterHandle>,
    write: Option<CounterHandle>,
    used_percent: Option<f64>,
    used_gb: Option<f64>,
    free_gb: Option<f64>,
    read_rate: Option<f64>,
    write_rate: Option<f64>,
    is_alert: bool,
}

impl DriveInfo {
    pub fn open(
        source: &dyn CounterSource,
        instance: &str,
        show_details: bool,
        used_space_alert: f64,
    ) -> Result<Self> {
        let free_mb = CounterHandle::open(source, LOGICAL_DISK, FREE_MEGABYTES, instance)?;
        let free_percent = CounterHandle::open(source, LOGICAL_DISK, PERCENT_FREE_SPACE, instance)?;
        let (read, write) = if show_details {
            (
                open_rate(source, DISK_READ_BYTES_PER_SEC, instance),
                open_rate(source, DISK_WRITE_BYTES_PER_SEC, instance),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            instance: instance.to_string(),
            label: instance.to_string(),
            show_details,
            used_space_alert,
            free_mb,
            free_percent,
            read,
            write,
            used_percent: None,
            used_gb: None,
            free_gb: None,
            read_rate: None,
            write_rate: None,
            is_alert: false,
        })
    }

    /// Re-read the counters; a vanished instance keeps its last values and
    /// an unreadable counter reports no value
    pub fn update(&mut self, source: &dyn CounterSource) -> Result<()> {
        if !source.instance_exists(&self.instance, LOGICAL_DISK)? {
            debug!("Logical disk {} is gone, skipping update", self.instance);
            return Ok(());
        }

        let free_gb = self.free_mb.sample().map(|mb| mb as f64 / 1024.0);
        let free_percent = self.free_percent.sample().map(f64::from);

        self.used_percent = free_percent.map(|p| 100.0 - p);
        self.free_gb = free_gb;
        self.used_gb = match (free_gb, free_percent) {
            (Some(free), Some(percent)) if percent > 0.0 => Some(free / (percent / 100.0) - free),
            _ => None,
        };
        self.is_alert = match self.used_percent {
            Some(used) => self.used_space_alert > 0.0 && used >= self.used_space_alert,
            None => false,
        };

        if let Some(read) = self.read.as_mut() {
            self.read_rate = read.sample().map(|v| v as f64 / 1024.0);
        }
        if let Some(write) = self.write.as_mut() {
            self.write_rate = write.sample().map(|v| v as f64 / 1024.0);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.free_mb.close();
        self.free_percent.close();
        for counter in [&mut self.read, &mut self.write].into_iter().flatten() {
            counter.close();
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Used space in percent
    pub fn value(&self) -> Option<f64> {
        self.used_percent
    }

    pub fn is_alert(&self) -> bool {
        self.is_alert
    }

    pub fn show_details(&self) -> bool {
        self.show_details
    }

    pub fn used_gb(&self) -> Option<f64> {
        self.used_gb
    }

    pub fn free_gb(&self) -> Option<f64> {
        self.free_gb
    }

    pub fn read_rate(&self) -> Option<f64> {
        self.read_rate
    }

    pub fn write_rate(&self) -> Option<f64> {
        self.write_rate
    }

    pub fn text(&self) -> String {
        units::format_labeled(&self.label, self.used_percent, "%")
    }

    /// "Load: x%"; only with details
    pub fn load_text(&self) -> Option<String> {
        self.show_details
            .then(|| units::format_labeled("Load", self.used_percent, "%"))
    }

    pub fn used_text(&self) -> Option<String> {
        self.show_details
            .then(|| units::format_labeled("Used", self.used_gb, " GB"))
    }

    pub fn free_text(&self) -> Option<String> {
        self.show_details
            .then(|| units::format_labeled("Free", self.free_gb, " GB"))
    }

    pub fn read_text(&self) -> Option<String> {
        self.show_details
            .then(|| units::format_rate("Read", self.read_rate, true))
    }

    pub fn write_text(&self) -> Option<String> {
        self.show_details
            .then(|| units::format_rate("Write", self.write_rate, true))
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        let mut readings = vec![SensorReading {
            label: self.label.clone(),
            kind: None,
            value: self.used_percent,
            text: self.text(),
            is_alert: self.is_alert,
        }];
        if self.show_details {
            for (label, value, suffix) in [
                ("Used", self.used_gb, " GB"),
                ("Free", self.free_gb, " GB"),
            ] {
                readings.push(SensorReading {
                    label: format!("{} {}", self.label, label),
                    kind: None,
                    value,
                    text: units::format_labeled(label, value, suffix),
                    is_alert: false,
                });
            }
            readings.push(SensorReading::rate(
                format!("{} Read", self.label),
                self.read_rate,
                true,
                false,
            ));
            readings.push(SensorReading::rate(
                format!("{} Write", self.label),
                self.write_rate,
                true,
                false,
            ));
        }
        readings
    }
}

pub struct DriveInfoMonitor {
    options: DriveOptions,
    source: Arc<dyn CounterSource>,
    drives: Vec<DriveInfo>,
}

impl DriveInfoMonitor {
    /// Enumerate logical disks; aggregate instances ("_Total") are skipped
    pub fn new(source: Arc<dyn CounterSource>, options: DriveOptions) -> Result<Self> {
        let mut instances: Vec<String> = source
            .instance_names(LOGICAL_DISK)?
            .into_iter()
            .filter(|name| !name.starts_with('_'))
            .collect();
        instances.sort();

        let drives: Vec<DriveInfo> = instances
            .iter()
            .filter_map(|instance| {
                match DriveInfo::open(
                    source.as_ref(),
                    instance,
                    options.details,
                    options.used_space_alert,
                ) {
                    Ok(drive) => Some(drive),
                    Err(e) => {
                        debug!("Skipping logical disk {}: {}", instance, e);
                        None
                    }
                }
            })
            .collect();
        debug!("Logical disk monitor: {} of {} volumes", drives.len(), instances.len());

        Ok(Self {
            options,
            source,
            drives,
        })
    }

    pub fn drives(&self) -> &[DriveInfo] {
        &self.drives
    }
}

impl Monitor for DriveInfoMonitor {
    fn name(&self) -> &str {
        "Logical Disks"
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Hd
    }

    fn show_name(&self) -> bool {
        self.options.show_name
    }

    fn refresh(&mut self) -> Result<()> {
        for drive in &mut self.drives {
            drive.update(self.source.as_ref())?;
        }
        Ok(())
    }

    fn readings(&self) -> Vec<SensorReading> {
        self.drives.iter().flat_map(DriveInfo::readings).collect()
    }

    fn dispose(&mut self) {
        for drive in &mut self.drives {
            drive.close();
        }
    }
}
