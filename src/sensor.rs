//! Labeled sensors
//!
//! A [`LabeledSensor`] wraps exactly one raw sensor handle with the semantic
//! kind, display label, rounding policy and alert threshold chosen by the
//! monitor that selected it. `update()` re-reads the raw value; `text()`
//! renders the last value without side effects.

use crate::hardware::{SensorHandle, SensorType};
use crate::units::{self, DataKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value conversion applied after reading the raw sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conversion {
    CelsiusToFahrenheit,
}

impl Conversion {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Conversion::CelsiusToFahrenheit => units::celsius_to_fahrenheit(value),
        }
    }
}

/// One raw sensor with its presentation attributes and last reading
pub struct LabeledSensor {
    sensor: SensorHandle,
    kind: DataKind,
    label: String,
    round: bool,
    alert_threshold: f64,
    conversion: Option<Conversion>,
    value: Option<f64>,
    is_alert: bool,
}

impl LabeledSensor {
    pub fn new(sensor: SensorHandle, kind: DataKind, label: impl Into<String>) -> Self {
        Self {
            sensor,
            kind,
            label: label.into(),
            round: false,
            alert_threshold: 0.0,
            conversion: None,
            value: None,
            is_alert: false,
        }
    }

    /// Temperature sensor shown in Celsius, or in Fahrenheit with conversion
    pub fn temperature(sensor: SensorHandle, label: impl Into<String>, fahrenheit: bool) -> Self {
        if fahrenheit {
            Self::new(sensor, DataKind::Fahrenheit, label)
                .with_conversion(Conversion::CelsiusToFahrenheit)
        } else {
            Self::new(sensor, DataKind::Celsius, label)
        }
    }

    /// Display whole numbers only
    pub fn rounded(mut self) -> Self {
        self.round = true;
        self
    }

    /// Alert when the value reaches `threshold`; 0 disables
    pub fn with_alert(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = Some(conversion);
        self
    }

    /// Re-read the raw value, convert, round and recompute the alert flag
    pub fn update(&mut self) {
        self.value = self.sensor.value().map(|raw| {
            let mut value = raw as f64;
            if let Some(conversion) = self.conversion {
                value = conversion.apply(value);
            }
            if self.round {
                value = value.round();
            }
            value
        });

        self.is_alert = match self.value {
            Some(value) => self.alert_threshold > 0.0 && value >= self.alert_threshold,
            None => false,
        };
    }

    /// `"{label}: {value}{suffix}"` or `"{label}: No Value"`
    pub fn text(&self) -> String {
        units::format_labeled(&self.label, self.value, self.kind.suffix())
    }

    /// Last value; `None` when the raw sensor had no data
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_alert(&self) -> bool {
        self.is_alert
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn suffix(&self) -> &'static str {
        self.kind.suffix()
    }

    pub fn round(&self) -> bool {
        self.round
    }

    pub fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    /// Raw name of the wrapped sensor
    pub fn raw_name(&self) -> &str {
        self.sensor.name()
    }

    pub fn raw_index(&self) -> u32 {
        self.sensor.index()
    }

    pub fn raw_type(&self) -> SensorType {
        self.sensor.sensor_type()
    }

    /// Serializable view of the current state
    pub fn reading(&self) -> SensorReading {
        SensorReading {
            label: self.label.clone(),
            kind: Some(self.kind),
            value: self.value,
            text: self.text(),
            is_alert: self.is_alert,
        }
    }
}

impl fmt::Debug for LabeledSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledSensor")
            .field("label", &self.label)
            .field("raw", &self.sensor.name())
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("is_alert", &self.is_alert)
            .finish()
    }
}

/// Point-in-time reading handed to presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub label: String,
    /// `None` for readings without a sensor kind (bandwidth, drive usage)
    pub kind: Option<DataKind>,
    pub value: Option<f64>,
    pub text: String,
    pub is_alert: bool,
}

impl SensorReading {
    /// Reading that only carries text
    pub fn text_only(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: None,
            value: None,
            text: text.into(),
            is_alert: false,
        }
    }

    /// Throughput reading in kilo-units per second, rendered after minification
    pub fn rate(label: impl Into<String>, value: Option<f64>, is_bytes: bool, is_alert: bool) -> Self {
        let label = label.into();
        Self {
            text: units::format_rate(&label, value, is_bytes),
            label,
            kind: None,
            value,
            is_alert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::virt::VirtualSensor;
    use std::sync::Arc;

    fn raw(sensor_type: SensorType, value: Option<f32>) -> Arc<VirtualSensor> {
        Arc::new(VirtualSensor::new(sensor_type, 0, "raw", value))
    }

    #[test]
    fn test_alert_threshold_is_inclusive_without_hysteresis() {
        let sensor = raw(SensorType::Temperature, None);
        let mut labeled = LabeledSensor::temperature(sensor.clone(), "Package", false).with_alert(80.0);

        let mut alerts = Vec::new();
        for sample in [79.0, 80.0, 81.0, 79.0] {
            sensor.set_value(Some(sample));
            labeled.update();
            alerts.push(labeled.is_alert());
        }
        assert_eq!(alerts, vec![false, true, true, false]);
    }

    #[test]
    fn test_zero_threshold_never_alerts() {
        let sensor = raw(SensorType::Load, Some(100.0));
        let mut labeled = LabeledSensor::new(sensor, DataKind::Percent, "Load");
        labeled.update();
        assert!(!labeled.is_alert());
    }

    #[test]
    fn test_missing_value_renders_no_value() {
        let sensor = raw(SensorType::Temperature, Some(90.0));
        let mut labeled = LabeledSensor::temperature(sensor.clone(), "Temp", false).with_alert(50.0);
        labeled.update();
        assert!(labeled.is_alert());

        sensor.set_value(None);
        labeled.update();
        assert_eq!(labeled.value(), None);
        assert!(!labeled.is_alert());
        assert_eq!(labeled.text(), "Temp: No Value");
    }

    #[test]
    fn test_fahrenheit_conversion_and_rounding() {
        let sensor = raw(SensorType::Temperature, Some(37.5));
        let mut labeled = LabeledSensor::temperature(sensor, "Package", true).rounded();
        labeled.update();
        // 37.5 C = 99.5 F, rounded half away from zero
        assert_eq!(labeled.value(), Some(100.0));
        assert_eq!(labeled.kind(), DataKind::Fahrenheit);
        assert_eq!(labeled.text(), "Package: 100 F");
    }

    #[test]
    fn test_clock_text() {
        let sensor = raw(SensorType::Clock, Some(3591.4));
        let mut labeled = LabeledSensor::new(sensor, DataKind::Clock, "Core 0").rounded();
        labeled.update();
        assert_eq!(labeled.text(), "Core 0: 3,591 MHz");

        let reading = labeled.reading();
        assert_eq!(reading.value, Some(3591.0));
        assert_eq!(reading.kind, Some(DataKind::Clock));
    }

    #[test]
    fn test_update_is_idempotent() {
        let sensor = raw(SensorType::Voltage, Some(1.248));
        let mut labeled = LabeledSensor::new(sensor, DataKind::Voltage, "Voltage").with_alert(1.2);
        labeled.update();
        let first = (labeled.value(), labeled.is_alert());
        labeled.update();
        assert_eq!(first, (labeled.value(), labeled.is_alert()));
    }
}
