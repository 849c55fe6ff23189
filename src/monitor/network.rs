//! Network monitor
//!
//! Network adapters and network-interface counter instances are enumerated
//! independently, so they are correlated by name: both sides are reduced to
//! ASCII letters and compared exactly. Adapters or instances without a
//! partner are dropped.

use super::Monitor;
use crate::config::{ConfigParam, MonitorType, ParamKey, ParamsExt};
use crate::counters::{
    CounterHandle, CounterSource, NetworkInterface, OsSources, BYTES_RECEIVED_PER_SEC,
    BYTES_SENT_PER_SEC, NETWORK_INTERFACE,
};
use crate::error::Result;
use crate::sensor::SensorReading;
use crate::units;
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOptions {
    /// Inbound alert threshold in the displayed base unit (kbps or kB/s); 0 disables
    pub in_alert: f64,
    pub out_alert: f64,
    /// Show kB/s instead of kbps
    pub use_bytes: bool,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            in_alert: 0.0,
            out_alert: 0.0,
            use_bytes: false,
        }
    }
}

impl NetworkOptions {
    pub fn from_params(params: &[ConfigParam]) -> Self {
        Self {
            in_alert: params.get_int(ParamKey::BandwidthInAlert) as f64,
            out_alert: params.get_int(ParamKey::BandwidthOutAlert) as f64,
            use_bytes: params.get_bool(ParamKey::UseBytes),
        }
    }
}

/// One direction of traffic on one adapter
#[derive(Debug)]
pub struct Bandwidth {
    label: &'static str,
    counter: CounterHandle,
    use_bytes: bool,
    alert_threshold: f64,
    value: Option<f64>,
    is_alert: bool,
}

impl Bandwidth {
    fn new(label: &'static str, counter: CounterHandle, use_bytes: bool, alert_threshold: f64) -> Self {
        Self {
            label,
            counter,
            use_bytes,
            alert_threshold,
            value: None,
            is_alert: false,
        }
    }

    /// Sample bytes/s and scale to kbps (÷128) or kB/s (÷1024); an unreadable
    /// counter leaves no value
    pub fn update(&mut self) {
        let divisor = if self.use_bytes { 1024.0 } else { 128.0 };
        self.value = self.counter.sample().map(|v| v as f64 / divisor);
        self.is_alert = match self.value {
            Some(v) => self.alert_threshold > 0.0 && v >= self.alert_threshold,
            None => false,
        };
    }

    pub fn label(&self) -> &str {
        self.label
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_alert(&self) -> bool {
        self.is_alert
    }

    pub fn text(&self) -> String {
        units::format_rate(self.label, self.value, self.use_bytes)
    }

    pub fn close(&mut self) {
        self.counter.close();
    }
}

/// A network adapter joined with its counter instance
#[derive(Debug)]
pub struct NicInfo {
    instance: String,
    name: String,
    physical_address: String,
    in_bandwidth: Bandwidth,
    out_bandwidth: Bandwidth,
}

impl NicInfo {
    pub fn open(
        source: &dyn CounterSource,
        instance: &str,
        nic: &NetworkInterface,
        options: &NetworkOptions,
    ) -> Result<Self> {
        let received = CounterHandle::open(source, NETWORK_INTERFACE, BYTES_RECEIVED_PER_SEC, instance)?;
        let sent = CounterHandle::open(source, NETWORK_INTERFACE, BYTES_SENT_PER_SEC, instance)?;
        Ok(Self {
            instance: instance.to_string(),
            name: nic.description.clone(),
            physical_address: nic.formatted_address(),
            in_bandwidth: Bandwidth::new("In", received, options.use_bytes, options.in_alert),
            out_bandwidth: Bandwidth::new("Out", sent, options.use_bytes, options.out_alert),
        })
    }

    /// Sample both directions; skipped while the instance is missing
    pub fn update(&mut self, source: &dyn CounterSource) -> Result<()> {
        if !source.instance_exists(&self.instance, NETWORK_INTERFACE)? {
            debug!("Network instance {} is gone, skipping update", self.instance);
            return Ok(());
        }
        self.in_bandwidth.update();
        self.out_bandwidth.update();
        Ok(())
    }

    pub fn close(&mut self) {
        self.in_bandwidth.close();
        self.out_bandwidth.close();
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// MAC address as "XX:XX:XX:XX:XX:XX"
    pub fn physical_address(&self) -> &str {
        &self.physical_address
    }

    pub fn in_bandwidth(&self) -> &Bandwidth {
        &self.in_bandwidth
    }

    pub fn out_bandwidth(&self) -> &Bandwidth {
        &self.out_bandwidth
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        [&self.in_bandwidth, &self.out_bandwidth]
            .into_iter()
            .map(|b| {
                let mut reading =
                    SensorReading::rate(b.label, b.value, b.use_bytes, b.is_alert);
                reading.label = format!("{} {}", self.name, b.label);
                reading
            })
            .collect()
    }
}

/// Keep ASCII letters only
fn normalize(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphabetic()).collect()
}

/// Pair counter instances with adapters. Each instance takes the first unused
/// adapter whose description matches it exactly, else the first unused one
/// whose normalized description matches; each adapter is used at most once.
pub fn join<'a>(
    instances: &[String],
    nics: &'a [NetworkInterface],
) -> Vec<(String, &'a NetworkInterface)> {
    let mut used = vec![false; nics.len()];
    let mut pairs = Vec::new();

    for instance in instances {
        let key = normalize(instance);
        let exact = (0..nics.len()).find(|&i| !used[i] && nics[i].description == *instance);
        let partner = exact
            .or_else(|| (0..nics.len()).find(|&i| !used[i] && normalize(&nics[i].description) == key));

        match partner {
            Some(i) => {
                used[i] = true;
                pairs.push((instance.clone(), &nics[i]));
            }
            None => debug!("No network adapter matches counter instance '{}'", instance),
        }
    }
    pairs
}

pub struct NetworkMonitor {
    options: NetworkOptions,
    source: Arc<dyn CounterSource>,
    nics: Vec<NicInfo>,
}

impl NetworkMonitor {
    pub fn new(sources: &OsSources, options: NetworkOptions) -> Result<Self> {
        let instances = sources.counters.instance_names(NETWORK_INTERFACE)?;
        let nics: Vec<NetworkInterface> = sources
            .interfaces
            .interfaces()?
            .into_iter()
            .filter(NetworkInterface::is_monitorable)
            .collect();

        let joined: Vec<NicInfo> = join(&instances, &nics)
            .into_iter()
            .filter_map(|(instance, nic)| {
                match NicInfo::open(sources.counters.as_ref(), &instance, nic, &options) {
                    Ok(info) => Some(info),
                    Err(e) => {
                        debug!("Skipping network instance {}: {}", instance, e);
                        None
                    }
                }
            })
            .collect();
        debug!(
            "Network monitor: {} of {} adapters matched {} counter instances",
            joined.len(),
            nics.len(),
            instances.len()
        );

        Ok(Self {
            options,
            source: sources.counters.clone(),
            nics: joined,
        })
    }

    pub fn nics(&self) -> &[NicInfo] {
        &self.nics
    }

    pub fn options(&self) -> &NetworkOptions {
        &self.options
    }
}

impl Monitor for NetworkMonitor {
    fn name(&self) -> &str {
        "Network"
    }

    fn monitor_type(&self) -> MonitorType {
        MonitorType::Network
    }

    fn show_name(&self) -> bool {
        true
    }

    fn refresh(&mut self) -> Result<()> {
        for nic in &mut self.nics {
            nic.update(self.source.as_ref())?;
        }
        Ok(())
    }

    fn readings(&self) -> Vec<SensorReading> {
        self.nics.iter().flat_map(NicInfo::readings).collect()
    }

    fn dispose(&mut self) {
        for nic in &mut self.nics {
            nic.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::virt::{VirtualCounters, VirtualInterfaces};
    use crate::counters::{InterfaceType, OperationalStatus};

    fn nic(description: &str, interface_type: InterfaceType) -> NetworkInterface {
        NetworkInterface {
            name: description.to_string(),
            description: description.to_string(),
            status: OperationalStatus::Up,
            interface_type,
            physical_address: vec![0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e],
        }
    }

    fn sources(counters: &VirtualCounters, nics: Vec<NetworkInterface>) -> OsSources {
        OsSources::new(Arc::new(counters.clone()), Arc::new(VirtualInterfaces::new(nics)))
    }

    #[test]
    fn test_colliding_names_yield_one_nic() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "Ethernet");
        let nics = vec![
            nic("Ethernet", InterfaceType::Ethernet),
            nic("Ethernet 2", InterfaceType::Ethernet),
        ];

        let monitor = NetworkMonitor::new(&sources(&counters, nics), NetworkOptions::default()).unwrap();
        assert_eq!(monitor.nics().len(), 1);
        assert_eq!(monitor.nics()[0].name(), "Ethernet");
        assert_eq!(monitor.nics()[0].physical_address(), "00:1A:2B:3C:4D:5E");
    }

    #[test]
    fn test_join_strips_non_letters() {
        let instances = vec!["Intel[R] Ethernet Connection I219-V".to_string()];
        let nics = vec![nic("Intel(R) Ethernet Connection I219-V", InterfaceType::Ethernet)];
        let pairs = join(&instances, &nics);
        assert_eq!(pairs.len(), 1);

        // comparison is case-sensitive
        let instances = vec!["intel ethernet".to_string()];
        let nics = vec![nic("Intel Ethernet", InterfaceType::Ethernet)];
        assert!(join(&instances, &nics).is_empty());
    }

    #[test]
    fn test_join_prefers_exact_description() {
        let instances = vec!["eth1".to_string(), "eth0".to_string()];
        let nics = vec![
            nic("eth0", InterfaceType::Ethernet),
            nic("eth1", InterfaceType::Ethernet),
        ];
        let pairs = join(&instances, &nics);
        assert_eq!(pairs[0].1.description, "eth1");
        assert_eq!(pairs[1].1.description, "eth0");
    }

    #[test]
    fn test_loopback_and_down_adapters_excluded() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "lo");
        counters.add_instance(NETWORK_INTERFACE, "wlan");
        let mut down = nic("wlan", InterfaceType::Wireless80211);
        down.status = OperationalStatus::Down;

        let nics = vec![nic("lo", InterfaceType::Loopback), down];
        let monitor = NetworkMonitor::new(&sources(&counters, nics), NetworkOptions::default()).unwrap();
        assert!(monitor.nics().is_empty());
    }

    #[test]
    fn test_bandwidth_units_and_alerts() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "Ethernet");
        // 256 kB/s in = 2048 kbps
        counters.set_value(NETWORK_INTERFACE, BYTES_RECEIVED_PER_SEC, "Ethernet", 262_144.0);
        counters.set_value(NETWORK_INTERFACE, BYTES_SENT_PER_SEC, "Ethernet", 12_800.0);
        let nics = vec![nic("Ethernet", InterfaceType::Ethernet)];
        let options = NetworkOptions {
            in_alert: 1000.0,
            ..NetworkOptions::default()
        };

        let mut monitor = NetworkMonitor::new(&sources(&counters, nics.clone()), options).unwrap();
        monitor.refresh().unwrap();
        let nic0 = &monitor.nics()[0];
        assert_eq!(nic0.in_bandwidth().text(), "In: 2 Mbps");
        assert!(nic0.in_bandwidth().is_alert());
        assert_eq!(nic0.out_bandwidth().text(), "Out: 100 kbps");
        assert!(!nic0.out_bandwidth().is_alert());

        let options = NetworkOptions {
            use_bytes: true,
            ..NetworkOptions::default()
        };
        let mut monitor = NetworkMonitor::new(&sources(&counters, nics), options).unwrap();
        monitor.refresh().unwrap();
        assert_eq!(monitor.nics()[0].in_bandwidth().text(), "In: 256 kB/s");
    }

    #[test]
    fn test_vanished_instance_skips_update() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "Ethernet");
        counters.set_value(NETWORK_INTERFACE, BYTES_SENT_PER_SEC, "Ethernet", 1280.0);
        let nics = vec![nic("Ethernet", InterfaceType::Ethernet)];
        let mut monitor = NetworkMonitor::new(&sources(&counters, nics), NetworkOptions::default()).unwrap();
        monitor.refresh().unwrap();

        counters.remove_instance(NETWORK_INTERFACE, "Ethernet");
        counters.set_value(NETWORK_INTERFACE, BYTES_SENT_PER_SEC, "Ethernet", 0.0);
        monitor.refresh().unwrap();
        assert_eq!(monitor.nics()[0].out_bandwidth().value(), Some(10.0));

        monitor.dispose();
        monitor.dispose();
        assert_eq!(counters.open_count(), 0);
    }

    #[test]
    fn test_unopenable_adapter_is_skipped() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "eth0");
        counters.add_instance(NETWORK_INTERFACE, "eth1");
        counters.refuse_instance(NETWORK_INTERFACE, "eth0");
        counters.set_value(NETWORK_INTERFACE, BYTES_RECEIVED_PER_SEC, "eth1", 1280.0);
        let nics = vec![
            nic("eth0", InterfaceType::Ethernet),
            nic("eth1", InterfaceType::Ethernet),
        ];

        let mut monitor =
            NetworkMonitor::new(&sources(&counters, nics), NetworkOptions::default()).unwrap();
        assert_eq!(monitor.nics().len(), 1);
        assert_eq!(monitor.nics()[0].instance(), "eth1");
        assert_eq!(counters.open_count(), 2);

        monitor.refresh().unwrap();
        assert_eq!(monitor.nics()[0].in_bandwidth().value(), Some(10.0));
    }

    #[test]
    fn test_unreadable_adapter_does_not_stop_others() {
        let counters = VirtualCounters::new();
        counters.add_instance(NETWORK_INTERFACE, "eth0");
        counters.add_instance(NETWORK_INTERFACE, "eth1");
        counters.break_instance(NETWORK_INTERFACE, "eth0");
        counters.set_value(NETWORK_INTERFACE, BYTES_SENT_PER_SEC, "eth1", 2560.0);
        let nics = vec![
            nic("eth0", InterfaceType::Ethernet),
            nic("eth1", InterfaceType::Ethernet),
        ];
        let options = NetworkOptions {
            in_alert: 1.0,
            ..NetworkOptions::default()
        };

        let mut monitor = NetworkMonitor::new(&sources(&counters, nics), options).unwrap();
        monitor.refresh().unwrap();

        let broken = &monitor.nics()[0];
        assert_eq!(broken.in_bandwidth().value(), None);
        assert!(!broken.in_bandwidth().is_alert());
        assert_eq!(broken.out_bandwidth().text(), "Out: No Value");
        assert_eq!(monitor.nics()[1].out_bandwidth().value(), Some(20.0));
    }
}
