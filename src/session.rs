//! Telemetry session
//!
//! Ties a hardware enumeration context to a [`MonitorManager`]: opening the
//! session opens the computer and builds the monitors, closing it disposes the
//! monitors and then closes the computer.

use crate::config::Settings;
use crate::counters::OsSources;
use crate::error::{Error, Result};
use crate::hardware::Computer;
use crate::manager::{MonitorManager, Snapshot};
use log::{debug, info};
use std::time::Duration;

pub struct TelemetrySession {
    computer: Box<dyn Computer>,
    manager: MonitorManager,
    settings: Settings,
    closed: bool,
}

impl TelemetrySession {
    /// Open `computer` and build a manager over its hardware
    pub fn open(mut computer: Box<dyn Computer>, sources: OsSources, settings: Settings) -> Result<Self> {
        computer.open()?;
        let hardware = computer.hardware();
        info!("Hardware session open: {} top-level nodes", hardware.len());

        let manager = MonitorManager::new(hardware, sources, settings.monitors.clone());
        Ok(Self {
            computer,
            manager,
            settings,
            closed: false,
        })
    }

    /// Session over the platform's native backends
    pub fn open_default(settings: Settings) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let computer = crate::hardware::linux::LinuxComputer::new();
            Self::open(Box::new(computer), OsSources::linux(), settings)
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = settings;
            Err(Error::UnsupportedPlatform(std::env::consts::OS.to_string()))
        }
    }

    /// Run one refresh tick
    pub fn update(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Other("session is closed".to_string()));
        }
        self.manager.update();
        Ok(())
    }

    pub fn manager(&self) -> &MonitorManager {
        &self.manager
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Polling cadence from the settings
    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.settings.update_interval_ms))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.manager.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Dispose the monitors, then close the computer; later calls do nothing
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.manager.dispose();
        self.computer.close();
        self.closed = true;
        debug!("Telemetry session closed");
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, MonitorType};
    use crate::counters::virt::{VirtualCounters, VirtualInterfaces};
    use crate::counters::LOGICAL_DISK;
    use crate::hardware::virt::{VirtualComputer, VirtualHardware, VirtualSensor};
    use crate::hardware::{Hardware, HardwareHandle, HardwareType, SensorType};
    use crate::monitor::Monitor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Computer that reports whether it is still open through a shared flag
    struct TrackedComputer {
        inner: VirtualComputer,
        open: Arc<AtomicBool>,
    }

    impl Computer for TrackedComputer {
        fn open(&mut self) -> Result<()> {
            self.inner.open()?;
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn close(&mut self) {
            self.inner.close();
            self.open.store(false, Ordering::SeqCst);
        }

        fn hardware(&self) -> Vec<HardwareHandle> {
            self.inner.hardware()
        }
    }

    struct FailingComputer;

    impl Computer for FailingComputer {
        fn open(&mut self) -> Result<()> {
            Err(Error::HardwareUnavailable("driver not loaded".to_string()))
        }

        fn close(&mut self) {}

        fn hardware(&self) -> Vec<HardwareHandle> {
            Vec::new()
        }
    }

    fn sources(counters: &VirtualCounters) -> OsSources {
        OsSources::new(
            Arc::new(counters.clone()),
            Arc::new(VirtualInterfaces::new(Vec::new())),
        )
    }

    fn computer(load: Arc<VirtualSensor>, open: Arc<AtomicBool>) -> Box<dyn Computer> {
        let cpu = VirtualHardware::new("Intel Core i7-8700K", HardwareType::Cpu).with_shared_sensor(load);
        Box::new(TrackedComputer {
            inner: VirtualComputer::new().with_hardware(Arc::new(cpu)),
            open,
        })
    }

    #[test]
    fn test_open_update_close() {
        let load = Arc::new(VirtualSensor::new(SensorType::Load, 0, "CPU Total", Some(12.0)));
        let open = Arc::new(AtomicBool::new(false));
        let counters = VirtualCounters::new();
        counters.add_instance(LOGICAL_DISK, "C:");

        let mut session =
            TelemetrySession::open(computer(load.clone(), open.clone()), sources(&counters), Settings::default())
                .unwrap();
        assert!(open.load(Ordering::SeqCst));
        assert_eq!(session.interval(), Duration::from_millis(2000));

        let cpu = &session.manager().cpu_monitors()[0];
        assert_eq!(cpu.total_load().unwrap().text(), "Load: 12%");

        load.set_value(Some(64.5));
        session.update().unwrap();
        let snapshot = session.snapshot();
        let cpu = snapshot.of_type(MonitorType::Cpu).next().unwrap();
        assert_eq!(cpu.name, "Intel Core i7-8700K");
        assert_eq!(cpu.readings[0].text, "Load: 64.5%");

        assert!(counters.open_count() > 0);
        session.close();
        assert!(!open.load(Ordering::SeqCst));
        assert_eq!(counters.open_count(), 0);
        assert!(session.update().is_err());
    }

    #[test]
    fn test_close_is_idempotent_and_runs_on_drop() {
        let load = Arc::new(VirtualSensor::new(SensorType::Load, 0, "CPU Total", Some(1.0)));
        let open = Arc::new(AtomicBool::new(false));
        let counters = VirtualCounters::new();
        counters.add_instance(LOGICAL_DISK, "C:");

        let mut session =
            TelemetrySession::open(computer(load.clone(), open.clone()), sources(&counters), Settings::default())
                .unwrap();
        session.close();
        session.close();
        let released = counters.release_count();
        drop(session);
        assert_eq!(counters.release_count(), released);

        let session =
            TelemetrySession::open(computer(load, open.clone()), sources(&counters), Settings::default()).unwrap();
        assert!(open.load(Ordering::SeqCst));
        drop(session);
        assert!(!open.load(Ordering::SeqCst));
    }

    #[test]
    fn test_settings_drive_monitor_set() {
        let load = Arc::new(VirtualSensor::new(SensorType::Load, 0, "CPU Total", Some(1.0)));
        let open = Arc::new(AtomicBool::new(false));
        let mut settings = Settings::default();
        settings.monitors = MonitorConfig::defaults();
        settings.monitors[0].enabled = false;

        let session =
            TelemetrySession::open(computer(load, open), sources(&VirtualCounters::new()), settings).unwrap();
        assert!(session.manager().cpu_monitors().is_empty());
        assert!(session.manager().failures().is_empty());
    }

    #[test]
    fn test_open_failure_propagates() {
        let result = TelemetrySession::open(
            Box::new(FailingComputer),
            sources(&VirtualCounters::new()),
            Settings::default(),
        );
        assert!(matches!(result, Err(Error::HardwareUnavailable(_))));
    }

    #[test]
    fn test_nodes_are_shared_with_computer() {
        let board: HardwareHandle = Arc::new(VirtualHardware::new("B450", HardwareType::Mainboard));
        let computer = VirtualComputer::new().with_hardware(board.clone());
        let session =
            TelemetrySession::open(Box::new(computer), sources(&VirtualCounters::new()), Settings::default())
                .unwrap();
        assert_eq!(session.manager().board().map(|b| b.name()), Some(board.name()));
        assert_eq!(session.manager().mainboard_monitor().unwrap().sensors().len(), 0);
    }
}
