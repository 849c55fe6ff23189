//! Linux hardware backend
//!
//! Builds the node tree from sysfs and procfs:
//! - /sys/class/dmi/id for the mainboard name
//! - /sys/class/hwmon/* for Super I/O chips, ACPI thermal zones, CPU and GPU temperatures
//! - /proc/stat, /proc/cpuinfo and cpufreq for CPU load and clocks
//! - /proc/meminfo for memory
//! - /sys/block/* and /proc/mounts for drives
//!
//! Every path is resolved under a root directory so a captured tree can be
//! replayed in tests.

use super::{Computer, Hardware, HardwareHandle, HardwareType, Sensor, SensorHandle, SensorType};
use crate::error::{Error, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const GIB: f32 = 1024.0 * 1024.0 * 1024.0;
const SECTOR_SIZE: f32 = 512.0;

/// Sensor whose value is refreshed by its owning node
#[derive(Debug)]
pub struct LinuxSensor {
    sensor_type: SensorType,
    index: u32,
    name: String,
    value: RwLock<Option<f32>>,
}

impl LinuxSensor {
    fn new(sensor_type: SensorType, index: u32, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            sensor_type,
            index,
            name: name.into(),
            value: RwLock::new(None),
        })
    }

    fn set(&self, value: Option<f32>) {
        if let Ok(mut guard) = self.value.write() {
            *guard = value;
        }
    }
}

impl Sensor for LinuxSensor {
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

/// Where a sensor's value comes from
#[derive(Debug, Clone)]
enum Source {
    /// Numeric sysfs attribute multiplied by a scale
    Attribute { path: PathBuf, scale: f32 },
    /// PWM duty 0-255 reported as percent
    Pwm(PathBuf),
    /// Sector counter field of a block device `stat` file, reported in GB
    BlockStat { path: PathBuf, field: usize },
}

impl Source {
    fn read(&self) -> Option<f32> {
        match self {
            Source::Attribute { path, scale } => read_number(path).map(|v| v * scale),
            Source::Pwm(path) => read_number(path).map(|v| v / 255.0 * 100.0),
            Source::BlockStat { path, field } => fs::read_to_string(path)
                .ok()
                .and_then(|s| {
                    s.split_whitespace()
                        .nth(*field)
                        .and_then(|v| v.parse::<f64>().ok())
                })
                .map(|sectors| (sectors as f32) * SECTOR_SIZE / GIB),
        }
    }
}

#[derive(Debug)]
struct Probe {
    sensor: Arc<LinuxSensor>,
    source: Source,
}

/// Jiffy counters of one /proc/stat cpu line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

/// Memory figures from /proc/meminfo, in kB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemInfo {
    pub fn load_percent(&self) -> f32 {
        if self.total_kb == 0 {
            return 0.0;
        }
        (self.total_kb - self.available_kb.min(self.total_kb)) as f32 / self.total_kb as f32 * 100.0
    }

    pub fn used_gb(&self) -> f32 {
        (self.total_kb - self.available_kb.min(self.total_kb)) as f32 * 1024.0 / GIB
    }

    pub fn available_gb(&self) -> f32 {
        self.available_kb as f32 * 1024.0 / GIB
    }
}

/// Values computed from a whole procfs file rather than one attribute
#[derive(Debug)]
enum Derived {
    None,
    CpuLoad {
        stat_path: PathBuf,
        // index 0 is the total, index n+1 is core n
        sensors: Vec<Arc<LinuxSensor>>,
        previous: Mutex<Vec<CpuTimes>>,
    },
    Memory {
        meminfo_path: PathBuf,
        load: Arc<LinuxSensor>,
        used: Arc<LinuxSensor>,
        available: Arc<LinuxSensor>,
    },
}

/// One sysfs/procfs backed node
pub struct LinuxHardware {
    name: String,
    hardware_type: HardwareType,
    sensors: Vec<Arc<LinuxSensor>>,
    probes: Vec<Probe>,
    derived: Derived,
    sub_hardware: Vec<HardwareHandle>,
    volumes: Vec<String>,
}

impl LinuxHardware {
    fn new(name: impl Into<String>, hardware_type: HardwareType) -> Self {
        Self {
            name: name.into(),
            hardware_type,
            sensors: Vec::new(),
            probes: Vec::new(),
            derived: Derived::None,
            sub_hardware: Vec::new(),
            volumes: Vec::new(),
        }
    }

    fn probe(&mut self, sensor_type: SensorType, index: u32, name: impl Into<String>, source: Source) {
        let sensor = LinuxSensor::new(sensor_type, index, name);
        self.sensors.push(sensor.clone());
        self.probes.push(Probe { sensor, source });
    }

    fn has_sensors(&self) -> bool {
        !self.sensors.is_empty()
    }

    fn update_cpu_load(stat_path: &Path, sensors: &[Arc<LinuxSensor>], previous: &Mutex<Vec<CpuTimes>>) -> Result<()> {
        let contents = fs::read_to_string(stat_path)?;
        let current = parse_proc_stat(&contents);
        let mut previous = previous
            .lock()
            .map_err(|_| Error::Other("cpu load state poisoned".to_string()))?;

        // no jiffy elapsed since the last sample: keep the last loads
        if let (Some(now), Some(before)) = (current.first(), previous.first()) {
            if now.total == before.total {
                return Ok(());
            }
        }

        for (i, sensor) in sensors.iter().enumerate() {
            let value = current.get(i).map(|now| {
                let before = previous.get(i).copied().unwrap_or_default();
                busy_percent(before, *now)
            });
            sensor.set(value.flatten());
        }
        *previous = current;
        Ok(())
    }
}

impl Hardware for LinuxHardware {
    fn name(&self) -> &str {
        &self.name
    }

    fn hardware_type(&self) -> HardwareType {
        self.hardware_type
    }

    fn update(&self) -> Result<()> {
        for probe in &self.probes {
            probe.sensor.set(probe.source.read());
        }

        match &self.derived {
            Derived::None => {}
            Derived::CpuLoad {
                stat_path,
                sensors,
                previous,
            } => Self::update_cpu_load(stat_path, sensors, previous)?,
            Derived::Memory {
                meminfo_path,
                load,
                used,
                available,
            } => {
                let info = parse_meminfo(&fs::read_to_string(meminfo_path)?);
                load.set(info.map(|m| m.load_percent()));
                used.set(info.map(|m| m.used_gb()));
                available.set(info.map(|m| m.available_gb()));
            }
        }
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

/// Role of a hwmon chip in the node tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipClass {
    Cpu,
    Gpu,
    SuperIo,
    Thermal,
    Storage,
    Other,
}

pub fn classify_chip(name: &str) -> ChipClass {
    let name = name.to_lowercase();

    if name.starts_with("coretemp") || name.starts_with("k10temp") || name.starts_with("zenpower") {
        ChipClass::Cpu
    } else if name.starts_with("amdgpu") || name.starts_with("radeon") {
        ChipClass::Gpu
    } else if name.starts_with("nvme") || name.starts_with("drivetemp") {
        ChipClass::Storage
    } else if name.starts_with("acpitz") {
        ChipClass::Thermal
    } else if ["nct", "it87", "it86", "f71", "f75", "w83", "nuvoton", "fintek", "smsc", "asus"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
    {
        ChipClass::SuperIo
    } else {
        ChipClass::Other
    }
}

/// Map a CPU temperature label to the conventional sensor name.
///
/// "Package id 0", "Tctl" and "Tdie" become "CPU Package"; "Core N" becomes
/// "CPU Core #N+1"; "TccdN" becomes "CPU CCD #N".
/// Whether block device `name` is `device` itself or one of its partitions
/// ("sda1" of "sda", "nvme0n1p2" of "nvme0n1"); "sdaa1" is not a partition of "sda"
pub fn is_partition_of(name: &str, device: &str) -> bool {
    let Some(rest) = name.strip_prefix(device) else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    rest.is_empty() || digits(rest) || rest.strip_prefix('p').is_some_and(digits)
}

pub fn cpu_temperature_name(label: &str) -> String {
    let label = label.trim();
    if label.starts_with("Package") || label == "Tctl" || label == "Tdie" {
        return "CPU Package".to_string();
    }
    if let Some(n) = label.strip_prefix("Core ").and_then(|n| n.trim().parse::<u32>().ok()) {
        return format!("CPU Core #{}", n + 1);
    }
    if let Some(n) = label.strip_prefix("Tccd").and_then(|n| n.parse::<u32>().ok()) {
        return format!("CPU CCD #{}", n);
    }
    format!("CPU {}", label)
}

/// Parse the cpu lines of /proc/stat: aggregate first, then each core
pub fn parse_proc_stat(contents: &str) -> Vec<CpuTimes> {
    contents
        .lines()
        .filter(|line| line.starts_with("cpu"))
        .filter_map(|line| {
            let fields: Vec<u64> = line
                .split_whitespace()
                .skip(1)
                .filter_map(|v| v.parse().ok())
                .collect();
            if fields.len() < 4 {
                return None;
            }
            // user nice system idle iowait irq softirq steal
            let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
            let total: u64 = fields.iter().take(8).sum();
            Some(CpuTimes {
                busy: total - idle,
                total,
            })
        })
        .collect()
}

/// Busy share between two samples; `None` when no time has passed
pub fn busy_percent(before: CpuTimes, now: CpuTimes) -> Option<f32> {
    let total = now.total.checked_sub(before.total)?;
    if total == 0 {
        return None;
    }
    let busy = now.busy.saturating_sub(before.busy);
    Some(busy as f32 * 100.0 / total as f32)
}

pub fn parse_meminfo(contents: &str) -> Option<MemInfo> {
    let field = |key: &str| {
        contents.lines().find_map(|line| {
            let rest = line.strip_prefix(key)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
    };
    let total_kb = field("MemTotal")?;
    let available_kb = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some(MemInfo {
        total_kb,
        available_kb,
    })
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_number(path: &Path) -> Option<f32> {
    read_trimmed(path).and_then(|s| s.parse::<f64>().ok()).map(|v| v as f32)
}

/// Indices `n` for which `{prefix}{n}{suffix}` exists in `dir`, ascending
fn attribute_indices(dir: &Path, prefix: &str, suffix: &str) -> Vec<u32> {
    let mut indices: Vec<u32> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().to_string();
                    name.strip_prefix(prefix)?
                        .strip_suffix(suffix)?
                        .parse::<u32>()
                        .ok()
                })
                .collect()
        })
        .unwrap_or_default();
    indices.sort_unstable();
    indices
}

/// Label of a hwmon channel, or a numbered fallback
fn channel_label(dir: &Path, channel: &str, fallback: &str, n: u32) -> String {
    read_trimmed(&dir.join(format!("{}{}_label", channel, n)))
        .unwrap_or_else(|| format!("{} #{}", fallback, n))
}

/// Add every temperature, fan, PWM and voltage channel of a hwmon chip
fn add_chip_channels(node: &mut LinuxHardware, dir: &Path) {
    for (index, n) in attribute_indices(dir, "temp", "_input").into_iter().enumerate() {
        let name = channel_label(dir, "temp", "Temperature", n);
        let path = dir.join(format!("temp{}_input", n));
        node.probe(SensorType::Temperature, index as u32, name, Source::Attribute { path, scale: 0.001 });
    }
    for (index, n) in attribute_indices(dir, "fan", "_input").into_iter().enumerate() {
        let name = channel_label(dir, "fan", "Fan", n);
        let path = dir.join(format!("fan{}_input", n));
        node.probe(SensorType::Fan, index as u32, name, Source::Attribute { path, scale: 1.0 });
    }
    for (index, n) in attribute_indices(dir, "pwm", "").into_iter().enumerate() {
        node.probe(
            SensorType::Control,
            index as u32,
            format!("Fan Control #{}", n),
            Source::Pwm(dir.join(format!("pwm{}", n))),
        );
    }
    for (index, n) in attribute_indices(dir, "in", "_input").into_iter().enumerate() {
        let name = channel_label(dir, "in", "Voltage", n);
        let path = dir.join(format!("in{}_input", n));
        node.probe(SensorType::Voltage, index as u32, name, Source::Attribute { path, scale: 0.001 });
    }
}

struct HwmonChip {
    name: String,
    dir: PathBuf,
}

/// Hardware enumeration over sysfs and procfs
pub struct LinuxComputer {
    root: PathBuf,
    hardware: Vec<HardwareHandle>,
}

impl Default for LinuxComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxComputer {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Enumerate under `root` instead of the filesystem root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            hardware: Vec::new(),
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn hwmon_chips(&self) -> Vec<HwmonChip> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(self.path("sys/class/hwmon"))
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default();
        dirs.sort();

        dirs.into_iter()
            .filter_map(|dir| {
                let name = read_trimmed(&dir.join("name"))?;
                Some(HwmonChip { name, dir })
            })
            .collect()
    }

    fn mainboard(&self, chips: &[HwmonChip]) -> Option<LinuxHardware> {
        let dmi = self.path("sys/class/dmi/id");
        let name = match (
            read_trimmed(&dmi.join("board_vendor")),
            read_trimmed(&dmi.join("board_name")),
        ) {
            (Some(vendor), Some(board)) => format!("{} {}", vendor, board),
            (None, Some(board)) => board,
            (Some(vendor), None) => vendor,
            (None, None) => "Mainboard".to_string(),
        };
        let mut board = LinuxHardware::new(name, HardwareType::Mainboard);

        for chip in chips {
            match classify_chip(&chip.name) {
                ChipClass::SuperIo => {
                    let mut node = LinuxHardware::new(chip.name.clone(), HardwareType::SuperIo);
                    add_chip_channels(&mut node, &chip.dir);
                    debug!("Super I/O chip {} with {} sensors", chip.name, node.sensors.len());
                    board.sub_hardware.push(Arc::new(node));
                }
                ChipClass::Thermal => {
                    for n in attribute_indices(&chip.dir, "temp", "_input") {
                        let index = board.sensors.len() as u32;
                        let path = chip.dir.join(format!("temp{}_input", n));
                        board.probe(
                            SensorType::Temperature,
                            index,
                            format!("ACPI Thermal Zone #{}", index + 1),
                            Source::Attribute { path, scale: 0.001 },
                        );
                    }
                }
                _ => {}
            }
        }

        (board.has_sensors() || !board.sub_hardware.is_empty() || dmi.exists()).then_some(board)
    }

    fn cpu(&self, chips: &[HwmonChip]) -> Option<LinuxHardware> {
        let stat_path = self.path("proc/stat");
        let times = fs::read_to_string(&stat_path)
            .map(|s| parse_proc_stat(&s))
            .unwrap_or_default();
        if times.is_empty() {
            return None;
        }

        let name = fs::read_to_string(self.path("proc/cpuinfo"))
            .ok()
            .and_then(|info| {
                info.lines()
                    .find(|line| line.starts_with("model name"))
                    .and_then(|line| line.split(':').nth(1))
                    .map(|model| model.trim().to_string())
            })
            .unwrap_or_else(|| "CPU".to_string());
        let mut cpu = LinuxHardware::new(name, HardwareType::Cpu);

        let cores = times.len() - 1;
        let mut loads = vec![LinuxSensor::new(SensorType::Load, 0, "CPU Total")];
        for core in 1..=cores {
            loads.push(LinuxSensor::new(SensorType::Load, core as u32, format!("CPU Core #{}", core)));
        }
        cpu.sensors.extend(loads.iter().cloned());
        cpu.derived = Derived::CpuLoad {
            stat_path,
            sensors: loads,
            previous: Mutex::new(Vec::new()),
        };

        // index 0 is reserved for the bus clock
        for core in 0..cores {
            let path = self.path(&format!(
                "sys/devices/system/cpu/cpu{}/cpufreq/scaling_cur_freq",
                core
            ));
            if path.exists() {
                cpu.probe(
                    SensorType::Clock,
                    core as u32 + 1,
                    format!("CPU Core #{}", core + 1),
                    Source::Attribute { path, scale: 0.001 },
                );
            }
        }

        let mut index = 0;
        for chip in chips.iter().filter(|c| classify_chip(&c.name) == ChipClass::Cpu) {
            for n in attribute_indices(&chip.dir, "temp", "_input") {
                let label = read_trimmed(&chip.dir.join(format!("temp{}_label", n)))
                    .unwrap_or_else(|| "Tctl".to_string());
                cpu.probe(
                    SensorType::Temperature,
                    index,
                    cpu_temperature_name(&label),
                    Source::Attribute {
                        path: chip.dir.join(format!("temp{}_input", n)),
                        scale: 0.001,
                    },
                );
                index += 1;
            }
        }

        Some(cpu)
    }

    fn memory(&self) -> Option<LinuxHardware> {
        let meminfo_path = self.path("proc/meminfo");
        if !meminfo_path.exists() {
            return None;
        }
        let mut ram = LinuxHardware::new("Generic Memory", HardwareType::Ram);
        let load = LinuxSensor::new(SensorType::Load, 0, "Memory");
        let used = LinuxSensor::new(SensorType::Data, 0, "Used Memory");
        let available = LinuxSensor::new(SensorType::Data, 1, "Available Memory");
        ram.sensors.extend([load.clone(), used.clone(), available.clone()]);
        ram.derived = Derived::Memory {
            meminfo_path,
            load,
            used,
            available,
        };
        Some(ram)
    }

    fn gpus(&self, chips: &[HwmonChip]) -> Vec<LinuxHardware> {
        chips
            .iter()
            .filter(|c| classify_chip(&c.name) == ChipClass::Gpu)
            .map(|chip| {
                let device = chip.dir.join("device");
                let name = read_trimmed(&device.join("product_name"))
                    .unwrap_or_else(|| "AMD Radeon Graphics".to_string());
                let mut gpu = LinuxHardware::new(name, HardwareType::GpuAmd);
                let attribute = |file: &str, scale: f32| Source::Attribute {
                    path: chip.dir.join(file),
                    scale,
                };

                let channels = [
                    (SensorType::Clock, 0, "GPU Core", "freq1_input", 1e-6),
                    (SensorType::Clock, 1, "GPU Memory", "freq2_input", 1e-6),
                    (SensorType::Voltage, 0, "GPU Core", "in0_input", 0.001),
                    (SensorType::Temperature, 0, "GPU Core", "temp1_input", 0.001),
                    (SensorType::Fan, 0, "GPU Fan", "fan1_input", 1.0),
                ];
                for (sensor_type, index, name, file, scale) in channels {
                    if chip.dir.join(file).exists() {
                        gpu.probe(sensor_type, index, name, attribute(file, scale));
                    }
                }
                if chip.dir.join("pwm1").exists() {
                    gpu.probe(SensorType::Control, 0, "GPU Fan", Source::Pwm(chip.dir.join("pwm1")));
                }
                for (index, name, file) in [(0, "GPU Core", "gpu_busy_percent"), (3, "GPU Memory", "mem_busy_percent")] {
                    let path = device.join(file);
                    if path.exists() {
                        gpu.probe(SensorType::Load, index, name, Source::Attribute { path, scale: 1.0 });
                    }
                }
                gpu
            })
            .collect()
    }

    /// Mount points of every partition of `device`, in /proc/mounts order
    fn volumes_of(&self, device: &str) -> Vec<String> {
        let mounts = fs::read_to_string(self.path("proc/mounts")).unwrap_or_default();
        let mut volumes = Vec::new();
        for line in mounts.lines() {
            let mut parts = line.split_whitespace();
            let (Some(source), Some(mount_point)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Some(name) = source.strip_prefix("/dev/") else {
                continue;
            };
            if is_partition_of(name, device) && !volumes.iter().any(|v| v == mount_point) {
                volumes.push(mount_point.to_string());
            }
        }
        volumes
    }

    fn drives(&self) -> Vec<LinuxHardware> {
        let block = self.path("sys/block");
        let mut names: Vec<String> = fs::read_dir(&block)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();

        names
            .into_iter()
            .filter(|name| {
                !["loop", "ram", "zram", "dm-", "sr", "fd", "md"]
                    .iter()
                    .any(|prefix| name.starts_with(prefix))
            })
            .filter(|name| block.join(name).join("device").exists())
            .map(|dev| {
                let dir = block.join(&dev);
                let name = read_trimmed(&dir.join("device/model")).unwrap_or_else(|| dev.clone());
                let mut drive = LinuxHardware::new(name, HardwareType::Storage);

                if let Some(temp) = drive_temperature_input(&dir.join("device")) {
                    drive.probe(
                        SensorType::Temperature,
                        0,
                        "Temperature",
                        Source::Attribute { path: temp, scale: 0.001 },
                    );
                }
                // stat fields: sectors read is 2, sectors written is 6
                let stat = dir.join("stat");
                if stat.exists() {
                    drive.probe(SensorType::Data, 0, "Data Read", Source::BlockStat { path: stat.clone(), field: 2 });
                    drive.probe(SensorType::Data, 1, "Data Written", Source::BlockStat { path: stat, field: 6 });
                }
                drive.volumes = self.volumes_of(&dev);
                drive
            })
            .collect()
    }
}

/// temp1_input of the hwmon directory attached to a block device, if any
fn drive_temperature_input(device: &Path) -> Option<PathBuf> {
    let candidates = [device.to_path_buf(), device.join("hwmon")];
    candidates.iter().find_map(|dir| {
        fs::read_dir(dir).ok()?.filter_map(|e| e.ok()).find_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let input = e.path().join("temp1_input");
            (name.starts_with("hwmon") && input.exists()).then_some(input)
        })
    })
}

impl Computer for LinuxComputer {
    fn open(&mut self) -> Result<()> {
        if !self.path("sys").exists() || !self.path("proc").exists() {
            return Err(Error::HardwareUnavailable(format!(
                "sysfs/procfs not found under {}",
                self.root.display()
            )));
        }

        let chips = self.hwmon_chips();
        let mut hardware: Vec<HardwareHandle> = Vec::new();

        if let Some(board) = self.mainboard(&chips) {
            hardware.push(Arc::new(board));
        }
        if let Some(cpu) = self.cpu(&chips) {
            hardware.push(Arc::new(cpu));
        }
        if let Some(ram) = self.memory() {
            hardware.push(Arc::new(ram));
        }
        for gpu in self.gpus(&chips) {
            hardware.push(Arc::new(gpu));
        }
        for drive in self.drives() {
            hardware.push(Arc::new(drive));
        }

        info!(
            "Enumerated {} hardware nodes from {} hwmon chips",
            hardware.len(),
            chips.len()
        );
        self.hardware = hardware;
        Ok(())
    }

    fn close(&mut self) {
        self.hardware.clear();
    }

    fn hardware(&self) -> Vec<HardwareHandle> {
        self.hardware.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::update_tree;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write(root, "sys/class/dmi/id/board_vendor", "ASUSTeK COMPUTER INC.\n");
        write(root, "sys/class/dmi/id/board_name", "PRIME B450M-A\n");

        write(root, "sys/class/hwmon/hwmon0/name", "k10temp\n");
        write(root, "sys/class/hwmon/hwmon0/temp1_input", "48250\n");
        write(root, "sys/class/hwmon/hwmon0/temp1_label", "Tctl\n");
        write(root, "sys/class/hwmon/hwmon0/temp3_input", "45000\n");
        write(root, "sys/class/hwmon/hwmon0/temp3_label", "Tccd1\n");

        write(root, "sys/class/hwmon/hwmon1/name", "it8665\n");
        write(root, "sys/class/hwmon/hwmon1/temp1_input", "35000\n");
        write(root, "sys/class/hwmon/hwmon1/fan1_input", "1250\n");
        write(root, "sys/class/hwmon/hwmon1/fan1_label", "CPU Fan\n");
        write(root, "sys/class/hwmon/hwmon1/pwm1", "128\n");
        write(root, "sys/class/hwmon/hwmon1/in0_input", "1200\n");

        write(root, "sys/class/hwmon/hwmon2/name", "acpitz\n");
        write(root, "sys/class/hwmon/hwmon2/temp1_input", "27800\n");

        write(root, "sys/class/hwmon/hwmon3/name", "amdgpu\n");
        write(root, "sys/class/hwmon/hwmon3/temp1_input", "51000\n");
        write(root, "sys/class/hwmon/hwmon3/freq1_input", "1340000000\n");
        write(root, "sys/class/hwmon/hwmon3/device/gpu_busy_percent", "17\n");

        write(root, "sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq", "3600000\n");
        write(root, "sys/devices/system/cpu/cpu1/cpufreq/scaling_cur_freq", "2200500\n");

        write(
            root,
            "proc/stat",
            "cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 50 0 50 400 0 0 0 0 0 0\ncpu1 50 0 50 400 0 0 0 0 0 0\nintr 1\n",
        );
        write(root, "proc/cpuinfo", "processor\t: 0\nmodel name\t: AMD Ryzen 5 2600 Six-Core Processor\n");
        write(root, "proc/meminfo", "MemTotal:       16777216 kB\nMemFree:         1048576 kB\nMemAvailable:    4194304 kB\n");
        write(
            root,
            "proc/mounts",
            "/dev/sda2 / ext4 rw 0 0\nproc /proc proc rw 0 0\n/dev/sdaa1 /srv xfs rw 0 0\n/dev/sda1 /boot vfat rw 0 0\n",
        );

        write(root, "sys/block/sda/device/model", "Samsung SSD 860\n");
        write(root, "sys/block/sda/stat", "100 0 2097152 0 50 0 4194304 0 0 0 0\n");
        write(root, "sys/block/sda/device/hwmon/hwmon4/temp1_input", "33000\n");
        write(root, "sys/block/loop0/stat", "0 0 0 0 0 0 0 0 0 0 0\n");
        dir
    }

    fn open(dir: &TempDir) -> LinuxComputer {
        let mut computer = LinuxComputer::with_root(dir.path());
        computer.open().unwrap();
        for node in computer.hardware() {
            update_tree(node.as_ref()).unwrap();
        }
        computer
    }

    fn sensor(node: &HardwareHandle, sensor_type: SensorType, name: &str) -> Option<SensorHandle> {
        node.sensors()
            .into_iter()
            .find(|s| s.sensor_type() == sensor_type && s.name() == name)
    }

    #[test]
    fn test_node_order_and_names() {
        let dir = fixture();
        let computer = open(&dir);
        let nodes: Vec<(HardwareType, String)> = computer
            .hardware()
            .iter()
            .map(|h| (h.hardware_type(), h.name().to_string()))
            .collect();
        assert_eq!(
            nodes,
            vec![
                (HardwareType::Mainboard, "ASUSTeK COMPUTER INC. PRIME B450M-A".to_string()),
                (HardwareType::Cpu, "AMD Ryzen 5 2600 Six-Core Processor".to_string()),
                (HardwareType::Ram, "Generic Memory".to_string()),
                (HardwareType::GpuAmd, "AMD Radeon Graphics".to_string()),
                (HardwareType::Storage, "Samsung SSD 860".to_string()),
            ]
        );
    }

    #[test]
    fn test_mainboard_chips_and_thermal_zone() {
        let dir = fixture();
        let computer = open(&dir);
        let board = computer.hardware()[0].clone();

        let zone = sensor(&board, SensorType::Temperature, "ACPI Thermal Zone #1").unwrap();
        assert!((zone.value().unwrap() - 27.8).abs() < 1e-3);

        let chips = board.sub_hardware();
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].hardware_type(), HardwareType::SuperIo);
        let fan = sensor(&chips[0], SensorType::Fan, "CPU Fan").unwrap();
        assert_eq!(fan.value(), Some(1250.0));
        let pwm = sensor(&chips[0], SensorType::Control, "Fan Control #1").unwrap();
        assert!((pwm.value().unwrap() - 50.196).abs() < 0.01);
        assert!(sensor(&chips[0], SensorType::Temperature, "Temperature #1").is_some());
        assert!(sensor(&chips[0], SensorType::Voltage, "Voltage #0").is_some());
    }

    #[test]
    fn test_cpu_sensors() {
        let dir = fixture();
        let computer = open(&dir);
        let cpu = computer.hardware()[1].clone();

        let package = sensor(&cpu, SensorType::Temperature, "CPU Package").unwrap();
        assert!((package.value().unwrap() - 48.25).abs() < 1e-3);
        assert!(sensor(&cpu, SensorType::Temperature, "CPU CCD #1").is_some());

        let clock = sensor(&cpu, SensorType::Clock, "CPU Core #2").unwrap();
        assert_eq!(clock.index(), 2);
        assert!((clock.value().unwrap() - 2200.5).abs() < 1e-3);

        // first sample averages since boot
        let total = sensor(&cpu, SensorType::Load, "CPU Total").unwrap();
        assert_eq!(total.index(), 0);
        assert_eq!(total.value(), Some(20.0));

        write(
            dir.path(),
            "proc/stat",
            "cpu  150 0 150 900 0 0 0 0 0 0\ncpu0 100 0 100 400 0 0 0 0 0 0\ncpu1 50 0 50 500 0 0 0 0 0 0\n",
        );
        cpu.update().unwrap();
        assert_eq!(total.value(), Some(50.0));
        cpu.update().unwrap();
        assert_eq!(total.value(), Some(50.0));
        assert_eq!(sensor(&cpu, SensorType::Load, "CPU Core #1").unwrap().value(), Some(100.0));
        assert_eq!(sensor(&cpu, SensorType::Load, "CPU Core #2").unwrap().value(), Some(0.0));
    }

    #[test]
    fn test_memory_sensors() {
        let dir = fixture();
        let computer = open(&dir);
        let ram = computer.hardware()[2].clone();

        assert_eq!(sensor(&ram, SensorType::Load, "Memory").unwrap().value(), Some(75.0));
        let used = ram.sensors().into_iter().find(|s| s.sensor_type() == SensorType::Data && s.index() == 0);
        assert_eq!(used.unwrap().value(), Some(12.0));
        let free = ram.sensors().into_iter().find(|s| s.sensor_type() == SensorType::Data && s.index() == 1);
        assert_eq!(free.unwrap().value(), Some(4.0));
    }

    #[test]
    fn test_gpu_and_drive() {
        let dir = fixture();
        let computer = open(&dir);
        let gpu = computer.hardware()[3].clone();
        let clock = sensor(&gpu, SensorType::Clock, "GPU Core").unwrap();
        assert!((clock.value().unwrap() - 1340.0).abs() < 1e-2);
        assert_eq!(sensor(&gpu, SensorType::Load, "GPU Core").unwrap().value(), Some(17.0));

        let drive = computer.hardware()[4].clone();
        assert_eq!(drive.volumes(), vec!["/".to_string(), "/boot".to_string()]);
        assert_eq!(sensor(&drive, SensorType::Temperature, "Temperature").unwrap().value(), Some(33.0));
        assert_eq!(sensor(&drive, SensorType::Data, "Data Read").unwrap().value(), Some(1.0));
        assert_eq!(sensor(&drive, SensorType::Data, "Data Written").unwrap().value(), Some(2.0));
    }

    #[test]
    fn test_missing_attribute_reads_as_none() {
        let dir = fixture();
        let computer = open(&dir);
        let drive = computer.hardware()[4].clone();
        fs::remove_file(dir.path().join("sys/block/sda/device/hwmon/hwmon4/temp1_input")).unwrap();
        drive.update().unwrap();
        assert_eq!(sensor(&drive, SensorType::Temperature, "Temperature").unwrap().value(), None);
    }

    #[test]
    fn test_open_without_procfs_fails() {
        let dir = TempDir::new().unwrap();
        let mut computer = LinuxComputer::with_root(dir.path());
        assert!(matches!(computer.open(), Err(Error::HardwareUnavailable(_))));
    }

    #[test]
    fn test_parsers() {
        assert_eq!(cpu_temperature_name("Package id 0"), "CPU Package");
        assert_eq!(cpu_temperature_name("Core 3"), "CPU Core #4");
        assert_eq!(cpu_temperature_name("Tdie"), "CPU Package");
        assert!(is_partition_of("sda", "sda"));
        assert!(is_partition_of("sda1", "sda"));
        assert!(is_partition_of("nvme0n1p2", "nvme0n1"));
        assert!(is_partition_of("mmcblk0p1", "mmcblk0"));
        assert!(!is_partition_of("sdaa1", "sda"));
        assert!(!is_partition_of("nvme0n10p1", "nvme0n1"));
        assert!(!is_partition_of("sdb1", "sda"));
        assert_eq!(classify_chip("nct6798"), ChipClass::SuperIo);
        assert_eq!(classify_chip("coretemp"), ChipClass::Cpu);
        assert_eq!(classify_chip("iwlwifi_1"), ChipClass::Other);

        assert_eq!(busy_percent(CpuTimes { busy: 10, total: 100 }, CpuTimes { busy: 10, total: 100 }), None);
        assert!(parse_meminfo("MemTotal: 1 kB\n").is_none());
    }
}
