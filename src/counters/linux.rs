//! Linux counter backend
//!
//! `LogicalDisk` instances are mount points of block-device filesystems from
//! /proc/mounts. Space comes from statvfs, throughput from /proc/diskstats.
//! `Network Interface` instances are the entries of /sys/class/net, with
//! throughput from their statistics files. Rate counters report 0 on their
//! first sample and bytes per second afterwards.

use super::{
    Counter, CounterSource, InterfaceSource, InterfaceType, NetworkInterface, OperationalStatus,
    BYTES_RECEIVED_PER_SEC, BYTES_SENT_PER_SEC, DISK_READ_BYTES_PER_SEC, DISK_WRITE_BYTES_PER_SEC,
    FREE_MEGABYTES, LOGICAL_DISK, NETWORK_INTERFACE, PERCENT_FREE_SPACE,
};
use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const SECTOR_SIZE: u64 = 512;

/// One mounted block-device filesystem
#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    pub device: String,
    pub mount_point: String,
}

/// Block-device mounts in /proc/mounts order, one per mount point
pub fn parse_mounts(contents: &str) -> Vec<Mount> {
    let mut mounts: Vec<Mount> = Vec::new();
    for line in contents.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let (source, mount_point) = (parts[0], parts[1]);
        let Some(device) = source.strip_prefix("/dev/") else {
            continue;
        };
        if device.starts_with("loop") || mounts.iter().any(|m| m.mount_point == mount_point) {
            continue;
        }
        mounts.push(Mount {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
        });
    }
    mounts
}

/// Sectors read and written by `device` according to /proc/diskstats
pub fn parse_diskstats(contents: &str, device: &str) -> Option<(u64, u64)> {
    contents.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || fields[2] != device {
            return None;
        }
        Some((fields[5].parse().ok()?, fields[9].parse().ok()?))
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SpaceKind {
    FreeMegabytes,
    PercentFree,
}

struct SpaceCounter {
    path: PathBuf,
    kind: SpaceKind,
}

impl Counter for SpaceCounter {
    fn next_value(&mut self) -> Result<f32> {
        let stat = nix::sys::statvfs::statvfs(&self.path)
            .map_err(|e| Error::Io(std::io::Error::from(e)))?;
        let block_size = stat.fragment_size() as u64;
        let available = stat.blocks_available() as u64 * block_size;
        let total = stat.blocks() as u64 * block_size;

        Ok(match self.kind {
            SpaceKind::FreeMegabytes => available as f32 / (1024.0 * 1024.0),
            SpaceKind::PercentFree if total == 0 => 0.0,
            SpaceKind::PercentFree => available as f32 * 100.0 / total as f32,
        })
    }
}

/// Where a rate counter reads its running byte total
#[derive(Debug, Clone)]
enum Total {
    Disk { diskstats: PathBuf, device: String, write: bool },
    Net(PathBuf),
}

impl Total {
    fn read(&self) -> Result<u64> {
        match self {
            Total::Disk {
                diskstats,
                device,
                write,
            } => {
                let contents = fs::read_to_string(diskstats)?;
                let (read, written) = parse_diskstats(&contents, device).ok_or_else(|| {
                    Error::Parse(format!("{} missing from {}", device, diskstats.display()))
                })?;
                let sectors = if *write { written } else { read };
                Ok(sectors * SECTOR_SIZE)
            }
            Total::Net(path) => fs::read_to_string(path)?
                .trim()
                .parse()
                .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Bytes per second between consecutive samples of a running total
struct RateCounter {
    total: Total,
    last: Option<(u64, Instant)>,
}

impl RateCounter {
    fn new(total: Total) -> Self {
        Self { total, last: None }
    }
}

impl Counter for RateCounter {
    fn next_value(&mut self) -> Result<f32> {
        let value = self.total.read()?;
        let now = Instant::now();
        let rate = match self.last {
            Some((before, at)) => {
                let seconds = now.duration_since(at).as_secs_f64();
                if seconds > 0.0 {
                    value.saturating_sub(before) as f64 / seconds
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last = Some((value, now));
        Ok(rate as f32)
    }
}

/// procfs/sysfs performance counters
#[derive(Debug, Clone)]
pub struct ProcCounters {
    root: PathBuf,
}

impl Default for ProcCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcCounters {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn mounts(&self) -> Result<Vec<Mount>> {
        Ok(parse_mounts(&fs::read_to_string(self.root.join("proc/mounts"))?))
    }

    fn net_dir(&self) -> PathBuf {
        self.root.join("sys/class/net")
    }

    /// Mount point path under the root
    fn mount_path(&self, mount_point: &str) -> PathBuf {
        self.root.join(mount_point.trim_start_matches('/'))
    }

    /// Kernel name of a mount's device, following /dev/mapper links
    fn kernel_device(&self, device: &str) -> String {
        let dev = self.root.join("dev").join(device);
        fs::canonicalize(&dev)
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| {
                Path::new(device)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| device.to_string())
            })
    }
}

impl CounterSource for ProcCounters {
    fn instance_names(&self, category: &str) -> Result<Vec<String>> {
        match category {
            LOGICAL_DISK => Ok(self.mounts()?.into_iter().map(|m| m.mount_point).collect()),
            NETWORK_INTERFACE => {
                let mut names: Vec<String> = fs::read_dir(self.net_dir())?
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect();
                names.sort();
                Ok(names)
            }
            other => Err(Error::CounterCategoryMissing(other.to_string())),
        }
    }

    fn instance_exists(&self, instance: &str, category: &str) -> Result<bool> {
        Ok(self.instance_names(category)?.iter().any(|i| i == instance))
    }

    fn open(&self, category: &str, counter: &str, instance: &str) -> Result<Box<dyn Counter>> {
        let missing = || Error::CounterInstanceMissing {
            category: category.to_string(),
            instance: instance.to_string(),
        };

        match category {
            LOGICAL_DISK => {
                let mount = self
                    .mounts()?
                    .into_iter()
                    .find(|m| m.mount_point == instance)
                    .ok_or_else(missing)?;
                let space = |kind| -> Box<dyn Counter> {
                    Box::new(SpaceCounter {
                        path: self.mount_path(&mount.mount_point),
                        kind,
                    })
                };
                let disk = |write| -> Box<dyn Counter> {
                    Box::new(RateCounter::new(Total::Disk {
                        diskstats: self.root.join("proc/diskstats"),
                        device: self.kernel_device(&mount.device),
                        write,
                    }))
                };
                match counter {
                    FREE_MEGABYTES => Ok(space(SpaceKind::FreeMegabytes)),
                    PERCENT_FREE_SPACE => Ok(space(SpaceKind::PercentFree)),
                    DISK_READ_BYTES_PER_SEC => Ok(disk(false)),
                    DISK_WRITE_BYTES_PER_SEC => Ok(disk(true)),
                    other => Err(Error::Other(format!("unknown {} counter: {}", category, other))),
                }
            }
            NETWORK_INTERFACE => {
                let stats = self.net_dir().join(instance).join("statistics");
                if !stats.exists() {
                    return Err(missing());
                }
                let file = match counter {
                    BYTES_RECEIVED_PER_SEC => "rx_bytes",
                    BYTES_SENT_PER_SEC => "tx_bytes",
                    other => {
                        return Err(Error::Other(format!("unknown {} counter: {}", category, other)))
                    }
                };
                debug!("Opening {} for {}", file, instance);
                Ok(Box::new(RateCounter::new(Total::Net(stats.join(file)))))
            }
            other => Err(Error::CounterCategoryMissing(other.to_string())),
        }
    }
}

/// Network interfaces from /sys/class/net
#[derive(Debug, Clone)]
pub struct SysfsInterfaces {
    root: PathBuf,
}

impl Default for SysfsInterfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsInterfaces {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// "aa:bb:cc:dd:ee:ff" to bytes; malformed input yields no bytes
pub fn parse_mac(address: &str) -> Vec<u8> {
    address
        .trim()
        .split(':')
        .map(|pair| u8::from_str_radix(pair, 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .unwrap_or_default()
}

impl InterfaceSource for SysfsInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(self.root.join("sys/class/net"))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        dirs.sort();

        let read = |dir: &Path, file: &str| {
            fs::read_to_string(dir.join(file))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        Ok(dirs
            .iter()
            .filter_map(|dir| {
                let name = dir.file_name()?.to_string_lossy().to_string();
                let status = match read(dir, "operstate").as_str() {
                    "up" => OperationalStatus::Up,
                    "down" | "lowerlayerdown" | "dormant" | "notpresent" => OperationalStatus::Down,
                    _ => OperationalStatus::Unknown,
                };
                // ARPHRD_ETHER = 1, ARPHRD_LOOPBACK = 772
                let interface_type = match read(dir, "type").as_str() {
                    "772" => InterfaceType::Loopback,
                    "1" if dir.join("wireless").exists() || dir.join("phy80211").exists() => {
                        InterfaceType::Wireless80211
                    }
                    "1" => InterfaceType::Ethernet,
                    _ => InterfaceType::Other,
                };
                Some(NetworkInterface {
                    description: name.clone(),
                    name,
                    status,
                    interface_type,
                    physical_address: parse_mac(&read(dir, "address")),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::CounterHandle;
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
        write(
            root,
            "proc/mounts",
            "sysfs /sys sysfs rw 0 0\n/dev/nvme0n1p2 / ext4 rw 0 0\n/dev/loop0 /snap/core squashfs ro 0 0\n/dev/nvme0n1p1 /boot/efi vfat rw 0 0\n",
        );
        write(
            root,
            "proc/diskstats",
            " 259       0 nvme0n1 10 0 4000 0 20 0 8000 0 0 0 0\n 259       2 nvme0n1p2 5 0 2048 0 9 0 4096 0 0 0 0\n",
        );
        fs::create_dir_all(root.join("boot/efi")).unwrap();

        write(root, "sys/class/net/lo/operstate", "unknown\n");
        write(root, "sys/class/net/lo/type", "772\n");
        write(root, "sys/class/net/lo/address", "00:00:00:00:00:00\n");
        write(root, "sys/class/net/lo/statistics/rx_bytes", "100\n");
        write(root, "sys/class/net/enp5s0/operstate", "up\n");
        write(root, "sys/class/net/enp5s0/type", "1\n");
        write(root, "sys/class/net/enp5s0/address", "a8:5e:45:01:02:0f\n");
        write(root, "sys/class/net/enp5s0/statistics/rx_bytes", "1000\n");
        write(root, "sys/class/net/enp5s0/statistics/tx_bytes", "2000\n");
        write(root, "sys/class/net/wlp4s0/operstate", "down\n");
        write(root, "sys/class/net/wlp4s0/type", "1\n");
        fs::create_dir_all(root.join("sys/class/net/wlp4s0/wireless")).unwrap();
        dir
    }

    #[test]
    fn test_logical_disk_instances() {
        let dir = fixture();
        let counters = ProcCounters::with_root(dir.path());
        assert_eq!(
            counters.instance_names(LOGICAL_DISK).unwrap(),
            vec!["/".to_string(), "/boot/efi".to_string()]
        );
        assert!(counters.instance_exists("/boot/efi", LOGICAL_DISK).unwrap());
        assert!(!counters.instance_exists("/snap/core", LOGICAL_DISK).unwrap());
        assert!(matches!(
            counters.instance_names("Processor"),
            Err(Error::CounterCategoryMissing(_))
        ));
    }

    #[test]
    fn test_space_counters() {
        let dir = fixture();
        let counters = ProcCounters::with_root(dir.path());
        let mut free = CounterHandle::open(&counters, LOGICAL_DISK, FREE_MEGABYTES, "/").unwrap();
        let mut percent = CounterHandle::open(&counters, LOGICAL_DISK, PERCENT_FREE_SPACE, "/").unwrap();

        assert!(free.next_value().unwrap().unwrap() > 0.0);
        let percent = percent.next_value().unwrap().unwrap();
        assert!(percent > 0.0 && percent <= 100.0);
    }

    #[test]
    fn test_disk_rate_first_sample_is_zero() {
        let dir = fixture();
        let counters = ProcCounters::with_root(dir.path());
        let mut read = CounterHandle::open(&counters, LOGICAL_DISK, DISK_READ_BYTES_PER_SEC, "/").unwrap();
        assert_eq!(read.next_value().unwrap(), Some(0.0));

        write(
            dir.path(),
            "proc/diskstats",
            " 259       2 nvme0n1p2 5 0 4096 0 9 0 4096 0 0 0 0\n",
        );
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(read.next_value().unwrap().unwrap() > 0.0);
    }

    #[test]
    fn test_diskstats_lookup() {
        let stats = " 8 0 sda 1 0 10 0 2 0 20 0 0 0 0\n 8 1 sda1 1 0 3 0 2 0 4 0 0 0 0\n";
        assert_eq!(parse_diskstats(stats, "sda1"), Some((3, 4)));
        assert_eq!(parse_diskstats(stats, "sdb"), None);
    }

    #[test]
    fn test_network_counters() {
        let dir = fixture();
        let counters = ProcCounters::with_root(dir.path());
        assert_eq!(
            counters.instance_names(NETWORK_INTERFACE).unwrap(),
            vec!["enp5s0".to_string(), "lo".to_string(), "wlp4s0".to_string()]
        );

        let mut rx = CounterHandle::open(&counters, NETWORK_INTERFACE, BYTES_RECEIVED_PER_SEC, "enp5s0").unwrap();
        assert_eq!(rx.next_value().unwrap(), Some(0.0));
        write(dir.path(), "sys/class/net/enp5s0/statistics/rx_bytes", "501000\n");
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(rx.next_value().unwrap().unwrap() > 0.0);

        assert!(matches!(
            counters.open(NETWORK_INTERFACE, BYTES_SENT_PER_SEC, "eth9"),
            Err(Error::CounterInstanceMissing { .. })
        ));
    }

    #[test]
    fn test_interfaces() {
        let dir = fixture();
        let interfaces = SysfsInterfaces::with_root(dir.path()).interfaces().unwrap();
        let monitorable: Vec<&str> = interfaces
            .iter()
            .filter(|i| i.is_monitorable())
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(monitorable, vec!["enp5s0"]);

        let wifi = interfaces.iter().find(|i| i.name == "wlp4s0").unwrap();
        assert_eq!(wifi.interface_type, InterfaceType::Wireless80211);
        assert_eq!(wifi.status, OperationalStatus::Down);
        assert!(wifi.physical_address.is_empty());

        let eth = interfaces.iter().find(|i| i.name == "enp5s0").unwrap();
        assert_eq!(eth.formatted_address(), "A8:5E:45:01:02:0F");
        assert_eq!(eth.description, "enp5s0");
    }
}
