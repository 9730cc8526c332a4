//! Oracles consulted by resolution and gating.
//!
//! Both traits are synchronous and side-effect free. Failures surface as
//! [`Error::OracleUnavailable`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

/// Answers whether an artifact is already present on local storage.
///
/// Presence is the only staleness signal. A version-aware implementation can
/// be substituted here without touching resolution.
pub trait ExistenceOracle: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;
}

/// Answers whether the active network is unmetered (wifi-class).
pub trait ConnectivityOracle: Send + Sync {
    fn is_unmetered(&self) -> Result<bool>;
}

/// Existence check against the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsExistence;

impl ExistenceOracle for FsExistence {
    fn exists(&self, path: &Path) -> Result<bool> {
        path.try_exists()
            .map_err(|e| Error::oracle("existence", format!("cannot stat {}: {}", path.display(), e)))
    }
}

/// Connectivity pinned to a fixed answer (configuration override, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedConnectivity {
    unmetered: bool,
}

impl FixedConnectivity {
    pub fn unmetered() -> Self {
        Self { unmetered: true }
    }

    pub fn metered() -> Self {
        Self { unmetered: false }
    }
}

impl ConnectivityOracle for FixedConnectivity {
    fn is_unmetered(&self) -> Result<bool> {
        Ok(self.unmetered)
    }
}

/// Interface name prefixes used by cellular modems and point-to-point links.
const METERED_PREFIXES: &[&str] = &["wwan", "wwp", "rmnet", "ccmni", "ppp"];

/// Linux connectivity reading from procfs and sysfs.
///
/// The interface carrying the default route decides: it is metered when the
/// kernel reports it as a `wwan` device or its name is a cellular/ppp name.
/// Everything else (wifi, ethernet) counts as unmetered.
#[derive(Debug, Clone)]
pub struct SysfsConnectivity {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for SysfsConnectivity {
    fn default() -> Self {
        Self::with_roots("/proc", "/sys")
    }
}

impl SysfsConnectivity {
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    /// Name of the interface that carries the default route.
    ///
    /// The IPv4 table is consulted first; IPv6-only hosts are answered from
    /// `net/ipv6_route`.
    pub fn default_route_interface(&self) -> Result<String> {
        let ipv4 = self.read_table("net/route")?;
        if let Some(iface) = ipv4_default(&ipv4) {
            return Ok(iface);
        }

        // Missing ipv6_route means IPv6 is disabled, not an error.
        let ipv6 = self.read_table("net/ipv6_route").unwrap_or_default();
        ipv6_default(&ipv6).ok_or_else(|| Error::oracle("connectivity", "no active default route"))
    }

    fn read_table(&self, name: &str) -> Result<String> {
        let path = self.proc_root.join(name);
        fs::read_to_string(&path).map_err(|e| {
            Error::oracle(
                "connectivity",
                format!("cannot read {}: {}", path.display(), e),
            )
        })
    }

    fn is_metered_interface(&self, iface: &str) -> bool {
        if METERED_PREFIXES.iter().any(|p| iface.starts_with(p)) {
            return true;
        }
        let uevent = self.sys_root.join("class/net").join(iface).join("uevent");
        fs::read_to_string(uevent)
            .map(|raw| raw.lines().any(|l| l.trim() == "DEVTYPE=wwan"))
            .unwrap_or(false)
    }
}

const RTF_UP: u32 = 0x0001;
const RTF_REJECT: u32 = 0x0200;

/// `Iface Destination Gateway Flags ...`, hex fields, one header line.
fn ipv4_default(table: &str) -> Option<String> {
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (iface, dest, flags) = (fields.first()?, fields.get(1)?, fields.get(3)?);
        let flags = u32::from_str_radix(flags, 16).ok()?;
        (*dest == "00000000" && flags & RTF_UP != 0).then(|| iface.to_string())
    })
}

/// `dest dest_len src src_len next_hop metric refcnt use flags iface`, no
/// header. The kernel lists `::/0` reject routes on `lo`; those are skipped.
fn ipv6_default(table: &str) -> Option<String> {
    table.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            return None;
        }
        let (dest, dest_len, iface) = (fields[0], fields[1], fields[9]);
        let flags = u32::from_str_radix(fields[8], 16).ok()?;
        let is_default = dest.bytes().all(|b| b == b'0') && dest_len == "00";
        let usable = flags & RTF_UP != 0 && flags & RTF_REJECT == 0 && iface != "lo";
        (is_default && usable).then(|| iface.to_string())
    })
}

impl ConnectivityOracle for SysfsConnectivity {
    fn is_unmetered(&self) -> Result<bool> {
        let iface = self.default_route_interface()?;
        let metered = self.is_metered_interface(&iface);
        debug!(iface = %iface, metered, "classified active network");
        Ok(!metered)
    }
}
