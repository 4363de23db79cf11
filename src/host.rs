use crate::models::NetworkMode;
use std::fs;
use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::System;

pub trait Network: Send + Sync {
    fn current_ip(&self) -> String;
    fn current_mac(&self) -> String;
    /// 0 when not associated.
    fn signal_strength(&self) -> i32;
    fn mode(&self) -> NetworkMode;
    fn is_associated(&self) -> bool;
}

pub trait Platform: Send + Sync {
    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
    fn free_memory(&self) -> u64;
    fn has_external_ram(&self) -> bool;
    fn restart(&self);
}

pub trait StaticFiles: Send + Sync {
    fn read(&self, path: &str) -> Option<Vec<u8>>;
}

pub struct HostNetwork {
    mac: String,
}

impl HostNetwork {
    pub fn new() -> Self {
        let mac = mac_address::get_mac_address()
            .ok()
            .flatten()
            .map(|mac| mac.to_string())
            .unwrap_or_else(|| "00:00:00:00:00:00".to_string());
        Self { mac }
    }

    /// First non-loopback IPv4 interface as `(name, address)`.
    fn ipv4() -> Option<(String, String)> {
        let ifaces = get_if_addrs::get_if_addrs().ok()?;
        ifaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .find_map(|iface| match iface.ip() {
                IpAddr::V4(addr) => Some((iface.name.clone(), addr.to_string())),
                IpAddr::V6(_) => None,
            })
    }
}

/// Soft-AP interfaces are conventionally named `ap0`, `uap0`.
fn is_access_point(name: &str) -> bool {
    name.starts_with("ap") || name.starts_with("uap")
}

impl Network for HostNetwork {
    fn current_ip(&self) -> String {
        Self::ipv4()
            .map(|(_, ip)| ip)
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    fn current_mac(&self) -> String {
        self.mac.clone()
    }

    fn signal_strength(&self) -> i32 {
        0
    }

    fn mode(&self) -> NetworkMode {
        match Self::ipv4() {
            Some((name, _)) if is_access_point(&name) => NetworkMode::Ap,
            Some(_) => NetworkMode::Sta,
            None => NetworkMode::Other,
        }
    }

    fn is_associated(&self) -> bool {
        self.mode() == NetworkMode::Sta
    }
}

pub struct HostPlatform {
    started: Instant,
    external_ram: bool,
    system: Mutex<System>,
}

impl HostPlatform {
    pub fn new(external_ram: bool) -> Self {
        Self {
            started: Instant::now(),
            external_ram,
            system: Mutex::new(System::new()),
        }
    }
}

impl Platform for HostPlatform {
    fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn free_memory(&self) -> u64 {
        let mut system = match self.system.lock() {
            Ok(system) => system,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_memory();
        system.available_memory()
    }

    fn has_external_ram(&self) -> bool {
        self.external_ram
    }

    fn restart(&self) {
        tracing::warn!("restarting");
        std::process::exit(0);
    }
}

pub struct DirectoryFiles {
    root: PathBuf,
}

impl DirectoryFiles {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl StaticFiles for DirectoryFiles {
    fn read(&self, path: &str) -> Option<Vec<u8>> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return None;
        }
        fs::read(full).ok()
    }
}
