use crate::config::{self, AppConfig};
use anyhow::{Context, Result};
use std::fs;

const SYSTEMD_UNIT_PATH: &str = "/etc/systemd/system/camfeed-device.service";

pub fn run_install() -> Result<()> {
    match config::load_config()? {
        (_, Some(existing)) => println!("Keeping existing config: {}", existing.display()),
        (_, None) => {
            let config_path = config::write_config(&AppConfig::default())?;
            println!("Wrote config: {}", config_path.display());
        }
    }

    fs::write(SYSTEMD_UNIT_PATH, systemd_unit()).context("write systemd unit")?;
    println!("Wrote systemd unit: {}", SYSTEMD_UNIT_PATH);

    println!();
    println!("Next steps:");
    println!("  put the UI bundle in the configured static_dir");
    println!("  put JPEG frames in the configured frames_dir");
    println!("  systemctl daemon-reload");
    println!("  systemctl enable --now camfeed-device");
    Ok(())
}

/// `Restart=always` is what turns the reboot endpoints' process exit into a restart.
fn systemd_unit() -> String {
    [
        "[Unit]",
        "Description=Camfeed device control plane",
        "After=network-online.target",
        "",
        "[Service]",
        "Type=simple",
        "ExecStart=/usr/local/bin/camfeed-device run",
        "Restart=always",
        "RestartSec=2",
        "",
        "[Install]",
        "WantedBy=multi-user.target",
        "",
    ]
    .join("\n")
}
