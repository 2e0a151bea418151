//! Probe command: dump the card's mode-setting resources

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use krypton_core::{DisplayDevice, PixelFormat};

#[derive(Args)]
pub struct ProbeArgs {
    /// DRM device node to probe
    #[arg(short, long, default_value = "/dev/dri/card0")]
    device: PathBuf,
}

pub fn run(args: ProbeArgs) -> Result<()> {
    let device = DisplayDevice::open(&args.device)
        .with_context(|| format!("opening {}", args.device.display()))?;

    let res = device.resources().context("enumerating resources")?;
    println!("Device: {}", args.device.display());
    println!(
        "Resources: {} connectors, {} encoders, {} CRTCs",
        res.connectors.len(),
        res.encoders.len(),
        res.crtcs.len()
    );

    for &id in &res.connectors {
        let conn = match device.connector(id) {
            Ok(c) => c,
            Err(e) => {
                println!("  Connector {id}: probe failed ({e})");
                continue;
            }
        };
        println!(
            "  Connector {} ({}): {}",
            id,
            conn.type_name(),
            if conn.connected() {
                "connected"
            } else {
                "disconnected"
            }
        );
        for (i, mode) in conn.modes.iter().enumerate() {
            let marker = if i == 0 { " (preferred)" } else { "" };
            println!("    {} {}{}", mode.name(), mode, marker);
        }
    }

    let formats = device.plane_formats().context("enumerating plane formats")?;
    print!("Scanout formats:");
    for fourcc in &formats {
        print!(" {}", PixelFormat::fourcc_string(*fourcc));
    }
    println!();

    Ok(())
}
