//! Config command: print or install the sample configuration

use anyhow::{Context, Result};
use clap::Args;

use krypton_core::{ConfigFile, sample_config};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the sample config to the default location instead of printing it
    #[arg(long)]
    write: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    if !args.write {
        print!("{}", sample_config());
        return Ok(());
    }

    let path = ConfigFile::default_path().context("no config directory available")?;
    if path.exists() {
        anyhow::bail!("{} already exists, not overwriting", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&path, sample_config())
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
