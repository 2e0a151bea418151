//! Test command: present a moving pattern until interrupted

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use krypton_core::{ConfigFile, DisplayConfig, Pipeline, PixelFormat, TestPatternSource};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[derive(Args)]
pub struct TestArgs {
    /// DRM device node (overrides the config file)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Pattern width in pixels
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Pattern height in pixels
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Pattern frame rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Stop after this many frames (default: run until Ctrl-C)
    #[arg(long)]
    frames: Option<u64>,
}

pub fn run(args: TestArgs) -> Result<()> {
    let file = ConfigFile::load().context("loading config")?;
    let mut config = DisplayConfig {
        width: args.width,
        height: args.height,
        format: PixelFormat::Nv12,
        ..file.display
    };
    if let Some(device) = args.device {
        config.device = device;
    }

    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
    }

    let mut source = TestPatternSource::new(args.width, args.height, args.fps);
    if let Some(frames) = args.frames {
        source = source.with_frame_limit(frames);
    }

    let mut pipeline = Pipeline::new(config)?;
    pipeline.start().context("starting pipeline")?;
    info!(
        "Presenting {}x{} test pattern at {} fps (Ctrl-C to stop)",
        args.width, args.height, args.fps
    );

    while !INTERRUPTED.load(Ordering::SeqCst) {
        if !pipeline.process(&mut source)? {
            break;
        }
    }

    pipeline.stop();
    println!("{}", pipeline.stats());
    Ok(())
}
