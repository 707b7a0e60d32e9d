//! model_export - prepare a detection model for the station
//!
//! Loads an ONNX model, runs the same optimization pass the station applies
//! at startup, and reports timing plus a single warm-up inference. A model
//! that fails here will also fail in `sorterd`, so run this after every
//! retraining before deploying.

use anyhow::{Context, Result};
use clap::Parser;

use sort_station::ui::StageReporter;
use sort_station::{DetectorBackend, TractBackend};

#[derive(Parser, Debug)]
#[command(name = "model_export", about = "Validate and optimize a detection model")]
struct Args {
    /// ONNX model to load
    #[arg(default_value = "best.onnx")]
    model: String,

    /// Input width the station will feed the model
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Input height the station will feed the model
    #[arg(long, default_value_t = 480)]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = StageReporter::auto();

    let size = std::fs::metadata(&args.model)
        .with_context(|| format!("cannot read model {}", args.model))?
        .len();

    let mut backend = {
        let _stage = ui.stage("loading and optimizing model");
        TractBackend::new(&args.model, args.width, args.height)
            .with_context(|| format!("failed to load model {}", args.model))?
    };

    {
        let _stage = ui.stage("running warm-up inference");
        backend.warm_up().context("warm-up inference failed")?;
    }

    println!(
        "{}: ok ({:.1} MB, {}x{} input)",
        args.model,
        size as f64 / (1024.0 * 1024.0),
        args.width,
        args.height
    );
    Ok(())
}
