//! Example: factorize a synthetic light field of a tilted plane
//!
//! Builds a light field whose views are shifted copies of a gradient texture,
//! factorizes it into rank-2 mask stacks and prints the PSNR trace.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example synthetic_factorization
//! RUST_LOG=debug cargo run --example synthetic_factorization
//! ```

use std::sync::Arc;
use std::time::Instant;

use common::log_setup::{LogConfig, setup_logging};
use lightfield::{
    FactorizeConfig, FactorizeProgress, FactorizeStage, LightField, Matrix, ProgressCallback,
    factorize_with_progress,
};

const ROWS: usize = 32;
const COLS: usize = 48;
const VIEWS: usize = 5;
const RANK: usize = 2;

fn texture(v: isize, u: isize) -> f64 {
    let v = v.clamp(0, ROWS as isize - 1) as f64 / ROWS as f64;
    let u = u.clamp(0, COLS as isize - 1) as f64 / COLS as f64;
    0.1 + 0.8 * (0.5 + 0.5 * (6.0 * u).sin() * (4.0 * v).cos())
}

fn main() -> anyhow::Result<()> {
    setup_logging(LogConfig::default());

    let half = (VIEWS - 1) as isize / 2;
    let light_field = LightField::from_fn([ROWS, COLS, VIEWS, VIEWS], |v, u, b, a| {
        // A plane half-way between the masks: each view shifts by one pixel
        texture(
            v as isize + b as isize - half,
            u as isize + a as isize - half,
        )
    })?;

    let n = light_field.pixel_count();
    let config = FactorizeConfig::default()
        .with_iterations(30)
        .with_min_psnr(40.0)
        .with_psnr_trace();

    let progress = ProgressCallback::new(Arc::new(|p: FactorizeProgress| {
        if p.stage != FactorizeStage::Updating {
            tracing::info!(iteration = p.iteration, psnr = ?p.psnr, stage = %p.stage, "Done");
        }
    }));

    let start = Instant::now();
    let result = factorize_with_progress(
        &light_field,
        &Matrix::filled(n, RANK, 0.5),
        &Matrix::filled(RANK, n, 0.5),
        &config,
        progress,
    )?;
    let elapsed = start.elapsed();

    tracing::info!(
        iterations = result.iterations_run,
        elapsed_ms = elapsed.as_millis() as u64,
        "Factorization finished"
    );
    if let Some(trace) = &result.psnr {
        for (i, psnr) in trace.iter().enumerate().take(result.iterations_run) {
            println!("iteration {:3}: {:6.2} dB", i + 1, psnr);
        }
    }

    for (r, layer) in result.rear_layers().iter().enumerate() {
        let mean = layer.data().iter().sum::<f64>() / layer.data().len() as f64;
        println!("rear layer {r}: mean weight {mean:.3}");
    }
    for (r, layer) in result.front_layers().iter().enumerate() {
        let mean = layer.data().iter().sum::<f64>() / layer.data().len() as f64;
        println!("front layer {r}: mean weight {mean:.3}");
    }

    Ok(())
}
