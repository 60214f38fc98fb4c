//! Distortion Inspection Tool
//!
//! Loads a camera property file, creates the configured distortion model and
//! applies it to a set of normalized image points. Optionally reports the
//! round-trip accuracy of the numeric inverse over a regular grid.
//!
//! Usage:
//! ```bash
//! cargo run --example distortion_tool -- \
//!   --input-path samples/rad_tan.yaml \
//!   --point 0.3,-0.2 --point 0.5,0.4 \
//!   --grid 21
//! ```

use clap::Parser;
use flexi_logger::{colored_detailed_format, Logger};
use lens_distortion::util::{compute_round_trip_error, sample_grid};
use lens_distortion::{Distortion, DistortionModel, Properties};
use log::{error, info, warn};
use nalgebra::Vector2;
use std::path::PathBuf;

/// Lens distortion inspection tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the property file (.yaml, .json or key=value text)
    #[arg(short = 'p', long)]
    input_path: PathBuf,

    /// Camera id used to namespace the property keys
    #[arg(short = 'c', long)]
    camera_id: Option<u32>,

    /// Normalized point as `x,y`; may be repeated
    #[arg(long = "point", value_parser = parse_point)]
    points: Vec<Vector2<f64>>,

    /// Treat the points as distorted and undistort them
    #[arg(short = 'u', long)]
    undistort: bool,

    /// Samples per axis of the [-1, 1] grid used for the round-trip report
    #[arg(short = 'g', long, value_parser = clap::value_parser!(u16).range(1..=MAX_GRID_PER_AXIS))]
    grid: Option<u16>,
}

const MAX_GRID_PER_AXIS: i64 = 2000;

fn parse_point(value: &str) -> Result<Vector2<f64>, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{value}'"))?;
    let x = x.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok(Vector2::new(x, y))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep the handle alive so buffered records are flushed on exit
    let _logger = Logger::try_with_str("info")?
        .format(colored_detailed_format)
        .start()?;

    let cli = Cli::parse();

    let prop = Properties::load(&cli.input_path).map_err(|e| {
        error!("Failed to load {}: {}", cli.input_path.display(), e);
        e
    })?;
    info!(
        "Loaded {} properties from {}",
        prop.len(),
        cli.input_path.display()
    );

    let model = match Distortion::create(&prop, cli.camera_id)? {
        Some(model) => model,
        None => {
            warn!("No distortion configured, using identity");
            Distortion::Identity
        }
    };

    info!(
        "Model: {} with parameters {:?}",
        model.name(),
        model.parameters().as_slice()
    );

    for point in &cli.points {
        if cli.undistort {
            let solution = model.undistort_solution(point);
            info!(
                "({:.8}, {:.8}) -> ({:.8}, {:.8}) in {} iterations{}",
                point.x,
                point.y,
                solution.point.x,
                solution.point.y,
                solution.iterations,
                if solution.converged { "" } else { " (not converged)" }
            );
        } else {
            let distorted = model.distort(point);
            info!(
                "({:.8}, {:.8}) -> ({:.8}, {:.8})",
                point.x, point.y, distorted.x, distorted.y
            );
        }
    }

    if let Some(per_axis) = cli.grid {
        let grid = sample_grid(-1.0, 1.0, usize::from(per_axis));
        let stats = compute_round_trip_error(&model, &grid)?;
        info!("Round trip over {} points: {:?}", grid.len(), stats);
    }

    Ok(())
}
