//! Rectify image files with a saved camera parameter file.
//!
//! Usage: rectify <params.json> <alpha> <output_dir> <image>...
//!
//! Each output is written under the output folder with the `_undist`
//! suffix.

use std::path::PathBuf;

use camdist::calib::{CameraModel, CancelToken};
use camdist::pipeline::{rectify_files, Rectifier};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (params, alpha, out_dir) = match (args.next(), args.next(), args.next()) {
        (Some(params), Some(alpha), Some(out_dir)) => {
            (params, alpha.parse::<f64>()?, PathBuf::from(out_dir))
        }
        _ => {
            eprintln!("usage: rectify <params.json> <alpha> <output_dir> <image>...");
            std::process::exit(2);
        }
    };
    let inputs: Vec<PathBuf> = args.map(PathBuf::from).collect();

    let model = CameraModel::load(&params)?;
    log::info!("loaded camera model '{}'", model.camera_name);

    let mut rectifier = Rectifier::new(model, alpha)?;
    let stats = rectify_files(&mut rectifier, &inputs, &out_dir, &CancelToken::new())?;
    println!("rectified {} files, {} failed", stats.written, stats.failed);

    Ok(())
}
