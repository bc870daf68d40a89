use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_boundaries::config::{load_user_config, UserConfig};
use osm_boundaries::errors::Result;
use osm_boundaries::etl::boundaries::BoundaryEtl;
use osm_boundaries::etl::parse_osm::ParseOsmEtl;
use osm_boundaries::etl::Etl;

/// Assemble boundary polygons for OSM ways and relations.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON file naming the OSM dump and the elements to assemble
    #[arg(long, default_value = "config/boundaries.json")]
    config: PathBuf,

    /// Overrides `output_dir` from the config file
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Drop cached output and recompute every step
    #[arg(long, default_value_t = false)]
    clean: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn create_output_dir(config: &UserConfig, output_dir: Option<PathBuf>) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = output_dir
        .unwrap_or_else(|| PathBuf::from(&config.output_dir))
        .join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let user_config = load_user_config(&args.config)?;
    let output_dir = create_output_dir(&user_config, args.output_dir)?;
    let output_dir_str = output_dir.display().to_string();
    info!(output_dir = output_dir_str.as_str(), elements = user_config.elements.len(); "Starting run");

    ParseOsmEtl::new(&user_config).process(&output_dir, args.clean)?;
    BoundaryEtl::new(&user_config).process(&output_dir, args.clean)?;
    Ok(())
}
