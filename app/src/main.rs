use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use glob::glob;
use log::LevelFilter;
use serde::Serialize;

use pcd_parser::parsers::las::LasParser;
use pcd_patchwork::{
    config::DonorAlignment,
    donor::{CsvDonorLocator, DirectoryDonorLocator, DonorLocator},
    merge_and_write,
    tile::tile_origin_from_bounds,
    MergeOutcome, PatchworkConfig, PatchworkError,
};

#[derive(Parser, Debug)]
#[command(
    name = "Patchwork",
    about = "Fills the gaps of a LiDAR tile with the points of an older survey",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    #[arg(short, long, required = true, value_name = "FILE")]
    recipient: PathBuf,

    /// Donor files, glob patterns are expanded
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["donor_csv", "donor_dir"])]
    donor: Vec<String>,

    /// Matching table with `recipient_file` and `donor_file` columns
    #[arg(long, value_name = "FILE", conflicts_with = "donor_dir")]
    donor_csv: Option<PathBuf>,

    /// Directory holding donor tiles named after their coordinates
    #[arg(long, value_name = "DIR")]
    donor_dir: Option<PathBuf>,

    #[arg(long, value_name = "NAME", requires = "donor_dir")]
    donor_subdir: Option<String>,

    #[arg(short, long, required = true, value_name = "FILE")]
    output: PathBuf,

    #[arg(long, value_name = "FILE")]
    indices_map: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_delimiter = ',', value_name = "CLASSES")]
    donor_classes: Option<Vec<u8>>,

    #[arg(long, value_delimiter = ',', value_name = "CLASSES")]
    recipient_classes: Option<Vec<u8>>,

    #[arg(long, value_name = "NAME")]
    new_column: Option<String>,

    #[arg(long, value_name = "BITS")]
    new_column_size: Option<u32>,

    #[arg(long, value_name = "VALUE")]
    value_added_points: Option<i64>,

    /// Drop donor points outside the recipient tile instead of rejecting the donor
    #[arg(long)]
    crop_donor: bool,

    /// Writes a JSON summary of the merge
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Patchwork(#[from] PatchworkError),

    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    outcome: &'a MergeOutcome,
    occupied_patches: usize,
    indices_map: Option<&'a Path>,
}

fn load_config(args: &Cli) -> Result<PatchworkConfig, PatchworkError> {
    let mut config = match &args.config {
        Some(path) => PatchworkConfig::from_json_file(path)?,
        None => PatchworkConfig::default(),
    };

    if let Some(classes) = &args.donor_classes {
        config.donor_class_list = classes.clone();
    }
    if let Some(classes) = &args.recipient_classes {
        config.recipient_class_list = classes.clone();
    }
    if let Some(name) = &args.new_column {
        config.new_column = Some(name.clone());
    }
    if let Some(size) = args.new_column_size {
        config.new_column_size = size;
    }
    if let Some(value) = args.value_added_points {
        config.value_added_points = value;
    }
    if args.crop_donor {
        config.donor_alignment = DonorAlignment::Crop;
    }

    config.validate()?;
    Ok(config)
}

fn expand_globs(input_patterns: &[String]) -> Result<Vec<PathBuf>, PatchworkError> {
    let mut paths = Vec::new();
    for pattern in input_patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            for entry in glob(pattern)? {
                paths.push(entry.map_err(|error| error.into_error())?);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

fn find_donors(args: &Cli, config: &PatchworkConfig) -> Result<Vec<PathBuf>, PatchworkError> {
    let locator: Box<dyn DonorLocator> = match (&args.donor_csv, &args.donor_dir) {
        (Some(csv_path), _) => Box::new(CsvDonorLocator::new(csv_path, &config.mount_points)),
        (None, Some(root)) => Box::new(DirectoryDonorLocator {
            root: root.clone(),
            subdirectory: args.donor_subdir.clone(),
            tile_coordinate_factor: config.tile_coordinate_factor,
        }),
        (None, None) => return expand_globs(&args.donor),
    };

    let bounds = LasParser::new(&args.recipient)
        .bounds()?
        .ok_or_else(|| PatchworkError::EmptyInput(Some(args.recipient.clone())))?;
    let origin = tile_origin_from_bounds(&bounds, config.tile_size)?;

    match locator.locate(&args.recipient, origin) {
        Ok(donor) => Ok(donor.into_iter().collect()),
        Err(PatchworkError::DonorNotFound(key)) => {
            log::warn!("no donor file for tile {}", key);
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

fn write_report(path: &Path, report: &Report) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

fn run(args: &Cli) -> Result<(), CliError> {
    let config = load_config(args)?;
    log::debug!("configuration: {:?}", config);

    let donors = find_donors(args, &config)?;
    log::info!("donor files: {:?}", donors);

    let outcome = merge_and_write(&args.recipient, &donors, &args.output, &config)?;
    log::info!(
        "{} recipient points, {} added points, {} points written",
        outcome.recipient_points,
        outcome.added_points,
        outcome.output_points
    );

    write_side_outputs(args, &config, &outcome).map_err(|error| {
        log::error!(
            "{:?} is complete and was kept, only its side outputs failed",
            outcome.output
        );
        error
    })
}

// Runs once the merged file is in place.
fn write_side_outputs(
    args: &Cli,
    config: &PatchworkConfig,
    outcome: &MergeOutcome,
) -> Result<(), CliError> {
    if let Some(path) = &args.indices_map {
        match &outcome.occupancy {
            Some(occupancy) => occupancy.write_geotiff(path, config.crs_epsg)?,
            None => log::warn!("no tile origin for {:?}, indices map skipped", args.recipient),
        }
    }

    if let Some(path) = &args.report {
        let report = Report {
            outcome,
            occupied_patches: outcome.occupied_patches(),
            indices_map: args.indices_map.as_deref(),
        };
        write_report(path, &report)?;
    }
    Ok(())
}

fn main() {
    let args = Cli::parse();

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            if args.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        )
        .init();

    log::info!("recipient file: {:?}", args.recipient);
    log::info!("output file: {:?}", args.output);

    let start = std::time::Instant::now();
    log::info!("start processing...");

    if let Err(error) = run(&args) {
        log::error!("{}", error);
        std::process::exit(1);
    }

    log::info!("Elapsed: {:?}", start.elapsed());
    log::info!("Finish processing");
}

#[cfg(test)]
mod tests {
    use std::fs;

    use las::{point::Format, Builder as LasBuilder, Writer};
    use pcd_parser::layout::DimensionLayout;

    use super::*;

    fn write_tile(path: &Path, points: &[(f64, f64, u8)]) {
        let mut builder = LasBuilder::from((1, 4));
        builder.point_format = Format::new(6).unwrap();
        let header = builder.into_header().unwrap();
        let mut writer = Writer::from_path(path, header).unwrap();
        for (x, y, classification) in points {
            let mut point = las::Point {
                x: *x,
                y: *y,
                z: 1.0,
                gps_time: Some(0.0),
                ..Default::default()
            };
            DimensionLayout::set_classification(&mut point, *classification).unwrap();
            writer.write_point(point).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn test_cli_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, r#"{"tile_size": 500, "donor_class_list": [2]}"#).unwrap();

        let args = Cli::parse_from([
            "patchwork",
            "--recipient",
            "recipient.las",
            "--output",
            "out.las",
            "--config",
            config_path.to_str().unwrap(),
            "--recipient-classes",
            "2,6",
            "--new-column",
            "Origin",
            "--new-column-size",
            "16",
            "--crop-donor",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.tile_size, 500.0);
        assert_eq!(config.donor_class_list, vec![2]);
        assert_eq!(config.recipient_class_list, vec![2, 6]);
        assert_eq!(config.new_column.as_deref(), Some("Origin"));
        assert_eq!(config.new_column_size, 16);
        assert_eq!(config.donor_alignment, DonorAlignment::Crop);
    }

    #[test]
    fn test_invalid_override() {
        let args = Cli::parse_from([
            "patchwork",
            "-r",
            "recipient.las",
            "-o",
            "out.las",
            "--new-column",
            "Origin",
            "--new-column-size",
            "12",
        ]);
        let error = load_config(&args).unwrap_err();
        assert!(error.is_configuration_error());
    }

    #[test]
    fn test_donor_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "patchwork",
            "-r",
            "recipient.las",
            "-o",
            "out.las",
            "--donor",
            "donor.las",
            "--donor-csv",
            "matching.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_with_donor_directory() {
        let dir = tempfile::tempdir().unwrap();
        let donor_dir = dir.path().join("donors").join("lidar");
        fs::create_dir_all(&donor_dir).unwrap();
        let recipient = dir.path().join("recipient_1_3.las");
        write_tile(&recipient, &[(1000.5, 2999.5, 2), (1000.0, 2000.0, 2)]);
        write_tile(
            &donor_dir.join("donor_1_3.las"),
            &[(1000.5, 2999.5, 2), (1500.5, 2500.5, 9)],
        );

        let output = dir.path().join("out").join("merged.las");
        let indices_map = dir.path().join("out").join("indices.tif");
        let report = dir.path().join("out").join("report.json");
        let args = Cli::parse_from([
            "patchwork",
            "-r",
            recipient.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--donor-dir",
            dir.path().join("donors").to_str().unwrap(),
            "--donor-subdir",
            "lidar",
            "--indices-map",
            indices_map.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ]);
        run(&args).unwrap();

        let merged = LasParser::new(&output).bounds().unwrap().unwrap();
        assert_eq!(merged.max[0], 1500.5);
        assert!(indices_map.exists());

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(summary["added_points"], 1);
        assert_eq!(summary["output_points"], 3);
        assert_eq!(summary["occupied_patches"], 1);
        assert_eq!(summary["tile_origin"]["x"], 1000.0);
    }

    #[test]
    fn test_missing_donor_copies_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let recipient = dir.path().join("recipient.las");
        write_tile(&recipient, &[(1000.5, 2999.5, 2)]);
        let output = dir.path().join("merged.las");

        let args = Cli::parse_from([
            "patchwork",
            "-r",
            recipient.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--donor-dir",
            dir.path().join("nowhere").to_str().unwrap(),
        ]);
        run(&args).unwrap();
        assert_eq!(fs::read(&recipient).unwrap(), fs::read(&output).unwrap());
    }

    #[test]
    fn test_failed_report_keeps_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        let recipient = dir.path().join("recipient.las");
        write_tile(&recipient, &[(1000.5, 2999.5, 2)]);
        let output = dir.path().join("merged.las");
        let report = dir.path().join("report");
        fs::create_dir_all(&report).unwrap();

        let args = Cli::parse_from([
            "patchwork",
            "-r",
            recipient.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ]);
        let result = run(&args);
        assert!(matches!(result, Err(CliError::Io(_))));
        assert_eq!(fs::read(&recipient).unwrap(), fs::read(&output).unwrap());
    }
}
