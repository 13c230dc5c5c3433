//! gridsite command-line interface.
//!
//! Coordinate lookups, time-series extraction and slice-read benchmarks over
//! gridded and site-based HDF5 datasets.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use gridsite_algorithms::{BoundsConfig, DEFAULT_SAMPLES_PER_EDGE};
use gridsite_core::{GridBounds, GridIndex, LatLon, TimeIndex};
use gridsite_io::{
    write_subset, AxisSlice, BoxSelection, ChunkConfig, DataStore, GridConfig, GridResource,
    Hdf5Store, SeriesStats, SiteConfig, SiteResource, DEFAULT_BATCH_SIZE,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Store(#[from] gridsite_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] gridsite_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Coordinate lookups and time-series extraction for meteorological HDF5
/// datasets.
#[derive(Parser)]
#[command(name = "gridsite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List variables, shapes and chunk layout
    Info {
        /// Dataset path
        input: String,
    },

    /// Resolve a coordinate on the grid and print a short window
    Point {
        /// Dataset path
        input: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Variable(s) to read
        #[arg(
            long = "variable",
            default_values_t = ["windspeed_100m".to_string(), "winddirection_100m".to_string()]
        )]
        variables: Vec<String>,

        /// First time step
        #[arg(long, default_value = "0")]
        start: usize,

        /// Time step after the last one
        #[arg(long, default_value = "24")]
        stop: usize,
    },

    /// Read a full time series in batches
    Timeseries {
        /// Dataset path
        input: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Variable to read
        #[arg(long)]
        variable: String,

        /// Treat the dataset as site-based (nearest site instead of grid cell)
        #[arg(long)]
        site: bool,

        /// Time steps per read
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Concurrent batch reads
        #[arg(long)]
        parallel: Option<usize>,

        /// Shift timestamps to the site's local time (site datasets only)
        #[arg(long)]
        local: bool,

        /// Write the series to a CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract a lat/lon rectangle into a new HDF5 file
    Box {
        /// Dataset path
        input: String,

        /// South-west corner as LAT,LON
        #[arg(long, value_parser = parse_coord, allow_hyphen_values = true)]
        sw: LatLon,

        /// North-east corner as LAT,LON
        #[arg(long, value_parser = parse_coord, allow_hyphen_values = true)]
        ne: LatLon,

        /// Variable(s) to extract
        #[arg(
            long = "variable",
            default_values_t = ["windspeed_100m".to_string(), "winddirection_100m".to_string()]
        )]
        variables: Vec<String>,

        #[arg(long, default_value = "0")]
        tmin: usize,

        #[arg(long, default_value = "24")]
        tmax: usize,

        /// Time stride
        #[arg(long, default_value = "1")]
        tskip: usize,

        /// Spatial stride
        #[arg(long, default_value = "1")]
        skip: usize,

        /// Samples per rectangle edge
        #[arg(long, default_value_t = DEFAULT_SAMPLES_PER_EDGE)]
        samples: usize,

        /// Output HDF5 file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Values at every contiguous-US site for the step nearest a timestamp
    Timestep {
        /// Dataset path
        input: String,

        #[arg(long)]
        variable: String,

        /// Timestamp, e.g. "2012-07-04 12:00:00"
        #[arg(long)]
        at: String,
    },

    /// Every step of one day at every contiguous-US site
    Day {
        /// Dataset path
        input: String,

        #[arg(long)]
        variable: String,

        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,

        /// Select the day in mean local time
        #[arg(long)]
        local: bool,
    },

    /// Time random full-length column reads
    Bench {
        /// Dataset path
        input: String,

        #[arg(long, default_value = "wind_speed")]
        variable: String,

        /// Number of distinct columns to read
        #[arg(long, default_value = "10")]
        samples: usize,

        /// RNG seed for reproducible column choice
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_coord(raw: &str) -> std::result::Result<LatLon, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {raw:?}"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let lon = lon.trim().parse::<f64>().map_err(|e| e.to_string())?;
    LatLon::new(lat, lon).validate().map_err(|e| e.to_string())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stats(label: &str, stats: Option<SeriesStats>) {
    match stats {
        Some(s) => println!(
            "{} min: {:8.2} max: {:8.2} mean: {:8.2} ({} values)",
            label, s.min, s.max, s.mean, s.count
        ),
        None => println!("{} no values", label),
    }
}

#[derive(Serialize)]
struct VariableInfo {
    name: String,
    shape: Vec<usize>,
    chunks: Option<Vec<usize>>,
    scale_factor: Option<f64>,
}

#[derive(Serialize)]
struct PointReport {
    index: GridIndex,
    coordinate: LatLon,
    variables: Vec<(String, Vec<f64>)>,
}

#[derive(Serialize)]
struct SeriesReport {
    index: String,
    stats: Option<SeriesStats>,
}

#[derive(Serialize)]
struct BoxReport {
    bounds: GridBounds,
    variables: Vec<(String, Vec<usize>)>,
    output: PathBuf,
}

#[derive(Serialize)]
struct DayReport {
    date: NaiveDate,
    first: Option<NaiveDateTime>,
    steps: usize,
    sites: usize,
    stats: Option<SeriesStats>,
}

#[derive(Serialize)]
struct BenchRead {
    index: usize,
    stats: Option<SeriesStats>,
    seconds: f64,
}

/// Time index of a dataset, `None` when it has none.
///
/// A time variable that exists but cannot be read or parsed is an error.
fn time_axis<S: DataStore>(store: &S) -> Result<Option<TimeIndex>> {
    let Some(name) = ["time_index", "datetime"]
        .into_iter()
        .find(|name| store.contains(name))
    else {
        log::debug!("no time variable, writing step numbers");
        return Ok(None);
    };
    let raw = store.read_strings(name)?;
    Ok(Some(TimeIndex::parse(raw.as_slice())?))
}

fn write_csv(path: &Path, variable: &str, times: Option<&TimeIndex>, values: &[f64]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "time,{}", variable)?;
    for (i, v) in values.iter().enumerate() {
        match times.and_then(|t| t.get(i)) {
            Some(t) => writeln!(out, "{},{}", t.format("%Y-%m-%d %H:%M:%S"), v)?,
            None => writeln!(out, "{},{}", i, v)?,
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json = cli.json;

    match cli.command {
        Commands::Info { input } => {
            let store = Hdf5Store::open(&input)?;
            let mut infos = Vec::new();
            for name in store.variables()? {
                // Groups (e.g. the meta table) have no dataset layout.
                let Ok(chunks) = store.chunks(&name) else {
                    infos.push(VariableInfo {
                        name,
                        shape: Vec::new(),
                        chunks: None,
                        scale_factor: None,
                    });
                    continue;
                };
                infos.push(VariableInfo {
                    shape: store.shape(&name)?,
                    scale_factor: store.attr_f64(&name, "scale_factor")?,
                    chunks,
                    name,
                });
            }

            if json {
                return print_json(&infos);
            }
            println!("File: {}", store.location());
            for info in &infos {
                println!(
                    "{:<24} shape: {:<20} chunks: {:<20} scale_factor: {}",
                    info.name,
                    format!("{:?}", info.shape),
                    info.chunks
                        .as_ref()
                        .map_or_else(|| "contiguous".to_string(), |c| format!("{:?}", c)),
                    info.scale_factor
                        .map_or_else(|| "-".to_string(), |s| s.to_string()),
                );
            }
        }

        Commands::Point {
            input,
            lat,
            lon,
            variables,
            start,
            stop,
        } => {
            let grid = GridResource::load(Hdf5Store::open(&input)?, &GridConfig::default())?;
            let point = LatLon::new(lat, lon);
            let index = grid.resolve(point)?;
            let coordinate = grid.coordinate(index)?;
            let mut report = PointReport {
                index,
                coordinate,
                variables: Vec::with_capacity(variables.len()),
            };
            for variable in variables {
                let window = grid.point_window(&variable, point, start..stop)?;
                report.variables.push((variable, window.to_vec()));
            }

            if json {
                return print_json(&report);
            }
            println!(
                "({}, {}) -> row {} col {} at ({:.5}, {:.5})",
                lat, lon, index.row, index.col, coordinate.lat, coordinate.lon
            );
            let names: Vec<&str> = report.variables.iter().map(|(n, _)| n.as_str()).collect();
            println!("step,{}", names.join(","));
            for step in 0..report.variables.first().map_or(0, |(_, v)| v.len()) {
                let row: Vec<String> = report
                    .variables
                    .iter()
                    .map(|(_, v)| v.get(step).map_or_else(String::new, |x| format!("{:10.5}", x)))
                    .collect();
                println!("{},{}", start + step, row.join(","));
            }
        }

        Commands::Timeseries {
            input,
            lat,
            lon,
            variable,
            site,
            batch_size,
            parallel,
            local,
            output,
        } => {
            let mut chunk = ChunkConfig::default().try_with_batch_size(batch_size)?;
            if let Some(threads) = parallel {
                chunk = chunk.try_with_parallelism(threads)?;
            }
            let point = LatLon::new(lat, lon);
            let store = Hdf5Store::open(&input)?;
            let started = Instant::now();

            let (label, times, values) = if site {
                let sites = SiteResource::load(store, &SiteConfig::default().with_chunk(chunk))?;
                let series = sites.timeseries(&variable, point, local)?;
                (format!("site {}", series.site), Some(series.times), series.values)
            } else {
                if local {
                    return Err(CliError::Usage(
                        "--local needs site metadata; add --site".to_string(),
                    ));
                }
                let grid = GridResource::load(store, &GridConfig::default().with_chunk(chunk))?;
                let index = grid.resolve(point)?;
                let values = grid.timeseries(&variable, point)?;
                (
                    format!("row {} col {}", index.row, index.col),
                    time_axis(grid.store())?,
                    values,
                )
            };
            let elapsed = started.elapsed();
            let values = values.to_vec();

            if let Some(path) = &output {
                write_csv(path, &variable, times.as_ref(), &values)?;
                log::info!("wrote {} values to {}", values.len(), path.display());
            }

            let report = SeriesReport {
                index: label,
                stats: SeriesStats::from_values(&values),
            };
            if json {
                return print_json(&report);
            }
            print_stats(&format!("{} {}", variable, report.index), report.stats);
            println!("read in {:.2} s", elapsed.as_secs_f64());
        }

        Commands::Box {
            input,
            sw,
            ne,
            variables,
            tmin,
            tmax,
            tskip,
            skip,
            samples,
            output,
        } => {
            let grid = GridResource::load(Hdf5Store::open(&input)?, &GridConfig::default())?;
            let bounds = grid.resolve_bounds(
                sw,
                ne,
                &BoundsConfig::default()
                    .with_samples_per_edge(samples)
                    .with_parallel(true),
            )?;
            let selection = BoxSelection::default()
                .with_time(tmin..tmax)
                .with_tskip(tskip)
                .with_skip(skip);

            let mut datasets = Vec::with_capacity(variables.len() + 1);
            for variable in variables {
                let block = grid.extract_box(&variable, &bounds, &selection)?;
                datasets.push((variable, block));
            }
            datasets.push((
                "coordinates".to_string(),
                grid.coordinates_box(&bounds, selection.skip)?,
            ));
            write_subset(&output, &datasets)?;

            let report = BoxReport {
                bounds,
                variables: datasets
                    .iter()
                    .map(|(name, data)| (name.clone(), data.shape().to_vec()))
                    .collect(),
                output,
            };
            if json {
                return print_json(&report);
            }
            println!(
                "rows {}..={} cols {}..={}",
                bounds.min.row, bounds.max.row, bounds.min.col, bounds.max.col
            );
            for (name, shape) in &report.variables {
                println!("  {:<24} {:?}", name, shape);
            }
            println!("wrote {}", report.output.display());
        }

        Commands::Timestep {
            input,
            variable,
            at,
        } => {
            let at = gridsite_core::parse_timestamp(&at)?;
            let sites = SiteResource::load(Hdf5Store::open(&input)?, &SiteConfig::default())?;
            let snapshot = sites.timestep_snapshot(&variable, at)?;

            if json {
                return print_json(&snapshot);
            }
            println!(
                "step {} ({}) at {} sites",
                snapshot.step,
                snapshot.time,
                snapshot.sites.len()
            );
            print_stats(&variable, SeriesStats::from_values(&snapshot.values));
        }

        Commands::Day {
            input,
            variable,
            date,
            local,
        } => {
            let sites = SiteResource::load(Hdf5Store::open(&input)?, &SiteConfig::default())?;
            let day = sites.day(&variable, date, local)?;
            let report = DayReport {
                date,
                first: day.times.first().copied(),
                steps: day.values.nrows(),
                sites: day.sites.len(),
                stats: SeriesStats::from_values(&day.values),
            };

            if json {
                return print_json(&report);
            }
            println!(
                "{}: steps {}..{} x {} sites",
                date, day.steps.start, day.steps.end, report.sites
            );
            print_stats(&variable, report.stats);
        }

        Commands::Bench {
            input,
            variable,
            samples,
            seed,
        } => {
            let store = Hdf5Store::open(&input)?;
            let shape = store.shape(&variable)?;
            if shape.len() != 2 {
                return Err(CliError::Usage(format!(
                    "{} has shape {:?}; bench reads (time, site) variables",
                    variable, shape
                )));
            }
            println!("{}: {:?}", variable, shape);
            println!("chunks: {:?}", store.chunks(&variable)?);

            let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
            let mut indices =
                rand::seq::index::sample(&mut rng, shape[1], samples.min(shape[1])).into_vec();
            indices.sort_unstable();

            let mut reads = Vec::with_capacity(indices.len());
            for index in indices {
                let started = Instant::now();
                let column =
                    store.read_slice(&variable, &[AxisSlice::full(), AxisSlice::index(index)])?;
                let seconds = started.elapsed().as_secs_f64();
                let read = BenchRead {
                    index,
                    stats: SeriesStats::from_values(&column),
                    seconds,
                };
                if !json {
                    match read.stats {
                        Some(s) => println!(
                            "{}[:, {:8}] min: {:8.2} max: {:8.2} mean: {:8.2} ({:.2} s)",
                            variable, index, s.min, s.max, s.mean, seconds
                        ),
                        None => println!("{}[:, {:8}] empty ({:.2} s)", variable, index, seconds),
                    }
                }
                reads.push(read);
            }

            if json {
                return print_json(&reads);
            }
            if !reads.is_empty() {
                let avg = reads.iter().map(|r| r.seconds).sum::<f64>() / reads.len() as f64;
                println!("avg time: {:.2} s", avg);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_time_axis_propagates_bad_stamps() {
        let mut store = gridsite_io::MemoryStore::new();
        assert!(time_axis(&store).unwrap().is_none());

        store.insert_strings("time_index", vec!["2012-01-01 00:00:00".to_string()]);
        assert_eq!(time_axis(&store).unwrap().map(|t| t.len()), Some(1));

        store.insert_strings("time_index", vec!["not a time".to_string()]);
        assert!(matches!(time_axis(&store), Err(CliError::Core(_))));
    }

    #[test]
    fn test_parse_coord() {
        assert_eq!(
            parse_coord("36.97, -109.05").unwrap(),
            LatLon::new(36.97, -109.05)
        );
        assert!(parse_coord("36.97").is_err());
        assert!(parse_coord("136.0,-109.0").is_err());
    }

    #[test]
    fn test_box_arguments() {
        let cli = Cli::try_parse_from([
            "gridsite",
            "box",
            "wtk.h5",
            "--sw",
            "36.96744946416934,-109.05029296875",
            "--ne",
            "41.02964338716638,-102.0849609375",
            "--output",
            "out.h5",
        ])
        .unwrap();
        match cli.command {
            Commands::Box {
                sw, variables, tmax, ..
            } => {
                assert_eq!(sw.lon, -109.050_292_968_75);
                assert_eq!(variables, vec!["windspeed_100m", "winddirection_100m"]);
                assert_eq!(tmax, 24);
            }
            _ => panic!("expected box"),
        }
    }
}
