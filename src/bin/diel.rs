//! Diel CLI - command-line interface for the diel analysis pipeline
//!
//! Commands:
//! - analyze: classify diel patterns and export the combined table
//! - validate: check a tracking export's schema and timestamps
//! - phases: print the configured phase calendar

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveTime;

use cichlid_diel::diel::DielTest;
use cichlid_diel::error::AnalysisError;
use cichlid_diel::ingest;
use cichlid_diel::pipeline::{AnalysisOptions, DielProcessor};
use cichlid_diel::types::Feature;
use cichlid_diel::{TimingConfig, DIEL_VERSION};

/// Diel - classify diel activity patterns from cichlid tracking exports
#[derive(Parser)]
#[command(name = "diel")]
#[command(version = DIEL_VERSION)]
#[command(about = "Classify diel activity patterns from tracking data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Width of one sample bin, minutes
    #[arg(long, global = true, default_value = "30")]
    bin_minutes: u32,

    /// Dawn start clock time (HH:MM)
    #[arg(long, global = true, default_value = "07:00")]
    dawn_start: String,

    /// Day start clock time (HH:MM)
    #[arg(long, global = true, default_value = "07:30")]
    day_start: String,

    /// Dusk start clock time (HH:MM)
    #[arg(long, global = true, default_value = "18:30")]
    dusk_start: String,

    /// Night start clock time (HH:MM)
    #[arg(long, global = true, default_value = "19:00")]
    night_start: String,

    /// Predawn/postdusk window length, minutes
    #[arg(long, global = true, default_value = "30")]
    twilight_buffer_minutes: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write the combined diel pattern CSV
    Analyze {
        /// Tracking export CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the combined table into
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Species metrics table (six-letter code to tribe); no default location
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Feature to analyze
        #[arg(long, default_value = "speed-mm")]
        feature: FeatureArg,

        /// Day-vs-night statistical test
        #[arg(long, default_value = "welch")]
        test: TestArg,

        /// Significance threshold
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Minimum peak prominence; 0 accepts any local maximum
        #[arg(long, default_value = "0.0")]
        min_prominence: f64,

        /// Print the run summary as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a tracking export without running the analysis
    Validate {
        /// Tracking export CSV
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the configured phase calendar
    Phases,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeatureArg {
    SpeedMm,
    Movement,
    Rest,
    VerticalPos,
}

impl From<FeatureArg> for Feature {
    fn from(arg: FeatureArg) -> Self {
        match arg {
            FeatureArg::SpeedMm => Feature::SpeedMm,
            FeatureArg::Movement => Feature::Movement,
            FeatureArg::Rest => Feature::Rest,
            FeatureArg::VerticalPos => Feature::VerticalPos,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TestArg {
    Welch,
    MannWhitney,
}

impl From<TestArg> for DielTest {
    fn from(arg: TestArg) -> Self {
        match arg {
            TestArg::Welch => DielTest::Welch,
            TestArg::MannWhitney => DielTest::MannWhitney,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter("cichlid_diel=info")
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AnalysisError> {
    match cli.command {
        Commands::Analyze {
            ref input,
            ref output_dir,
            ref metrics,
            feature,
            test,
            alpha,
            min_prominence,
            json,
        } => {
            let options = AnalysisOptions {
                feature: feature.into(),
                test: test.into(),
                alpha,
                min_prominence,
            };

            let mut records = ingest::read_track_csv(input)?;
            if let Some(metrics_path) = metrics {
                let table = ingest::read_species_metrics(metrics_path)?;
                ingest::attach_tribes(&mut records, &table);
            }

            let samples_per_fish = max_samples_per_fish(&records);
            let timing = timing_from_flags(&cli, samples_per_fish)?;
            let processor = DielProcessor::new(timing, options);
            let summary = processor.run(&records)?;

            for species in &summary.species {
                println!(
                    "{} is {} ({} individuals, crepuscular fraction {:.2})",
                    species.species_six,
                    species.pattern,
                    species.n_individuals,
                    species.crepuscular_fraction
                );
            }

            std::fs::create_dir_all(output_dir)?;
            let path = processor.export_csv(&summary, output_dir)?;
            println!("wrote {}", path.display());

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }

        Commands::Validate { ref input } => {
            let records = ingest::read_track_csv(input)?;
            let fish: std::collections::HashSet<&str> =
                records.iter().map(|r| r.fish_id.as_str()).collect();
            let species: std::collections::HashSet<&str> =
                records.iter().map(|r| r.species_six.as_str()).collect();
            println!(
                "ok: {} rows, {} fish, {} species",
                records.len(),
                fish.len(),
                species.len()
            );
            Ok(())
        }

        Commands::Phases => {
            let timing = timing_from_flags(&cli, 0)?;
            for duration in timing.phase_durations() {
                println!(
                    "{:<9} {:>6} s  {:>4} bins",
                    duration.phase.as_str(),
                    duration.seconds,
                    duration.samples
                );
            }
            Ok(())
        }
    }
}

fn max_samples_per_fish(records: &[cichlid_diel::TrackRecord]) -> usize {
    let mut counts = std::collections::HashMap::new();
    for record in records {
        *counts.entry(record.fish_id.as_str()).or_insert(0usize) += 1;
    }
    counts.values().copied().max().unwrap_or_default()
}

fn timing_from_flags(cli: &Cli, samples_per_fish: usize) -> Result<TimingConfig, AnalysisError> {
    TimingConfig::new(
        cli.bin_minutes * 60,
        samples_per_fish,
        parse_clock(&cli.dawn_start)?,
        parse_clock(&cli.day_start)?,
        parse_clock(&cli.dusk_start)?,
        parse_clock(&cli.night_start)?,
        cli.twilight_buffer_minutes * 60,
    )
}

fn parse_clock(raw: &str) -> Result<NaiveTime, AnalysisError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| AnalysisError::Configuration(format!("invalid clock time '{raw}'")))
}
