use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use polars::prelude::*;
use solar_data_processor::{DataLoader, Merger, PipelineConfig, Preprocessor, TimestampStrictness};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "solar_data_processor")]
#[command(about = "Merge and preprocess solar generation, weather and site datasets")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory for merged output files
    #[arg(long, global = true, default_value = "processed_data")]
    output_dir: PathBuf,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Fail on unparseable timestamps instead of coercing them to null
    #[arg(long, global = true)]
    strict_timestamps: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Merge generation, weather and site details, then clean and derive features
    Solar {
        /// Path to the solar generation readings CSV
        #[arg(long)]
        generation: PathBuf,

        /// Path to the weather observations CSV
        #[arg(long)]
        weather: PathBuf,

        /// Path to the site details CSV
        #[arg(long)]
        site_details: PathBuf,
    },
    /// Hierarchical four-table merge of reading and metadata tables
    Hierarchical {
        /// Path to the base readings CSV (carries both keys)
        #[arg(long)]
        base: PathBuf,

        /// Path to the secondary readings CSV (carries both keys)
        #[arg(long)]
        secondary: PathBuf,

        /// Path to the campus metadata CSV (CampusKey only)
        #[arg(long)]
        campus: PathBuf,

        /// Path to the site metadata CSV (SiteKey only)
        #[arg(long)]
        site: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Parquet,
    Both,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("🚀 Solar Data Processor");
    println!("{}", "=".repeat(60));

    let strictness = if args.strict_timestamps {
        TimestampStrictness::Strict
    } else {
        TimestampStrictness::Coerce
    };
    let config = PipelineConfig::default().with_strictness(strictness);

    let loader = DataLoader::new(true);
    let merger = Merger::new(config.clone());

    match args.command {
        Command::Solar {
            generation,
            weather,
            site_details,
        } => {
            info!("Running solar merge and preprocessing");
            let frames = loader.load_data(&[generation, weather, site_details])?;
            let [generation, weather, site_details]: [DataFrame; 3] =
                frames.try_into().map_err(|frames: Vec<DataFrame>| {
                    anyhow!("expected 3 input tables, loaded {}", frames.len())
                })?;

            let merged = merger.merge_solar(&generation, &weather, &site_details)?;
            let processed = Preprocessor::new(config).process(&merged)?;
            save_output(processed, &args.output_dir, "solar_features", args.format)?;
        }
        Command::Hierarchical {
            base,
            secondary,
            campus,
            site,
        } => {
            info!("Running hierarchical metadata merge");
            let frames = loader.load_data(&[base, secondary, campus, site])?;
            let [base, secondary, campus, site]: [DataFrame; 4] =
                frames.try_into().map_err(|frames: Vec<DataFrame>| {
                    anyhow!("expected 4 input tables, loaded {}", frames.len())
                })?;

            let merged = merger.merge_hierarchical(&base, &secondary, &campus, &site)?;
            save_output(merged, &args.output_dir, "hierarchical_merge", args.format)?;
        }
    }

    Ok(())
}

fn save_output(
    mut df: DataFrame,
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    if matches!(format, OutputFormat::Csv | OutputFormat::Both) {
        let path = output_dir.join(format!("{stem}.csv"));
        println!("💾 Saving CSV...");
        CsvWriter::new(std::fs::File::create(&path)?).finish(&mut df)?;
    }
    if matches!(format, OutputFormat::Parquet | OutputFormat::Both) {
        let path = output_dir.join(format!("{stem}.parquet"));
        println!("📦 Saving Parquet...");
        ParquetWriter::new(std::fs::File::create(&path)?).finish(&mut df)?;
    }

    println!("✅ Output written to {}", output_dir.display());
    Ok(())
}
