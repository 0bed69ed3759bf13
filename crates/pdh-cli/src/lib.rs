//! Command-line surface of the PDS harvest pipeline
//!
//! Thin shell over `pdh-harvest`: parses arguments, runs the requested
//! phase and prints a summary. Per-collection failures are reported in the
//! storage tree and never change the exit code; only fatal configuration
//! errors do.

pub mod progress;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use pdh_harvest::etl::Selection;
use pdh_harvest::{HarvestConfig, HarvestEtl};
use std::path::PathBuf;
use tracing::info;

pub use pdh_common::{HarvestError, Result};

/// Harvest ODE/PDS3 planetary data descriptions into a STAC tree
#[derive(Parser, Debug)]
#[command(name = "pdh")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
#[command(rename_all = "snake_case")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path of the storage root
    #[arg(
        short = 'd',
        long,
        env = "PDH_DATABASE",
        default_value = "work/database",
        global = true
    )]
    pub database: PathBuf,

    /// Log level
    #[arg(
        long,
        default_value = "INFO",
        value_parser = ["NOTSET", "INFO", "DEBUG", "WARNING", "ERROR", "CRITICAL"],
        global = true
    )]
    pub level: String,

    /// Show progress indicators
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        global = true
    )]
    pub progress_bar: bool,
}

/// What to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractType {
    /// Query the georeferenced collection index
    #[value(name = "ode_collections")]
    OdeCollections,
    /// Query the collection index and save it to the registry
    #[value(name = "ode_collections_save")]
    OdeCollectionsSave,
    /// Download record pages for the registered collections
    #[value(name = "ode_records")]
    OdeRecords,
    /// Scrape and download the PDS3 catalog objects
    #[value(name = "pds3_objects")]
    Pds3Objects,
}

/// What to transform into STAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransformType {
    /// Record pages into STAC items
    #[value(name = "records")]
    Records,
    /// PDS3 objects into enriched parent catalogs
    #[value(name = "pds3_objects")]
    Pds3Objects,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
pub enum Commands {
    /// Extract information from the ODE web service and web site
    Extract {
        #[arg(long)]
        type_extract: ExtractType,

        /// Restrict to one planet meta-database
        #[arg(long)]
        planet: Option<String>,

        /// Restrict to one dataset id
        #[arg(long)]
        dataset_id: Option<String>,

        /// Extract only the first N pages per collection
        #[arg(long)]
        sample: Option<usize>,

        /// Number of parallel downloads
        #[arg(long, default_value_t = 8)]
        nb_workers: usize,
    },

    /// Transform the extracted information into STAC
    Transform {
        #[arg(long)]
        type_stac: TransformType,

        /// Restrict to one planet meta-database
        #[arg(long)]
        planet: Option<String>,

        /// Restrict to one dataset id
        #[arg(long)]
        dataset_id: Option<String>,
    },

    /// Report missing pages and PDS3 files per collection
    #[command(name = "check_extract")]
    CheckExtract {
        /// Restrict to one planet meta-database
        #[arg(long)]
        planet: Option<String>,

        /// Restrict to one dataset id
        #[arg(long)]
        dataset_id: Option<String>,
    },
}

/// Build the pipeline configuration from the CLI flags
pub fn config_from_cli(cli: &Cli) -> HarvestConfig {
    let mut config = HarvestConfig::new(&cli.database);
    if let Commands::Extract {
        sample, nb_workers, ..
    } = &cli.command
    {
        if let Some(pages) = sample {
            config = config.with_sample_pages(*pages);
        }
        config = config.with_max_in_flight(*nb_workers);
    }
    config
}

fn print_phase_summary(summary: &pdh_harvest::report::PhaseSummary) {
    let status = if summary.failed == 0 {
        "ok".green()
    } else {
        format!("{} failed", summary.failed).yellow()
    };
    println!(
        "{}: {} collection(s), {}",
        summary.phase.bold(),
        summary.collections,
        status
    );
    for failure in &summary.failures {
        println!("  {} {}", "!".yellow(), failure.collection);
    }
}

/// Execute the parsed command
pub async fn execute(cli: &Cli) -> Result<()> {
    let config = config_from_cli(cli);
    let etl = HarvestEtl::new(config)?;

    match &cli.command {
        Commands::Extract {
            type_extract,
            planet,
            dataset_id,
            ..
        } => {
            let selection = Selection::from_dataset_id(dataset_id.as_deref());
            match type_extract {
                ExtractType::OdeCollections => {
                    let spinner = cli
                        .progress_bar
                        .then(|| progress::create_spinner("Querying ODE collection index"));
                    let descriptors = etl
                        .discover(planet.as_deref(), dataset_id.as_deref(), false)
                        .await?;
                    if let Some(spinner) = spinner {
                        spinner.finish_and_clear();
                    }
                    for descriptor in &descriptors {
                        println!(
                            "{}  {} products",
                            descriptor.dataset_id.bold(),
                            descriptor.number_products
                        );
                    }
                    println!("{} georeferenced collection(s)", descriptors.len());
                },
                ExtractType::OdeCollectionsSave => {
                    let spinner = cli
                        .progress_bar
                        .then(|| progress::create_spinner("Querying ODE collection index"));
                    let descriptors = etl
                        .discover(planet.as_deref(), dataset_id.as_deref(), true)
                        .await?;
                    if let Some(spinner) = spinner {
                        spinner.finish_and_clear();
                    }
                    println!(
                        "{} georeferenced collection(s) saved to {}",
                        descriptors.len(),
                        etl.registry().path().display()
                    );
                },
                ExtractType::OdeRecords => {
                    let summary = etl.extract_records(planet.as_deref(), &selection).await?;
                    print_phase_summary(&summary);
                },
                ExtractType::Pds3Objects => {
                    let summary = etl.extract_pds3(planet.as_deref(), &selection).await?;
                    print_phase_summary(&summary);
                },
            }
        },

        Commands::Transform {
            type_stac,
            planet,
            dataset_id,
        } => {
            let selection = Selection::from_dataset_id(dataset_id.as_deref());
            let summary = match type_stac {
                TransformType::Records => etl.transform_records(planet.as_deref(), &selection)?,
                TransformType::Pds3Objects => etl.transform_pds3(planet.as_deref(), &selection)?,
            };
            print_phase_summary(&summary);
        },

        Commands::CheckExtract { planet, dataset_id } => {
            let selection = Selection::from_dataset_id(dataset_id.as_deref());
            let check = etl.check_extract(planet.as_deref(), &selection)?;
            print!("{}", check.render());
            info!(
                missing_pages = check.missing_page_total(),
                untransformed = check.untransformed(),
                "Extraction check complete"
            );
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses_extract() {
        let cli = Cli::try_parse_from([
            "pdh",
            "extract",
            "--type_extract",
            "ode_records",
            "--planet",
            "mars",
            "--sample",
            "2",
        ])
        .unwrap();

        let Commands::Extract {
            type_extract,
            planet,
            sample,
            ..
        } = &cli.command
        else {
            panic!("expected extract");
        };
        assert_eq!(*type_extract, ExtractType::OdeRecords);
        assert_eq!(planet.as_deref(), Some("mars"));
        assert_eq!(*sample, Some(2));

        let config = config_from_cli(&cli);
        assert_eq!(config.sample_pages, Some(2));
    }

    #[test]
    fn test_cli_parses_transform_and_check() {
        let cli = Cli::try_parse_from([
            "pdh",
            "transform",
            "--type_stac",
            "pds3_objects",
            "--dataset_id",
            "MGS-M-MOLA-3-PEDR-L1A-V1.0",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Transform { .. }));

        let cli = Cli::try_parse_from(["pdh", "check_extract"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckExtract { .. }));
    }

    #[test]
    fn test_cli_rejects_unknown_extract_type() {
        assert!(Cli::try_parse_from(["pdh", "extract", "--type_extract", "nope"]).is_err());
    }

    #[test]
    fn test_database_flag_defaults() {
        let cli = Cli::try_parse_from(["pdh", "check_extract"]).unwrap();
        assert_eq!(cli.database, PathBuf::from("work/database"));
        let config = config_from_cli(&cli);
        assert_eq!(config.root_dir, PathBuf::from("work/database"));
    }

    #[test]
    fn test_command_shape_is_valid() {
        Cli::command().debug_assert();
    }
}
