use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dark_o_mat::config::AppConfig;
use dark_o_mat::filter::criteria::parse_temperature;
use dark_o_mat::filter::{self, Criterion, SelectionCriteria, TemperatureConstraint};
use dark_o_mat::fits::FitsHeaderReader;
use dark_o_mat::indexer::{self, IndexReport};
use dark_o_mat::master::{self, MasterDarkRequest, SirilCli};
use dark_o_mat::state::registry::Registry;
use dark_o_mat::{DarkError, Result};

#[derive(Parser)]
#[command(author, version, about = "Dark frame libraries and master dark creation with Siril", long_about = None)]
struct Cli {
    /// Library registry file (default: ~/.siril-dark-libraries.json)
    #[arg(long, global = true, env = "DARK_O_MAT_REGISTRY")]
    registry: Option<PathBuf>,

    /// Directory holding the library catalogs (default: ~/.siril-dark-libraries)
    #[arg(long, global = true, env = "DARK_O_MAT_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage dark libraries
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },

    /// Show the choices available for each criterion
    Domains {
        library: String,
        #[command(flatten)]
        temperature: TemperatureArgs,
    },

    /// Count the frames matching the given criteria
    Count {
        library: String,
        #[command(flatten)]
        criteria: CriteriaArgs,
        /// Number of darks to stack
        #[arg(long, default_value_t = 2)]
        count: usize,
    },

    /// Stack matching darks into a master dark
    Master {
        library: String,
        #[command(flatten)]
        criteria: CriteriaArgs,
        /// Number of darks to stack (clamped to the number of matches)
        #[arg(long, default_value_t = 2)]
        count: usize,
        /// Target directory for the master dark
        #[arg(long)]
        output: PathBuf,
        /// Siril console executable
        #[arg(long, env = "SIRIL_CLI")]
        siril: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LibraryCommands {
    /// Create a library and index its source directory
    Add { name: String, dir: PathBuf },
    /// Delete a library (the FITS files remain untouched)
    Remove { name: String },
    /// Re-index a library from its source directory
    Rescan { name: String },
    /// List all libraries
    List,
    /// Show one library
    Show { name: String },
}

#[derive(Args)]
struct TemperatureArgs {
    /// Exact CCD temperature
    #[arg(long, allow_negative_numbers = true, conflicts_with_all = ["temp_min", "temp_max"])]
    temp: Option<String>,
    /// Lower bound of a temperature range (inclusive)
    #[arg(long, allow_negative_numbers = true)]
    temp_min: Option<String>,
    /// Upper bound of a temperature range (inclusive)
    #[arg(long, allow_negative_numbers = true)]
    temp_max: Option<String>,
}

impl TemperatureArgs {
    fn constraint(&self) -> Result<Option<TemperatureConstraint>> {
        if let Some(temp) = &self.temp {
            return Ok(Some(TemperatureConstraint::Exact(parse_temperature(temp)?)));
        }
        if self.temp_min.is_none() && self.temp_max.is_none() {
            return Ok(None);
        }
        let bound = |raw: &Option<String>| raw.as_deref().map(parse_temperature).transpose();
        Ok(Some(TemperatureConstraint::Range {
            min: bound(&self.temp_min)?,
            max: bound(&self.temp_max)?,
        }))
    }
}

#[derive(Args)]
struct CriteriaArgs {
    #[command(flatten)]
    temperature: TemperatureArgs,
    /// ISO speed or gain
    #[arg(long)]
    iso: Option<String>,
    /// Exposure time in seconds
    #[arg(long)]
    exposure: Option<String>,
    /// Resolution, e.g. 4144x2822
    #[arg(long)]
    resolution: Option<String>,
    /// Binning, e.g. 1x1
    #[arg(long)]
    binning: Option<String>,
}

impl CriteriaArgs {
    fn criteria(&self) -> Result<SelectionCriteria> {
        Ok(SelectionCriteria {
            temperature: self.temperature.constraint()?,
            iso_or_gain: self.iso.clone(),
            exposure: self.exposure.clone(),
            resolution: self.resolution.clone(),
            binning: self.binning.clone(),
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "dark_o_mat=debug"
    } else {
        "dark_o_mat=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let siril = match &cli.command {
        Commands::Master { siril, .. } => siril.clone(),
        _ => None,
    };
    let config = AppConfig::resolve(cli.registry, cli.store_dir, siril)?;
    debug!("Registry: {}", config.registry_file.display());

    let mut registry = Registry::load(&config.registry_file, &config.store_dir)?;
    let reader = FitsHeaderReader::new();

    match cli.command {
        Commands::Library { command } => match command {
            LibraryCommands::Add { name, dir } => {
                println!("🔍 Found {} FITS files in {}", indexer::scan(&dir).len(), dir.display());
                let (library, report) = registry.create(&name, &dir, &reader)?;
                println!("📚 Library '{}' created.", library.name);
                print_report(&report);
            }
            LibraryCommands::Remove { name } => {
                let library = registry.delete(&name)?;
                println!(
                    "🗑️  Library '{}' deleted. FITS files in {} remain untouched.",
                    library.name,
                    library.source_dir.display()
                );
            }
            LibraryCommands::Rescan { name } => {
                let report = registry.rescan(&name, &reader)?;
                println!("🔄 Library '{}' rescanned.", name.trim());
                print_report(&report);
            }
            LibraryCommands::List => {
                for name in registry.list() {
                    println!("{}", name);
                }
            }
            LibraryCommands::Show { name } => {
                let library = registry.get(&name)?;
                let catalog = registry.open_catalog(&name)?;
                println!("Library:  {}", library.name);
                println!("Source:   {}", library.source_dir.display());
                println!("Catalog:  {}", library.store_path.display());
                println!("Frames:   {}", catalog.frame_count()?);
            }
        },

        Commands::Domains {
            library,
            temperature,
        } => {
            let catalog = registry.open_catalog(&library)?;
            let constraint = temperature.constraint()?;
            let domains = filter::domains(&catalog, constraint.as_ref())?;

            print_choices("Temperature", &filter::temperature_domain(&catalog)?);
            for criterion in [
                Criterion::IsoOrGain,
                Criterion::Exposure,
                Criterion::Resolution,
                Criterion::Binning,
            ] {
                print_choices(&criterion.to_string(), domains.get(criterion));
            }
        }

        Commands::Count {
            library,
            criteria,
            count,
        } => {
            let catalog = registry.open_catalog(&library)?;
            let refined = filter::refine(&catalog, criteria.criteria()?, count)?;
            for criterion in &refined.cleared {
                println!("⚠️  {} reset: the selected value is not available", criterion);
            }
            println!("Matching darks:          {}", refined.match_count);
            println!("Number of darks to use:  {}", refined.desired_count);
            if refined.ready {
                println!("✅ Ready to create a master dark");
            } else {
                let missing: Vec<String> = refined.criteria.missing().iter().map(|c| c.to_string()).collect();
                if missing.is_empty() {
                    println!("⏸️  Not ready: fewer than 2 matching darks");
                } else {
                    println!("⏸️  Not ready, choose: {}", missing.join(", "));
                }
            }
        }

        Commands::Master {
            library,
            criteria,
            count,
            output,
            ..
        } => {
            let library = registry.get(&library)?;
            let catalog = registry.open_catalog(&library.name)?;
            let refined = filter::refine(&catalog, criteria.criteria()?, count)?;
            if !refined.cleared.is_empty() {
                let names: Vec<String> = refined.cleared.iter().map(|c| c.to_string()).collect();
                return Err(DarkError::invalid(format!(
                    "no darks at the selected temperature for the chosen {}",
                    names.join(", ")
                )));
            }

            let request = MasterDarkRequest {
                library_name: &library.name,
                criteria: &refined.criteria,
                desired_count: refined.desired_count,
                output_root: &output,
                date: chrono::Local::now().date_naive(),
            };
            let path = master::synthesize(&catalog, &request, &SirilCli::new(&config.siril))?;
            println!("🌑 Master dark created: {}", path.display());
        }
    }

    Ok(())
}

fn print_report(report: &IndexReport) {
    println!(
        "📊 {} frames indexed, {} without complete metadata, {} unreadable ({} files scanned)",
        report.indexed, report.incomplete, report.unreadable, report.candidates
    );
}

fn print_choices(label: &str, values: &[String]) {
    println!("{:<14} {}", format!("{}:", label), values.join(", "));
}
