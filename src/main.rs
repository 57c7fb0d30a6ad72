use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};

use sphinx_autoschema::{BuildConfig, SphinxBuilder};

#[derive(Parser)]
#[command(name = "sphinx-autoschema")]
#[command(about = "Generate schema stub pages and build Sphinx-style documentation")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate schema stubs, then render every document to HTML
    Build {
        /// Documentation source directory
        source: PathBuf,

        /// Output directory
        #[arg(default_value = "_build/html")]
        output: PathBuf,

        /// Configuration file (defaults to conf.toml in the source directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of parallel rendering jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Remove the output directory first
        #[arg(long)]
        clean: bool,
    },
    /// Only write stub pages for referenced schemas
    Generate {
        source: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the schema references found in the sources
    List {
        source: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a JSON array instead of one reference per line
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_builder(source: &Path, output: PathBuf, config: Option<&Path>) -> Result<SphinxBuilder> {
    let source = source
        .canonicalize()
        .with_context(|| format!("Source directory not found: {}", source.display()))?;
    let config = BuildConfig::load(&source, config)?;
    SphinxBuilder::new(config, source, output)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            source,
            output,
            config,
            jobs,
            clean,
        } => {
            let mut builder = load_builder(&source, output, config.as_deref())?;
            if let Some(jobs) = jobs {
                builder.set_parallel_jobs(jobs);
            }
            if clean {
                builder.clean()?;
            }

            let stats = builder.build()?;
            info!(
                "{} documents rendered, {} stubs created, {} kept, {} warnings",
                stats.documents,
                stats.stubs_created,
                stats.stubs_skipped,
                stats.warnings.len()
            );
        }
        Commands::Generate { source, config } => {
            let mut builder = load_builder(&source, PathBuf::from("_build/html"), config.as_deref())?;
            let report = builder.generate_stubs()?;
            for path in &report.created {
                println!("{}", path.display());
            }
        }
        Commands::List {
            source,
            config,
            json,
        } => {
            let mut builder = load_builder(&source, PathBuf::from("_build/html"), config.as_deref())?;
            let references = builder.schema_references()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&references)?);
            } else {
                for reference in &references {
                    println!("{}", reference);
                }
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
