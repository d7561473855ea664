use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use yuic::config::{self, MinifyConfig};
use yuic::process::{self, RunOptions};
use yuic::{cache, output};

/// Overrides shared by commands that look at sources.
#[derive(clap::Args, Clone)]
struct SourceArgs {
    /// Root for minified output (overrides `target_dir`)
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Cache file location (overrides `cache_file`)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Ignore the existing cache and treat every file as new
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "yuic")]
#[command(about = "Incremental YUI Compressor runner for JavaScript and CSS")]
#[command(long_about = "\
Incremental YUI Compressor runner for JavaScript and CSS

Sources are grouped into file lists and file sets in yuic.toml. Each file is
minified only when it changed since the last run, judged by its modification
time and a digest of its (filtered) content. Results are recorded in a cache
file next to the config:

  project/
  ├── yuic.toml                    # Config (run 'yuic gen-config' for a template)
  ├── yuic.cache                   # Change-detection cache (safe to delete)
  ├── vendor/bin/yuicompressor.jar
  └── web/
      ├── js/app.js
      └── js/app.min.js            # Output, named by name_template

A file that fails to minify is reported and retried on the next run; the
remaining files are still processed.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace with exact commands)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Minify every changed source
    Run {
        #[command(flatten)]
        sources: SourceArgs,

        /// Exit with status 1 when any file or batch failed
        #[arg(long)]
        strict: bool,
    },
    /// Show what a run would minify, without running the minifier
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Print a stock yuic.toml with all options documented
    GenConfig,
    /// Delete the cache file, forcing a full rebuild on the next run
    ClearCache {
        /// Cache file location (overrides `cache_file`)
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run { sources, strict } => {
            let config = load(&cli.config, &sources)?;
            let options = RunOptions {
                use_cache: !sources.no_cache,
            };
            let report = process::run(&config, &options)?;
            output::print_run_report(&report, config_base(&cli.config).as_deref());
            if strict && report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Check { sources } => {
            let config = load(&cli.config, &sources)?;
            let minifier = process::yui_compressor(&config);
            let options = RunOptions {
                use_cache: !sources.no_cache,
            };
            let plan = process::plan(&minifier, &config, &options)?;
            output::print_check_output(&plan, config_base(&cli.config).as_deref());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::ClearCache { cache_file } => {
            let path = match cache_file {
                Some(p) => p,
                None => config::load_config(&cli.config)?.cache_file,
            };
            if cache::clear(&path)? {
                info!("Removed {}", path.display());
            } else {
                info!("No cache file at {}", path.display());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// 0 = info, 1 = debug, 2+ = trace. `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("yuic=info"),
        1 => EnvFilter::new("yuic=debug"),
        _ => EnvFilter::new("yuic=trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file and apply command-line overrides.
fn load(path: &Path, args: &SourceArgs) -> Result<MinifyConfig, config::ConfigError> {
    let mut config = config::load_config(path)?;
    // Command-line paths are relative to the working directory
    if let Some(dir) = &args.target_dir {
        config.target_dir = Some(std::path::absolute(dir)?);
    }
    if let Some(file) = &args.cache_file {
        config.cache_file = std::path::absolute(file)?;
    }
    config.validate()?;
    Ok(config)
}

/// Directory that report paths are shown relative to.
fn config_base(config_path: &Path) -> Option<PathBuf> {
    std::path::absolute(config_path)
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
}
