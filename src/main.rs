use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::Path;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// etlit: extract, transform and load records as described by a process configuration file
#[derive(Parser)]
#[command(name = "etlit", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from (skipped when missing)
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every active process
    Run {
        /// Process configuration file (YAML, JSON or JSON5)
        #[arg(default_value = "etl.yml")]
        config: String,

        /// Only run the named process (repeatable)
        #[arg(short, long)]
        only: Vec<String>,

        /// Number of processes to run at once
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Exit with a failure status when any process fails
        #[arg(long)]
        strict: bool,
    },

    /// Set up every active process without extracting or loading
    Check {
        /// Process configuration file (YAML, JSON or JSON5)
        #[arg(default_value = "etl.yml")]
        config: String,

        /// Only check the named process (repeatable)
        #[arg(short, long)]
        only: Vec<String>,
    },

    /// List configured processes
    List {
        /// Process configuration file (YAML, JSON or JSON5)
        #[arg(default_value = "etl.yml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_loaded = Path::new(&cli.env).exists();
    if env_loaded {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if env_loaded {
        log::debug!("Loaded environment from {}", cli.env.bright_black());
    }

    match cli.command {
        Commands::Run {
            config,
            only,
            parallel,
            strict,
        } => {
            log::info!("Running processes from: {}", config.bright_black());
            let summary = etlit::cli::run_processes(&config, &only, parallel).await?;
            if strict && !summary.is_success() {
                eyre::bail!("{} process(es) failed", summary.failure_count());
            }
        }
        Commands::Check { config, only } => {
            log::info!("Checking processes from: {}", config.bright_black());
            let summary = etlit::cli::check_processes(&config, &only).await?;
            if !summary.is_success() {
                eyre::bail!("{} process(es) not ready", summary.failure_count());
            }
        }
        Commands::List { config } => {
            let count = etlit::cli::list_processes(&config)?;
            log::debug!("Listed {} process(es)", count);
        }
    }

    Ok(())
}
