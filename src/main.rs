/*!
 * CPIO CLI - Command Line Interface
 */

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use cpio::{
    config::{CpioConfig, LogLevel},
    error::{CpioError, EXIT_FATAL, EXIT_SUCCESS},
    logging,
    resilience::AdmissionMode,
    run_stress, ParameterClient, StressOptions,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cpio")]
#[command(version, about = "Drive the CPIO async execution stack", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write diagnostics to a file instead of stdout
    #[arg(long = "log", value_name = "PATH", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit concurrent parameter lookups through the full stack
    Stress {
        /// Number of lookups to submit at once
        #[arg(short = 'n', long, default_value_t = 1_000)]
        requests: usize,

        /// Override rate_controller.max_outstanding
        #[arg(long, value_name = "N")]
        max_outstanding: Option<usize>,

        /// Enforce the outstanding ceiling with compare-and-swap
        #[arg(long)]
        strict: bool,

        /// Override provider.latency_ms
        #[arg(long, value_name = "MS")]
        latency_ms: Option<u64>,

        /// Parameter names to look up (defaults to every configured parameter)
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config {
        /// Output format
        #[arg(long, value_enum, default_value = "toml")]
        format: ConfigFormat,

        /// Write to this file instead of stdout
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Toml,
    Json,
}

/// Parameters served when the configuration defines none
const DEMO_PARAMETERS: &[(&str, &str)] = &[
    ("region", "us-east-1"),
    ("instance-type", "standard-4"),
    ("project", "cpio-demo"),
];

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<CpioError>()
                .map_or(EXIT_FATAL, CpioError::exit_code)
        }
    };
    logging::shutdown_logging();
    std::process::exit(code);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => CpioConfig::from_file(path)?,
        None => CpioConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }
    if cli.log.is_some() {
        config.logging.file = cli.log.clone();
    }

    match cli.command {
        Commands::Config { format, output } => print_config(&config, format, output),
        Commands::Stress {
            requests,
            max_outstanding,
            strict,
            latency_ms,
            names,
            format,
        } => {
            if let Some(max) = max_outstanding {
                config.rate_controller.max_outstanding = max;
            }
            if strict {
                config.rate_controller.admission = AdmissionMode::Strict;
            }
            if let Some(latency) = latency_ms {
                config.provider.latency_ms = latency;
            }
            if config.provider.parameters.is_empty() {
                config.provider.parameters.extend(
                    DEMO_PARAMETERS
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string())),
                );
            }
            config.validate()?;

            logging::init_logging(&config.logging, cli.verbose)?;
            stress(&config, requests, names, format)
        }
    }
}

fn stress(
    config: &CpioConfig,
    requests: usize,
    names: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    let client = ParameterClient::from_config(runtime.handle().clone(), config)?;
    let names = if names.is_empty() {
        config.provider.parameters.keys().cloned().collect()
    } else {
        names
    };
    let options = StressOptions { requests, names };

    tracing::info!(
        requests,
        max_outstanding = config.rate_controller.max_outstanding,
        "starting stress run"
    );
    let report = runtime.block_on(run_stress(&client, &options));

    match format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_config(
    config: &CpioConfig,
    format: ConfigFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let rendered = match format {
        ConfigFormat::Toml => config.to_toml()?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    };

    match output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", rendered),
    }
    Ok(())
}
