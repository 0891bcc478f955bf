// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use linesync::app_config::{self, Config, TranslationProvider};
use linesync::{Controller, SyncOptions, SyncPaths};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring a translation up to date with its source
    Sync(SyncArgs),

    /// Check that translations keep the structure of their sources
    Verify(VerifyArgs),

    /// Inspect or clear the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for linesync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show entry and hit counts
    Stats,
    /// Remove every cached translation
    Clear,
}

#[derive(Parser, Debug)]
struct SyncArgs {
    /// Source file or directory as of the base revision
    #[arg(long, value_name = "PATH")]
    previous: PathBuf,

    /// Source file or directory as it is now
    #[arg(long, value_name = "PATH")]
    current: PathBuf,

    /// Translated file or directory aligned with --previous
    #[arg(long, value_name = "PATH")]
    target: PathBuf,

    /// Base revision identifier, used to key the cache
    #[arg(long, value_name = "REV")]
    revision: String,

    /// Write results here instead of over --target
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Use the mock provider and write nothing
    #[arg(long)]
    dry_run: bool,

    /// Process at most N files
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Write a JSON run report
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'ja', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Source file or directory
    #[arg(long, value_name = "PATH")]
    source: PathBuf,

    /// Translated file or directory
    #[arg(long, value_name = "PATH")]
    target: PathBuf,
}

/// linesync - line-locked translation sync for documentation
#[derive(Parser, Debug)]
#[command(name = "linesync")]
#[command(version)]
#[command(about = "Keep translated documentation aligned line for line with its source")]
#[command(long_about = "linesync re-translates only the lines of a document whose meaning changed upstream,
keeping every other translated line as it is and the line count identical to the source.

EXAMPLES:
    linesync sync --previous old/docs --current docs --target ja/docs --revision abc123
    linesync sync --previous old.md --current new.md --target ja.md --revision abc123 --dry-run
    linesync verify --source docs --target ja/docs
    linesync cache stats
    linesync completions bash > linesync.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Everything is let through; the real level is set once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "linesync", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(Path::new(&cli.config_path))?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    } else {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let failed = match cli.command {
        Commands::Sync(args) => run_sync(config, args).await?,
        Commands::Verify(args) => run_verify(config, args)?,
        Commands::Cache { action } => {
            run_cache(config, action).await?;
            false
        }
        Commands::Completions { .. } => false,
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Apply CLI overrides to the loaded configuration
fn apply_overrides(config: &mut Config, args: &SyncArgs) {
    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &args.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }

    if let Some(source_lang) = &args.source_language {
        config.source_language = source_lang.clone();
    }

    if let Some(target_lang) = &args.target_language {
        config.target_language = target_lang.clone();
    }
}

async fn run_sync(mut config: Config, args: SyncArgs) -> Result<bool> {
    apply_overrides(&mut config, &args);

    if let Err(e) = config.validate() {
        if args.dry_run {
            warn!("Configuration is incomplete, continuing dry run: {:#}", e);
        } else {
            return Err(e).context("Configuration validation failed");
        }
    }

    let controller = Controller::with_config(config)?;
    let paths = SyncPaths {
        previous: args.previous,
        current: args.current,
        target: args.target,
        output: args.output,
    };
    let options = SyncOptions {
        base_revision: args.revision,
        dry_run: args.dry_run,
        limit: args.limit,
        report: args.report,
    };

    let report = controller.run_sync(&paths, &options).await?;
    if report.has_failures() {
        error!("Some files were not synced; see the messages above");
    }
    Ok(report.has_failures())
}

fn run_verify(config: Config, args: VerifyArgs) -> Result<bool> {
    let controller = Controller::with_config(config)?;
    let reports = controller.verify_paths(&args.source, &args.target)?;
    let failed = reports.iter().filter(|r| !r.passed).count();
    info!("Verified {} file(s): {} aligned, {} with violations", reports.len(), reports.len() - failed, failed);
    Ok(failed > 0)
}

async fn run_cache(config: Config, action: CacheAction) -> Result<()> {
    let controller = Controller::with_config(config)?;
    match action {
        CacheAction::Stats => {
            let stats = controller.cache_stats().await?;
            info!("{}", stats);
        }
        CacheAction::Clear => {
            controller.clear_cache().await?;
        }
    }
    Ok(())
}
