use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use treesync::{OneOrMany, SyncMetrics, SyncOptions, TaskFile};

#[derive(Parser)]
#[command(name = "treesync")]
#[command(about = "Mirror source trees into destination directories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Print run metrics as JSON instead of a summary line
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tasks from a task file
    Run {
        /// Task file path
        #[arg(short, long, default_value = "treesync.toml")]
        config: PathBuf,

        /// Tasks to run (all when omitted)
        tasks: Vec<String>,
    },
    /// Mirror everything under SOURCE into DESTINATION
    Mirror {
        source: PathBuf,
        destination: PathBuf,

        /// Remove destination entries missing from the source
        #[arg(long)]
        delete: bool,

        /// Only report what would change
        #[arg(long)]
        pretend: bool,

        /// Abort on the first failed action
        #[arg(long)]
        fail_on_error: bool,

        /// Log every action at info level
        #[arg(short, long)]
        verbose: bool,

        /// Destination pattern never deleted (repeatable)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,

        /// How to decide a destination file is current
        #[arg(long, value_enum, default_value_t = Compare::Mtime)]
        compare: Compare,
    },
    /// Validate a task file
    Check {
        /// Task file path
        #[arg(short, long, default_value = "treesync.toml")]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Compare {
    Mtime,
    Hash,
}

impl Compare {
    fn as_str(self) -> &'static str {
        match self {
            Compare::Mtime => "mtime",
            Compare::Hash => "hash",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run { config, tasks } => run_tasks(&config, &tasks, cli.json).await,
        Commands::Mirror {
            source,
            destination,
            delete,
            pretend,
            fail_on_error,
            verbose,
            ignore,
            compare,
        } => {
            let options = SyncOptions {
                update_and_delete: delete,
                pretend,
                fail_on_error,
                verbose,
                ignore_in_dest: (!ignore.is_empty()).then(|| OneOrMany::from(ignore)),
                compare_using: compare.as_str().to_string(),
                ..Default::default()
            };

            mirror(&source, &destination, options, cli.json).await
        }
        Commands::Check { config } => check_config(&config).await,
    }
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("treesync={},treesync_cli={}", level, level))
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn load_tasks(config: &Path) -> Result<TaskFile> {
    let file = TaskFile::load(config)
        .await
        .with_context(|| format!("Failed to load task file '{}'", config.display()))?;
    file.validate()
        .with_context(|| format!("Invalid task file '{}'", config.display()))?;
    Ok(file)
}

async fn run_tasks(config: &Path, names: &[String], json: bool) -> Result<()> {
    let file = load_tasks(config).await?;

    let selected: Vec<String> = if names.is_empty() {
        file.tasks.keys().cloned().collect()
    } else {
        names.to_vec()
    };

    for name in &selected {
        let task = file.task(name)?;
        info!("Running task '{}'", name);

        let metrics = treesync::sync_task(task)
            .await
            .with_context(|| format!("Task '{}' failed", name))?;
        report(&metrics, json)?;
    }

    Ok(())
}

async fn mirror(source: &Path, destination: &Path, options: SyncOptions, json: bool) -> Result<()> {
    // A missing source lists as empty and would prune the whole destination.
    let is_dir = tokio::fs::metadata(source).await.map(|meta| meta.is_dir()).unwrap_or(false);
    if !is_dir {
        bail!("Source '{}' is not a directory", source.display());
    }

    info!("Mirroring {} -> {}", source.display(), destination.display());
    let metrics = treesync::mirror_directory(source, destination, options)
        .await
        .with_context(|| format!("Failed to mirror '{}'", source.display()))?;
    report(&metrics, json)
}

async fn check_config(config: &Path) -> Result<()> {
    let file = load_tasks(config).await?;

    for (name, task) in &file.tasks {
        let rules = if task.files.is_empty() { 1 } else { task.files.len() };
        println!(
            "{}: {} rule(s), {}{}",
            name,
            rules,
            if task.options.update_and_delete { "update and delete" } else { "update only" },
            if task.options.pretend { ", pretend" } else { "" },
        );
    }

    println!("Task file '{}' is valid", config.display());
    Ok(())
}

fn report(metrics: &SyncMetrics, json: bool) -> Result<()> {
    if json {
        println!("{}", metrics.to_json()?);
    } else {
        println!("{}", metrics.summary());
    }

    if !metrics.is_successful() {
        warn!("{} action(s) failed and were skipped", metrics.warnings.len());
    }

    Ok(())
}
