use anyhow::Context;
use clap::{Parser, Subcommand};
use crawlwatch::config::{ConfigLoader, SupervisorConfig, DEFAULT_OUTPUT_DIR, ENV_OUTPUT_DIR};
use crawlwatch::layout::{self, OutputLayout};
use crawlwatch::live::{replay_journal, ReplayScope};
use crawlwatch::progress::StatusSnapshot;
use crawlwatch::{CrawlwatchError, RunResult, Supervisor};
use std::path::PathBuf;
use tracing::{debug, error, info, trace};

#[derive(Parser)]
#[command(name = "crawlwatch")]
#[command(about = "Supervise a crawler and track its progress", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawler once under supervision
    Run {
        /// Config file (defaults to ./crawlwatch.toml, then the user config dir)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// First id of the range to crawl
        #[arg(long)]
        start_id: Option<u64>,

        /// Last id of the range to crawl
        #[arg(long)]
        end_id: Option<u64>,

        /// Number of ids per batch
        #[arg(long)]
        group_size: Option<u32>,

        /// Where the crawler writes its export
        #[arg(long)]
        output_location: Option<PathBuf>,

        /// Directory for logs, live status and run records
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,

        /// Crawler program and arguments, replacing the configured command
        #[arg(last = true)]
        program: Vec<String>,
    },
    /// Print the latest live status snapshot
    Status {
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,
    },
    /// Rebuild counters from the event journal
    Replay {
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,

        /// Fold every run in the journal instead of only the last one
        #[arg(long)]
        all: bool,
    },
    /// Print the record of the last run
    Last {
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,
    },
}

struct RunArgs {
    start_id: Option<u64>,
    end_id: Option<u64>,
    group_size: Option<u32>,
    output_location: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    program: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The config is loaded before tracing so its log level can seed the filter.
    let loaded = match &cli.command {
        Commands::Run { config, .. } => load_config(config.as_deref()).await,
        _ => {
            let mut config = SupervisorConfig::default();
            config.merge_env_vars();
            Ok(config)
        }
    };
    let log_level = match &loaded {
        Ok(config) => config.log_filter(cli.verbose),
        Err(_) => SupervisorConfig::default().log_filter(cli.verbose),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("crawlwatch started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Run {
            config: _,
            start_id,
            end_id,
            group_size,
            output_location,
            output_dir,
            program,
        } => {
            run_crawl(
                loaded,
                RunArgs {
                    start_id,
                    end_id,
                    group_size,
                    output_location,
                    output_dir,
                    program,
                },
            )
            .await
        }
        Commands::Status { output_dir } => show_status(output_dir).await,
        Commands::Replay { output_dir, all } => replay(output_dir, all).await,
        Commands::Last { output_dir } => show_last(output_dir).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {e:#}");
            let known = e.downcast_ref::<CrawlwatchError>();
            if known.is_some_and(|err| err.is_not_found()) {
                eprintln!("Hint: nothing recorded there yet, start a run with `crawlwatch run`");
            }
            let code = known.map(|err| err.exit_code()).unwrap_or(1);
            std::process::exit(code);
        }
    }
}

async fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<SupervisorConfig> {
    let base_dir = std::env::current_dir().context("Cannot determine current directory")?;
    Ok(ConfigLoader::new(base_dir).load(explicit).await?)
}

async fn run_crawl(
    loaded: anyhow::Result<SupervisorConfig>,
    args: RunArgs,
) -> anyhow::Result<i32> {
    let mut config = loaded?;
    apply_run_args(&mut config, args);
    config.validate()?;

    let mut supervisor = Supervisor::new(config);
    let cancel = supervisor.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let result = supervisor.run().await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.process_exit_code())
}

fn apply_run_args(config: &mut SupervisorConfig, args: RunArgs) {
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.start_id.is_some() {
        config.crawl.start_id = args.start_id;
    }
    if args.end_id.is_some() {
        config.crawl.end_id = args.end_id;
    }
    if args.group_size.is_some() {
        config.crawl.group_size = args.group_size;
    }
    if args.output_location.is_some() {
        config.crawl.output_location = args.output_location;
    }
    if let Some((program, rest)) = args.program.split_first() {
        config.command.program = program.clone();
        config.command.args = rest.to_vec();
    }
}

/// Output directory for the read-only subcommands
fn resolve_layout(output_dir: Option<PathBuf>) -> OutputLayout {
    let dir = output_dir
        .or_else(|| std::env::var(ENV_OUTPUT_DIR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    OutputLayout::new(dir)
}

async fn show_status(output_dir: Option<PathBuf>) -> anyhow::Result<i32> {
    let layout = resolve_layout(output_dir);
    let snapshot: StatusSnapshot = layout::read_json(&layout.live_status_path()).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(0)
}

async fn replay(output_dir: Option<PathBuf>, all: bool) -> anyhow::Result<i32> {
    let layout = resolve_layout(output_dir);
    let scope = if all {
        ReplayScope::AllRuns
    } else {
        ReplayScope::LastRun
    };
    let replay = replay_journal(&layout.live_events_path(), scope).await?;
    if replay.malformed > 0 {
        info!("Skipped {} malformed journal lines", replay.malformed);
    }
    println!("{}", serde_json::to_string_pretty(&replay)?);
    Ok(0)
}

async fn show_last(output_dir: Option<PathBuf>) -> anyhow::Result<i32> {
    let layout = resolve_layout(output_dir);
    let result = RunResult::load_last(&layout).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(0)
}
