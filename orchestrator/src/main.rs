//! agentflow CLI
//!
//! Usage:
//!   agentflow run --goal "Review https://github.com/acme/widgets"
//!   agentflow run --goal "..." --plan plan.toml --yes --out artifacts
//!   agentflow plan --goal "Write a market report"
//!   agentflow history list
//!   agentflow history show <id>
//!   agentflow self-test
//!   agentflow models

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent::config::AgentFileConfig;
use agent::db::{Database, RunRecord};
use agent::llm::{list_models, Llm, OllamaClient};
use orchestrator::artifact::write_artifacts;
use orchestrator::checkpoint::{AutoApproveHandler, InteractiveApprovalHandler, PlanApprovalHandler};
use orchestrator::events::{event_channel, EventReceiver, LogEntry, LogLevel, RunEvent, RunEventSender};
use orchestrator::executor::LlmStepExecutor;
use orchestrator::github::GitHubRepoSource;
use orchestrator::history::RunStore;
use orchestrator::planner::LlmPlanner;
use orchestrator::scratchpad::parse_last_record;
use orchestrator::review::LlmReviewer;
use orchestrator::selector::HeuristicFileSelector;
use orchestrator::selftest::run_self_test;
use orchestrator::synthesizer::LlmSynthesizer;
use orchestrator::{Goal, Plan, PlanRunner, RoleRegistry, Run, RunnerConfig, Services, UploadedFile};

#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "Plan, execute, review and synthesize multi-agent LLM runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_URL", global = true)]
    ollama_url: Option<String>,

    /// Default model to use
    #[arg(short = 'm', long, env = "OLLAMA_MODEL", global = true)]
    model: Option<String>,

    /// Config file (default: nearest .agentflow.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and execute a goal
    Run {
        /// What the agents should accomplish
        #[arg(long, short)]
        goal: String,

        /// File whose text is attached to the goal
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Execute this TOML plan instead of asking the planner
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Approve the plan without asking
        #[arg(long, short)]
        yes: bool,

        /// Directory for artifacts (default from config)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Print the plan for a goal without executing it
    Plan {
        #[arg(long, short)]
        goal: String,

        #[arg(long, short)]
        file: Option<PathBuf>,
    },
    /// Stored runs
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Run a review of the fixture repository end to end
    SelfTest,
    /// List models on the Ollama server
    Models,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List recent runs
    List {
        #[arg(long, short, default_value_t = 20)]
        limit: u32,
    },
    /// Replay a stored run
    Show {
        /// Run ID
        id: String,
    },
    /// Delete all stored runs
    Clear,
}

/// Initialize tracing with the given verbosity level
///
/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
///
/// `RUST_LOG` overrides the level; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Settings resolved from CLI flags over the config file
struct Settings {
    file: AgentFileConfig,
    ollama_url: String,
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = match &cli.config {
        Some(path) => AgentFileConfig::load_from_path(path)?,
        None => AgentFileConfig::load()?,
    };
    let settings = Settings {
        ollama_url: cli.ollama_url.unwrap_or_else(|| file.llm.url.clone()),
        model: cli.model.unwrap_or_else(|| file.llm.model.clone()),
        file,
    };

    match cli.command {
        Commands::Run {
            goal,
            file,
            plan,
            yes,
            out,
        } => run_command(&settings, goal, file, plan, yes, out).await,
        Commands::Plan { goal, file } => plan_command(&settings, goal, file).await,
        Commands::History { command } => history_command(&settings, command),
        Commands::SelfTest => self_test_command(&settings).await,
        Commands::Models => models_command(&settings).await,
    }
}

fn build_services(settings: &Settings) -> Result<Services> {
    let mut roles = RoleRegistry::with_defaults();
    roles.apply_overrides(&settings.file.roles);

    let llm: Arc<dyn Llm> = Arc::new(OllamaClient::new(&settings.ollama_url, &settings.model)?);

    let mut executor = LlmStepExecutor::new(llm.clone(), roles.clone());
    for model in roles.override_models() {
        let client = Arc::new(OllamaClient::new(&settings.ollama_url, &model)?);
        executor = executor.with_model_client(model, client);
    }

    let github = &settings.file.github;
    Ok(Services {
        planner: Arc::new(LlmPlanner::new(llm.clone(), roles)),
        executor: Arc::new(executor),
        reviewer: Arc::new(LlmReviewer::new(llm.clone())),
        synthesizer: Arc::new(LlmSynthesizer::new(llm)),
        repo: Arc::new(GitHubRepoSource::new(github.clone())?),
        selector: Arc::new(HeuristicFileSelector::new(github.max_files)),
    })
}

fn open_history(settings: &Settings) -> Result<Database> {
    match &settings.file.history.db_path {
        Some(path) => Database::open_at(path.clone()),
        None => Database::open(),
    }
}

fn load_goal(text: String, file: Option<PathBuf>) -> Result<Goal> {
    let goal = Goal::new(text);
    let Some(path) = file else {
        return Ok(goal);
    };

    let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(goal.with_file(UploadedFile::new(name, String::from_utf8_lossy(&bytes))))
}

async fn run_command(
    settings: &Settings,
    goal: String,
    file: Option<PathBuf>,
    plan: Option<PathBuf>,
    yes: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let goal = load_goal(goal, file)?;
    let plan = plan.map(|path| Plan::from_toml_file(&path)).transpose()?;

    let approval: Arc<dyn PlanApprovalHandler> = if yes {
        Arc::new(AutoApproveHandler)
    } else {
        Arc::new(InteractiveApprovalHandler)
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current step...");
            ctrl_c.cancel();
        }
    });

    let (tx, rx) = event_channel();
    let printer = tokio::spawn(print_events(rx));

    let mut runner = PlanRunner::new(
        build_services(settings)?,
        runner_config(settings),
    )
    .with_approval_handler(approval)
    .with_event_sender(RunEventSender::new(tx))
    .with_cancellation(cancel);

    if settings.file.history.enabled {
        match open_history(settings) {
            Ok(db) => runner = runner.with_store(Arc::new(db) as Arc<dyn RunStore>),
            Err(e) => tracing::warn!("Run history disabled: {:#}", e),
        }
    }

    let run = match plan {
        Some(plan) => runner.run_with_plan(goal, plan).await,
        None => runner.run(goal).await,
    };
    drop(runner);
    let _ = printer.await;

    report_run(&run, out.as_deref().unwrap_or(&settings.file.orchestrator.output_dir))
}

fn report_run(run: &Run, out_dir: &Path) -> Result<()> {
    println!("\n{}", "═".repeat(60));
    println!("Run {}: {:?}", run.id, run.state);

    if !run.is_finished() {
        println!("Scratchpad at time of stop:\n{}", run.scratchpad.render());
        bail!("Run {} did not finish: {}", run.id, run.error().unwrap_or("unknown error"));
    }

    for path in write_artifacts(out_dir, run.artifacts())? {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

async fn print_events(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::StepStarted {
                ordinal,
                role,
                task,
            } => println!("\n── Step {} [{}] {}", ordinal, role, task),
            RunEvent::Log(entry) => print_log_entry(&entry),
            RunEvent::ArtifactsReady { artifacts } => {
                let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
                println!("\nArtifacts: {}", names.join(", "));
            }
            RunEvent::StateChanged { state } => tracing::debug!(?state, "Run state"),
            RunEvent::ScratchpadUpdated { ordinal, scratchpad } => {
                tracing::trace!(ordinal, length = scratchpad.len(), "Scratchpad updated")
            }
        }
    }
}

fn print_log_entry(entry: &LogEntry) {
    let tag = match entry.level {
        LogLevel::Info => "   ",
        LogLevel::Warning => " ! ",
        LogLevel::Error => " ✗ ",
    };
    println!(
        "{} {}{}: {}",
        entry.timestamp.format("%H:%M:%S"),
        tag,
        entry.role,
        entry.message
    );
}

fn runner_config(settings: &Settings) -> RunnerConfig {
    RunnerConfig::from_section(&settings.file.orchestrator)
        .with_max_files(settings.file.github.max_files)
}

async fn plan_command(settings: &Settings, goal: String, file: Option<PathBuf>) -> Result<()> {
    let goal = load_goal(goal, file)?;
    let runner = PlanRunner::new(
        build_services(settings)?,
        runner_config(settings),
    );

    let plan = runner.request_plan(&goal).await?;
    println!("{}", plan.summary());
    Ok(())
}

fn history_command(settings: &Settings, command: HistoryCommands) -> Result<()> {
    let db = open_history(settings)?;

    match command {
        HistoryCommands::List { limit } => {
            let runs = db.list_runs(limit)?;
            if runs.is_empty() {
                println!("No stored runs.");
            }
            for run in runs {
                println!(
                    "{}  {}  {:<9}  {:>7}ms  {}",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M"),
                    run.status.to_string(),
                    run.duration_ms,
                    run.goal
                );
            }
        }

        HistoryCommands::Show { id } => match db.get_run(&id)? {
            Some(record) => replay(&record),
            None => bail!("Run '{}' not found", id),
        },

        HistoryCommands::Clear => {
            let removed = db.clear_runs()?;
            println!("Removed {} run(s).", removed);
        }
    }

    Ok(())
}

fn replay(record: &RunRecord) {
    println!("Run: {}", record.id);
    println!("Goal: {}", record.goal);
    println!("Status: {}", record.status);
    println!("Started: {}", record.started_at.to_rfc3339());
    println!("Duration: {}ms", record.duration_ms);
    if let Some(error) = &record.error {
        println!("Error: {}", error);
    }

    println!("\nLog:");
    match serde_json::from_value::<Vec<LogEntry>>(record.log.clone()) {
        Ok(entries) => entries.iter().for_each(print_log_entry),
        Err(e) => println!("  (unreadable log: {})", e),
    }

    println!("\nScratchpad:\n{}", record.scratchpad);
    if let Some(last) = parse_last_record(&record.scratchpad) {
        println!("Last recorded step: {} ({})", last.ordinal, last.role);
    }

    if let Some(artifacts) = record.artifacts.as_ref().and_then(|a| a.as_array()) {
        println!("Artifacts:");
        for artifact in artifacts {
            println!(
                "  {} ({})",
                artifact["name"].as_str().unwrap_or("?"),
                artifact["mediaKind"].as_str().unwrap_or("?")
            );
        }
    }
}

async fn self_test_command(settings: &Settings) -> Result<()> {
    let config = runner_config(settings);
    let report = run_self_test(build_services(settings)?, config).await;

    for entry in &report.run.log {
        print_log_entry(entry);
    }

    println!();
    if report.passed {
        println!(
            "Self-test passed: {} artifact(s) produced.",
            report.run.artifacts().len()
        );
        Ok(())
    } else {
        for problem in &report.problems {
            println!("  - {}", problem);
        }
        bail!("Self-test failed")
    }
}

async fn models_command(settings: &Settings) -> Result<()> {
    let models = list_models(&settings.ollama_url).await?;
    if models.is_empty() {
        println!("No models installed on {}", settings.ollama_url);
    }
    for model in models {
        let marker = if model.name == settings.model { "*" } else { " " };
        println!(
            "{} {:<40} {:>8.1} GB  {}",
            marker,
            model.name,
            model.size as f64 / 1e9,
            model.modified_at
        );
    }
    Ok(())
}
