//! PlanForge CLI entry point
//!
//! Uploads inputs to the blob store, starts jobs, and polls their status
//! until terminal - the same polling surface a UI client would use.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result, eyre};
use tracing::info;

use planstore::{BlobStore, Database, PlanStore, SettingsStore, StoredPlanSummary};

use planforge::cli::{Cli, Command, KeysCommand, PlansCommand, PromptCommand, TuningCommand};
use planforge::config::{Config, SYSTEM_PROMPT_SETTING, SnapshotSource, TUNING_SETTING};
use planforge::domain::{JobStatus, plan_category};
use planforge::gate::CallGate;
use planforge::gateway::{GeminiFactory, MediaResolution, Tuning};
use planforge::jobs::{BatchRunner, JobBoard, PipelineContext, PlanJobRunner};
use planforge::{JsonExporter, prompts};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planforge")
        .join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("planforge.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

/// Wired-up application services
struct App {
    config: Config,
    runner: PlanJobRunner,
    batch: BatchRunner,
    plans: PlanStore,
    settings: Arc<SettingsStore>,
    blobs: Arc<BlobStore>,
}

fn build_app(config: Config) -> Result<App> {
    fs::create_dir_all(&config.storage.data_dir).context("Failed to create data directory")?;

    let db = Arc::new(Database::open(config.storage.database_path())?);
    let plans = PlanStore::new(Arc::clone(&db));
    let settings = Arc::new(SettingsStore::new(db));
    let blobs = Arc::new(BlobStore::open(config.storage.blob_root())?);

    let ctx = PipelineContext {
        factory: Arc::new(GeminiFactory::new(config.provider.clone())),
        snapshots: Arc::new(SnapshotSource::new(config.provider.clone(), Arc::clone(&settings))),
        gate: Arc::new(CallGate::new(config.concurrency.gate())),
        board: JobBoard::new(),
        plans: plans.clone(),
        blobs: Arc::clone(&blobs),
        exporter: Some(Arc::new(JsonExporter)),
        retry: config.retry.policy(),
        quality: config.quality.clone(),
        job_timeout: config.jobs.job_timeout(),
    };

    Ok(App {
        runner: PlanJobRunner::new(ctx.clone()),
        batch: BatchRunner::new(ctx, config.concurrency.batch_workers),
        plans,
        settings,
        blobs,
        config,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "PlanForge loaded config: provider={}, model={}",
        config.provider.provider, config.provider.model
    );
    let app = build_app(config)?;

    match cli.command {
        Command::Generate { files, template, options } => cmd_generate(&app, files, template, options).await,
        Command::Convert { file } => cmd_convert(&app, file).await,
        Command::Batch { files, template, options } => cmd_batch(&app, files, template, options).await,
        Command::Plans { command } => cmd_plans(&app, command),
        Command::Prompt { command } => cmd_prompt(&app, command),
        Command::Keys { command } => cmd_keys(&app, command),
        Command::Tuning { command } => cmd_tuning(&app, command),
    }
}

fn upload(blobs: &BlobStore, path: &Path, category: &str) -> Result<String> {
    let bytes = fs::read(path).context(format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    Ok(blobs.put(&bytes, filename, category)?)
}

fn validate_category(category: Option<&str>) -> Result<()> {
    if let Some(id) = category
        && plan_category(id).is_none()
    {
        let known: Vec<_> = planforge::domain::PLAN_CATEGORIES.iter().map(|c| c.id).collect();
        return Err(eyre!("Unknown plan category '{}'. Known: {}", id, known.join(", ")));
    }
    Ok(())
}

async fn cmd_generate(
    app: &App,
    files: Vec<PathBuf>,
    template: Option<PathBuf>,
    options: planforge::cli::AnalysisArgs,
) -> Result<()> {
    let options = options.to_options();
    validate_category(options.plan_category.as_deref())?;

    let mut file_ids = Vec::with_capacity(files.len());
    for file in &files {
        file_ids.push(upload(&app.blobs, file, "uploads")?);
    }
    let template_id = template
        .as_deref()
        .map(|path| upload(&app.blobs, path, "templates"))
        .transpose()?;

    let job = app.runner.start_generate(file_ids, options, template_id);
    println!("Job {} started ({} files)", job.id, job.total_files);

    let job = poll_until_terminal(app, &job.id).await?;
    match job.status {
        JobStatus::Success => {
            let plan_id = job.plan_id.as_deref().unwrap_or_default();
            let stored = app.plans.get(plan_id)?;
            println!("{}", stored.plan_json);
            if let Some(export_id) = &job.export_id {
                eprintln!("Export available at: {}", export_id);
            }
            Ok(())
        }
        _ => Err(eyre!(
            "Job failed: {}",
            job.message.unwrap_or_else(|| "unknown error".to_string())
        )),
    }
}

async fn cmd_convert(app: &App, file: PathBuf) -> Result<()> {
    let file_id = upload(&app.blobs, &file, "external")?;
    let job = app.runner.start_convert(file_id);
    println!("Job {} started", job.id);

    let job = poll_until_terminal(app, &job.id).await?;
    match job.status {
        JobStatus::Success => {
            let stored = app.plans.get(job.plan_id.as_deref().unwrap_or_default())?;
            println!("{}", stored.plan_json);
            Ok(())
        }
        _ => Err(eyre!(
            "Conversion failed: {}",
            job.message.unwrap_or_else(|| "unknown error".to_string())
        )),
    }
}

async fn cmd_batch(
    app: &App,
    files: Vec<PathBuf>,
    template: Option<PathBuf>,
    options: planforge::cli::AnalysisArgs,
) -> Result<()> {
    let options = options.to_options();
    validate_category(options.plan_category.as_deref())?;

    let mut file_ids = Vec::with_capacity(files.len());
    for file in &files {
        file_ids.push(upload(&app.blobs, file, "uploads")?);
    }
    let template_id = template
        .as_deref()
        .map(|path| upload(&app.blobs, path, "templates"))
        .transpose()?;

    let batch = app.batch.start(file_ids, options, template_id);
    println!("Batch {} started ({} files)", batch.id, batch.total_files);

    let mut last_message = None;
    let batch = loop {
        let Some(snapshot) = app.batch.status(&batch.id) else {
            return Err(eyre!("Batch disappeared: {}", batch.id));
        };
        if snapshot.message != last_message {
            if let Some(message) = &snapshot.message {
                println!("  {}", message);
            }
            last_message = snapshot.message.clone();
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        tokio::time::sleep(app.config.jobs.poll_interval()).await;
    };

    for (index, slot) in batch.sub_results.iter().enumerate() {
        match slot {
            Some(sub) => {
                let outcome = match sub.outcome {
                    planforge::FileOutcome::Success => "ok",
                    planforge::FileOutcome::Failed => "failed",
                };
                let flags = if sub.flags.is_empty() {
                    String::new()
                } else {
                    format!(" flags={:?}", sub.flags)
                };
                println!(
                    "  [{}] {} {} {}{}",
                    index + 1,
                    sub.file_id,
                    outcome,
                    sub.plan_id.as_deref().unwrap_or("-"),
                    flags
                );
            }
            None => println!("  [{}] missing result", index + 1),
        }
    }
    println!(
        "Batch {}: {} succeeded, {} failed",
        batch.status, batch.success_count, batch.failure_count
    );

    if batch.status == JobStatus::Success {
        Ok(())
    } else {
        Err(eyre!(
            "Batch failed: {}",
            batch.message.unwrap_or_else(|| "unknown error".to_string())
        ))
    }
}

async fn poll_until_terminal(app: &App, job_id: &str) -> Result<planforge::Job> {
    let mut last_message = None;
    loop {
        let Some(job) = app.runner.status(job_id) else {
            return Err(eyre!("Job disappeared: {}", job_id));
        };
        if job.message != last_message {
            if let Some(message) = &job.message {
                println!("  [{}] {}", job.status, message);
            }
            last_message = job.message.clone();
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(app.config.jobs.poll_interval()).await;
    }
}

fn cmd_plans(app: &App, command: PlansCommand) -> Result<()> {
    match command {
        PlansCommand::List { limit } => {
            let summaries = app.plans.list(limit)?;
            if summaries.is_empty() {
                println!("No stored plans.");
                return Ok(());
            }
            for summary in summaries {
                print_summary(&summary);
            }
            Ok(())
        }
        PlansCommand::Show { id } => {
            let stored = app.plans.get(&id)?;
            print_summary(&stored.summary);
            println!("{}", stored.plan_json);
            Ok(())
        }
    }
}

fn print_summary(summary: &StoredPlanSummary) {
    let file_count = summary
        .metadata
        .as_ref()
        .and_then(|m| m.get("file_count"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    println!(
        "{}  {:<9}  {}  files={}  export={}",
        summary.id,
        summary.source,
        summary.created_at.format("%Y-%m-%d %H:%M:%S"),
        file_count,
        summary.export_id.as_deref().unwrap_or("-")
    );
}

fn cmd_prompt(app: &App, command: PromptCommand) -> Result<()> {
    match command {
        PromptCommand::Show => {
            match app.settings.get_setting(SYSTEM_PROMPT_SETTING)? {
                Some(setting) => {
                    println!("{}", setting.value);
                    println!();
                    println!("(override set {})", setting.updated_at.format("%Y-%m-%d %H:%M:%S"));
                }
                None => {
                    println!("{}", prompts::DEFAULT_SYSTEM_PROMPT);
                    println!();
                    println!("(using built-in default)");
                }
            }
            Ok(())
        }
        PromptCommand::Set { text } => {
            app.settings.set_setting(SYSTEM_PROMPT_SETTING, &text)?;
            println!("System prompt override stored.");
            Ok(())
        }
        PromptCommand::Reset => {
            app.settings.delete_setting(SYSTEM_PROMPT_SETTING)?;
            println!("System prompt reset to the built-in default.");
            Ok(())
        }
    }
}

fn cmd_keys(app: &App, command: KeysCommand) -> Result<()> {
    match command {
        KeysCommand::List => {
            let keys = app.settings.list_api_keys()?;
            if keys.is_empty() {
                println!("No API keys configured.");
                return Ok(());
            }
            for key in keys {
                println!(
                    "{:<12} {:<20} ....{}  updated {}",
                    key.name,
                    key.label,
                    key.last_four.as_deref().unwrap_or("????"),
                    key.updated_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
        KeysCommand::Set { name, value, label } => {
            let summary = app.settings.set_api_key(&name, &value, label.as_deref())?;
            println!(
                "Stored key '{}' (....{})",
                summary.name,
                summary.last_four.as_deref().unwrap_or("????")
            );
            Ok(())
        }
        KeysCommand::Delete { name } => {
            app.settings.delete_api_key(&name)?;
            println!("Deleted key '{}'.", name);
            Ok(())
        }
    }
}

fn cmd_tuning(app: &App, command: TuningCommand) -> Result<()> {
    match command {
        TuningCommand::Show => {
            match app.settings.get_setting(TUNING_SETTING)? {
                Some(setting) => println!("{}", setting.value),
                None => println!("No tuning override; provider defaults apply."),
            }
            Ok(())
        }
        TuningCommand::Set {
            temperature,
            top_p,
            media_resolution,
        } => {
            let media_resolution = media_resolution
                .as_deref()
                .map(|raw| {
                    MediaResolution::parse(raw)
                        .ok_or_else(|| eyre!("Unknown media resolution '{}'. Use: low, medium, high", raw))
                })
                .transpose()?;
            let tuning = Tuning {
                temperature,
                top_p,
                media_resolution,
            };
            tuning.validate().map_err(|e| eyre!(e))?;
            app.settings
                .set_setting(TUNING_SETTING, &serde_json::to_string(&tuning)?)?;
            println!("Tuning override stored.");
            Ok(())
        }
        TuningCommand::Reset => {
            app.settings.delete_setting(TUNING_SETTING)?;
            println!("Tuning override removed; provider defaults apply.");
            Ok(())
        }
    }
}
