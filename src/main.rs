use anyhow::{bail, Context};
use sleuth::cli::init::{self, InitConfig, InitResult};
use sleuth::cli::output::Output;
use sleuth::cli::{Cli, Commands, StoreCommands};
use sleuth::db::{ContentStore, InMemoryVectorStore};
use sleuth::rag::NotesIndex;
use sleuth::research::{
    ChannelSink, DependencyGraph, ProgressSink, PromptLibrary, ResearchContext, ResearchRunner,
    TaskScheduler, TracingSink,
};
use sleuth::tools::{PageScraper, ToolRegistry};
use sleuth::types::{ResearchPlan, ResearchReport};
use sleuth::utils::SleuthConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let json_logs = init_tracing(cli.verbose);

    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            provider,
        }) => match init::run(
            InitConfig {
                path,
                force,
                provider,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => bail!(e),
        },
        Some(Commands::Config { validate }) => show_config(&cli.config, validate, &output),
        Some(Commands::Plan { plan }) => show_plan(&plan, &output),
        Some(Commands::Store(command)) => store_command(&cli.config, command, &output).await,
        Some(Commands::Run {
            plan,
            output: report_path,
            workers,
        }) => run_plan(&cli.config, &plan, report_path, workers, json_logs, &output).await,
        None => {
            output.banner();
            output.hint("Run `sleuth init` to get started, or `sleuth --help` for all commands");
            Ok(())
        }
    }
}

/// `--verbose` raises the default filter; `RUST_LOG` always wins.
/// `SLEUTH_LOG_FORMAT=json` switches to JSON lines. Returns whether it did.
fn init_tracing(verbose: bool) -> bool {
    let default_filter = if verbose { "info,sleuth=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("SLEUTH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    json
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> anyhow::Result<SleuthConfig> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(SleuthConfig::default());
    }
    SleuthConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn read_plan(path: &Path) -> anyhow::Result<ResearchPlan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    Ok(ResearchPlan::from_json(&text)?)
}

fn show_config(path: &Path, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = SleuthConfig::load(path)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    if validate {
        output.success(&format!("{} is valid", path.display()));
        return Ok(());
    }

    output.header("Configuration");
    output.kv("file", &path.display().to_string());

    output.subheader("Oracle");
    output.kv("provider", &format!("{:?}", config.llm.provider).to_lowercase());
    output.kv("model", &config.llm.model);
    output.kv("base_url", &config.base_url());

    output.subheader("Research");
    output.kv("store", &config.store.path);
    output.kv("max_workers", &config.scheduler.max_workers.to_string());
    output.kv(
        "task_timeout_secs",
        &config.scheduler.task_timeout_secs.to_string(),
    );
    output.kv(
        "min_content_length",
        &config.research.min_content_length.to_string(),
    );
    output.kv(
        "max_followup_topics",
        &config.research.max_followup_topics.to_string(),
    );
    output.kv("search.num_results", &config.search.num_results.to_string());
    output.kv(
        "scrape.requests_per_second",
        &config.scrape.requests_per_second.to_string(),
    );

    output.subheader("Notes index");
    output.kv("enabled", &config.index.enabled.to_string());
    if config.index.enabled {
        output.kv("embedding_model", &config.embedding_model());
        output.kv("collection", &config.index.collection);
    }
    Ok(())
}

fn show_plan(path: &Path, output: &Output) -> anyhow::Result<()> {
    let plan = read_plan(path)?;
    let tasks = plan.to_tasks();
    let graph = DependencyGraph::build(&tasks)?;
    let topics: HashMap<&str, &str> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.topic.as_str()))
        .collect();

    output.header(&format!("Plan: {}", plan.query));
    for (i, wave) in graph.waves().iter().enumerate() {
        output.subheader(&format!("Wave {}", i + 1));
        for id in wave {
            output.list_item(&format!("{}: {}", id, topics.get(id.as_str()).unwrap_or(&"")));
        }
    }
    output.newline();
    output.success(&format!("{} questions, no cycles", graph.len()));
    Ok(())
}

async fn store_command(
    config_path: &Path,
    command: StoreCommands,
    output: &Output,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = config.store_provider().open().await?;

    match command {
        StoreCommands::Get { id, url } => {
            let item = match (id, url) {
                (Some(id), _) => store.get_by_id(&id).await?,
                (None, Some(url)) => store.get_by_url(&url).await?,
                (None, None) => bail!("Pass --id or --url"),
            };
            let Some(item) = item else {
                bail!("No such document in {}", config.store.path);
            };

            output.header(&item.title);
            output.kv("id", &item.id);
            output.kv("url", &item.url);
            output.kv("source", &item.source);
            output.kv("content", &format!("{} chars", item.content_len()));
            output.newline();
            println!("{}", item.snippet);
        }
        StoreCommands::Delete { id } => {
            if store.delete(&id).await? {
                output.success(&format!("Deleted {}", id));
            } else {
                output.warning(&format!("No document with id {}", id));
            }
        }
    }
    Ok(())
}

async fn run_plan(
    config_path: &Path,
    plan_path: &Path,
    report_path: Option<PathBuf>,
    workers: Option<usize>,
    json_logs: bool,
    output: &Output,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(workers) = workers {
        config.scheduler.max_workers = workers;
        config.validate()?;
    }

    let plan = read_plan(plan_path)?;
    let tasks = plan.to_tasks();
    DependencyGraph::build(&tasks)?;

    let provider = config.provider()?;
    let oracle = provider.create_client().await?;
    let store: Arc<ContentStore> = Arc::new(config.store_provider().open().await?);
    let prompts = PromptLibrary::load(config.research.prompts_dir.as_deref())?;
    let tools = Arc::new(ToolRegistry::with_web_search(config.search.num_results));
    let scraper = Arc::new(PageScraper::new(
        config.scrape.max_concurrency,
        config.scrape.requests_per_second,
    ));

    // JSON logs carry progress as structured events; otherwise render it
    let (sink, renderer): (Arc<dyn ProgressSink>, _) = if json_logs {
        let sink: Arc<dyn ProgressSink> = Arc::new(TracingSink);
        (sink, None)
    } else {
        let (sink, mut events) = ChannelSink::channel();
        let colored = output.colored;
        let renderer = tokio::spawn(async move {
            let output = if colored {
                Output::new()
            } else {
                Output::no_color()
            };
            while let Some(event) = events.recv().await {
                output.progress(&event);
            }
        });
        let sink: Arc<dyn ProgressSink> = Arc::new(sink);
        (sink, Some(renderer))
    };

    let mut ctx = ResearchContext::new(oracle, tools, scraper, store.clone())
        .with_prompts(prompts)
        .with_sink(sink)
        .with_settings(config.research_settings());
    if config.index.enabled {
        let embedder = provider.create_embedder().await?;
        ctx = ctx.with_index(NotesIndex::new(
            embedder,
            Arc::new(InMemoryVectorStore::new()),
            config.index.collection.clone(),
        ));
    }

    let scheduler = TaskScheduler::new(
        Arc::new(ResearchRunner::new(Arc::new(ctx))),
        config.scheduler_settings(),
    );

    output.banner();
    output.header(&plan.query);
    output.info(&format!(
        "{} questions, up to {} at once, using {} ({})",
        tasks.len(),
        scheduler.settings().max_workers,
        config.llm.model,
        provider.name()
    ));
    output.newline();

    let results = scheduler.run(tasks).await;
    drop(scheduler);
    if let Some(renderer) = renderer {
        renderer.await.ok();
    }
    let results = results?;

    let report = ResearchReport::new(plan, results);
    let report_path = report_path.unwrap_or_else(|| PathBuf::from(report.default_file_name()));
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&report_path, json)
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;

    let stats = store.stats();
    output.header("Summary");
    output.kv("succeeded", &report.succeeded().count().to_string());
    output.kv("failed", &report.failed().count().to_string());
    output.kv("documents stored", &store.count().await?.to_string());
    output.kv("store hits", &stats.url_hits.to_string());
    output.kv("report", &report_path.display().to_string());

    let failed: Vec<_> = report.failed().collect();
    if !failed.is_empty() {
        output.subheader("Failed tasks");
        for result in failed {
            output.list_item(&format!("{} ({}): {}", result.id, result.topic, result.error));
        }
    }

    output.complete("Research complete");
    Ok(())
}
