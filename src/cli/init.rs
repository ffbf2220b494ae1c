//! Init command implementation
//!
//! Scaffolds a sleuth project: configuration, environment template and an
//! example research plan.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (sleuth.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (ollama or openai)
    pub provider: String,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing sleuth");

    if config.provider != "ollama" && config.provider != "openai" {
        output.error(&format!(
            "Unknown provider '{}', expected ollama or openai",
            config.provider
        ));
        return InitResult::Error(format!("unknown provider: {}", config.provider));
    }

    let base_path = &config.path;
    let config_path = base_path.join("sleuth.toml");
    if config_path.exists() && !config.force {
        output.warning("sleuth.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let data_dir = base_path.join("data");
    if let Err(e) = fs::create_dir_all(&data_dir) {
        output.error(&format!("Failed to create data/: {}", e));
        return InitResult::Error(e.to_string());
    }

    output.subheader("Creating files");

    let files = [
        ("config", "sleuth.toml", generate_sleuth_toml(&config.provider)),
        ("env", ".env.example", generate_env_example()),
        ("plan", "plan.example.json", generate_example_plan()),
    ];

    for (kind, name, content) in &files {
        match write_file(&base_path.join(name), content, config.force) {
            Ok(true) => output.created(kind, name),
            Ok(false) => output.skipped(name, "already exists"),
            Err(e) => {
                output.error(&format!("Failed to create {}: {}", name, e));
                return InitResult::Error(e.to_string());
            }
        }
    }

    output.complete("sleuth project initialized!");

    output.header("Next Steps");
    output.newline();
    if config.provider == "ollama" {
        output.info("1. Start Ollama and pull a model:");
        output.command("ollama serve");
        output.command("ollama pull llama3.2");
    } else {
        output.info("1. Set your API key:");
        output.command("cp .env.example .env");
        output.command("# Edit .env and set OPENAI_API_KEY");
    }
    output.newline();
    output.info("2. Check the example plan, then run it:");
    output.command("sleuth plan plan.example.json");
    output.command("sleuth run plan.example.json");

    InitResult::Success
}

/// Returns whether the file was written.
fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

fn generate_sleuth_toml(provider: &str) -> String {
    let llm_section = if provider == "openai" {
        r#"[llm]
provider = "openai"
model = "gpt-4o-mini"
# base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
"#
    } else {
        r#"[llm]
provider = "ollama"
model = "llama3.2"
# base_url = "http://localhost:11434"
"#
    };

    format!(
        r#"# sleuth configuration
# Every section is optional; the values below are the defaults.

{llm_section}
[store]
# SQLite file shared across runs, or ":memory:"
path = "./data/content.db"

[scheduler]
max_workers = 4
# 0 disables the per-task deadline
task_timeout_secs = 300

[research]
# Stored documents at least this long are reused without scraping
min_content_length = 500
tool_selection_attempts = 3
max_followup_topics = 5
max_content_chars = 8000
# prompts_dir = "./prompts"

[search]
num_results = 10

[scrape]
max_concurrency = 4
# 0 disables rate limiting
requests_per_second = 5

[index]
enabled = false
collection = "research-notes"
# embedding_model = "nomic-embed-text"
"#
    )
}

fn generate_env_example() -> String {
    r#"# sleuth Environment Variables
# Copy this file to .env and fill in the values.

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,sleuth=debug

# Optional: OpenAI API key (if using the openai provider)
# OPENAI_API_KEY=sk-...
"#
    .to_string()
}

fn generate_example_plan() -> String {
    r#"{
  "query": "How practical are residential heat pumps in cold climates?",
  "questions": [
    {
      "id": "1",
      "text": "How do air-source heat pumps work?",
      "dependencies": []
    },
    {
      "id": "2",
      "text": "How does outdoor temperature affect heat pump efficiency?",
      "dependencies": ["1"]
    },
    {
      "id": "3",
      "text": "What do cold-climate heat pump installations cost?",
      "dependencies": []
    },
    {
      "id": "4",
      "text": "Are heat pumps cost-effective in cold climates compared to gas furnaces?",
      "dependencies": ["2", "3"]
    }
  ]
}
"#
    .to_string()
}
