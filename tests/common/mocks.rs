//! Mock implementations for testing.
//!
//! Scripted stand-ins for the oracle, content providers and the scraper, so
//! the research protocol can be exercised end to end without a model or a
//! network connection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sleuth::db::ContentStore;
use sleuth::llm::{LLMClient, LLMResponse};
use sleuth::rag::{Embedder, NotesIndex};
use sleuth::research::{ProgressEvent, ProgressSink, ResearchContext, ResearchRunner};
use sleuth::tools::{ContentProvider, Scraper, ToolRegistry};
use sleuth::types::{AppError, RawDocument, Result, ScrapedPage, ToolCall, ToolDefinition};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which snippets the scripted oracle picks.
#[derive(Clone, Debug)]
pub enum Selection {
    /// Every listed snippet. Indices past the end are dropped by the runner.
    All,
    Indices(Vec<i64>),
}

/// Oracle with scripted answers, routed by the shape of the request.
///
/// - tool selection calls every offered tool (or nothing when scripted to)
/// - a schema with `research_topics` gets the scripted follow-ups
/// - a schema with `snippet_indices` gets the scripted selection
/// - free text gets `notes`
pub struct ScriptedLLMClient {
    pub follow_ups: Vec<String>,
    pub selection: Selection,
    pub notes: String,
    pub select_no_tools: bool,
    pub tool_selection_calls: AtomicUsize,
    pub sufficiency_calls: AtomicUsize,
    pub selection_prompts: Mutex<Vec<String>>,
    pub notes_prompts: Mutex<Vec<String>>,
    pub tool_topics: Mutex<Vec<String>>,
}

impl Default for ScriptedLLMClient {
    fn default() -> Self {
        Self {
            follow_ups: Vec::new(),
            selection: Selection::All,
            notes: "- scripted note".to_string(),
            select_no_tools: false,
            tool_selection_calls: AtomicUsize::new(0),
            sufficiency_calls: AtomicUsize::new(0),
            selection_prompts: Mutex::new(Vec::new()),
            notes_prompts: Mutex::new(Vec::new()),
            tool_topics: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedLLMClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_follow_ups(mut self, topics: &[&str]) -> Self {
        self.follow_ups = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Never select a tool.
    pub fn selecting_no_tools(mut self) -> Self {
        self.select_no_tools = true;
        self
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn generate_with_system(&self, system: &str, _prompt: &str) -> Result<String> {
        self.notes_prompts.lock().push(system.to_string());
        Ok(self.notes.clone())
    }

    async fn generate_json(&self, system: &str, _prompt: &str, schema: &Value) -> Result<Value> {
        let properties = &schema["properties"];
        if properties.get("research_topics").is_some() {
            self.sufficiency_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({ "research_topics": self.follow_ups }));
        }
        if properties.get("snippet_indices").is_some() {
            self.selection_prompts.lock().push(system.to_string());
            let indices: Vec<i64> = match &self.selection {
                Selection::All => (0..64).collect(),
                Selection::Indices(indices) => indices.clone(),
            };
            return Ok(json!({ "snippet_indices": indices }));
        }
        Err(AppError::LLM(format!("Unscripted schema: {}", schema)))
    }

    async fn generate_with_tools(
        &self,
        prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.tool_selection_calls.fetch_add(1, Ordering::SeqCst);
        self.tool_topics.lock().push(prompt.to_string());

        let tool_calls = if self.select_no_tools {
            Vec::new()
        } else {
            tools
                .iter()
                .enumerate()
                .map(|(i, tool)| ToolCall {
                    id: format!("call_{}", i),
                    name: tool.name.clone(),
                    arguments: json!({}),
                })
                .collect()
        };

        Ok(LLMResponse {
            content: String::new(),
            finish_reason: (if tool_calls.is_empty() { "stop" } else { "tool_calls" }).to_string(),
            tool_calls,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Provider returning fixed documents per topic, counting its calls.
pub struct StaticProvider {
    name: String,
    by_topic: HashMap<String, Vec<RawDocument>>,
    fallback: Vec<RawDocument>,
    fail: bool,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl StaticProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            by_topic: HashMap::new(),
            fallback: Vec::new(),
            fail: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Documents returned for any topic without its own entry.
    pub fn returning(mut self, docs: Vec<RawDocument>) -> Self {
        self.fallback = docs;
        self
    }

    pub fn for_topic(mut self, topic: &str, docs: Vec<RawDocument>) -> Self {
        self.by_topic.insert(topic.to_string(), docs);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl ContentProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Scripted documents"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": { "query": { "type": "string" } } })
    }

    async fn fetch(&self, topic: &str, args: &Value) -> Result<Vec<RawDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .push(args["query"].as_str().unwrap_or_default().to_string());

        if self.fail {
            return Err(AppError::Tool("provider unavailable".to_string()));
        }
        Ok(self
            .by_topic
            .get(topic)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Scraper returning `full_text_len` characters per URL, counting batches.
pub struct CountingScraper {
    full_text_len: usize,
    failing: HashSet<String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
}

impl CountingScraper {
    pub fn new(full_text_len: usize) -> Self {
        Self {
            full_text_len,
            failing: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, so other work can interleave with the scrape.
    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    /// URLs that cannot be scraped.
    pub fn failing_on(mut self, urls: &[&str]) -> Self {
        self.failing = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn scraped_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Scraper for CountingScraper {
    async fn fetch_full_text(&self, urls: &[String]) -> Vec<ScrapedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().extend(urls.iter().cloned());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        urls.iter()
            .filter(|url| !self.failing.contains(url.as_str()))
            .map(|url| ScrapedPage {
                url: url.clone(),
                full_text: text_of_len(self.full_text_len),
            })
            .collect()
    }
}

/// Sink that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

pub fn text_of_len(len: usize) -> String {
    "x".repeat(len)
}

/// A provider document with `content_len` characters of content.
pub fn raw_doc(url: &str, title: &str, content_len: usize) -> RawDocument {
    RawDocument {
        url: url.to_string(),
        title: title.to_string(),
        snippet: format!("About {}", title),
        content: text_of_len(content_len),
        source: "static".to_string(),
    }
}

/// Everything a runner test needs to assert on afterwards.
pub struct Harness {
    pub runner: ResearchRunner,
    pub oracle: Arc<ScriptedLLMClient>,
    pub provider: Arc<StaticProvider>,
    pub scraper: Arc<CountingScraper>,
    pub store: Arc<ContentStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub async fn new(
        oracle: ScriptedLLMClient,
        provider: StaticProvider,
        scraper: CountingScraper,
    ) -> Self {
        let store = Arc::new(
            ContentStore::new_memory()
                .await
                .expect("in-memory store"),
        );
        Self::with_store(oracle, provider, scraper, store)
    }

    pub fn with_store(
        oracle: ScriptedLLMClient,
        provider: StaticProvider,
        scraper: CountingScraper,
        store: Arc<ContentStore>,
    ) -> Self {
        Self::build(oracle, provider, scraper, store, None)
    }

    pub fn build(
        oracle: ScriptedLLMClient,
        provider: StaticProvider,
        scraper: CountingScraper,
        store: Arc<ContentStore>,
        index: Option<NotesIndex>,
    ) -> Self {
        let oracle = Arc::new(oracle);
        let provider = Arc::new(provider);
        let scraper = Arc::new(scraper);
        let sink = Arc::new(RecordingSink::default());

        let mut tools = ToolRegistry::new();
        tools.register(provider.clone());

        let mut ctx = ResearchContext::new(
            oracle.clone(),
            Arc::new(tools),
            scraper.clone(),
            store.clone(),
        )
        .with_sink(sink.clone());
        if let Some(index) = index {
            ctx = ctx.with_index(index);
        }

        Self {
            runner: ResearchRunner::new(Arc::new(ctx)),
            oracle,
            provider,
            scraper,
            store,
            sink,
        }
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.sink.events.lock().clone()
    }
}

/// Bag-of-letters embedding, enough for similar text to score higher.
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; 26];
        for c in text.to_ascii_lowercase().chars() {
            if c.is_ascii_lowercase() {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        Ok(v)
    }

    fn model_name(&self) -> &str {
        "letters"
    }
}
