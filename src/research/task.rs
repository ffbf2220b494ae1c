//! The research protocol run for every task.
//!
//! A task inherits the content its dependencies selected, asks the oracle
//! whether that covers its own topic, collects more where it does not,
//! picks the most relevant documents and turns them into notes.

use crate::db::ContentStore;
use crate::llm::{generate_structured, LLMClient};
use crate::rag::NotesIndex;
use crate::research::progress::{DocumentRef, NoopSink, ProgressEvent, ProgressSink};
use crate::research::prompts::{self, PromptLibrary};
use crate::research::scheduler::TaskRunner;
use crate::tools::{Scraper, ToolRegistry};
use crate::types::{ContentItem, RawDocument, Result, Task, TaskResult, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Knobs for the research protocol.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// Stored documents with at least this many characters of content are
    /// reused without scraping.
    pub min_content_length: usize,
    /// How many times to ask the oracle for applicable providers.
    pub tool_selection_attempts: usize,
    /// Upper bound on follow-up topics taken from one sufficiency check.
    pub max_followup_topics: usize,
    /// Per-document cap on content handed to note extraction.
    pub max_content_chars: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            min_content_length: 500,
            tool_selection_attempts: 3,
            max_followup_topics: 5,
            max_content_chars: 8_000,
        }
    }
}

/// Everything a task needs, constructed once at startup and shared.
pub struct ResearchContext {
    pub oracle: Arc<dyn LLMClient>,
    pub tools: Arc<ToolRegistry>,
    pub scraper: Arc<dyn Scraper>,
    pub store: Arc<ContentStore>,
    pub prompts: PromptLibrary,
    pub sink: Arc<dyn ProgressSink>,
    pub index: Option<NotesIndex>,
    pub settings: ResearchSettings,
}

impl ResearchContext {
    pub fn new(
        oracle: Arc<dyn LLMClient>,
        tools: Arc<ToolRegistry>,
        scraper: Arc<dyn Scraper>,
        store: Arc<ContentStore>,
    ) -> Self {
        Self {
            oracle,
            tools,
            scraper,
            store,
            prompts: PromptLibrary::default(),
            sink: Arc::new(NoopSink),
            index: None,
            settings: ResearchSettings::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_index(mut self, index: NotesIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_settings(mut self, settings: ResearchSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SufficiencyAssessment {
    /// New search topics needed to cover the research topic; empty when the
    /// available content is enough.
    research_topics: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContentSelection {
    /// Numbers of the snippets to use, as listed in the prompt.
    snippet_indices: Vec<i64>,
}

/// Runs the research protocol for scheduled tasks.
#[derive(Clone)]
pub struct ResearchRunner {
    ctx: Arc<ResearchContext>,
}

#[async_trait]
impl TaskRunner for ResearchRunner {
    async fn run(&self, task: &Task, dependencies: &[TaskResult]) -> Result<TaskResult> {
        match self.execute(task, dependencies).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.ctx.sink.emit(ProgressEvent::TaskFailed {
                    task_id: task.id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

impl ResearchRunner {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ResearchContext {
        &self.ctx
    }

    /// Run the full protocol for one task. `dependencies` are the results of
    /// the task's declared dependencies.
    pub async fn execute(&self, task: &Task, dependencies: &[TaskResult]) -> Result<TaskResult> {
        tracing::info!(task_id = %task.id, topic = %task.topic, "Executing task");
        self.ctx.sink.emit(ProgressEvent::TaskStarted {
            task_id: task.id.clone(),
            topic: task.topic.clone(),
        });

        let inherited = inherited_content(dependencies);
        let mut working = inherited.clone();

        if inherited.is_empty() {
            working.extend(self.collect_content(task, &task.topic).await?);
        } else {
            let follow_ups = self.check_sufficiency(task, &inherited).await?;
            if follow_ups.is_empty() {
                tracing::info!(task_id = %task.id, "Inherited content is sufficient");
            } else {
                // Sequential: a URL shared between topics must be found in
                // the store by the later pass, not scraped twice.
                for topic in &follow_ups {
                    working.extend(self.collect_content(task, topic).await?);
                }
            }
        }

        let candidates = dedup_preserving_order(working);
        let selected = self.select_content(task, &candidates).await?;

        let notes = if selected.is_empty() {
            tracing::warn!(task_id = %task.id, "No content selected, skipping notes");
            String::new()
        } else {
            self.extract_notes(task, &selected).await?
        };

        let result = TaskResult {
            id: task.id.clone(),
            topic: task.topic.clone(),
            notes,
            content_used: selected.iter().map(|item| item.id.clone()).collect(),
            content_urls: selected.iter().map(|item| item.url.clone()).collect(),
            error: String::new(),
        };

        self.index_in_background(&result);
        tracing::info!(
            task_id = %task.id,
            content_used = result.content_used.len(),
            "Task complete"
        );
        Ok(result)
    }

    /// Ask the oracle whether inherited content covers the topic. Returns the
    /// follow-up topics to collect, bounded by `max_followup_topics`.
    async fn check_sufficiency(&self, task: &Task, inherited: &[String]) -> Result<Vec<String>> {
        self.ctx.sink.emit(ProgressEvent::CheckingSufficiency {
            task_id: task.id.clone(),
            topic: task.topic.clone(),
        });

        let items = self.resolve(inherited).await?;
        let snippets: Vec<&str> = items.iter().map(|item| item.snippet.as_str()).collect();
        let formatted_content = format!("Available data:\n{}", snippets.join("\n"));

        let system = self.ctx.prompts.compile(
            prompts::SUFFICIENCY,
            &[
                ("research_topic", task.topic.as_str()),
                ("formatted_content", formatted_content.as_str()),
            ],
        )?;
        let assessment: SufficiencyAssessment = generate_structured(
            self.ctx.oracle.as_ref(),
            &system,
            prompts::SUFFICIENCY_QUESTION,
        )
        .await?;

        let mut seen = HashSet::new();
        let mut topics: Vec<String> = assessment
            .research_topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        let limit = self.ctx.settings.max_followup_topics;
        if topics.len() > limit {
            tracing::warn!(
                task_id = %task.id,
                requested = topics.len(),
                limit,
                "Truncating follow-up topics"
            );
            topics.truncate(limit);
        }

        if !topics.is_empty() {
            self.ctx.sink.emit(ProgressEvent::FollowUps {
                task_id: task.id.clone(),
                topic: task.topic.clone(),
                topics: topics.clone(),
            });
        }
        Ok(topics)
    }

    /// Collect documents for `topic` and return their ids, in provider order.
    /// Provider and scrape failures only shrink the result.
    async fn collect_content(&self, task: &Task, topic: &str) -> Result<Vec<String>> {
        let definitions = self.ctx.tools.definitions_for(topic);
        if definitions.is_empty() {
            tracing::warn!(task_id = %task.id, topic, "No content provider can handle topic");
            return Ok(Vec::new());
        }

        let calls = self.select_tools(task, topic, &definitions).await;
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let mut raw: Vec<RawDocument> = Vec::new();
        for call in &calls {
            match self.ctx.tools.invoke(&call.name, topic, &call.arguments).await {
                Ok(docs) => raw.extend(docs),
                Err(e) => {
                    tracing::warn!(task_id = %task.id, tool = %call.name, error = %e, "Content provider failed")
                }
            }
        }

        let mut urls = HashSet::new();
        raw.retain(|doc| !doc.url.is_empty() && urls.insert(doc.url.clone()));

        let items = self.enrich(raw).await?;
        for item in &items {
            self.ctx.store.upsert(item).await?;
        }

        self.ctx.sink.emit(ProgressEvent::ContentFound {
            task_id: task.id.clone(),
            topic: topic.to_string(),
            documents: items
                .iter()
                .map(|item| DocumentRef::new(&item.title, &item.url))
                .collect(),
        });

        Ok(items.into_iter().map(|item| item.id).collect())
    }

    /// Ask the oracle which providers to call, retrying until it names at
    /// least one offered provider. Empty after the last attempt.
    async fn select_tools(
        &self,
        task: &Task,
        topic: &str,
        definitions: &[ToolDefinition],
    ) -> Vec<ToolCall> {
        let offered: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        let attempts = self.ctx.settings.tool_selection_attempts.max(1);

        for attempt in 1..=attempts {
            match self.ctx.oracle.generate_with_tools(topic, definitions).await {
                Ok(response) => {
                    let calls: Vec<ToolCall> = response
                        .tool_calls
                        .into_iter()
                        .filter(|call| offered.contains(call.name.as_str()))
                        .collect();
                    if !calls.is_empty() {
                        return calls;
                    }
                    tracing::info!(task_id = %task.id, attempt, "No tools to execute");
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, attempt, error = %e, "Tool selection failed")
                }
            }
        }

        tracing::error!(
            task_id = %task.id,
            topic,
            attempts,
            "No applicable content provider selected, collecting nothing"
        );
        Vec::new()
    }

    /// Turn raw documents into stored items: reuse complete stored copies,
    /// scrape short ones, and give every non-reused document a fresh id.
    ///
    /// A document not reused from the store is only scraped when its
    /// provider content is shorter than `min_content_length`; longer provider
    /// content is already complete and is stored as is.
    async fn enrich(&self, raw: Vec<RawDocument>) -> Result<Vec<ContentItem>> {
        let min_len = self.ctx.settings.min_content_length;

        enum Slot {
            Reused(ContentItem),
            Pending(RawDocument),
        }

        let mut slots = Vec::with_capacity(raw.len());
        for doc in raw {
            match self.ctx.store.get_by_url(&doc.url).await? {
                Some(stored) if stored.content_len() >= min_len => {
                    tracing::debug!(url = %doc.url, "Content already stored, skipping scrape");
                    slots.push(Slot::Reused(stored));
                }
                _ => slots.push(Slot::Pending(doc)),
            }
        }

        let to_scrape: Vec<String> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Pending(doc) if doc.content.chars().count() < min_len => {
                    Some(doc.url.clone())
                }
                _ => None,
            })
            .collect();

        let mut scraped: HashMap<String, String> = HashMap::new();
        if !to_scrape.is_empty() {
            for page in self.ctx.scraper.fetch_full_text(&to_scrape).await {
                if !page.full_text.trim().is_empty() {
                    scraped.insert(page.url, page.full_text);
                }
            }
            if scraped.len() < to_scrape.len() {
                tracing::warn!(
                    requested = to_scrape.len(),
                    scraped = scraped.len(),
                    "Some pages could not be scraped, keeping provider content"
                );
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Reused(item) => item,
                Slot::Pending(mut doc) => {
                    if let Some(text) = scraped.remove(&doc.url) {
                        doc.content = text;
                    }
                    ContentItem::from_raw(uuid::Uuid::new_v4().to_string(), doc)
                }
            })
            .collect())
    }

    /// Let the oracle pick the candidates most relevant to the task's topic.
    async fn select_content(&self, task: &Task, candidates: &[String]) -> Result<Vec<ContentItem>> {
        let items = self.resolve(candidates).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let formatted_snippets: String = items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}: {}\n", i, item))
            .collect();

        let system = self.ctx.prompts.compile(
            prompts::SELECT_CONTENT,
            &[
                ("research_topic", task.topic.as_str()),
                ("formatted_snippets", formatted_snippets.as_str()),
            ],
        )?;
        let selection: ContentSelection =
            generate_structured(self.ctx.oracle.as_ref(), &system, prompts::SELECT_QUESTION)
                .await?;

        let mut picked = HashSet::new();
        let selected: Vec<ContentItem> = selection
            .snippet_indices
            .into_iter()
            .filter_map(|i| usize::try_from(i).ok())
            .filter(|&i| i < items.len() && picked.insert(i))
            .map(|i| items[i].clone())
            .collect();

        self.ctx.sink.emit(ProgressEvent::ContentSelected {
            task_id: task.id.clone(),
            documents: selected
                .iter()
                .map(|item| DocumentRef::new(&item.title, &item.url))
                .collect(),
        });
        Ok(selected)
    }

    async fn extract_notes(&self, task: &Task, selected: &[ContentItem]) -> Result<String> {
        let max_chars = self.ctx.settings.max_content_chars;
        let formatted_webpages: String = selected
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "Webpage {}:\nTitle: {}\nUrl: {}\nContent: {}\n\n",
                    i + 1,
                    item.title,
                    item.url,
                    truncate_chars(&item.content, max_chars)
                )
            })
            .collect();

        let system = self.ctx.prompts.compile(
            prompts::EXTRACT_NOTES,
            &[
                ("research_topic", task.topic.as_str()),
                ("formatted_webpages", formatted_webpages.as_str()),
            ],
        )?;

        tracing::info!(task_id = %task.id, "Generating notes");
        let notes = self
            .ctx
            .oracle
            .generate_with_system(&system, prompts::NOTES_QUESTION)
            .await?;

        self.ctx.sink.emit(ProgressEvent::NotesReady {
            task_id: task.id.clone(),
            topic: task.topic.clone(),
            notes: notes.clone(),
        });
        Ok(notes)
    }

    /// Look ids up in the store, dropping any that have since disappeared.
    async fn resolve(&self, ids: &[String]) -> Result<Vec<ContentItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.ctx.store.get_by_id(id).await? {
                Some(item) => items.push(item),
                None => tracing::warn!(content_id = %id, "Content id not found in store"),
            }
        }
        Ok(items)
    }

    fn index_in_background(&self, result: &TaskResult) {
        let Some(index) = self.ctx.index.clone() else {
            return;
        };
        if result.notes.trim().is_empty() {
            return;
        }

        let result = result.clone();
        tokio::spawn(async move {
            if let Err(e) = index.index_notes(&result).await {
                tracing::warn!(task_id = %result.id, error = %e, "Failed to index notes");
            }
        });
    }
}

/// Content ids selected by successful dependencies, first occurrence wins.
fn inherited_content(dependencies: &[TaskResult]) -> Vec<String> {
    dedup_preserving_order(
        dependencies
            .iter()
            .filter(|result| !result.is_failed())
            .flat_map(|result| result.content_used.iter().cloned())
            .collect(),
    )
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
