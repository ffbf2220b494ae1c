use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::research::graph::GraphError;

// ============= Content Types =============

/// A retrieved document as held by the content store.
///
/// `url` is the dedup key; `id` is assigned by whoever produced the item and
/// is the stable reference tasks pass around afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub content: String,
    #[serde(default)]
    pub source: String,
}

impl ContentItem {
    /// Build a stored item from a raw provider document under the given id.
    pub fn from_raw(id: impl Into<String>, raw: RawDocument) -> Self {
        Self {
            id: id.into(),
            url: raw.url,
            title: raw.title,
            snippet: raw.snippet,
            content: raw.content,
            source: raw.source,
        }
    }

    /// Number of characters of full content held for this item.
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }
}

impl std::fmt::Display for ContentItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}\n{}", self.title, self.url, self.snippet)
    }
}

/// A document as returned by a content provider, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: String,
}

/// Full page text returned by the scrape capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub full_text: String,
}

// ============= Task Types =============

/// A unit of research work. Immutable once the dependency graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of one task. A non-empty `error` marks the task as failed, in which
/// case the remaining fields carry no usable research output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub content_used: Vec<String>,
    #[serde(default)]
    pub content_urls: Vec<String>,
    #[serde(default)]
    pub error: String,
}

impl TaskResult {
    /// Result for a task that faulted. Carries the task's id and topic so a
    /// report can name the question; notes and content stay empty.
    pub fn failed(id: impl Into<String>, topic: impl Into<String>, error: impl ToString) -> Self {
        let mut error = error.to_string();
        if error.is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            id: id.into(),
            topic: topic.into(),
            error,
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        !self.error.is_empty()
    }
}

// ============= Plan & Report Types =============

/// One question of a research plan, in the shape produced by outline tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A research question decomposed into a dependency graph of subquestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    #[serde(default)]
    pub query: String,
    pub questions: Vec<Question>,
}

impl ResearchPlan {
    /// Parse a plan from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let plan: ResearchPlan = serde_json::from_str(text)
            .map_err(|e| AppError::InvalidInput(format!("Invalid research plan: {}", e)))?;
        if plan.questions.is_empty() {
            return Err(AppError::InvalidInput(
                "Research plan contains no questions".to_string(),
            ));
        }
        Ok(plan)
    }

    pub fn to_tasks(&self) -> Vec<Task> {
        self.questions
            .iter()
            .map(|q| Task::new(&q.id, &q.text).with_dependencies(q.dependencies.clone()))
            .collect()
    }
}

/// Everything a run produced, as written to `research_<timestamp>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub query: String,
    pub generated_at: DateTime<Utc>,
    pub plan: ResearchPlan,
    pub results: Vec<TaskResult>,
}

impl ResearchReport {
    pub fn new(plan: ResearchPlan, results: Vec<TaskResult>) -> Self {
        Self {
            query: plan.query.clone(),
            generated_at: Utc::now(),
            plan,
            results,
        }
    }

    /// Results that finished without error.
    pub fn succeeded(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| !r.is_failed())
    }

    /// Results that carry an error.
    pub fn failed(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    /// Default report file name, e.g. `research_2026_10_19_14_03_59.json`.
    pub fn default_file_name(&self) -> String {
        format!(
            "research_{}.json",
            self.generated_at.format("%Y_%m_%d_%H_%M_%S")
        )
    }
}

// ============= Tool Types =============

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid task graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_keeps_topic_but_no_output() {
        let result = TaskResult::failed("1.2", "topic", "boom");
        assert!(result.is_failed());
        assert_eq!(result.id, "1.2");
        assert_eq!(result.topic, "topic");
        assert_eq!(result.error, "boom");
        assert!(result.notes.is_empty());
        assert!(result.content_used.is_empty());
        assert!(result.content_urls.is_empty());
    }

    #[test]
    fn test_failed_result_never_has_empty_error() {
        let result = TaskResult::failed("1", "topic", "");
        assert!(result.is_failed());
    }

    #[test]
    fn test_plan_from_json() {
        let plan = ResearchPlan::from_json(
            r#"{
                "query": "How do heat pumps work?",
                "questions": [
                    {"id": "1", "text": "What is a heat pump?"},
                    {"id": "2", "text": "How efficient are they?", "dependencies": ["1"]}
                ]
            }"#,
        )
        .unwrap();

        let tasks = plan.to_tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].dependencies.is_empty());
        assert_eq!(tasks[1].dependencies, vec!["1".to_string()]);
    }

    #[test]
    fn test_plan_without_questions_rejected() {
        let result = ResearchPlan::from_json(r#"{"query": "x", "questions": []}"#);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_report_partitions_results() {
        let plan = ResearchPlan {
            query: "q".to_string(),
            questions: vec![],
        };
        let ok = TaskResult {
            id: "1".to_string(),
            notes: "- note".to_string(),
            ..Default::default()
        };
        let bad = TaskResult::failed("2", "t", "timed out");
        let report = ResearchReport::new(plan, vec![ok, bad]);

        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.failed().count(), 1);
        assert!(report.default_file_name().starts_with("research_"));
        assert!(report.default_file_name().ends_with(".json"));
    }

    #[test]
    fn test_content_item_display() {
        let item = ContentItem {
            id: "a".to_string(),
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            snippet: "An example".to_string(),
            content: String::new(),
            source: "web".to_string(),
        };
        assert_eq!(item.to_string(), "Example\nhttps://example.com\nAn example");
    }
}
