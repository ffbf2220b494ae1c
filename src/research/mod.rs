//! Dependency-driven research.
//!
//! A research plan is a set of tasks whose dependencies form a DAG. The
//! [`TaskScheduler`] runs them on a bounded pool of workers as soon as their
//! dependencies finish, and the [`ResearchRunner`] executes the research
//! protocol for each one:
//!
//! 1. **Inherit** - content selected by successful dependencies
//! 2. **Assess** - ask the oracle whether that covers the topic
//! 3. **Collect** - search providers and scrape short pages for what is missing
//! 4. **Select** - let the oracle pick the relevant documents
//! 5. **Notes** - turn the selection into bullet point notes

/// Dependency graph validation and topological views.
pub mod graph;
/// Progress events and sinks.
pub mod progress;
/// Prompt templates.
pub mod prompts;
/// Concurrent, dependency-driven task execution.
pub mod scheduler;
/// The research protocol.
pub mod task;

pub use graph::{DependencyGraph, GraphError};
pub use progress::{ChannelSink, DocumentRef, NoopSink, ProgressEvent, ProgressSink, TracingSink};
pub use prompts::PromptLibrary;
pub use scheduler::{SchedulerSettings, TaskRunner, TaskScheduler};
pub use task::{ResearchContext, ResearchRunner, ResearchSettings};
