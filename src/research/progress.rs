//! Human-readable status from running tasks.
//!
//! Sinks must never influence the research itself: emitting is synchronous,
//! infallible and cheap.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// A document as shown to a person following along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub title: String,
    pub url: String,
}

impl DocumentRef {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    TaskStarted {
        task_id: String,
        topic: String,
    },
    CheckingSufficiency {
        task_id: String,
        topic: String,
    },
    FollowUps {
        task_id: String,
        topic: String,
        topics: Vec<String>,
    },
    ContentFound {
        task_id: String,
        topic: String,
        documents: Vec<DocumentRef>,
    },
    ContentSelected {
        task_id: String,
        documents: Vec<DocumentRef>,
    },
    NotesReady {
        task_id: String,
        topic: String,
        notes: String,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
}

impl ProgressEvent {
    pub fn task_id(&self) -> &str {
        match self {
            ProgressEvent::TaskStarted { task_id, .. }
            | ProgressEvent::CheckingSufficiency { task_id, .. }
            | ProgressEvent::FollowUps { task_id, .. }
            | ProgressEvent::ContentFound { task_id, .. }
            | ProgressEvent::ContentSelected { task_id, .. }
            | ProgressEvent::NotesReady { task_id, .. }
            | ProgressEvent::TaskFailed { task_id, .. } => task_id,
        }
    }
}

fn write_documents(f: &mut fmt::Formatter<'_>, documents: &[DocumentRef]) -> fmt::Result {
    for doc in documents {
        write!(f, "\n- [{}]({})", doc.title, doc.url)?;
    }
    Ok(())
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::TaskStarted { topic, .. } => write!(f, "Researching {}...", topic),
            ProgressEvent::CheckingSufficiency { topic, .. } => {
                write!(f, "Checking whether existing content covers {}", topic)
            }
            ProgressEvent::FollowUps { topic, topics, .. } => {
                write!(f, "Expanding on {}", topic)?;
                for t in topics {
                    write!(f, "\n- {}", t)?;
                }
                Ok(())
            }
            ProgressEvent::ContentFound {
                topic, documents, ..
            } => {
                write!(f, "Found new content for {}", topic)?;
                write_documents(f, documents)
            }
            ProgressEvent::ContentSelected { documents, .. } => {
                write!(f, "Decided to use:")?;
                write_documents(f, documents)
            }
            ProgressEvent::NotesReady { topic, notes, .. } => {
                write!(f, "Notes for {}:\n{}", topic, notes)
            }
            ProgressEvent::TaskFailed { task_id, error } => {
                write!(f, "Task {} failed: {}", task_id, error)
            }
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Writes events to the tracing subscriber at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        tracing::info!(task_id = event.task_id(), "{}", event);
    }
}

/// Forwards events over an unbounded channel, e.g. to a CLI renderer.
/// A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}
