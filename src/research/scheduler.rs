//! Dependency-driven task scheduler.
//!
//! Tasks are dispatched onto a bounded set of workers as soon as every
//! dependency has a recorded result. Completion of one task decrements the
//! unmet-dependency count of its dependents; whichever reach zero become
//! ready. Task faults, panics and timeouts all become failed results, so the
//! graph always drains. Only a malformed graph aborts a run.

use crate::research::graph::DependencyGraph;
use crate::types::{AppError, Result, Task, TaskResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};

/// Executes one task given its dependencies' results.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &Task, dependencies: &[TaskResult]) -> Result<TaskResult>;
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Maximum number of tasks executing at once.
    pub max_workers: usize,
    /// Deadline per task; `None` lets a task run forever.
    pub task_timeout: Option<Duration>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Results and unmet-dependency counts for one run. Both only change under
/// the same lock.
#[derive(Default)]
struct RunState {
    results: HashMap<String, TaskResult>,
    in_degree: HashMap<String, usize>,
    completion_order: Vec<String>,
}

impl RunState {
    /// Record a finished task and return the dependents it made ready.
    fn record(&mut self, result: TaskResult, graph: &DependencyGraph) -> Vec<String> {
        let task_id = result.id.clone();
        if self.results.contains_key(&task_id) {
            tracing::error!(task_id = %task_id, "Task completed twice, ignoring second result");
            return Vec::new();
        }
        self.results.insert(task_id.clone(), result);
        self.completion_order.push(task_id.clone());

        let mut ready = Vec::new();
        for dependent in graph.dependents_of(&task_id) {
            if let Some(degree) = self.in_degree.get_mut(dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.push(dependent.clone());
                }
            }
        }
        ready
    }

    fn dependency_results(&self, task: &Task) -> Vec<TaskResult> {
        task.dependencies
            .iter()
            .filter_map(|dep| self.results.get(dep).cloned())
            .collect()
    }

    fn into_results(mut self) -> Vec<TaskResult> {
        self.completion_order
            .iter()
            .filter_map(|id| self.results.remove(id))
            .collect()
    }
}

pub struct TaskScheduler {
    runner: Arc<dyn TaskRunner>,
    settings: SchedulerSettings,
}

impl TaskScheduler {
    pub fn new(runner: Arc<dyn TaskRunner>, settings: SchedulerSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run every task exactly once, honoring dependencies. Returns one result
    /// per task, in completion order.
    ///
    /// # Errors
    ///
    /// Fails before running anything if the tasks do not form a valid
    /// dependency graph.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let graph = DependencyGraph::build(&tasks)?;
        if graph.is_empty() {
            return Ok(Vec::new());
        }

        let total = tasks.len();
        let max_workers = self.settings.max_workers.max(1);
        let tasks: HashMap<String, Arc<Task>> = tasks
            .into_iter()
            .map(|task| (task.id.clone(), Arc::new(task)))
            .collect();

        let state = Arc::new(Mutex::new(RunState {
            in_degree: graph.in_degrees(),
            ..Default::default()
        }));

        let mut ready: VecDeque<String> = graph.ready().into();
        let mut workers: JoinSet<TaskResult> = JoinSet::new();
        let mut in_flight: HashMap<Id, String> = HashMap::new();

        tracing::info!(tasks = total, max_workers, "Starting research run");

        loop {
            while in_flight.len() < max_workers {
                let Some(task_id) = ready.pop_front() else {
                    break;
                };
                let Some(task) = tasks.get(&task_id).cloned() else {
                    continue;
                };
                tracing::info!(task_id = %task_id, "Dispatching task");
                let handle = workers.spawn(self.execute(task, state.clone()));
                in_flight.insert(handle.id(), task_id);
            }

            let Some(joined) = workers.join_next_with_id().await else {
                break;
            };

            let result = match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    result
                }
                Err(join_error) => {
                    let task_id = in_flight.remove(&join_error.id()).ok_or_else(|| {
                        AppError::Internal(format!("Unknown worker finished: {}", join_error))
                    })?;
                    let topic = tasks
                        .get(&task_id)
                        .map(|t| t.topic.clone())
                        .unwrap_or_default();
                    tracing::error!(task_id = %task_id, error = %join_error, "Task worker panicked");
                    TaskResult::failed(task_id, topic, format!("task panicked: {}", join_error))
                }
            };

            let newly_ready = state.lock().record(result, &graph);
            ready.extend(newly_ready);
        }

        let results = std::mem::take(&mut *state.lock()).into_results();

        if results.len() != total {
            return Err(AppError::Internal(format!(
                "Run finished with {} of {} results",
                results.len(),
                total
            )));
        }

        tracing::info!(
            tasks = total,
            failed = results.iter().filter(|r| r.is_failed()).count(),
            "All tasks executed"
        );
        Ok(results)
    }

    /// Worker body: read dependency results, run under the deadline, and
    /// normalize whatever comes back into a result for this task.
    fn execute(
        &self,
        task: Arc<Task>,
        state: Arc<Mutex<RunState>>,
    ) -> impl std::future::Future<Output = TaskResult> + Send + 'static {
        let runner = self.runner.clone();
        let timeout = self.settings.task_timeout;

        async move {
            let dependencies = state.lock().dependency_results(&task);

            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, runner.run(&task, &dependencies))
                    .await
                    .unwrap_or_else(|_| {
                        Err(AppError::Internal(format!(
                            "task timed out after {}s",
                            limit.as_secs_f64()
                        )))
                    }),
                None => runner.run(&task, &dependencies).await,
            };

            match outcome {
                Ok(mut result) => {
                    result.id = task.id.clone();
                    if result.topic.is_empty() {
                        result.topic = task.topic.clone();
                    }
                    result
                }
                Err(e) => {
                    tracing::error!(task_id = %task.id, error = %e, "Task failed");
                    TaskResult::failed(task.id.clone(), task.topic.clone(), e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TaskRunner for Echo {
        async fn run(&self, task: &Task, dependencies: &[TaskResult]) -> Result<TaskResult> {
            Ok(TaskResult {
                id: "ignored".to_string(),
                notes: format!("{} after {}", task.id, dependencies.len()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let scheduler = TaskScheduler::new(Arc::new(Echo), SchedulerSettings::default());
        assert!(scheduler.run(vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_id_forced_to_task_id() {
        let scheduler = TaskScheduler::new(Arc::new(Echo), SchedulerSettings::default());
        let results = scheduler
            .run(vec![
                Task::new("a", "first"),
                Task::new("b", "second").with_dependencies(["a"]),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].topic, "first");
        assert_eq!(results[1].id, "b");
        assert_eq!(results[1].notes, "b after 1");
    }

    #[tokio::test]
    async fn test_zero_workers_still_runs() {
        let settings = SchedulerSettings {
            max_workers: 0,
            task_timeout: None,
        };
        let scheduler = TaskScheduler::new(Arc::new(Echo), settings);
        let results = scheduler.run(vec![Task::new("a", "t")]).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_record_unblocks_only_when_all_dependencies_done() {
        let tasks = vec![
            Task::new("a", ""),
            Task::new("b", ""),
            Task::new("c", "").with_dependencies(["a", "b"]),
        ];
        let graph = DependencyGraph::build(&tasks).unwrap();
        let mut state = RunState {
            in_degree: graph.in_degrees(),
            ..Default::default()
        };

        assert!(state.record(TaskResult::failed("a", "", "x"), &graph).is_empty());
        assert_eq!(
            state.record(TaskResult { id: "b".to_string(), ..Default::default() }, &graph),
            vec!["c".to_string()]
        );
    }
}
