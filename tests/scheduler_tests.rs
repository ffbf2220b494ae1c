//! Scheduler integration tests
//!
//! A recording runner notes when tasks start and finish and how many run at
//! once, so ordering and concurrency guarantees can be checked directly.

use async_trait::async_trait;
use parking_lot::Mutex;
use rstest::rstest;
use sleuth::research::{GraphError, SchedulerSettings, TaskRunner, TaskScheduler};
use sleuth::types::{AppError, Result, Task, TaskResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
    Hang,
}

#[derive(Default)]
struct RecordingRunner {
    delays: HashMap<String, Duration>,
    behaviors: HashMap<String, Behavior>,
    running: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    seen_dependencies: Mutex<HashMap<String, Vec<TaskResult>>>,
}

impl RecordingRunner {
    fn new() -> Self {
        Self::default()
    }

    fn delay(mut self, id: &str, millis: u64) -> Self {
        self.delays
            .insert(id.to_string(), Duration::from_millis(millis));
        self
    }

    fn behave(mut self, id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(id.to_string(), behavior);
        self
    }

    fn position(list: &[String], id: &str) -> usize {
        list.iter()
            .position(|x| x == id)
            .unwrap_or_else(|| panic!("{} not recorded", id))
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    async fn run(&self, task: &Task, dependencies: &[TaskResult]) -> Result<TaskResult> {
        self.started.lock().push(task.id.clone());
        self.seen_dependencies
            .lock()
            .insert(task.id.clone(), dependencies.to_vec());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        if let Some(delay) = self.delays.get(&task.id) {
            tokio::time::sleep(*delay).await;
        }

        let behavior = self
            .behaviors
            .get(&task.id)
            .copied()
            .unwrap_or(Behavior::Succeed);

        let outcome = match behavior {
            Behavior::Succeed => Ok(TaskResult {
                id: task.id.clone(),
                topic: task.topic.clone(),
                notes: format!("notes for {}", task.id),
                content_used: vec![format!("content-{}", task.id)],
                ..Default::default()
            }),
            Behavior::Fail => Err(AppError::LLM(format!("oracle down for {}", task.id))),
            Behavior::Panic => panic!("runner exploded on {}", task.id),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AppError::Internal("unreachable".to_string()))
            }
        };

        self.finished.lock().push(task.id.clone());
        outcome
    }
}

fn settings(max_workers: usize) -> SchedulerSettings {
    SchedulerSettings {
        max_workers,
        task_timeout: Some(Duration::from_secs(30)),
    }
}

fn by_id(results: &[TaskResult]) -> HashMap<String, TaskResult> {
    results.iter().map(|r| (r.id.clone(), r.clone())).collect()
}

fn diamond() -> Vec<Task> {
    vec![
        Task::new("a", "root"),
        Task::new("b", "left").with_dependencies(["a"]),
        Task::new("c", "right").with_dependencies(["a"]),
        Task::new("d", "join").with_dependencies(["b", "c"]),
    ]
}

#[tokio::test]
async fn test_diamond_respects_dependencies() {
    let runner = Arc::new(RecordingRunner::new().delay("b", 30).delay("c", 10));
    let scheduler = TaskScheduler::new(runner.clone(), settings(4));

    let results = scheduler.run(diamond()).await.unwrap();
    assert_eq!(results.len(), 4);

    let started = runner.started.lock().clone();
    let finished = runner.finished.lock().clone();
    assert_eq!(started[0], "a");
    assert_eq!(started[3], "d");
    assert_eq!(finished[0], "a");
    assert_eq!(finished.last().map(String::as_str), Some("d"));
    assert!(RecordingRunner::position(&started, "b") < RecordingRunner::position(&started, "d"));
    assert!(RecordingRunner::position(&started, "c") < RecordingRunner::position(&started, "d"));

    // d sees exactly the results of its own dependencies
    let seen = runner.seen_dependencies.lock();
    let mut d_deps: Vec<String> = seen["d"].iter().map(|r| r.id.clone()).collect();
    d_deps.sort();
    assert_eq!(d_deps, vec!["b", "c"]);
    assert!(seen["a"].is_empty());
}

#[tokio::test]
async fn test_results_in_completion_order() {
    let runner = Arc::new(RecordingRunner::new().delay("slow", 60).delay("fast", 5));
    let scheduler = TaskScheduler::new(runner, settings(4));

    let results = scheduler
        .run(vec![Task::new("slow", "s"), Task::new("fast", "f")])
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["fast", "slow"]);
}

#[tokio::test]
async fn test_independent_tasks_run_concurrently() {
    let mut runner = RecordingRunner::new();
    for i in 0..4 {
        runner = runner.delay(&format!("t{}", i), 50);
    }
    let runner = Arc::new(runner);
    let scheduler = TaskScheduler::new(runner.clone(), settings(4));

    let tasks = (0..4).map(|i| Task::new(format!("t{}", i), "x")).collect();
    scheduler.run(tasks).await.unwrap();

    assert_eq!(runner.peak.load(Ordering::SeqCst), 4);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[tokio::test]
async fn test_worker_bound_is_respected(#[case] max_workers: usize) {
    let mut runner = RecordingRunner::new();
    for i in 0..8 {
        runner = runner.delay(&format!("t{}", i), 15);
    }
    let runner = Arc::new(runner);
    let scheduler = TaskScheduler::new(runner.clone(), settings(max_workers));

    let tasks = (0..8).map(|i| Task::new(format!("t{}", i), "x")).collect();
    let results = scheduler.run(tasks).await.unwrap();

    assert_eq!(results.len(), 8);
    assert!(runner.peak.load(Ordering::SeqCst) <= max_workers);
    assert_eq!(runner.running.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_every_task_runs_exactly_once() {
    let runner = Arc::new(RecordingRunner::new());
    let scheduler = TaskScheduler::new(runner.clone(), settings(3));

    let tasks = vec![
        Task::new("1", ""),
        Task::new("2", "").with_dependencies(["1"]),
        Task::new("3", "").with_dependencies(["1"]),
        Task::new("4", "").with_dependencies(["2", "3"]),
        Task::new("5", ""),
        Task::new("6", "").with_dependencies(["5", "4"]),
    ];
    let results = scheduler.run(tasks).await.unwrap();

    assert_eq!(results.len(), 6);
    let started = runner.started.lock().clone();
    let unique: HashSet<&String> = started.iter().collect();
    assert_eq!(started.len(), 6);
    assert_eq!(unique.len(), 6);
}

#[tokio::test]
async fn test_cycle_rejected_before_running() {
    let runner = Arc::new(RecordingRunner::new());
    let scheduler = TaskScheduler::new(runner.clone(), settings(4));

    let err = scheduler
        .run(vec![
            Task::new("a", "").with_dependencies(["c"]),
            Task::new("b", "").with_dependencies(["a"]),
            Task::new("c", "").with_dependencies(["b"]),
        ])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Graph(GraphError::CircularDependency(_))
    ));
    assert!(runner.started.lock().is_empty());
}

#[tokio::test]
async fn test_missing_dependency_rejected_before_running() {
    let runner = Arc::new(RecordingRunner::new());
    let scheduler = TaskScheduler::new(runner.clone(), settings(4));

    let err = scheduler
        .run(vec![
            Task::new("a", ""),
            Task::new("b", "").with_dependencies(["ghost"]),
        ])
        .await
        .unwrap_err();

    match err {
        AppError::Graph(GraphError::DependencyNotFound { task_id, missing }) => {
            assert_eq!(task_id, "b");
            assert_eq!(missing, "ghost");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(runner.started.lock().is_empty());
}

#[tokio::test]
async fn test_failed_task_still_unblocks_dependents() {
    let runner = Arc::new(RecordingRunner::new().behave("a", Behavior::Fail));
    let scheduler = TaskScheduler::new(runner.clone(), settings(2));

    let results = scheduler
        .run(vec![
            Task::new("a", "root"),
            Task::new("b", "child").with_dependencies(["a"]),
        ])
        .await
        .unwrap();

    let results = by_id(&results);
    assert!(results["a"].is_failed());
    assert!(results["a"].error.contains("oracle down"));
    assert_eq!(results["a"].topic, "root");
    assert!(results["a"].content_used.is_empty());
    assert!(!results["b"].is_failed());

    // the dependent still receives the failed result and decides what to do
    let seen = runner.seen_dependencies.lock();
    assert_eq!(seen["b"].len(), 1);
    assert!(seen["b"][0].is_failed());
}

#[tokio::test]
async fn test_panicking_task_becomes_failed_result() {
    let runner = Arc::new(RecordingRunner::new().behave("boom", Behavior::Panic));
    let scheduler = TaskScheduler::new(runner, settings(2));

    let results = scheduler
        .run(vec![
            Task::new("boom", "explodes"),
            Task::new("after", "").with_dependencies(["boom"]),
            Task::new("other", ""),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let results = by_id(&results);
    assert!(results["boom"].error.contains("panicked"));
    assert_eq!(results["boom"].topic, "explodes");
    assert!(!results["after"].is_failed());
    assert!(!results["other"].is_failed());
}

#[tokio::test]
async fn test_timeout_becomes_failed_result() {
    let runner = Arc::new(RecordingRunner::new().behave("stuck", Behavior::Hang));
    let scheduler = TaskScheduler::new(
        runner,
        SchedulerSettings {
            max_workers: 2,
            task_timeout: Some(Duration::from_millis(50)),
        },
    );

    let results = scheduler
        .run(vec![
            Task::new("stuck", ""),
            Task::new("next", "").with_dependencies(["stuck"]),
        ])
        .await
        .unwrap();

    let results = by_id(&results);
    assert!(results["stuck"].error.contains("timed out"));
    assert!(!results["next"].is_failed());
}

#[tokio::test]
async fn test_duplicate_dependency_counted_once() {
    let runner = Arc::new(RecordingRunner::new());
    let scheduler = TaskScheduler::new(runner, settings(2));

    let results = scheduler
        .run(vec![
            Task::new("a", ""),
            Task::new("b", "").with_dependencies(["a", "a"]),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.is_failed()));
}
