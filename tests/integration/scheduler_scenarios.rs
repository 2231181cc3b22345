//! Scheduler behaviour end to end: ordering, failure isolation, shutdown,
//! deadlines, and back-pressure.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use syscore::config::SyscoreConfig;
use syscore::request::{Payload, StorageOp, ToolCall};
use syscore::scheduler::SchedulerBuilder;
use syscore::{
    Request, RequestHandle, RequestKind, RequestStatus, ResourceManager, Response, Scheduler,
    SyscallError,
};

/// Manager whose behaviour is picked by the request key:
/// `fail`, `panic`, `sleep:<ms>`, or anything else to succeed at once.
struct Scripted {
    kind: RequestKind,
    seen: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(kind: RequestKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

fn key_of(request: &Request) -> String {
    match &request.payload {
        Payload::Storage(StorageOp::Read { key }) => key.clone(),
        Payload::Tool(call) => call.name.clone(),
        other => format!("{:?}", other),
    }
}

#[async_trait]
impl ResourceManager for Scripted {
    fn kind(&self) -> RequestKind {
        self.kind
    }

    async fn handle(&self, request: &Request) -> Result<Response, SyscallError> {
        let key = key_of(request);
        self.seen.lock().push(key.clone());
        if key == "fail" {
            return Err(SyscallError::KeyNotFound(key));
        }
        if key == "panic" {
            panic!("scripted manager exploded");
        }
        if let Some(ms) = key.strip_prefix("sleep:") {
            let ms: u64 = ms.parse().unwrap();
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        Ok(Response::Value(json!(key)))
    }
}

fn read(key: &str) -> Request {
    Request::new(
        "agent",
        Payload::Storage(StorageOp::Read {
            key: key.to_string(),
        }),
    )
}

fn tool(name: &str) -> Request {
    Request::new(
        "agent",
        Payload::Tool(ToolCall {
            name: name.to_string(),
            params: serde_json::Value::Null,
        }),
    )
}

fn builder(poll: Duration) -> SchedulerBuilder {
    SchedulerBuilder::from_config(&SyscoreConfig::default())
        .unwrap()
        .poll_interval(poll)
}

fn with_storage(manager: Arc<Scripted>, poll: Duration) -> Scheduler {
    builder(poll).manager(manager).build().unwrap()
}

async fn wait_for_status(handle: &RequestHandle, status: RequestStatus) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.status().status != status {
        assert!(Instant::now() < deadline, "timed out waiting for {}", status);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_fifo_completion_order_after_restart() {
    let manager = Scripted::new(RequestKind::Storage);
    let scheduler = with_storage(manager.clone(), Duration::from_millis(20));

    scheduler.start().unwrap();
    scheduler.stop().await.unwrap();

    let handles: Vec<RequestHandle> = (0..5)
        .map(|i| {
            scheduler
                .enqueue(RequestKind::Storage, read(&format!("k{}", i)))
                .unwrap()
        })
        .collect();
    assert!(handles
        .iter()
        .all(|h| h.status().status == RequestStatus::Queued));

    scheduler.start().unwrap();
    for handle in &handles {
        scheduler.await_completion(handle).await.unwrap();
    }

    assert_eq!(manager.seen(), vec!["k0", "k1", "k2", "k3", "k4"]);
    for pair in handles.windows(2) {
        let (a, b) = (pair[0].status(), pair[1].status());
        assert!(a.created_at <= b.created_at);
        assert!(a.end_at <= b.start_at);
    }
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_request_does_not_stop_the_worker() {
    let scheduler = Scheduler::from_config(&SyscoreConfig::default()).unwrap();
    scheduler.start().unwrap();

    let failing = scheduler.enqueue(RequestKind::Storage, read("absent")).unwrap();
    let normal = scheduler
        .enqueue(
            RequestKind::Storage,
            Request::new(
                "agent",
                Payload::Storage(StorageOp::Write {
                    key: "present".to_string(),
                    value: json!({ "ok": true }),
                }),
            ),
        )
        .unwrap();

    assert_eq!(
        failing.wait().await,
        Err(SyscallError::KeyNotFound("absent".to_string()))
    );
    assert_eq!(failing.status().status, RequestStatus::Failed);
    assert_eq!(
        failing.error(),
        Some(SyscallError::KeyNotFound("absent".to_string()))
    );

    assert_eq!(normal.wait().await, Ok(Response::Ack));
    assert_eq!(normal.status().status, RequestStatus::Done);

    let stats = scheduler.stats(RequestKind::Storage);
    assert_eq!((stats.completed, stats.failed, stats.pending), (1, 1, 0));
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_manager_panic_becomes_failure() {
    let manager = Scripted::new(RequestKind::Storage);
    let scheduler = with_storage(manager.clone(), Duration::from_millis(20));
    scheduler.start().unwrap();

    let exploding = scheduler.enqueue(RequestKind::Storage, read("panic")).unwrap();
    let after = scheduler.enqueue(RequestKind::Storage, read("after")).unwrap();

    match exploding.wait().await {
        Err(SyscallError::ManagerPanicked(message)) => {
            assert!(message.contains("scripted manager exploded"))
        }
        other => panic!("expected ManagerPanicked, got {:?}", other),
    }
    assert_eq!(after.wait().await, Ok(Response::Value(json!("after"))));
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_wakes_idle_workers() {
    // Poll interval far longer than the test; only the shutdown signal can end it
    let scheduler = builder(Duration::from_secs(30)).build().unwrap();
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let started = Instant::now();
    scheduler.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn test_stop_lets_executing_request_finish() {
    let manager = Scripted::new(RequestKind::Storage);
    let scheduler = with_storage(manager.clone(), Duration::from_millis(20));
    scheduler.start().unwrap();

    let slow = scheduler.enqueue(RequestKind::Storage, read("sleep:100")).unwrap();
    let queued = scheduler.enqueue(RequestKind::Storage, read("later")).unwrap();
    wait_for_status(&slow, RequestStatus::Executing).await;

    scheduler.stop().await.unwrap();
    assert_eq!(slow.status().status, RequestStatus::Done);
    assert_eq!(queued.status().status, RequestStatus::Queued);

    // The leftover request runs on the next start
    scheduler.start().unwrap();
    assert_eq!(queued.wait().await, Ok(Response::Value(json!("later"))));
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_kinds_do_not_block_each_other() {
    let tools = Scripted::new(RequestKind::Tool);
    let storage = Scripted::new(RequestKind::Storage);
    let scheduler = builder(Duration::from_millis(20))
        .manager(tools.clone())
        .manager(storage.clone())
        .build()
        .unwrap();
    scheduler.start().unwrap();

    let slow_tool = scheduler.enqueue(RequestKind::Tool, tool("sleep:300")).unwrap();
    wait_for_status(&slow_tool, RequestStatus::Executing).await;
    let quick = scheduler.enqueue(RequestKind::Storage, read("quick")).unwrap();

    assert_eq!(quick.wait().await, Ok(Response::Value(json!("quick"))));
    assert!(!slow_tool.is_terminal());

    slow_tool.wait().await.unwrap();
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_deadline_expired_while_queued_skips_manager() {
    let manager = Scripted::new(RequestKind::Storage);
    let scheduler = with_storage(manager.clone(), Duration::from_millis(20));

    let handle = scheduler
        .enqueue(
            RequestKind::Storage,
            read("late").with_deadline(Duration::from_millis(1)),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    scheduler.start().unwrap();

    assert!(matches!(
        handle.wait().await,
        Err(SyscallError::DeadlineExceeded { .. })
    ));
    let status = handle.status();
    assert_eq!(status.status, RequestStatus::Failed);
    assert!(status.start_at.is_some());
    assert!(manager.seen().is_empty());
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_deadline_interrupts_slow_manager() {
    let manager = Scripted::new(RequestKind::Storage);
    let scheduler = with_storage(manager.clone(), Duration::from_millis(20));
    scheduler.start().unwrap();

    let started = Instant::now();
    let handle = scheduler
        .enqueue(
            RequestKind::Storage,
            read("sleep:2000").with_deadline(Duration::from_millis(50)),
        )
        .unwrap();
    assert!(matches!(
        handle.wait().await,
        Err(SyscallError::DeadlineExceeded { .. })
    ));
    assert!(started.elapsed() < Duration::from_millis(1500));
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_bounded_queue_rejects_overflow() {
    let scheduler = builder(Duration::from_millis(20))
        .queue_capacity(2)
        .build()
        .unwrap();
    scheduler.enqueue(RequestKind::Storage, read("a")).unwrap();
    scheduler.enqueue(RequestKind::Storage, read("b")).unwrap();
    assert_eq!(
        scheduler.enqueue(RequestKind::Storage, read("c")).err(),
        Some(SyscallError::QueueFull {
            kind: RequestKind::Storage,
            capacity: 2
        })
    );
    // Other kinds have their own queues
    scheduler.enqueue(RequestKind::Tool, tool("echo")).unwrap();
    assert_eq!(scheduler.stats(RequestKind::Storage).pending, 2);
}

#[tokio::test]
async fn test_resubmitting_a_handle_is_rejected() {
    let scheduler = Scheduler::from_config(&SyscoreConfig::default()).unwrap();
    let handle = scheduler.enqueue(RequestKind::Storage, read("a")).unwrap();
    assert!(matches!(
        scheduler.submit(handle.clone()),
        Err(SyscallError::InvalidTransition { .. })
    ));
    assert_eq!(scheduler.stats(RequestKind::Storage).pending, 1);
}

#[tokio::test]
async fn test_mismatched_payload_fails_in_manager() {
    let scheduler = Scheduler::from_config(&SyscoreConfig::default()).unwrap();
    scheduler.start().unwrap();
    // A storage payload routed to the tool queue
    let handle = scheduler.enqueue(RequestKind::Tool, read("k")).unwrap();
    assert!(matches!(
        handle.wait().await,
        Err(SyscallError::UnsupportedOperation(_))
    ));
    scheduler.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timestamps_ordered_under_concurrent_load() {
    let scheduler = Arc::new(Scheduler::from_config(&SyscoreConfig::default()).unwrap());
    scheduler.start().unwrap();

    let mut producers = Vec::new();
    for p in 0..4 {
        let scheduler = Arc::clone(&scheduler);
        producers.push(tokio::spawn(async move {
            let mut handles = Vec::new();
            for i in 0..25 {
                let request = Request::new(
                    format!("agent-{}", p),
                    Payload::Storage(StorageOp::Write {
                        key: format!("{}-{}", p, i),
                        value: json!(i),
                    }),
                );
                handles.push(scheduler.enqueue(RequestKind::Storage, request).unwrap());
            }
            handles
        }));
    }

    let mut all = Vec::new();
    for producer in producers {
        all.extend(producer.await.unwrap());
    }
    for handle in &all {
        handle.wait().await.unwrap();
        let status = handle.status();
        assert!(status.created_at <= status.start_at);
        assert!(status.start_at <= status.end_at);
    }

    let stats = scheduler.stats(RequestKind::Storage);
    assert_eq!(stats.completed, 100);
    let latency = scheduler.latency(RequestKind::Storage);
    assert_eq!(latency.waiting.count, 100);
    assert!(latency.turnaround.p99_ms >= latency.waiting.p99_ms);
    scheduler.stop().await.unwrap();
}
