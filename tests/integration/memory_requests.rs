//! Memory manager behaviour through the scheduler and directly.

use std::collections::HashSet;
use std::sync::Arc;
use syscore::config::SyscoreConfig;
use syscore::manager::MemoryManager;
use syscore::memory::{Address, BlockPool, IdentityCompressor};
use syscore::request::{MemoryOp, Payload};
use syscore::{Request, RequestKind, Response, Scheduler, SyscallError};

fn memory(agent: &str, op: MemoryOp) -> Request {
    Request::new(agent, Payload::Memory(op))
}

fn small_pool_config(block_size: usize, block_count: usize) -> SyscoreConfig {
    let mut config = SyscoreConfig::default();
    config.memory.block_size = block_size;
    config.memory.block_count = block_count;
    config
}

#[tokio::test]
async fn test_memory_round_trip_through_scheduler() {
    let scheduler = Scheduler::from_config(&small_pool_config(4096, 2)).unwrap();
    scheduler.start().unwrap();

    let alloc = scheduler
        .enqueue(RequestKind::Memory, memory("agent", MemoryOp::Alloc { size: 64 }))
        .unwrap();
    let content = b"turn one: the agent asked about BRCA1 variants. ".repeat(8);
    let write = scheduler
        .enqueue(
            RequestKind::Memory,
            memory(
                "agent",
                MemoryOp::Write {
                    round_id: 1,
                    content: content.clone(),
                },
            ),
        )
        .unwrap();
    let read = scheduler
        .enqueue(RequestKind::Memory, memory("agent", MemoryOp::Read { round_id: 1 }))
        .unwrap();

    assert_eq!(
        alloc.wait().await,
        Ok(Response::Address(Address {
            block_id: 0,
            offset: 0
        }))
    );
    match write.wait().await.unwrap() {
        Response::Record(record) => {
            assert_eq!(record.block_id, 0);
            assert!(record.len < content.len());
        }
        other => panic!("unexpected response {:?}", other),
    }
    assert_eq!(read.wait().await, Ok(Response::Bytes(content)));

    let clear = scheduler
        .enqueue(RequestKind::Memory, memory("agent", MemoryOp::Clear))
        .unwrap();
    assert_eq!(clear.wait().await, Ok(Response::Ack));

    let status = scheduler
        .enqueue(RequestKind::Memory, memory("agent", MemoryOp::Status))
        .unwrap();
    match status.wait().await.unwrap() {
        Response::MemoryStatus(status) => {
            assert_eq!(status.free_blocks, vec![0, 1]);
            assert_eq!(status.allocated_blocks, 0);
            assert_eq!(status.free_bytes, 2 * 4096);
        }
        other => panic!("unexpected response {:?}", other),
    }
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_memory_requests_queued_while_stopped_run_in_order() {
    let scheduler = Scheduler::from_config(&small_pool_config(1024, 1)).unwrap();
    scheduler.start().unwrap();
    scheduler.stop().await.unwrap();

    // Each request depends on the one before it
    let ops = vec![
        MemoryOp::Alloc { size: 32 },
        MemoryOp::Write {
            round_id: 1,
            content: b"round one".to_vec(),
        },
        MemoryOp::Read { round_id: 1 },
        MemoryOp::Release { round_id: 1 },
        MemoryOp::Read { round_id: 1 },
    ];
    let handles: Vec<_> = ops
        .into_iter()
        .map(|op| {
            scheduler
                .enqueue(RequestKind::Memory, memory("agent", op))
                .unwrap()
        })
        .collect();
    assert_eq!(scheduler.stats(RequestKind::Memory).pending, 5);

    scheduler.start().unwrap();
    let mut outcomes = Vec::new();
    for handle in &handles {
        outcomes.push(scheduler.await_completion(handle).await);
    }

    assert!(matches!(outcomes[0], Ok(Response::Address(_))));
    assert!(matches!(outcomes[1], Ok(Response::Record(_))));
    assert_eq!(outcomes[2], Ok(Response::Bytes(b"round one".to_vec())));
    assert_eq!(outcomes[3], Ok(Response::Ack));
    assert!(matches!(outcomes[4], Err(SyscallError::KeyNotFound(_))));
    for pair in handles.windows(2) {
        assert!(pair[0].status().end_at <= pair[1].status().start_at);
    }
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_agents_get_distinct_blocks_until_exhausted() {
    let scheduler = Scheduler::from_config(&small_pool_config(256, 3)).unwrap();
    scheduler.start().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            scheduler
                .enqueue(
                    RequestKind::Memory,
                    memory(&format!("agent-{}", i), MemoryOp::Alloc { size: 16 }),
                )
                .unwrap()
        })
        .collect();

    let mut blocks = HashSet::new();
    for handle in &handles[..3] {
        match handle.wait().await.unwrap() {
            Response::Address(address) => {
                blocks.insert(address.block_id);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
    assert_eq!(blocks.len(), 3);
    assert_eq!(
        handles[3].wait().await,
        Err(SyscallError::OutOfMemory { requested: 16 })
    );

    let again = scheduler
        .enqueue(RequestKind::Memory, memory("agent-0", MemoryOp::Alloc { size: 8 }))
        .unwrap();
    assert!(matches!(
        again.wait().await,
        Err(SyscallError::AllocationConflict(_))
    ));
    scheduler.stop().await.unwrap();
}

#[test]
fn test_first_fit_exhaustion_on_a_single_block() {
    let manager = MemoryManager::new(BlockPool::new(100, 1), Arc::new(IdentityCompressor));

    assert_eq!(
        manager.alloc("agent", 150),
        Err(SyscallError::OutOfMemory { requested: 150 })
    );
    // The failed reservation hands the block back
    assert_eq!(manager.status().free_blocks, vec![0]);

    manager.alloc("agent", 50).unwrap();
    assert_eq!(
        manager.write("agent", 1, &[7u8; 60]),
        Err(SyscallError::OutOfMemory { requested: 60 })
    );
    let record = manager.write("agent", 1, &[7u8; 50]).unwrap();
    assert_eq!(record.offset, 50);
    assert_eq!(manager.read("agent", 1).unwrap(), vec![7u8; 50]);

    manager.release("agent", 1).unwrap();
    assert_eq!(manager.status().free_bytes, 50);
    manager.clear("agent").unwrap();
    assert_eq!(manager.status().free_bytes, 100);
}

#[test]
fn test_missing_round_is_key_not_found() {
    let manager = MemoryManager::with_zlib(128, 1, 6);
    manager.alloc("agent", 8).unwrap();
    assert!(matches!(
        manager.read("agent", 9),
        Err(SyscallError::KeyNotFound(_))
    ));
    assert!(matches!(
        manager.read("stranger", 1),
        Err(SyscallError::KeyNotFound(_))
    ));
}
