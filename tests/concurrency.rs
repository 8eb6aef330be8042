mod common;

use common::{cheque, harness_with_store, request, success_reply};
use payflow::domain::identifier::NymId;
use payflow::error::WorkflowError;
use payflow::infrastructure::in_memory::InMemoryWorkflowStore;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant};

const STORE_LATENCY: Duration = Duration::from_millis(100);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_workflows_do_not_block_each_other() {
    let h = Arc::new(harness_with_store(Box::new(
        InMemoryWorkflowStore::with_latency(STORE_LATENCY),
    )));
    h.register_contact("bob").await;
    let alice = NymId::from("alice");

    let first = cheque("cheque-1", "alice", Some("bob"), "acct-1", dec!(10.0));
    let second = cheque("cheque-2", "alice", Some("bob"), "acct-1", dec!(20.0));
    h.engine.write_cheque(&alice, &first).await.unwrap();
    h.engine.write_cheque(&alice, &second).await.unwrap();

    // Each send pays the artificial latency several times; run in parallel
    // they should take barely longer than one send alone.
    let start = Instant::now();
    let a = {
        let h = Arc::clone(&h);
        let alice = alice.clone();
        let first = first.clone();
        tokio::spawn(async move {
            h.engine
                .send_cheque(&alice, &first, &request(), Some(&success_reply()))
                .await
        })
    };
    let b = {
        let h = Arc::clone(&h);
        let alice = alice.clone();
        let second = second.clone();
        tokio::spawn(async move {
            h.engine
                .send_cheque(&alice, &second, &request(), Some(&success_reply()))
                .await
        })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();
    let elapsed = start.elapsed();

    // Three latency-paying store calls per send; serialized execution would
    // need at least six.
    assert!(
        elapsed < STORE_LATENCY * 5,
        "sends on distinct workflows blocked each other: {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_workflow_race_yields_one_success() {
    let h = Arc::new(harness_with_store(Box::new(
        InMemoryWorkflowStore::with_latency(Duration::from_millis(20)),
    )));
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let cheque = cheque("cheque-1", "alice", Some("bob"), "acct-1", dec!(10.0));

    let id = h.engine.write_cheque(&alice, &cheque).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let h = Arc::clone(&h);
        let alice = alice.clone();
        let cheque = cheque.clone();
        tasks.push(tokio::spawn(async move {
            h.engine
                .send_cheque(&alice, &cheque, &request(), Some(&success_reply()))
                .await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(WorkflowError::IllegalTransition { .. }) => rejections += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(rejections, 1);

    // Exactly one convey event made it into the log.
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.events.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_origination_race_creates_one_workflow() {
    let h = Arc::new(harness_with_store(Box::new(
        InMemoryWorkflowStore::with_latency(Duration::from_millis(20)),
    )));
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let cheque = cheque("cheque-1", "alice", Some("bob"), "acct-1", dec!(10.0));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let h = Arc::clone(&h);
        let alice = alice.clone();
        let cheque = cheque.clone();
        tasks.push(tokio::spawn(
            async move { h.engine.write_cheque(&alice, &cheque).await },
        ));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let workflow = h.engine.load_workflow(&alice, &ids[0]).await.unwrap().unwrap();
    assert_eq!(workflow.events.len(), 1);
}
