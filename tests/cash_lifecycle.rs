mod common;

use common::{conveying_message, failure_reply, harness, purse, request, success_reply};
use payflow::domain::identifier::NymId;
use payflow::domain::workflow::{EventType, WorkflowState, WorkflowType};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_allocate_and_send_cash() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let purse = purse("purse-1", "alice", Some("bob"), dec!(5.0));

    let first = h.engine.allocate_cash(&alice, &purse).await.unwrap();
    let second = h.engine.allocate_cash(&alice, &purse).await.unwrap();
    assert_eq!(first, second);

    let workflow = h.engine.load_workflow(&alice, &first).await.unwrap().unwrap();
    assert_eq!(workflow.workflow_type, WorkflowType::OutgoingCash);
    assert_eq!(workflow.state, WorkflowState::Unsent);

    h.engine
        .send_cash(&alice, &purse, &request(), Some(&success_reply()))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &first).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Conveyed);
    assert_eq!(workflow.events.len(), 2);

    let entries = h.activity.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].contact.as_str(), "contact-bob");
}

#[tokio::test]
async fn test_cash_can_be_resent_after_failed_send() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let purse = purse("purse-1", "alice", Some("bob"), dec!(5.0));

    let id = h.engine.allocate_cash(&alice, &purse).await.unwrap();
    h.engine
        .send_cash(&alice, &purse, &request(), Some(&failure_reply()))
        .await
        .unwrap();

    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Unsent);
    assert!(!workflow.events[1].success);

    // A conveyed purse may also be conveyed again (e.g. re-export).
    h.engine
        .send_cash(&alice, &purse, &request(), Some(&success_reply()))
        .await
        .unwrap();
    h.engine
        .send_cash(&alice, &purse, &request(), Some(&success_reply()))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Conveyed);
    assert_eq!(workflow.events.len(), 4);
}

#[tokio::test]
async fn test_receive_cash() {
    let h = harness();
    let bob = NymId::from("bob");
    let purse = purse("purse-1", "alice", Some("bob"), dec!(5.0));

    let first = h
        .engine
        .receive_cash(&bob, &purse, &conveying_message("alice"))
        .await
        .unwrap();
    let second = h
        .engine
        .receive_cash(&bob, &purse, &conveying_message("alice"))
        .await
        .unwrap();
    assert_eq!(first, second);

    let workflow = h.engine.load_workflow(&bob, &first).await.unwrap().unwrap();
    assert_eq!(workflow.workflow_type, WorkflowType::IncomingCash);
    assert_eq!(workflow.state, WorkflowState::Conveyed);
    assert_eq!(workflow.events.len(), 1);
    assert_eq!(workflow.events[0].event_type, EventType::Convey);
    assert_eq!(workflow.parties, vec![NymId::from("alice")]);
}
