mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use threadrun::error::ThreadRunError;
use threadrun::run_loop::{ApprovalDecision, ControllerStatus};
use threadrun::session::SendOptions;
use threadrun::types::*;

use common::*;

fn approval(id: &str, tool_id: &str, decision: ApprovalVerdict) -> ToolApprovalSubmission {
    ToolApprovalSubmission {
        id: id.into(),
        tool_id: tool_id.into(),
        decision,
    }
}

#[tokio::test]
async fn previously_approved_tool_resolves_without_prompt() {
    let api = MockApi::new();
    api.push_leg(Leg::frames(vec![
        run_created("run_1"),
        requires_approvals("run_1", &[("ap_1", "web_search")]),
    ]));
    api.push_leg(reply("run_1", "msg_1", &["Found it"]));
    let session = session(&api).with_thread(thread_with_approved(&["web_search"]));
    let prompts = session.watch_pending_approval();

    let outcome = session.send_message("Search", SendOptions::new()).await;

    assert!(outcome.failure.is_none());
    assert!(!prompts.has_changed().unwrap());
    assert_eq!(
        api.approval_submissions(),
        vec![vec![approval("ap_1", "web_search", ApprovalVerdict::Approve)]]
    );
    assert_eq!(last_assistant(&session).content, "Found it");
}

#[tokio::test]
async fn approvals_are_exposed_one_at_a_time() {
    let api = MockApi::new();
    api.push_leg(Leg::frames(vec![
        run_created("run_1"),
        requires_approvals("run_1", &[("ap_1", "crm_lookup"), ("ap_2", "web_search")]),
    ]));
    // The server announces the remaining approval again on the next leg.
    api.push_leg(Leg::frames(vec![requires_approvals(
        "run_1",
        &[("ap_1", "crm_lookup"), ("ap_2", "web_search")],
    )]));
    api.push_leg(reply("run_1", "msg_1", &["Done"]));
    let session = Arc::new(session(&api).with_thread(thread_with_approved(&[])));
    let mut prompts = session.watch_pending_approval();

    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("Look it up", SendOptions::new()).await }
    });

    let first = prompts
        .wait_for(Option::is_some)
        .await
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!(first.id, "ap_1");
    assert_eq!(first.tool_id, "crm_lookup");
    assert_eq!(session.status(), ControllerStatus::Waiting);
    assert!(session.decide_approval(ApprovalDecision::Once));

    let second = prompts
        .wait_for(|p| p.as_ref().is_some_and(|a| a.id == "ap_2"))
        .await
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!(second.tool_id, "web_search");
    assert!(session.decide_approval(ApprovalDecision::Decline));

    let outcome = send.await.unwrap();
    assert!(outcome.failure.is_none());
    assert_eq!(
        api.approval_submissions(),
        vec![
            vec![approval("ap_1", "crm_lookup", ApprovalVerdict::Approve)],
            vec![approval("ap_2", "web_search", ApprovalVerdict::Decline)],
        ]
    );
    assert!(session.pending_approval().is_none());
    assert!(!session.decide_approval(ApprovalDecision::Once));
    // "once" never touches the thread's approved set.
    assert!(session.thread().unwrap().metadata.approved_tools().is_empty());
}

#[tokio::test]
async fn always_persists_the_tool_even_when_the_remote_update_fails() {
    let api = MockApi::new();
    api.fail_update_thread();
    api.push_leg(Leg::frames(vec![
        run_created("run_1"),
        requires_approvals("run_1", &[("ap_1", "web_search")]),
    ]));
    api.push_leg(reply("run_1", "msg_1", &["First"]));
    api.push_leg(Leg::frames(vec![
        run_created("run_2"),
        requires_approvals("run_2", &[("ap_9", "web_search")]),
    ]));
    api.push_leg(reply("run_2", "msg_2", &["Second"]));
    let session = Arc::new(session(&api).with_thread(thread_with_approved(&[])));
    let mut prompts = session.watch_pending_approval();

    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("one", SendOptions::new()).await }
    });
    prompts
        .wait_for(Option::is_some)
        .await
        .unwrap();
    session.decide_approval(ApprovalDecision::Always);
    let outcome = send.await.unwrap();
    assert!(outcome.failure.is_none());

    // Local metadata moved ahead of the remote copy, which rejected the write.
    let local = session.thread().unwrap().metadata;
    assert!(local.is_tool_approved("web_search"));
    let pushed = api.calls().into_iter().find_map(|c| match c {
        Call::UpdateThread { metadata, .. } => Some(metadata),
        _ => None,
    });
    assert_eq!(pushed, Some(local));

    // The next approval for the same tool is answered without a prompt.
    prompts.borrow_and_update();
    let outcome = session.send_message("two", SendOptions::new()).await;
    assert!(outcome.failure.is_none());
    assert!(!prompts.has_changed().unwrap());
    assert_eq!(
        api.approval_submissions().last(),
        Some(&vec![approval("ap_9", "web_search", ApprovalVerdict::Approve)])
    );
}

#[tokio::test]
async fn cancel_while_waiting_for_approval() {
    let api = MockApi::new();
    api.push_leg(Leg::frames(vec![
        run_created("run_1"),
        requires_approvals("run_1", &[("ap_1", "web_search")]),
    ]));
    let session = Arc::new(session(&api).with_thread(thread_with_approved(&[])));
    let mut prompts = session.watch_pending_approval();

    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("Search", SendOptions::new()).await }
    });
    prompts
        .wait_for(Option::is_some)
        .await
        .unwrap();
    assert!(session.cancel());
    let outcome = send.await.unwrap();

    assert!(outcome.aborted);
    assert!(api.approval_submissions().is_empty());
    assert_eq!(api.cancel_calls(), vec!["run_1".to_string()]);
    assert!(session.pending_approval().is_none());
    assert!(session.messages().is_empty());
    assert_eq!(session.status(), ControllerStatus::Ready);
}

#[tokio::test]
async fn decided_approval_is_withdrawn_while_the_run_continues() {
    let api = MockApi::new();
    api.push_leg(Leg::frames(vec![
        run_created("run_1"),
        requires_approvals("run_1", &[("ap_1", "web_search")]),
    ]));
    api.push_leg(Leg::hanging(vec![message_created("msg_1")]));
    let session = Arc::new(session(&api).with_thread(thread_with_approved(&[])));
    let mut prompts = session.watch_pending_approval();
    let mut status = session.watch_status();

    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("Search", SendOptions::new()).await }
    });
    prompts.wait_for(Option::is_some).await.unwrap();
    assert!(session.decide_approval(ApprovalDecision::Once));

    status
        .wait_for(|s| s.status() == ControllerStatus::Fetching)
        .await
        .unwrap();
    assert!(session.snapshot().pending_approval.is_none());
    assert!(session.pending_approval().is_none());

    session.cancel();
    assert!(send.await.unwrap().aborted);
}

#[tokio::test]
async fn opened_thread_keeps_its_metadata_for_approvals() {
    let api = MockApi::new();
    let mut metadata = ThreadMetadata::seeded("Trip plan", Some("asst_1"));
    metadata.approve_tool("web_search");
    metadata.insert("project", "travel");
    api.add_thread(Thread {
        id: "thread_7".into(),
        metadata,
        tool_resources: ToolResources::default(),
    });
    api.push_leg(Leg::frames(vec![
        run_created("run_1"),
        requires_approvals("run_1", &[("ap_1", "web_search"), ("ap_2", "crm_lookup")]),
    ]));
    api.push_leg(Leg::frames(vec![requires_approvals(
        "run_1",
        &[("ap_2", "crm_lookup")],
    )]));
    api.push_leg(reply("run_1", "msg_1", &["Booked"]));
    let session = Arc::new(session(&api));

    let opened = session.open_thread("thread_7").await.unwrap();
    assert_eq!(opened.metadata.title(), Some("Trip plan"));
    assert_eq!(session.status(), ControllerStatus::Ready);

    let mut prompts = session.watch_pending_approval();
    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("Book it", SendOptions::new()).await }
    });
    let prompt = prompts
        .wait_for(Option::is_some)
        .await
        .unwrap()
        .clone()
        .unwrap();
    // web_search was answered from the thread's stored approvals.
    assert_eq!(prompt.id, "ap_2");
    session.decide_approval(ApprovalDecision::Always);
    assert!(send.await.unwrap().failure.is_none());

    assert_eq!(
        api.approval_submissions(),
        vec![
            vec![approval("ap_1", "web_search", ApprovalVerdict::Approve)],
            vec![approval("ap_2", "crm_lookup", ApprovalVerdict::Approve)],
        ]
    );
    let pushed = api
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::UpdateThread { thread_id, metadata } => Some((thread_id, metadata)),
            _ => None,
        })
        .unwrap();
    assert_eq!(pushed.0, "thread_7");
    assert_eq!(pushed.1.title(), Some("Trip plan"));
    assert_eq!(pushed.1.assistant_id(), Some("asst_1"));
    assert_eq!(pushed.1.get("project"), Some("travel"));
    assert!(pushed.1.is_tool_approved("web_search"));
    assert!(pushed.1.is_tool_approved("crm_lookup"));
    assert!(!api.calls().iter().any(|c| matches!(c, Call::CreateThread(_))));
}

#[tokio::test]
async fn opening_an_unknown_thread_leaves_the_session_unbound() {
    let api = MockApi::new();
    let session = session(&api);

    let err = session.open_thread("missing").await.unwrap_err();

    assert!(matches!(err, ThreadRunError::Api { status: 404, .. }));
    assert!(session.thread().is_none());
    assert_eq!(session.status(), ControllerStatus::Ready);
}
