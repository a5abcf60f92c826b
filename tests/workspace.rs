use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use review_harness::config::SessionConfig;
use review_harness::simulated::canned_analysis;
use review_harness::workspace::{AnalysisState, Workspace};
use review_harness_core::document::{build_document, Sectioning};
use review_harness_core::error::{Result, ReviewError};
use review_harness_core::models::{Analysis, Document, Message, Reply, Role};
use review_harness_core::range::TextRange;
use review_harness_core::services::{AnalysisService, ResponseGenerator};

fn quiet() -> SessionConfig {
    SessionConfig {
        greeting: false,
        summarize_analysis: false,
    }
}

fn doc(title: &str) -> Document {
    build_document(
        title,
        &format!("{} is a document with enough words to anchor issues. ", title).repeat(20),
        Sectioning::default(),
        None,
    )
    .unwrap()
}

/// Succeeds with the canned analysis once a permit is available.
struct GatedAnalyzer {
    gate: Semaphore,
    completed: AtomicUsize,
}

impl GatedAnalyzer {
    fn closed() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    fn open() -> Arc<Self> {
        let analyzer = Self::closed();
        analyzer.gate.add_permits(1000);
        analyzer
    }
}

#[async_trait]
impl AnalysisService for GatedAnalyzer {
    async fn analyze(&self, document: &Document) -> Result<Analysis> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ReviewError::AnalysisFailed(e.to_string()))?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(canned_analysis(document))
    }
}

/// Fails the first `failures` calls.
struct FlakyAnalyzer {
    failures: AtomicUsize,
}

#[async_trait]
impl AnalysisService for FlakyAnalyzer {
    async fn analyze(&self, document: &Document) -> Result<Analysis> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ReviewError::AnalysisFailed("timeout".to_string()));
        }
        Ok(canned_analysis(document))
    }
}

/// Points every issue at a section that does not exist.
struct DanglingAnalyzer;

#[async_trait]
impl AnalysisService for DanglingAnalyzer {
    async fn analyze(&self, document: &Document) -> Result<Analysis> {
        let mut analysis = canned_analysis(document);
        for issue in &mut analysis.issues {
            issue.section_id = "sec-99".to_string();
        }
        Ok(analysis)
    }
}

/// Echoes each message after a delay, tracking concurrency.
#[derive(Default)]
struct TrackingResponder {
    active: AtomicUsize,
    max_active: AtomicUsize,
    failures: AtomicUsize,
    /// (text answered, last message the generator was shown)
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ResponseGenerator for TrackingResponder {
    async fn respond(&self, conversation: &[Message], _document: &Document, text: &str) -> Result<Reply> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let last = conversation.last().map(|m| m.text.clone()).unwrap_or_default();
        self.calls.lock().unwrap().push((text.to_string(), last));

        tokio::time::sleep(Duration::from_millis(10)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ReviewError::GenerationFailed("rate limited".to_string()));
        }
        Ok(Reply {
            text: format!("re: {}", text),
            references: Vec::new(),
        })
    }
}

fn user_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.role == Role::User).collect()
}

#[tokio::test]
async fn test_turns_are_fifo_with_one_call_outstanding() {
    let responder = Arc::new(TrackingResponder::default());
    let mut ws = Workspace::new(GatedAnalyzer::open(), responder.clone(), quiet());
    ws.open(doc("Essay"));

    let ids: Vec<String> = ["first", "second", "third"]
        .iter()
        .map(|t| ws.send(t).unwrap())
        .collect();

    // All three user messages are visible before any reply.
    let pending = ws.snapshot();
    assert_eq!(pending.conversation.len(), 3);
    assert_eq!(pending.generation.queued + pending.generation.in_flight.iter().count(), 3);

    let done = ws.wait_idle().await;
    assert_eq!(responder.max_active.load(Ordering::SeqCst), 1);

    let calls = responder.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            ("first".to_string(), "first".to_string()),
            ("second".to_string(), "second".to_string()),
            ("third".to_string(), "third".to_string()),
        ]
    );

    let messages = done.conversation.messages();
    let replies: Vec<&Message> = messages.iter().filter(|m| m.role == Role::Assistant).collect();
    assert_eq!(replies.len(), 3);
    for (reply, user_id) in replies.iter().zip(&ids) {
        assert_eq!(reply.in_reply_to.as_ref(), Some(user_id));
        let user = done.conversation.get(user_id).unwrap();
        assert!(user.seq < reply.seq);
        assert!(user.timestamp < reply.timestamp);
        assert_eq!(reply.text, format!("re: {}", user.text));
    }
}

#[tokio::test]
async fn test_chat_is_not_blocked_by_pending_analysis() {
    let analyzer = GatedAnalyzer::closed();
    let mut ws = Workspace::new(analyzer, Arc::new(TrackingResponder::default()), quiet());
    ws.open(doc("Essay"));

    let id = ws.send("hello").unwrap();
    let snapshot = ws.wait_idle().await;
    assert_eq!(snapshot.analysis, AnalysisState::Pending);
    assert!(snapshot.conversation.reply_to(&id).is_some());
}

#[tokio::test]
async fn test_switching_documents_cancels_old_analysis() {
    let analyzer = GatedAnalyzer::closed();
    let mut ws = Workspace::new(analyzer.clone(), Arc::new(TrackingResponder::default()), quiet());

    let first_epoch = ws.open(doc("First"));
    let first = ws.snapshot().document.unwrap();
    ws.send("about the first document").unwrap();

    let second_epoch = ws.open(doc("Second"));
    assert_eq!(second_epoch, first_epoch + 1);
    analyzer.gate.add_permits(10);

    assert_eq!(ws.wait_for_analysis().await, AnalysisState::Ready);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The abandoned snapshot never gained an analysis and its task never finished.
    assert!(first.analysis.is_none());
    assert_eq!(analyzer.completed.load(Ordering::SeqCst), 1);

    let current = ws.snapshot();
    let current_doc = current.document.unwrap();
    assert_eq!(current_doc.title, "Second");
    assert!(current_doc.is_analyzed());
    // The new conversation starts empty.
    assert!(current.conversation.is_empty());

    let late = ws.apply_analysis(first_epoch, Ok(canned_analysis(&first)));
    assert!(matches!(late, Err(ReviewError::StaleResponse { .. })));
    assert_eq!(ws.snapshot().document.unwrap().id, current_doc.id);
}

#[tokio::test]
async fn test_inconsistent_analysis_is_surfaced() {
    let mut ws = Workspace::new(
        Arc::new(DanglingAnalyzer),
        Arc::new(TrackingResponder::default()),
        quiet(),
    );
    ws.open(doc("Essay"));

    match ws.wait_for_analysis().await {
        AnalysisState::Failed(message) => assert!(message.contains("dangling section")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!ws.snapshot().document.unwrap().is_analyzed());
}

#[tokio::test]
async fn test_out_of_range_issue_is_surfaced() {
    let mut ws = Workspace::new(
        GatedAnalyzer::open(),
        Arc::new(TrackingResponder::default()),
        quiet(),
    );
    let epoch = ws.open(doc("Essay"));
    // Beat the service to it with a malformed result.
    let document = ws.snapshot().document.unwrap();
    let mut analysis = canned_analysis(&document);
    analysis.issues[0].range = TextRange::new(0, document.len() + 1).unwrap();
    ws.apply_analysis(epoch, Ok(analysis)).unwrap();

    assert!(matches!(ws.snapshot().analysis, AnalysisState::Failed(_)));
}

#[tokio::test]
async fn test_retry_analysis_after_failure() {
    let mut ws = Workspace::new(
        Arc::new(FlakyAnalyzer {
            failures: AtomicUsize::new(1),
        }),
        Arc::new(TrackingResponder::default()),
        SessionConfig {
            greeting: true,
            summarize_analysis: true,
        },
    );
    ws.open(doc("Essay"));

    assert_eq!(
        ws.wait_for_analysis().await,
        AnalysisState::Failed("analysis failed: timeout".to_string())
    );
    assert_eq!(ws.snapshot().conversation.len(), 1);

    ws.retry_analysis().unwrap();
    assert_eq!(ws.wait_for_analysis().await, AnalysisState::Ready);

    // greeting + one analysis summary
    let snapshot = ws.snapshot();
    assert_eq!(snapshot.conversation.len(), 2);
    assert!(ws.retry_analysis().is_err());
}

#[tokio::test]
async fn test_retry_generation_does_not_duplicate_messages() {
    let responder = Arc::new(TrackingResponder {
        failures: AtomicUsize::new(1),
        ..Default::default()
    });
    let mut ws = Workspace::new(GatedAnalyzer::open(), responder.clone(), quiet());
    ws.open(doc("Essay"));

    let id = ws.send("what is weak here?").unwrap();
    let failed = ws.wait_idle().await;
    assert_eq!(failed.generation.failed.len(), 1);
    assert_eq!(failed.generation.failed[0].message_id, id);
    assert!(failed.conversation.reply_to(&id).is_none());

    assert_eq!(ws.retry_generation().unwrap(), 1);
    let done = ws.wait_idle().await;

    assert!(done.generation.failed.is_empty());
    assert_eq!(user_messages(done.conversation.messages()).len(), 1);
    assert_eq!(done.conversation.len(), 2);
    assert_eq!(
        done.conversation.reply_to(&id).unwrap().text,
        "re: what is weak here?"
    );
    assert_eq!(responder.calls.lock().unwrap().len(), 2);

    assert_eq!(ws.retry_generation().unwrap(), 0);
}

#[tokio::test]
async fn test_close_stops_pending_work() {
    let analyzer = GatedAnalyzer::closed();
    let mut ws = Workspace::new(analyzer.clone(), Arc::new(TrackingResponder::default()), quiet());
    ws.open(doc("Essay"));
    ws.close();
    analyzer.gate.add_permits(10);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = ws.snapshot();
    assert!(snapshot.document.is_none());
    assert_eq!(snapshot.analysis, AnalysisState::Idle);
    assert_eq!(analyzer.completed.load(Ordering::SeqCst), 0);
    assert!(ws.send("anyone there?").is_err());
}
