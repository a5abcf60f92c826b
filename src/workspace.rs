//! The async review session.
//!
//! A [`Workspace`] owns one open document at a time and publishes its state
//! as an immutable [`SessionSnapshot`] through a `tokio::sync::watch`
//! channel. Every update replaces the snapshot in one step, so readers see
//! either the old state or the new one, never a mix.
//!
//! # Lifecycle
//!
//! ```text
//! open(doc) ──► epoch += 1, analysis Pending, turn worker started
//!                 │
//!                 ├── analysis task ──► attach_analysis ──► Ready | Failed
//!                 │
//!                 └── send(text) ──► user message appended immediately
//!                                    └── queued to the FIFO worker
//!                                         └── generator ──► assistant reply
//! ```
//!
//! # Cancellation
//!
//! Opening another document (or [`Workspace::close`]) aborts the previous
//! document's analysis task and turn worker and bumps the epoch. Results are
//! applied only when their epoch matches the current one; anything older is
//! a [`ReviewError::StaleResponse`] and is dropped with a debug log.
//!
//! # Ordering
//!
//! One worker per document drains the turn queue, so at most one generator
//! call is outstanding and replies land in the order the user messages were
//! sent. The user message is in the log before its reply can be.

use anyhow::{anyhow, bail, Context};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use review_harness_core::conversation::ConversationLog;
use review_harness_core::document::attach_analysis;
use review_harness_core::error::{Result, ReviewError};
use review_harness_core::models::{Analysis, Document, Reply};
use review_harness_core::services::{AnalysisService, ResponseGenerator};

use crate::config::{Config, SessionConfig};
use crate::simulated::{analysis_summary, greeting, SimulatedAnalyzer, SimulatedResponder};

/// Where the current document's analysis stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnalysisState {
    /// No document is open.
    #[default]
    Idle,
    Pending,
    Ready,
    /// The service failed or returned data inconsistent with the document.
    Failed(String),
}

/// A user turn whose reply could not be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTurn {
    pub message_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationState {
    /// Turns waiting behind the one in flight.
    pub queued: usize,
    /// The user message currently being answered.
    pub in_flight: Option<String>,
    pub failed: Vec<FailedTurn>,
}

impl GenerationState {
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.in_flight.is_none()
    }
}

/// Everything a reader needs to draw the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub epoch: u64,
    /// The open document; replaced by its analyzed version once ready.
    pub document: Option<Arc<Document>>,
    pub analysis: AnalysisState,
    pub conversation: Arc<ConversationLog>,
    pub generation: GenerationState,
}

struct Turn {
    message_id: String,
    text: String,
}

struct Shared {
    analyzer: Arc<dyn AnalysisService>,
    responder: Arc<dyn ResponseGenerator>,
    config: SessionConfig,
    state: watch::Sender<SessionSnapshot>,
}

/// Single-document review session.
pub struct Workspace {
    shared: Arc<Shared>,
    analysis_task: Option<JoinHandle<()>>,
    worker_task: Option<JoinHandle<()>>,
    turns: Option<mpsc::UnboundedSender<Turn>>,
}

impl Workspace {
    pub fn new(
        analyzer: Arc<dyn AnalysisService>,
        responder: Arc<dyn ResponseGenerator>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                analyzer,
                responder,
                config,
                state,
            }),
            analysis_task: None,
            worker_task: None,
            turns: None,
        }
    }

    /// A workspace backed by the simulated collaborators.
    pub fn simulated(config: &Config) -> Self {
        Self::new(
            Arc::new(SimulatedAnalyzer::new(&config.simulation)),
            Arc::new(SimulatedResponder::new(&config.simulation)),
            config.session.clone(),
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn epoch(&self) -> u64 {
        self.shared.state.borrow().epoch
    }

    /// Make `document` current and start analyzing it.
    ///
    /// Must be called from within a tokio runtime. Returns the new epoch.
    pub fn open(&mut self, document: Document) -> u64 {
        self.cancel();

        let document = Arc::new(document);
        let mut conversation = ConversationLog::new();
        if self.shared.config.greeting {
            conversation.append_assistant(greeting(&document), Vec::new(), None);
        }

        let epoch = self.epoch() + 1;
        self.shared.state.send_replace(SessionSnapshot {
            epoch,
            document: Some(document.clone()),
            analysis: AnalysisState::Pending,
            conversation: Arc::new(conversation),
            generation: GenerationState::default(),
        });
        info!(
            document_id = %document.id,
            title = %document.title,
            sections = document.sections.len(),
            pages = document.page_count(),
            epoch,
            "Opened document"
        );

        self.analysis_task = Some(spawn_analysis(self.shared.clone(), epoch, document));

        let (tx, rx) = mpsc::unbounded_channel();
        self.worker_task = Some(tokio::spawn(run_turns(self.shared.clone(), epoch, rx)));
        self.turns = Some(tx);
        epoch
    }

    /// Drop the current document and all of its pending work.
    pub fn close(&mut self) {
        self.cancel();
        let epoch = self.epoch() + 1;
        self.shared.state.send_replace(SessionSnapshot {
            epoch,
            ..SessionSnapshot::default()
        });
        debug!(epoch, "Closed document");
    }

    /// Run the analysis again after a failure.
    pub fn retry_analysis(&mut self) -> anyhow::Result<()> {
        let snapshot = self.snapshot();
        let document = snapshot.document.context("No document is open")?;
        if !matches!(snapshot.analysis, AnalysisState::Failed(_)) {
            bail!("Analysis has not failed; nothing to retry");
        }

        if let Some(task) = self.analysis_task.take() {
            task.abort();
        }
        self.shared.state.send_modify(|s| s.analysis = AnalysisState::Pending);
        info!(document_id = %document.id, "Retrying analysis");
        self.analysis_task = Some(spawn_analysis(
            self.shared.clone(),
            snapshot.epoch,
            document,
        ));
        Ok(())
    }

    /// Append a user message and queue it for a reply.
    ///
    /// Returns the id of the new user message.
    pub fn send(&mut self, text: &str) -> anyhow::Result<String> {
        let turns = self.turns.as_ref().context("No document is open")?;

        let mut message_id = String::new();
        let mut queued = 0;
        self.shared.state.send_modify(|s| {
            message_id = Arc::make_mut(&mut s.conversation)
                .append_user(text)
                .id
                .clone();
            s.generation.queued += 1;
            queued = s.generation.queued;
        });
        debug!(message_id = %message_id, queued, "Queued turn");

        turns
            .send(Turn {
                message_id: message_id.clone(),
                text: text.to_string(),
            })
            .map_err(|_| anyhow!("Turn worker has stopped"))?;
        Ok(message_id)
    }

    /// Re-queue every failed turn. The user messages are not appended
    /// again. Returns how many turns were re-queued.
    pub fn retry_generation(&mut self) -> anyhow::Result<usize> {
        let turns = self.turns.as_ref().context("No document is open")?;

        let mut retry = Vec::new();
        self.shared.state.send_modify(|s| {
            for failed in s.generation.failed.drain(..) {
                if let Some(message) = s.conversation.get(&failed.message_id) {
                    retry.push(Turn {
                        message_id: failed.message_id,
                        text: message.text.clone(),
                    });
                }
            }
            s.generation.queued += retry.len();
        });

        let count = retry.len();
        for turn in retry {
            turns
                .send(turn)
                .map_err(|_| anyhow!("Turn worker has stopped"))?;
        }
        if count > 0 {
            info!(count, "Retrying failed turns");
        }
        Ok(count)
    }

    /// Deliver an analysis result computed for `epoch`.
    ///
    /// Fails with [`ReviewError::StaleResponse`] when `epoch` is no longer
    /// current or the analysis is no longer pending; the snapshot is left
    /// untouched in that case.
    pub fn apply_analysis(&self, epoch: u64, result: Result<Analysis>) -> Result<()> {
        self.shared.apply_analysis(epoch, result)
    }

    /// Wait until the analysis leaves `Pending`.
    pub async fn wait_for_analysis(&self) -> AnalysisState {
        let mut rx = self.subscribe();
        let state = match rx
            .wait_for(|s| s.analysis != AnalysisState::Pending)
            .await
        {
            Ok(snapshot) => snapshot.analysis.clone(),
            Err(_) => AnalysisState::Idle,
        };
        state
    }

    /// Wait until no turn is queued or in flight.
    pub async fn wait_idle(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(|s| s.generation.is_idle()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    fn cancel(&mut self) {
        if let Some(task) = self.analysis_task.take() {
            task.abort();
        }
        if let Some(task) = self.worker_task.take() {
            task.abort();
        }
        self.turns = None;
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn spawn_analysis(shared: Arc<Shared>, epoch: u64, document: Arc<Document>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = shared.analyzer.analyze(&document).await;
        if let Err(e) = shared.apply_analysis(epoch, result) {
            debug!(epoch, error = %e, "Discarded analysis");
        }
    })
}

/// Drain the turn queue for one document, one generator call at a time.
async fn run_turns(shared: Arc<Shared>, epoch: u64, mut rx: mpsc::UnboundedReceiver<Turn>) {
    while let Some(turn) = rx.recv().await {
        let mut snapshot = None;
        shared.state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.generation.queued = s.generation.queued.saturating_sub(1);
            s.generation.in_flight = Some(turn.message_id.clone());
            snapshot = Some(s.clone());
            true
        });
        let Some(snapshot) = snapshot else {
            break;
        };
        let Some(document) = snapshot.document.clone() else {
            break;
        };

        // The generator sees the log up to and including this turn.
        let messages = snapshot.conversation.messages();
        let upto = messages
            .iter()
            .position(|m| m.id == turn.message_id)
            .map_or(messages.len(), |i| i + 1);

        let result = shared
            .responder
            .respond(&messages[..upto], &document, &turn.text)
            .await;
        if let Err(e) = shared.apply_reply(epoch, &turn, result) {
            debug!(epoch, error = %e, "Discarded reply");
        }
    }
}

impl Shared {
    fn apply_analysis(&self, epoch: u64, result: Result<Analysis>) -> Result<()> {
        let mut stale_id = String::new();
        let applied = self.state.send_if_modified(|s| {
            let document = match &s.document {
                Some(d) if s.epoch == epoch && s.analysis == AnalysisState::Pending => d.clone(),
                other => {
                    stale_id = other.as_ref().map(|d| d.id.clone()).unwrap_or_default();
                    return false;
                }
            };

            match result.and_then(|analysis| attach_analysis(&document, analysis)) {
                Ok(analyzed) => {
                    let analyzed = Arc::new(analyzed);
                    let issues = analyzed.analysis.as_ref().map_or(0, |a| a.issues.len());
                    info!(document_id = %analyzed.id, issues, "Analysis ready");
                    if self.config.summarize_analysis {
                        if let Some(Reply { text, references }) = analysis_summary(&analyzed) {
                            Arc::make_mut(&mut s.conversation)
                                .append_assistant(text, references, None);
                        }
                    }
                    s.document = Some(analyzed);
                    s.analysis = AnalysisState::Ready;
                }
                Err(e) => {
                    warn!(document_id = %document.id, error = %e, "Analysis failed");
                    s.analysis = AnalysisState::Failed(e.to_string());
                }
            }
            true
        });

        if applied {
            Ok(())
        } else {
            Err(ReviewError::StaleResponse {
                document_id: stale_id,
            })
        }
    }

    fn apply_reply(&self, epoch: u64, turn: &Turn, result: Result<Reply>) -> Result<()> {
        let mut stale_id = String::new();
        let applied = self.state.send_if_modified(|s| {
            if s.epoch != epoch {
                stale_id = s.document.as_ref().map(|d| d.id.clone()).unwrap_or_default();
                return false;
            }
            s.generation.in_flight = None;
            match result {
                Ok(reply) => {
                    let log = Arc::make_mut(&mut s.conversation);
                    log.append_assistant(
                        reply.text,
                        reply.references,
                        Some(turn.message_id.clone()),
                    );
                    info!(
                        in_reply_to = %turn.message_id,
                        messages = log.len(),
                        queued = s.generation.queued,
                        "Turn complete"
                    );
                }
                Err(e) => {
                    warn!(message_id = %turn.message_id, error = %e, "Generation failed");
                    s.generation.failed.push(FailedTurn {
                        message_id: turn.message_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
            true
        });

        if applied {
            Ok(())
        } else {
            Err(ReviewError::StaleResponse {
                document_id: stale_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_harness_core::document::{build_document, Sectioning};

    fn quiet() -> Config {
        let mut config = Config::default();
        config.simulation = crate::config::SimulationConfig::instant();
        config
    }

    fn doc(title: &str) -> Document {
        build_document(title, &"Some words here. ".repeat(40), Sectioning::default(), None)
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_greets_and_analyzes() {
        let mut ws = Workspace::simulated(&quiet());
        assert_eq!(ws.snapshot().analysis, AnalysisState::Idle);

        let epoch = ws.open(doc("Essay"));
        assert_eq!(epoch, 1);
        assert_eq!(ws.snapshot().conversation.len(), 1);

        assert_eq!(ws.wait_for_analysis().await, AnalysisState::Ready);
        let snapshot = ws.snapshot();
        assert!(snapshot.document.unwrap().is_analyzed());
        // greeting + analysis summary
        assert_eq!(snapshot.conversation.len(), 2);
        assert_eq!(snapshot.conversation.messages()[1].references.len(), 3);
    }

    #[tokio::test]
    async fn test_send_without_document_fails() {
        let mut ws = Workspace::simulated(&quiet());
        assert!(ws.send("hello").is_err());
        assert!(ws.retry_analysis().is_err());
    }

    #[tokio::test]
    async fn test_close_resets_snapshot() {
        let mut ws = Workspace::simulated(&quiet());
        ws.open(doc("Essay"));
        ws.close();
        let snapshot = ws.snapshot();
        assert_eq!(snapshot.epoch, 2);
        assert!(snapshot.document.is_none());
        assert!(snapshot.conversation.is_empty());
        assert_eq!(snapshot.analysis, AnalysisState::Idle);
    }

    #[tokio::test]
    async fn test_stale_analysis_is_rejected() {
        let mut ws = Workspace::simulated(&quiet());
        let first = ws.open(doc("First"));
        ws.open(doc("Second"));
        let empty = Analysis {
            issues: Vec::new(),
            overall_score: 10.0,
            strengths: Vec::new(),
            suggestions: Vec::new(),
            complete: true,
        };
        let err = ws.apply_analysis(first, Ok(empty)).unwrap_err();
        assert!(matches!(err, ReviewError::StaleResponse { .. }));
    }
}
