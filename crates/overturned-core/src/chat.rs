use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    dispatch::{encode_files, Dispatcher},
    types::{AttachedFile, CaseContext, CitationSource, DispatchKind, Role, TabConfig, Turn},
};

/// Assistant text appended when a dispatch fails.
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Id of the greeting turn every chat panel starts with.
pub const GREETING_ID: &str = "initial";

/// State of a single chat panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelState {
    Idle,
    /// A request is in flight; submissions and attachment edits are refused.
    AwaitingResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("nothing to send: enter text or attach a file")]
    Empty,
    #[error("a request is already in flight")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachError {
    #[error("attachments cannot change while a request is in flight")]
    Busy,
    #[error("no attachment at index {0}")]
    NotFound(usize),
}

/// Name and size of a staged file, without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub mime_type: String,
    pub size: usize,
}

impl From<&AttachedFile> for AttachmentInfo {
    fn from(f: &AttachedFile) -> Self {
        Self {
            name: f.name.clone(),
            mime_type: f.mime_type.clone(),
            size: f.data.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelSnapshot {
    pub name: String,
    pub state: PanelState,
    pub turns: Vec<Turn>,
    pub attachments: Vec<AttachmentInfo>,
}

struct PanelInner {
    turns: Vec<Turn>,
    attachments: Vec<AttachedFile>,
    next_seq: u64,
}

impl PanelInner {
    fn next_id(&mut self) -> String {
        self.next_seq += 1;
        format!("{}-{}", Utc::now().timestamp_millis(), self.next_seq)
    }

    fn push(&mut self, role: Role, text: String, sources: Option<Vec<CitationSource>>) -> Turn {
        let turn = Turn {
            id: self.next_id(),
            role,
            text,
            sources: sources.filter(|s| !s.is_empty()),
        };
        self.turns.push(turn.clone());
        turn
    }
}

/// Clears an in-flight flag when dropped, so a cancelled or panicking
/// request cannot leave its panel stuck.
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    /// Set the flag unless it is already set.
    pub(crate) fn begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Conversation panel for one chat tab.
///
/// The lock is held only for state edits, never across the remote call, so
/// snapshots stay readable while a reply is pending.
pub struct ChatPanel {
    name: String,
    kind: DispatchKind,
    busy: AtomicBool,
    inner: Mutex<PanelInner>,
}

impl ChatPanel {
    pub fn new(tab: &TabConfig) -> Self {
        let mut turns = Vec::new();
        if !tab.greeting.is_empty() {
            turns.push(Turn {
                id: GREETING_ID.into(),
                role: Role::Assistant,
                text: tab.greeting.clone(),
                sources: None,
            });
        }
        Self {
            name: tab.name.clone(),
            kind: tab.dispatch(),
            busy: AtomicBool::new(false),
            inner: Mutex::new(PanelInner {
                turns,
                attachments: Vec::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DispatchKind {
        self.kind
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Stage a file for the next turn. Returns the number of staged files.
    pub async fn attach(&self, file: AttachedFile) -> Result<usize, AttachError> {
        let mut inner = self.inner.lock().await;
        if self.is_busy() {
            return Err(AttachError::Busy);
        }
        debug!(panel = %self.name, file = %file.name, size = file.data.len(), "attachment staged");
        inner.attachments.push(file);
        Ok(inner.attachments.len())
    }

    pub async fn remove_attachment(&self, index: usize) -> Result<AttachedFile, AttachError> {
        let mut inner = self.inner.lock().await;
        if self.is_busy() {
            return Err(AttachError::Busy);
        }
        if index >= inner.attachments.len() {
            return Err(AttachError::NotFound(index));
        }
        Ok(inner.attachments.remove(index))
    }

    pub async fn state(&self) -> PanelState {
        if self.is_busy() {
            PanelState::AwaitingResponse
        } else {
            PanelState::Idle
        }
    }

    pub async fn snapshot(&self) -> PanelSnapshot {
        let inner = self.inner.lock().await;
        PanelSnapshot {
            name: self.name.clone(),
            state: self.state().await,
            turns: inner.turns.clone(),
            attachments: inner.attachments.iter().map(AttachmentInfo::from).collect(),
        }
    }

    /// Run one turn: append the user turn, dispatch, append the reply.
    ///
    /// Returns the appended assistant turn. A failed dispatch is not an
    /// error here: it yields the fixed apology turn instead. If the returned
    /// future is dropped before completion the panel goes back to idle and
    /// the user turn stays unanswered.
    pub async fn submit(
        &self,
        text: &str,
        case: &CaseContext,
        dispatcher: &Dispatcher,
    ) -> Result<Turn, SubmitError> {
        let (in_flight, files) = {
            let mut inner = self.inner.lock().await;
            if self.is_busy() {
                debug!(panel = %self.name, "request in flight, refusing submit");
                return Err(SubmitError::Busy);
            }
            if text.trim().is_empty() && inner.attachments.is_empty() {
                return Err(SubmitError::Empty);
            }
            let Some(in_flight) = InFlight::begin(&self.busy) else {
                return Err(SubmitError::Busy);
            };

            inner.push(Role::User, text.to_string(), None);
            let staged = std::mem::take(&mut inner.attachments);
            (in_flight, encode_files(&staged))
        };

        let result = dispatcher.dispatch(self.kind, text, case, files).await;

        let mut inner = self.inner.lock().await;
        let turn = match result {
            Ok(reply) => inner.push(Role::Assistant, reply.text, reply.sources),
            Err(e) => {
                warn!(panel = %self.name, "dispatch failed: {e:#}");
                inner.push(Role::Assistant, ERROR_REPLY.to_string(), None)
            },
        };
        drop(in_flight);
        debug!(panel = %self.name, turns = inner.turns.len(), "panel returned to idle");
        Ok(turn)
    }
}
