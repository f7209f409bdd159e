use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    chat::{AttachError, AttachmentInfo, InFlight, SubmitError},
    dispatch::{encode_files, Dispatcher},
    types::{AttachedFile, CaseContext},
};

pub const EMPTY_EVIDENCE_ERROR: &str = "Please enter evidence text or upload files to analyze.";
pub const ANALYSIS_FAILED_ERROR: &str = "An error occurred during analysis. Please try again.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceSnapshot {
    pub text: String,
    pub attachments: Vec<AttachmentInfo>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Default)]
struct EvidenceInner {
    text: String,
    attachments: Vec<AttachedFile>,
    result: Option<String>,
    error: Option<String>,
}

/// Single request/response evidence form. Unlike a chat panel it keeps no
/// history and leaves staged files in place after a run.
#[derive(Default)]
pub struct EvidencePanel {
    loading: AtomicBool,
    inner: Mutex<EvidenceInner>,
}

impl EvidencePanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub async fn attach(&self, file: AttachedFile) -> Result<usize, AttachError> {
        let mut inner = self.inner.lock().await;
        if self.is_loading() {
            return Err(AttachError::Busy);
        }
        inner.attachments.push(file);
        Ok(inner.attachments.len())
    }

    pub async fn remove_attachment(&self, index: usize) -> Result<AttachedFile, AttachError> {
        let mut inner = self.inner.lock().await;
        if self.is_loading() {
            return Err(AttachError::Busy);
        }
        if index >= inner.attachments.len() {
            return Err(AttachError::NotFound(index));
        }
        Ok(inner.attachments.remove(index))
    }

    pub async fn snapshot(&self) -> EvidenceSnapshot {
        let inner = self.inner.lock().await;
        EvidenceSnapshot {
            text: inner.text.clone(),
            attachments: inner.attachments.iter().map(AttachmentInfo::from).collect(),
            result: inner.result.clone(),
            error: inner.error.clone(),
            loading: self.is_loading(),
        }
    }

    /// Analyze the pasted text plus staged files. On failure the form's
    /// error message is set and the previous result stays cleared.
    pub async fn analyze(
        &self,
        text: &str,
        case: &CaseContext,
        dispatcher: &Dispatcher,
    ) -> Result<EvidenceSnapshot, SubmitError> {
        let (in_flight, files) = {
            let mut inner = self.inner.lock().await;
            if self.is_loading() {
                return Err(SubmitError::Busy);
            }
            inner.text = text.to_string();
            if text.trim().is_empty() && inner.attachments.is_empty() {
                inner.error = Some(EMPTY_EVIDENCE_ERROR.into());
                return Err(SubmitError::Empty);
            }
            let Some(in_flight) = InFlight::begin(&self.loading) else {
                return Err(SubmitError::Busy);
            };
            inner.error = None;
            inner.result = None;
            (in_flight, encode_files(&inner.attachments))
        };

        info!(text_len = text.len(), files = files.len(), "evidence analysis started");
        let result = dispatcher.analyze_evidence(text, case, files).await;

        let mut inner = self.inner.lock().await;
        match result {
            Ok(reply) => inner.result = Some(reply.text),
            Err(e) => {
                warn!("evidence analysis failed: {e:#}");
                inner.error = Some(ANALYSIS_FAILED_ERROR.into());
            },
        }
        drop(in_flight);
        drop(inner);

        Ok(self.snapshot().await)
    }
}
