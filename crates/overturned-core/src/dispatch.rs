use std::sync::Arc;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::info;

use crate::{
    agent::ModelBackend,
    config::Config,
    prompt::{build_evidence_prompt, build_query_prompt},
    types::{AttachedFile, CaseContext, DispatchKind, FilePart, GenerateRequest, GenerationProfile, ModelReply},
};

/// One generation profile per dispatch variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profiles {
    pub search: GenerationProfile,
    pub thinking: GenerationProfile,
    pub evidence: GenerationProfile,
}

impl Profiles {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search: GenerationProfile {
                model: config.search_model.clone(),
                search: true,
                thinking_budget: None,
            },
            thinking: GenerationProfile {
                model: config.thinking_model.clone(),
                search: false,
                thinking_budget: Some(config.thinking_budget),
            },
            evidence: GenerationProfile {
                model: config.evidence_model.clone(),
                search: false,
                thinking_budget: None,
            },
        }
    }

    pub fn for_kind(&self, kind: DispatchKind) -> &GenerationProfile {
        match kind {
            DispatchKind::Search => &self.search,
            DispatchKind::Thinking => &self.thinking,
            DispatchKind::Evidence => &self.evidence,
        }
    }
}

/// Base64-encode staged attachments into inline file parts.
pub fn encode_files(files: &[AttachedFile]) -> Vec<FilePart> {
    files
        .iter()
        .map(|f| FilePart {
            mime_type: f.mime_type.clone(),
            data: STANDARD.encode(&f.data),
        })
        .collect()
}

/// Builds prompts and forwards them to the model backend.
///
/// Failures propagate unchanged: there is no retry, the caller decides what
/// the user sees.
pub struct Dispatcher {
    backend: Arc<dyn ModelBackend>,
    profiles: Profiles,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ModelBackend>, profiles: Profiles) -> Self {
        Self { backend, profiles }
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    pub async fn generate_with_search(
        &self,
        prompt: &str,
        case: &CaseContext,
        files: Vec<FilePart>,
    ) -> Result<ModelReply> {
        self.dispatch(DispatchKind::Search, prompt, case, files).await
    }

    pub async fn generate_with_thinking(
        &self,
        prompt: &str,
        case: &CaseContext,
        files: Vec<FilePart>,
    ) -> Result<ModelReply> {
        self.dispatch(DispatchKind::Thinking, prompt, case, files).await
    }

    pub async fn analyze_evidence(
        &self,
        evidence: &str,
        case: &CaseContext,
        files: Vec<FilePart>,
    ) -> Result<ModelReply> {
        self.dispatch(DispatchKind::Evidence, evidence, case, files).await
    }

    pub async fn dispatch(
        &self,
        kind: DispatchKind,
        text: &str,
        case: &CaseContext,
        files: Vec<FilePart>,
    ) -> Result<ModelReply> {
        let prompt = match kind {
            DispatchKind::Search | DispatchKind::Thinking => build_query_prompt(text, case),
            DispatchKind::Evidence => build_evidence_prompt(text, case),
        };
        let profile = self.profiles.for_kind(kind).clone();

        info!(
            kind = ?kind,
            backend = %self.backend.name(),
            model = %profile.model,
            prompt_len = prompt.len(),
            files = files.len(),
            "dispatching generation request"
        );

        let reply = self
            .backend
            .generate(GenerateRequest {
                profile,
                prompt,
                files,
            })
            .await?;

        info!(
            kind = ?kind,
            reply_len = reply.text.len(),
            sources = reply.sources.as_ref().map_or(0, Vec::len),
            "generation reply received"
        );
        Ok(reply)
    }
}
