use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Case context ─────────────────────────────────────────────────────────

/// Shared case details entered by the user. Every outgoing prompt carries a
/// formatted copy of the non-empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseContext {
    pub jurisdiction: String,
    pub charges: String,
    pub sentence_guidelines: String,
    pub plea_offer: String,
    pub immigration_status: String,
    /// Prior record of the defendant.
    pub criminal_record: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseField {
    Jurisdiction,
    Charges,
    SentenceGuidelines,
    PleaOffer,
    ImmigrationStatus,
    CriminalRecord,
}

impl CaseField {
    /// Form order, which is also the order lines appear in the prompt.
    pub const ALL: [CaseField; 6] = [
        CaseField::Jurisdiction,
        CaseField::Charges,
        CaseField::SentenceGuidelines,
        CaseField::PleaOffer,
        CaseField::ImmigrationStatus,
        CaseField::CriminalRecord,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Jurisdiction => "jurisdiction",
            Self::Charges => "charges",
            Self::SentenceGuidelines => "sentence_guidelines",
            Self::PleaOffer => "plea_offer",
            Self::ImmigrationStatus => "immigration_status",
            Self::CriminalRecord => "criminal_record",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Jurisdiction => "Jurisdiction",
            Self::Charges => "Charges",
            Self::SentenceGuidelines => "Sentence Guidelines",
            Self::PleaOffer => "Plea Offer",
            Self::ImmigrationStatus => "Immigration Status",
            Self::CriminalRecord => "Criminal Record",
        }
    }
}

impl FromStr for CaseField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the camelCase keys the browser form historically sent.
        match s {
            "jurisdiction" => Ok(Self::Jurisdiction),
            "charges" => Ok(Self::Charges),
            "sentence_guidelines" | "sentenceGuidelines" => Ok(Self::SentenceGuidelines),
            "plea_offer" | "pleaOffer" => Ok(Self::PleaOffer),
            "immigration_status" | "immigrationStatus" => Ok(Self::ImmigrationStatus),
            "criminal_record" | "criminalRecord" | "prior_record" => Ok(Self::CriminalRecord),
            other => anyhow::bail!("unknown case field: {other}"),
        }
    }
}

impl CaseContext {
    pub fn get(&self, field: CaseField) -> &str {
        match field {
            CaseField::Jurisdiction => &self.jurisdiction,
            CaseField::Charges => &self.charges,
            CaseField::SentenceGuidelines => &self.sentence_guidelines,
            CaseField::PleaOffer => &self.plea_offer,
            CaseField::ImmigrationStatus => &self.immigration_status,
            CaseField::CriminalRecord => &self.criminal_record,
        }
    }

    pub fn set(&mut self, field: CaseField, value: impl Into<String>) {
        let value = value.into();
        match field {
            CaseField::Jurisdiction => self.jurisdiction = value,
            CaseField::Charges => self.charges = value,
            CaseField::SentenceGuidelines => self.sentence_guidelines = value,
            CaseField::PleaOffer => self.plea_offer = value,
            CaseField::ImmigrationStatus => self.immigration_status = value,
            CaseField::CriminalRecord => self.criminal_record = value,
        }
    }

    /// Fields holding something other than whitespace, in form order.
    pub fn filled(&self) -> impl Iterator<Item = (CaseField, &str)> + '_ {
        CaseField::ALL
            .into_iter()
            .map(|f| (f, self.get(f)))
            .filter(|(_, v)| !v.trim().is_empty())
    }
}

// ── Conversation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A web source returned by a search-grounded reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSource {
    pub uri: String,
    pub title: String,
}

/// One entry in a panel's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// Present only when the reply carried at least one citation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<CitationSource>>,
}

// ── Attachments ──────────────────────────────────────────────────────────

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file staged on a panel, still in raw form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, data: Vec<u8>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        Self {
            name: name.into(),
            mime_type: mime_type.to_string(),
            data,
        }
    }
}

/// Inline file part: base64 payload embedded directly in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePart {
    pub mime_type: String,
    pub data: String,
}

// ── Model request / reply ────────────────────────────────────────────────

/// Per-variant generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationProfile {
    pub model: String,
    /// Enable the provider's web-search grounding tool.
    pub search: bool,
    /// Provider-side reasoning budget in tokens; `None` keeps the default tier.
    pub thinking_budget: Option<u32>,
}

/// Everything a backend needs for one single-turn generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub profile: GenerationProfile,
    pub prompt: String,
    pub files: Vec<FilePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<CitationSource>>,
}

// ── Tabs ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    /// Search-grounded generation on the default reasoning tier.
    Search,
    /// Elevated reasoning with a thinking budget, no search.
    Thinking,
    /// Fixed evidence-analysis template, single turn.
    Evidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TabKind {
    /// Conversation panel dispatching every turn through one variant.
    Chat { dispatch: DispatchKind },
    /// Single request/response evidence form.
    EvidenceForm,
}

/// Static configuration of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabConfig {
    pub name: String,
    pub label: String,
    pub title: String,
    pub placeholder: String,
    /// First assistant turn shown in a chat panel. Empty for forms.
    pub greeting: String,
    pub kind: TabKind,
}

impl TabConfig {
    pub fn dispatch(&self) -> DispatchKind {
        match self.kind {
            TabKind::Chat { dispatch } => dispatch,
            TabKind::EvidenceForm => DispatchKind::Evidence,
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self.kind, TabKind::Chat { .. })
    }
}
