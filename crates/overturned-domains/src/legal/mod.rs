use overturned_core::types::{CaseField, DispatchKind, TabConfig};

use crate::{chat_tab, form_tab};

pub const APP_NAME: &str = "Overturned";

pub const DISCLAIMER: &str = "This is an AI-powered tool and is not a substitute for professional \
legal advice. Always consult with a qualified attorney. Information may be inaccurate or incomplete.";

pub fn legal_tabs() -> Vec<TabConfig> {
    vec![
        case_overview_tab(),
        motion_drafter_tab(),
        evidence_analysis_tab(),
        collateral_consequences_tab(),
    ]
}

pub fn case_overview_tab() -> TabConfig {
    chat_tab(
        "case-overview",
        "Case Overview",
        "Case Overview",
        "Ask about case facts, precedents, or legal statutes...",
        CASE_OVERVIEW_GREETING,
        DispatchKind::Search,
    )
}

pub fn motion_drafter_tab() -> TabConfig {
    chat_tab(
        "motion-drafter",
        "Motion Drafter",
        "Motion Drafter (Thinking Mode)",
        "Describe the motion you need to draft...",
        MOTION_DRAFTER_GREETING,
        DispatchKind::Thinking,
    )
}

pub fn evidence_analysis_tab() -> TabConfig {
    form_tab(
        "evidence-analysis",
        "Evidence Analysis",
        "Evidence Analysis",
        "Paste witness testimony, police reports, or other documents here...",
    )
}

pub fn collateral_consequences_tab() -> TabConfig {
    chat_tab(
        "collateral-consequences",
        "Collateral Consequences",
        "Collateral Consequences",
        "Ask about consequences of a conviction...",
        COLLATERAL_GREETING,
        DispatchKind::Search,
    )
}

/// Example input shown in the case details form.
pub fn field_placeholder(field: CaseField) -> &'static str {
    match field {
        CaseField::Jurisdiction => "e.g., State of California, County of Los Angeles",
        CaseField::Charges => "e.g., Penal Code § 459 - Burglary",
        CaseField::SentenceGuidelines => "e.g., 2, 4, or 6 years in state prison",
        CaseField::PleaOffer => {
            "e.g., Plead to a lesser charge of PC 484 (petty theft), 3 years probation"
        },
        CaseField::ImmigrationStatus => "e.g., Lawful Permanent Resident, Visa holder, etc.",
        CaseField::CriminalRecord => "e.g., Prior misdemeanor conviction for DUI in 2019",
    }
}

// ── Greetings ────────────────────────────────────────────────────────────

const CASE_OVERVIEW_GREETING: &str = "Hello! I can help you understand the details of a legal \
case. Provide me with a case name, citation, or a summary of the facts, and I'll provide an \
overview using up-to-date information from Google Search.";

const MOTION_DRAFTER_GREETING: &str = "Welcome to the Motion Drafter. I am configured in \
'Thinking Mode' to handle complex legal reasoning and drafting tasks. Please describe the motion \
you want to draft, including the key arguments, relevant facts, and desired legal standard. The \
more detail you provide, the better I can assist you.";

const COLLATERAL_GREETING: &str = "I can provide information on the potential collateral \
consequences of a criminal conviction. Please specify the jurisdiction (e.g., California, \
Federal) and the type of conviction, and I will find relevant information using Google Search.";
