pub mod legal;

use overturned_core::types::{DispatchKind, TabConfig, TabKind};

/// Return all built-in tabs in display order.
pub fn all_tabs() -> Vec<TabConfig> {
    legal::legal_tabs()
}

/// Look up a tab by slug, label, or short alias.
pub fn get_tab(name: &str) -> Option<TabConfig> {
    match name {
        "overview" => get_tab("case-overview"),
        "motion" => get_tab("motion-drafter"),
        "evidence" => get_tab("evidence-analysis"),
        "collateral" => get_tab("collateral-consequences"),
        _ => all_tabs()
            .into_iter()
            .find(|t| t.name == name || t.label == name),
    }
}

/// Resolve the tab a user selected, falling back to the first tab.
pub fn select_tab(name: &str) -> TabConfig {
    get_tab(name).unwrap_or_else(legal::case_overview_tab)
}

// ── Shared tab builders ──────────────────────────────────────────────────

/// Create a chat tab whose every turn goes through `dispatch`.
pub(crate) fn chat_tab(
    name: &str,
    label: &str,
    title: &str,
    placeholder: &str,
    greeting: &str,
    dispatch: DispatchKind,
) -> TabConfig {
    TabConfig {
        name: name.into(),
        label: label.into(),
        title: title.into(),
        placeholder: placeholder.into(),
        greeting: greeting.into(),
        kind: TabKind::Chat { dispatch },
    }
}

/// Create a single-shot form tab.
pub(crate) fn form_tab(name: &str, label: &str, title: &str, placeholder: &str) -> TabConfig {
    TabConfig {
        name: name.into(),
        label: label.into(),
        title: title.into(),
        placeholder: placeholder.into(),
        greeting: String::new(),
        kind: TabKind::EvidenceForm,
    }
}
