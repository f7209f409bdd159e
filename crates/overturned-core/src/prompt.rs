use crate::types::CaseContext;

const CONTEXT_START: &str = "--- Case Context ---";
const CONTEXT_END: &str = "--- End Case Context ---";

pub const EVIDENCE_INSTRUCTION: &str = "Analyze the following legal text and/or attached files \
for key facts, inconsistencies, and potential arguments. Provide a structured summary.";

pub const NO_EVIDENCE_TEXT: &str = "No text provided.";

/// Render the non-empty case fields as a delimited block, one
/// `Label: value` line each. Returns an empty string when nothing is set.
pub fn format_context(case: &CaseContext) -> String {
    let lines: Vec<String> = case
        .filled()
        .map(|(field, value)| format!("{}: {}", field.label(), value))
        .collect();

    if lines.is_empty() {
        return String::new();
    }

    format!("{CONTEXT_START}\n{}\n{CONTEXT_END}\n\n", lines.join("\n"))
}

/// Prompt for the chat variants: case context followed by the user query.
pub fn build_query_prompt(text: &str, case: &CaseContext) -> String {
    let mut s = format_context(case);
    s.push_str("User Query: ");
    s.push_str(text);
    s
}

/// Prompt for evidence analysis. Blank evidence text is replaced by a
/// marker so the model knows to rely on the attached files.
pub fn build_evidence_prompt(evidence: &str, case: &CaseContext) -> String {
    let evidence = if evidence.trim().is_empty() {
        NO_EVIDENCE_TEXT
    } else {
        evidence
    };

    let mut s = format_context(case);
    s.push_str(EVIDENCE_INSTRUCTION);
    s.push_str("\n\nEvidence Text (if provided):\n---\n");
    s.push_str(evidence);
    s.push_str("\n---\n\nAnalysis:");
    s
}
