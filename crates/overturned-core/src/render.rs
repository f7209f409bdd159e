use std::{fmt::Write as _, sync::OnceLock};

use regex::Regex;

use crate::types::CitationSource;

/// A piece of reply text after splitting on links and citation markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Inline markdown link `[text](url)`.
    Link { text: &'a str, url: &'a str },
    /// Numeric marker `[n]` that resolved against the source list.
    Citation { number: usize, source: &'a CitationSource },
}

#[allow(clippy::expect_used)]
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[([^\[\]]*)\]\(((?:[^()\s]|\([^()\s]*\))*)\)|\[(\d+)\]")
            .expect("static citation pattern")
    })
}

fn resolve<'a>(
    marker: &str,
    sources: Option<&'a [CitationSource]>,
) -> Option<(usize, &'a CitationSource)> {
    if marker.is_empty() || !marker.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = marker.parse::<usize>().ok().filter(|n| *n >= 1)?;
    sources?.get(n - 1).map(|src| (n, src))
}

/// Split `content` into text, links and resolved citations.
///
/// `[n]` resolves to `sources[n - 1]`; an out-of-range, zero or
/// unparseable index, or no source list at all, leaves the marker as text.
pub fn segments<'a>(content: &'a str, sources: Option<&'a [CitationSource]>) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut last = 0;

    for caps in token_pattern().captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            out.push(Segment::Text(&content[last..whole.start()]));
        }
        last = whole.end();

        if let Some(number) = caps.get(3) {
            match resolve(number.as_str(), sources) {
                Some((number, source)) => out.push(Segment::Citation { number, source }),
                None => out.push(Segment::Text(whole.as_str())),
            }
            continue;
        }

        let (Some(text), Some(url)) = (caps.get(1), caps.get(2)) else {
            out.push(Segment::Text(whole.as_str()));
            continue;
        };
        // `[1](2019)` is a citation followed by prose, not a link.
        if let Some((number, source)) = resolve(text.as_str(), sources) {
            out.push(Segment::Citation { number, source });
            out.push(Segment::Text(&content[text.end() + 1..whole.end()]));
            continue;
        }
        out.push(Segment::Link {
            text: text.as_str(),
            url: url.as_str(),
        });
    }

    if last < content.len() {
        out.push(Segment::Text(&content[last..]));
    }
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_safe_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
}

/// Render reply text as an HTML fragment. Text is escaped; links open in a
/// new tab. Links with a non-web scheme are shown as the literal markdown.
pub fn render_html(content: &str, sources: Option<&[CitationSource]>) -> String {
    let mut html = String::with_capacity(content.len());
    for segment in segments(content, sources) {
        match segment {
            Segment::Text(t) => html.push_str(&escape_html(t)),
            Segment::Link { text, url } if is_safe_url(url) => {
                let _ = write!(
                    html,
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                    escape_html(url),
                    escape_html(text)
                );
            },
            Segment::Link { text, url } => html.push_str(&escape_html(&format!("[{text}]({url})"))),
            Segment::Citation { number, source } => {
                let _ = write!(
                    html,
                    r#"<a class="citation" href="{}" title="{}" target="_blank" rel="noopener noreferrer">[{}]</a>"#,
                    escape_html(&source.uri),
                    escape_html(&source.title),
                    number
                );
            },
        }
    }
    html
}

/// Numbered source list shown under a grounded reply.
pub fn render_sources_html(sources: &[CitationSource]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut html = String::from(r#"<ol class="sources">"#);
    for source in sources {
        let _ = write!(
            html,
            r#"<li><a href="{}" target="_blank" rel="noopener noreferrer">{}</a></li>"#,
            escape_html(&source.uri),
            escape_html(&source.title)
        );
    }
    html.push_str("</ol>");
    html
}
