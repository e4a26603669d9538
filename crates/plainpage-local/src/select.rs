//! Content selection: score candidate containers, then filter, classify and
//! prioritize text-bearing nodes within the chosen root.
//!
//! Everything here is a pure function over the serializable page model, so
//! the heuristics are unit-testable without a live browser. The heuristics
//! are inherently fuzzy; thresholds follow the shipped behavior rather than
//! any principled model.

use crate::page::{ContainerSummary, PageModel, PageNode};
use plainpage_core::{ContentItem, ContentKind, NodeId};
use std::collections::HashSet;

/// A container must clear this to become the sole search root; otherwise the
/// whole body is scanned. Coarse fallback on sparse pages, by design.
pub const ROOT_SCORE_THRESHOLD: f32 = 20.0;

/// Minimum cleaned text length for a quality item.
pub const MIN_TEXT_CHARS: usize = 40;

const LONG_FORM_CHARS: usize = 500;

const POSITIVE_SIGNALS: [&str; 6] = ["article", "content", "post", "body", "story", "main"];

const NEGATIVE_SIGNALS: [&str; 12] = [
    "comment", "ad", "promo", "disqus", "sidebar", "footer", "nav", "menu", "related", "share",
    "social", "popup",
];

/// Score one candidate main-content container.
///
/// A negative class/id signal exits early with the penalty applied, so nav
/// and comment widgets cannot buy their way back with paragraph counts.
pub fn score_container(c: &ContainerSummary) -> f32 {
    let mut score = 0.0f32;

    if c.tag == "article" {
        score += 50.0;
    } else if c.tag == "main" {
        score += 40.0;
    }

    if POSITIVE_SIGNALS.iter().any(|s| c.class_and_id.contains(s)) {
        score += 25.0;
    }
    if NEGATIVE_SIGNALS.iter().any(|s| c.class_and_id.contains(s)) {
        score -= 50.0;
    }
    if score < 0.0 {
        return score;
    }

    score += c.paragraph_count as f32 * 10.0;

    if c.text_chars > 200 && c.anchor_count > 2 {
        let link_density = c.anchor_text_chars as f32 / c.text_chars as f32;
        if link_density > 0.3 {
            score -= link_density * 50.0;
        }
    }

    score -= c.control_count as f32 * 3.0;

    score
}

// UI/nav/ad/meta selectors; a node is rejected when it or any ancestor
// matches one of these tokens.
const DENYLIST: [&str; 30] = [
    "nav",
    "header",
    "footer",
    "aside",
    "menu",
    ".nav",
    ".navigation",
    ".menu",
    ".sidebar",
    ".header",
    ".footer",
    ".breadcrumb",
    ".pagination",
    ".social",
    ".share",
    ".comments",
    ".advertisement",
    ".ad",
    ".promo",
    ".banner",
    "button",
    "input",
    "select",
    "textarea",
    "form",
    ".btn",
    ".meta",
    ".byline",
    ".related",
    ".recommended",
];

fn in_denylist(node: &PageNode) -> bool {
    node.ancestry
        .iter()
        .any(|tok| DENYLIST.contains(&tok.as_str()))
}

fn too_small(node: &PageNode) -> bool {
    match node.rect {
        Some(r) => r.width < 50.0 || r.height < 20.0,
        None => false,
    }
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_word_lc(s: &str) -> String {
    s.split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

const LEADING_UI_WORDS: [&str; 24] = [
    "click",
    "tap",
    "press",
    "select",
    "choose",
    "toggle",
    "menu",
    "navigation",
    "nav",
    "home",
    "back",
    "next",
    "previous",
    "share",
    "like",
    "comment",
    "subscribe",
    "follow",
    "login",
    "signup",
    "edit",
    "view",
    "print",
    "save",
];

const COUNT_WORDS: [&str; 8] = [
    "comment", "comments", "like", "likes", "share", "shares", "view", "views",
];

fn looks_like_date_prefix(s: &str) -> bool {
    // YYYY-MM-DD or YYYY/MM/DD at the start.
    let b: Vec<char> = s.chars().take(10).collect();
    if b.len() < 8 {
        return false;
    }
    if !b[..4].iter().all(|c| c.is_ascii_digit()) {
        return false;
    }
    matches!(b[4], '-' | '/') && b[5].is_ascii_digit()
}

fn looks_like_time_prefix(s: &str) -> bool {
    let lc = s.to_ascii_lowercase();
    let Some(colon) = lc.find(':') else {
        return false;
    };
    if colon == 0 || !lc[..colon].chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let rest = &lc[colon + 1..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    let tail = rest[digits.len()..].trim_start();
    tail.starts_with("am") || tail.starts_with("pm")
}

/// True for strings that are UI boilerplate rather than content: navigation
/// words, share/like prompts, pagination counts, bare dates/times,
/// punctuation-only strings, loading/error placeholders.
fn is_ui_boilerplate(text: &str) -> bool {
    let lc = text.to_ascii_lowercase();
    let words: Vec<&str> = lc.split_whitespace().collect();
    if words.is_empty() {
        return true;
    }

    if words.len() >= 2 && LEADING_UI_WORDS.contains(&words[0]) {
        return true;
    }

    let joined = words.join(" ");
    for exact in ["continue reading", "read more", "load more", "see more"] {
        if joined == exact {
            return true;
        }
    }

    if words.len() == 2
        && words[0].chars().all(|c| c.is_ascii_digit())
        && COUNT_WORDS.contains(&words[1])
    {
        return true;
    }

    for prefix in [
        "advertisement",
        "sponsored",
        "promoted",
        "copyright",
        "\u{a9}",
        "(c)",
        "terms",
        "privacy",
        "policy",
        "disclaimer",
        "loading",
        "please wait",
        "error",
    ] {
        if lc.starts_with(prefix) {
            return true;
        }
    }

    if looks_like_date_prefix(&lc) || looks_like_time_prefix(&lc) {
        return true;
    }

    // Only digits, whitespace and number punctuation.
    if text
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || "-+().".contains(c))
    {
        return true;
    }

    // Only symbols.
    if text.chars().count() >= 3 && !text.chars().any(|c| c.is_alphanumeric()) {
        return true;
    }

    false
}

/// Collapse whitespace, reject UI boilerplate (as empty), and strip symbol
/// clutter outside word and sentence punctuation.
pub fn clean_text(raw: &str) -> String {
    let text = norm_ws(raw);
    if text.is_empty() || is_ui_boilerplate(&text) {
        return String::new();
    }

    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || ".!?,;:-'\"()".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    norm_ws(&kept)
}

const FUNCTION_WORDS: [&str; 31] = [
    "the", "and", "or", "but", "if", "when", "where", "how", "why", "what", "who", "is", "are",
    "was", "were", "have", "has", "had", "will", "would", "could", "should", "this", "that",
    "these", "those", "some", "any", "all", "most", "many",
];

const SPEECH_VERBS: [&str; 7] = [
    "said",
    "says",
    "according",
    "reported",
    "announced",
    "explained",
    "described",
];

fn sentence_segments(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.trim().chars().count() > 5)
        .count()
}

/// Quality filter: is this cleaned text worth sending to the transform?
pub fn is_quality_content(text: &str, tag: &str) -> bool {
    let len = text.chars().count();
    if len < MIN_TEXT_CHARS {
        return false;
    }

    let alpha = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if (alpha as f32) / (len as f32) < 0.5 {
        return false;
    }

    let caps = text.chars().filter(|c| c.is_ascii_uppercase()).count();
    if (caps as f32) / (len as f32) > 0.6 {
        return false;
    }

    if sentence_segments(text) == 0 {
        return false;
    }

    let lc = text.to_ascii_lowercase();
    let words: Vec<&str> = lc.split_whitespace().collect();
    if len < 150 && !words.iter().any(|w| FUNCTION_WORDS.contains(w)) {
        return false;
    }

    // Short spans are usually UI; keep only reported speech.
    if tag == "span" && len < 100 {
        return words.iter().any(|w| SPEECH_VERBS.contains(w));
    }

    true
}

pub fn classify(tag: &str, text: &str) -> ContentKind {
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ContentKind::Heading,
        "blockquote" => ContentKind::Quote,
        "li" => ContentKind::ListItem,
        _ if text.chars().count() > LONG_FORM_CHARS => ContentKind::LongForm,
        _ => ContentKind::Paragraph,
    }
}

/// Processing-order priority. Higher processes earlier.
pub fn priority(node: &PageNode, text: &str, viewport_height: f32) -> f32 {
    let mut p = 1.0f32;

    if node.in_semantic_container {
        p += 2.0;
    }

    let len = text.chars().count();
    if len > 100 && len < 800 {
        p += 1.0;
    }

    if matches!(node.tag.as_str(), "h1" | "h2" | "h3") {
        p += 0.5;
    }

    if let Some(r) = node.rect {
        if r.top > viewport_height * 3.0 {
            p -= 0.5;
        }
    }

    p
}

/// Select quality content items from the page, sorted by priority descending.
///
/// Selection order feeds chunk packing directly: coherence-by-priority is
/// traded for strict document order.
pub fn select_content(
    page: &PageModel,
    allow_reprocessing: bool,
    done: &HashSet<NodeId>,
) -> Vec<ContentItem> {
    let mut items: Vec<ContentItem> = Vec::new();

    for node in &page.nodes {
        if !allow_reprocessing && done.contains(&node.id) {
            continue;
        }
        if in_denylist(node) || !node.visible || too_small(node) {
            continue;
        }

        let text = clean_text(&node.text);
        if text.is_empty() {
            continue;
        }
        if !is_quality_content(&text, &node.tag) {
            continue;
        }

        let kind = classify(&node.tag, &text);
        let priority = priority(node, &text, page.viewport_height);
        items.push(ContentItem {
            node: node.id,
            text,
            tag: node.tag.clone(),
            kind,
            priority,
        });
    }

    // Stable sort keeps document order within equal priorities.
    items.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    items
}
