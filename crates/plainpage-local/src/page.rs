//! Serializable page model.
//!
//! There is no live DOM here: a page is ingested once (from HTML or built
//! directly by tests/hosts) into a flat node list. Scoring and filtering are
//! pure functions over these summaries, and the replacement manager mutates
//! only `PageNode::text`.

use crate::select;
use plainpage_core::NodeId;
use serde::{Deserialize, Serialize};

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Measured box of a node, when the host can measure one.
///
/// HTML-only ingestion cannot; size filters treat a missing rect as passing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rect {
    pub width: f32,
    pub height: f32,
    /// Offset of the node's top edge from the top of the document.
    pub top: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub id: NodeId,
    pub tag: String,
    /// Lowercased `class` + `id` attribute text of the node itself.
    pub class_and_id: String,
    /// Lowercased tag and `.class` tokens of the node and its ancestors,
    /// used for denylist matching without a live tree.
    pub ancestry: Vec<String>,
    /// Current displayed text (whitespace-collapsed at ingestion).
    pub text: String,
    pub visible: bool,
    pub rect: Option<Rect>,
    /// Inside a `main`/`article`/`[role=main]` container.
    pub in_semantic_container: bool,
}

/// Candidate main-content container, summarized for pure scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub tag: String,
    pub class_and_id: String,
    pub hidden: bool,
    pub paragraph_count: usize,
    pub text_chars: usize,
    pub anchor_count: usize,
    pub anchor_text_chars: usize,
    pub control_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageModel {
    pub nodes: Vec<PageNode>,
    pub viewport_height: f32,
}

impl PageModel {
    pub fn node(&self, id: NodeId) -> Option<&PageNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PageNode> {
        self.nodes.get_mut(id.0)
    }

    /// Parse HTML into a page model.
    ///
    /// Finds the main content root first (scored candidates, body fallback),
    /// then collects content-bearing nodes within it. Node ids are positions
    /// in the returned list and are stable for the life of the model.
    pub fn from_html(html: &str) -> PageModel {
        let doc = html_scraper::Html::parse_document(html);

        let root = pick_content_root(&doc);
        let mut nodes: Vec<PageNode> = Vec::new();
        // Tree node ids of elements already collected; the type comes from
        // `el.id()` below.
        let mut seen = Vec::new();

        // Fixed selector order; CMS wrapper paragraphs come after the
        // generic tags so duplicates collapse onto the first match.
        let selectors = [
            "p",
            "h1",
            "h2",
            "h3",
            "h4",
            "h5",
            "h6",
            "blockquote",
            "li",
            "div.content p",
            "div.entry-content p",
            "div.post-content p",
        ];

        for sel_src in selectors {
            let Ok(sel) = html_scraper::Selector::parse(sel_src) else {
                continue;
            };
            for el in root.select(&sel) {
                if seen.contains(&el.id()) {
                    continue;
                }
                seen.push(el.id());
                let text = norm_ws(&el.text().collect::<Vec<_>>().join(" "));
                nodes.push(PageNode {
                    id: NodeId(nodes.len()),
                    tag: el.value().name().to_ascii_lowercase(),
                    class_and_id: class_and_id_lc(&el),
                    ancestry: ancestry_tokens(&el),
                    text,
                    visible: !element_hidden(&el),
                    rect: None,
                    in_semantic_container: in_semantic_container(&el),
                });
            }
        }

        PageModel {
            nodes,
            viewport_height: 900.0,
        }
    }
}

fn class_and_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn element_hidden(el: &html_scraper::ElementRef) -> bool {
    if el.value().attr("hidden").is_some() {
        return true;
    }
    let style = el.value().attr("style").unwrap_or("").to_ascii_lowercase();
    let style: String = style.split_whitespace().collect();
    style.contains("display:none")
        || style.contains("visibility:hidden")
        || style.contains("opacity:0;")
        || style.ends_with("opacity:0")
}

fn ancestry_tokens(el: &html_scraper::ElementRef) -> Vec<String> {
    let mut out = Vec::new();
    let mut push_el = |e: &html_scraper::ElementRef| {
        out.push(e.value().name().to_ascii_lowercase());
        if let Some(classes) = e.value().attr("class") {
            for c in classes.split_whitespace() {
                out.push(format!(".{}", c.to_ascii_lowercase()));
            }
        }
        if let Some(id) = e.value().attr("id") {
            out.push(format!("#{}", id.to_ascii_lowercase()));
        }
    };
    push_el(el);
    for anc in el.ancestors().filter_map(html_scraper::ElementRef::wrap) {
        push_el(&anc);
    }
    out
}

fn in_semantic_container(el: &html_scraper::ElementRef) -> bool {
    std::iter::once(*el)
        .chain(el.ancestors().filter_map(html_scraper::ElementRef::wrap))
        .any(|e| {
            let tag = e.value().name().to_ascii_lowercase();
            tag == "main"
                || tag == "article"
                || e.value().attr("role").map(|r| r.eq_ignore_ascii_case("main")) == Some(true)
        })
}

fn summarize_container(el: &html_scraper::ElementRef) -> ContainerSummary {
    fn count(el: &html_scraper::ElementRef, sel_src: &str) -> usize {
        html_scraper::Selector::parse(sel_src)
            .map(|sel| el.select(&sel).count())
            .unwrap_or(0)
    }
    let text_chars: usize = el.text().map(|t| t.chars().count()).sum();
    let (anchor_count, anchor_text_chars) = match html_scraper::Selector::parse("a") {
        Ok(sel) => {
            let mut n = 0usize;
            let mut chars = 0usize;
            for a in el.select(&sel) {
                n += 1;
                chars += a.text().map(|t| t.chars().count()).sum::<usize>();
            }
            (n, chars)
        }
        Err(_) => (0, 0),
    };
    ContainerSummary {
        tag: el.value().name().to_ascii_lowercase(),
        class_and_id: class_and_id_lc(el),
        hidden: element_hidden(el),
        paragraph_count: count(el, "p"),
        text_chars,
        anchor_count,
        anchor_text_chars,
        control_count: count(el, "input, button, select, form, textarea"),
    }
}

/// Highest-scoring visible candidate above the threshold, else `body`.
fn pick_content_root<'a>(doc: &'a html_scraper::Html) -> html_scraper::ElementRef<'a> {
    let body = html_scraper::Selector::parse("body")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element());

    let Ok(sel) = html_scraper::Selector::parse("main, article, section, div") else {
        return body;
    };

    let mut best: Option<(f32, html_scraper::ElementRef<'a>)> = None;
    for el in doc.select(&sel) {
        let summary = summarize_container(&el);
        if summary.hidden {
            continue;
        }
        let score = select::score_container(&summary);
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, el));
        }
    }

    match best {
        Some((score, el)) if score > select::ROOT_SCORE_THRESHOLD => el,
        _ => body,
    }
}
