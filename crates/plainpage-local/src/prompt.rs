//! Prompt construction for the remote transform tiers.

use plainpage_core::{ChunkContext, ContentKind, Level, SECTION_SEPARATOR};

fn json_contract(expected_parts: usize) -> String {
    format!(
        r#"CRITICAL: Your entire response must be a single, valid JSON object with two keys:
1. "sections": An array of strings, one simplified version per input section. Return exactly {expected_parts} strings.
2. "summary": A very short, one-sentence summary of ALL the content you just processed.

Example response format:
{{
  "sections": ["simplified text for section 1", "simplified text for section 2"],
  "summary": "a brief one-sentence summary of all the processed text"
}}"#
    )
}

fn structural_hints(ctx: &ChunkContext) -> String {
    let mut out = String::new();
    if ctx.kinds.contains(&ContentKind::Heading) {
        out.push_str("\n- For headings, keep them short and punchy");
    }
    if ctx.has_quotes {
        out.push_str("\n- For quotes, maintain the quote-like feel but simplify");
    }
    if ctx.kinds.contains(&ContentKind::ListItem) {
        out.push_str("\n- For list items, keep them brief and clear");
    }
    if ctx.has_code {
        out.push_str("\n- Avoid changing any code-like content");
    }
    out
}

/// Tier 1: full instruction with structural hints and summary continuity.
pub fn context_aware(
    text: &str,
    expected_parts: usize,
    ctx: &ChunkContext,
    previous_summary: Option<&str>,
    level: Level,
) -> String {
    let hints = structural_hints(ctx);

    let continuity = match previous_summary {
        Some(s) if !s.trim().is_empty() => format!(
            "The following is a summary of the content that came just before this section. \
             Use it for context to ensure a smooth transition and consistent style, but DO NOT \
             mention the summary in your output.\nPREVIOUS SUMMARY: \"{s}\"\n\n"
        ),
        _ => String::new(),
    };

    let (main, style) = match level {
        Level::Light => (
            "Rewrite the following content into a slightly simpler version. Keep most of the \
             original style and complexity, but make it a bit more accessible.",
            format!(
                "- Keep it mostly the same length as the original\n\
                 - Use slightly simpler words where possible\n\
                 - Maintain the professional tone\n\
                 - Keep the main information intact without major changes{hints}"
            ),
        ),
        Level::Balanced => (
            "Rewrite the following content into a simpler, friendlier version. Write like \
             someone explaining complex stuff in everyday language, but keep it informative \
             and readable.",
            format!(
                "- Much shorter than the original\n\
                 - Use simple, everyday words\n\
                 - Keep a casual, conversational register\n\
                 - Keep the main information intact\n\
                 - Make it approachable but still informative{hints}"
            ),
        ),
        Level::Strong => (
            "Rewrite the following content into a very simple version that a child could \
             understand. Use the simplest possible words and explanations.",
            format!(
                "- Much shorter than the original\n\
                 - Use very simple, everyday words (like a children's book)\n\
                 - Explain complex ideas in the simplest way possible\n\
                 - Add casual explanations like \"this means...\" or \"basically...\"\n\
                 - Make it fun and easy to understand{hints}"
            ),
        ),
    };

    let contract = json_contract(expected_parts);
    if expected_parts == 1 {
        format!(
            "{continuity}{main}\n\nFocus on making it shorter and more accessible while \
             preserving the main ideas.\n\nContent to transform:\n{text}\n\nInstructions:\n{style}\n{contract}"
        )
    } else {
        format!(
            "{continuity}You will be given {expected_parts} content sections separated by \
             \"{SECTION_SEPARATOR}\".\nYour task is to individually transform each section into \
             a simpler version.\n\nAfter transforming ALL sections, your response must be a \
             single JSON object as described below.\n\nContent sections to process:\n{text}\n\n\
             Instructions for transforming each section:\n{style}\n\n{contract}"
        )
    }
}

/// Tier 2: minimal instruction, same JSON contract.
pub fn plain(text: &str, expected_parts: usize, level: Level) -> String {
    let instruction = match level {
        Level::Light => {
            "Make this text a bit simpler and clearer. Keep most of the original style and complexity."
        }
        Level::Balanced => {
            "Make this text much simpler and shorter. Use very easy words that anyone can understand."
        }
        Level::Strong => {
            "Make this text much simpler and shorter. Use very easy words that a child could understand."
        }
    };

    let contract = json_contract(expected_parts);
    let label = if expected_parts == 1 {
        "Text to simplify"
    } else {
        "Sections to simplify"
    };
    format!("{instruction}\n\n{label}:\n{text}\n\n{contract}")
}
