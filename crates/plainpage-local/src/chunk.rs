//! Greedy chunk packing under a character budget.

use plainpage_core::{Chunk, ContentItem};

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Combined character budget per chunk (one remote request).
pub fn chunk_budget_from_env() -> usize {
    env("PLAINPAGE_CHUNK_BUDGET")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(12_000)
        .clamp(200, 100_000)
}

/// Pack items into ordered chunks.
///
/// Items are never split: an item that alone exceeds the budget still gets
/// its own chunk. Input order is preserved globally.
pub fn build_chunks(items: Vec<ContentItem>, budget: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<ContentItem> = Vec::new();
    let mut current_len = 0usize;

    for item in items {
        let len = item.text.chars().count();
        if current_len + len > budget && !current.is_empty() {
            chunks.push(Chunk {
                items: std::mem::take(&mut current),
            });
            current_len = 0;
        }
        current_len += len;
        current.push(item);
    }

    if !current.is_empty() {
        chunks.push(Chunk { items: current });
    }

    chunks
}
