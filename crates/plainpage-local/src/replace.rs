//! Non-destructive text replacement with toggle support.
//!
//! The side-table here (node id → snapshots), not the page nodes, is the
//! source of truth for original/simplified text. Replacement writes only
//! `PageNode::text`, which is the layout-preservation guarantee in this
//! model: node structure and geometry are never touched.

use crate::page::PageModel;
use plainpage_core::{Chunk, NodeId, ProcessingResult, Tier};
use std::collections::{HashMap, HashSet};

/// Snapshots for one replaced node. Both are always present once the node
/// is tracked, so toggling is lossless.
#[derive(Debug, Clone)]
pub struct ElementState {
    pub original: String,
    pub simplified: String,
    /// Which tier produced the text; the display cue varies by tier.
    pub tier: Tier,
}

#[derive(Debug, Default)]
pub struct ReplaceManager {
    states: HashMap<NodeId, ElementState>,
    showing_simplified: bool,
}

impl ReplaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a manager from previously recorded state, e.g. when a session
    /// starts over a page that already carries simplified content.
    pub fn from_states(states: HashMap<NodeId, ElementState>, showing_simplified: bool) -> Self {
        Self {
            states,
            showing_simplified,
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }

    pub fn is_showing_simplified(&self) -> bool {
        self.showing_simplified
    }

    /// Node ids already replaced ("done"), fed back into content selection.
    pub fn done_nodes(&self) -> HashSet<NodeId> {
        self.states.keys().copied().collect()
    }

    pub fn state(&self, id: NodeId) -> Option<&ElementState> {
        self.states.get(&id)
    }

    /// Apply one chunk's result to the page. Returns the number of nodes
    /// replaced. Sentinel entries are skipped; a per-node failure rolls that
    /// node back and never aborts its siblings.
    pub fn apply_result(
        &mut self,
        page: &mut PageModel,
        chunk: &Chunk,
        result: &ProcessingResult,
    ) -> usize {
        let mut replaced = 0usize;
        for (item, text) in chunk.items.iter().zip(result.texts.iter()) {
            let Some(text) = text else {
                tracing::debug!(node = item.node.0, "skip sentinel, node left untouched");
                continue;
            };
            match page.node_mut(item.node) {
                Some(node) => {
                    let original = node.text.clone();
                    node.text = text.clone();
                    self.states.insert(
                        item.node,
                        ElementState {
                            original,
                            simplified: text.clone(),
                            tier: result.tier,
                        },
                    );
                    replaced += 1;
                }
                None => {
                    // Rollback: nothing was written, just make sure no stale
                    // state survives for this id.
                    self.states.remove(&item.node);
                    tracing::warn!(node = item.node.0, "replacement target missing, node skipped");
                }
            }
        }
        if replaced > 0 {
            self.showing_simplified = true;
        }
        replaced
    }

    /// Swap every tracked node between original and simplified text.
    /// Reports failure when nothing is tracked.
    pub fn toggle(&mut self, page: &mut PageModel) -> bool {
        if self.states.is_empty() {
            return false;
        }
        self.showing_simplified = !self.showing_simplified;
        for (id, state) in &self.states {
            if let Some(node) = page.node_mut(*id) {
                node.text = if self.showing_simplified {
                    state.simplified.clone()
                } else {
                    state.original.clone()
                };
            }
        }
        true
    }

    /// Restore every tracked node's original text and forget all state.
    /// Used before a re-run so stale simplified text never survives.
    pub fn clear_all(&mut self, page: &mut PageModel) {
        for (id, state) in self.states.drain() {
            if let Some(node) = page.node_mut(id) {
                node.text = state.original.clone();
            }
        }
        self.showing_simplified = false;
    }
}
