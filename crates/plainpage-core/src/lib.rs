use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not configured: {0}")]
    NotConfigured(String),
    /// Configuration-class input rejection (empty/oversized). Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Remote transform failure (network, malformed response, validation).
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("no content: {0}")]
    NoContent(String),
    #[error("node error: {0}")]
    Node(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Separator token joining per-item texts inside one remote request, and
/// splitting per-item texts out of the response.
pub const SECTION_SEPARATOR: &str = "---SECTION_BREAK---";

/// Hard ceiling on combined chunk text sent to the remote transform.
/// Exceeding it is a configuration-class error, not a tier failure.
pub const MAX_INPUT_CHARS: usize = 30_000;

/// Simplification intensity chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    /// Light touch: slightly simpler wording, original register kept.
    Light,
    /// Balanced: casual but informative.
    Balanced,
    /// Strong: child-level wording, aggressive shortening.
    Strong,
}

impl Level {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(Level::Light),
            2 => Some(Level::Balanced),
            3 => Some(Level::Strong),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Level::Light => 1,
            Level::Balanced => 2,
            Level::Strong => 3,
        }
    }

    /// User-facing display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Level::Light => "Light",
            Level::Balanced => "Balanced",
            Level::Strong => "Strong",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Balanced
    }
}

/// Semantic classification of a selected content node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Heading,
    Quote,
    ListItem,
    LongForm,
    Paragraph,
}

/// Stable identity of a page node within one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// One text-bearing node selected for processing.
///
/// The node itself lives in the page model; items carry only the id plus the
/// extracted text, so they stay serializable and cheap to move into chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub node: NodeId,
    pub text: String,
    pub tag: String,
    pub kind: ContentKind,
    pub priority: f32,
}

/// An ordered batch of items whose combined text fits the chunk budget.
/// Not mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub items: Vec<ContentItem>,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.items.iter().map(|i| i.text.chars().count()).sum()
    }

    /// Structural hints for the context-aware prompt.
    pub fn context(&self) -> ChunkContext {
        let kinds: Vec<ContentKind> = self.items.iter().map(|i| i.kind).collect();
        let has_code = self
            .items
            .iter()
            .any(|i| i.text.contains("function") || i.text.contains("class "));
        let has_quotes = kinds.contains(&ContentKind::Quote);
        let avg_len = if self.items.is_empty() {
            0
        } else {
            self.char_len() / self.items.len()
        };
        ChunkContext {
            kinds,
            has_code,
            has_quotes,
            avg_len,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkContext {
    pub kinds: Vec<ContentKind>,
    pub has_code: bool,
    pub has_quotes: bool,
    pub avg_len: usize,
}

/// Which strategy of the fallback ladder produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    ContextAware,
    Plain,
    WordSubstitution,
}

/// Simplified texts for one chunk, 1:1 with its items.
///
/// `None` is the skip sentinel: the transform produced nothing usable for
/// that item and its node is left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub texts: Vec<Option<String>>,
    pub summary: String,
    pub tier: Tier,
}

/// One request to the black-box remote text-transform service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRequest {
    pub prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub timeout_ms: u64,
}

impl TransformRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Black-box remote transform: prompt in, raw model text out.
///
/// Adapters map provider errors into `Error::Transform` (retriable via tier
/// escalation) or `Error::NotConfigured` (terminal).
#[async_trait::async_trait]
pub trait TransformBackend: Send + Sync {
    async fn transform(&self, req: &TransformRequest) -> Result<String>;
}
