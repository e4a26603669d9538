//! Sequential chunk orchestration.
//!
//! Chunks are processed strictly one at a time because each chunk's prompt
//! threads the summary produced by the previous one. A failed chunk never
//! aborts the run: its nodes keep their original text, the threaded summary
//! resets, and processing moves on.

use crate::engine::Engine;
use crate::page::PageModel;
use crate::replace::ReplaceManager;
use plainpage_core::{Chunk, Error, Level, Tier};
use std::time::Duration;
use tokio::sync::mpsc;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_ms(key: &str, default: u64, min: u64, max: u64) -> Duration {
    let ms = env(key)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max);
    Duration::from_millis(ms)
}

/// Progress events, delivered best-effort. A closed or missing receiver
/// never affects the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    RunStarted {
        total_chunks: usize,
        /// Text blocks found, summed over all chunks.
        total_items: usize,
    },
    ChunkCompleted {
        index: usize,
        total: usize,
        tier: Tier,
        replaced: usize,
    },
    ChunkFailed {
        index: usize,
        total: usize,
        error: String,
    },
    RunFinished {
        completed: usize,
        failed: usize,
        /// True when any chunk landed on a fallback tier.
        degraded: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Discards everything.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    fn send(&self, notice: Notice) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(notice);
        }
    }
}

/// Outcome of one run over all chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub replaced_nodes: usize,
}

pub struct Orchestrator {
    chunk_timeout: Duration,
    run_timeout: Duration,
    max_attempts: u32,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            chunk_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(600),
            max_attempts: 3,
        }
    }
}

impl Orchestrator {
    pub fn new(chunk_timeout: Duration, run_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            chunk_timeout,
            run_timeout,
            max_attempts: max_attempts.clamp(1, 10),
        }
    }

    pub fn from_env() -> Self {
        let max_attempts = env("PLAINPAGE_MAX_ATTEMPTS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);
        Self::new(
            env_ms("PLAINPAGE_CHUNK_TIMEOUT_MS", 60_000, 1_000, 3_600_000),
            env_ms("PLAINPAGE_RUN_TIMEOUT_MS", 600_000, 1_000, 3_600_000),
            max_attempts,
        )
    }

    /// Process every chunk in order, applying each result to the page as
    /// soon as it arrives so partial progress survives later failures.
    pub async fn run_all(
        &self,
        engine: &Engine,
        page: &mut PageModel,
        manager: &mut ReplaceManager,
        chunks: &[Chunk],
        level: Level,
        notifier: &Notifier,
    ) -> RunSummary {
        let total = chunks.len();
        notifier.send(Notice::RunStarted {
            total_chunks: total,
            total_items: chunks.iter().map(|c| c.items.len()).sum(),
        });

        let deadline = tokio::time::Instant::now() + self.run_timeout;
        let mut summary = RunSummary {
            completed: 0,
            failed: 0,
            replaced_nodes: 0,
        };
        let mut degraded = false;
        // Threaded through consecutive chunks for prompt continuity.
        let mut previous_summary: Option<String> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::warn!(index, total, "run timeout, remaining chunks marked failed");
                summary.failed += total - index;
                for i in index..total {
                    notifier.send(Notice::ChunkFailed {
                        index: i,
                        total,
                        error: "run timed out".to_string(),
                    });
                }
                break;
            }

            match self
                .process_chunk(engine, chunk, level, previous_summary.as_deref(), deadline)
                .await
            {
                Ok(result) => {
                    previous_summary = Some(result.summary.clone());
                    if result.tier != Tier::ContextAware {
                        degraded = true;
                    }
                    let replaced = manager.apply_result(page, chunk, &result);
                    summary.completed += 1;
                    summary.replaced_nodes += replaced;
                    tracing::info!(index, total, tier = ?result.tier, replaced, "chunk completed");
                    notifier.send(Notice::ChunkCompleted {
                        index,
                        total,
                        tier: result.tier,
                        replaced,
                    });
                }
                Err(e) => {
                    // Reset continuity: the next chunk must not inherit a
                    // summary from before the gap.
                    previous_summary = None;
                    summary.failed += 1;
                    tracing::warn!(index, total, error = %e, "chunk failed, continuing");
                    notifier.send(Notice::ChunkFailed {
                        index,
                        total,
                        error: e.to_string(),
                    });
                }
            }
        }

        notifier.send(Notice::RunFinished {
            completed: summary.completed,
            failed: summary.failed,
            degraded,
        });
        summary
    }

    /// One chunk: per-attempt timeout, bounded retries, linear backoff.
    /// Input rejection is terminal for the chunk and never retried. Every
    /// attempt and backoff sleep is capped by the run deadline, so a stuck
    /// chunk cannot drag the run past its ceiling.
    async fn process_chunk(
        &self,
        engine: &Engine,
        chunk: &Chunk,
        level: Level,
        previous_summary: Option<&str>,
        deadline: tokio::time::Instant,
    ) -> plainpage_core::Result<plainpage_core::ProcessingResult> {
        let mut last_err = Error::Timeout("run deadline reached".to_string());

        for attempt in 1..=self.max_attempts {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::warn!(attempt, "run deadline reached, no more attempts");
                return Err(last_err);
            }
            let attempt_timeout = self.chunk_timeout.min(remaining);

            let outcome =
                tokio::time::timeout(attempt_timeout, engine.simplify(chunk, level, previous_summary))
                    .await;
            match outcome {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e @ Error::InvalidInput(_))) => return Err(e),
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "chunk attempt failed");
                    last_err = e;
                }
                Err(_) => {
                    tracing::warn!(attempt, timeout_ms = attempt_timeout.as_millis() as u64, "chunk attempt timed out");
                    last_err = Error::Timeout(format!(
                        "chunk timed out after {} ms",
                        attempt_timeout.as_millis()
                    ));
                }
            }
            if attempt < self.max_attempts {
                let backoff = Duration::from_secs(2 * attempt as u64)
                    .min(deadline.saturating_duration_since(tokio::time::Instant::now()));
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageNode;
    use plainpage_core::{
        ContentItem, ContentKind, NodeId, Result, TransformBackend, TransformRequest,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Returns a numbered canned JSON per call and records prompts.
    struct Counting {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl TransformBackend for Counting {
        async fn transform(&self, req: &TransformRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(req.prompt.clone());
            Ok(format!(
                r#"{{"sections": ["Simple {n}."], "summary": "sum-{n}"}}"#
            ))
        }
    }

    /// Never returns; only a timeout gets past it.
    struct Stuck;

    #[async_trait::async_trait]
    impl TransformBackend for Stuck {
        async fn transform(&self, _req: &TransformRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(86_400)).await;
            Ok(String::new())
        }
    }

    fn page_and_chunks(texts: &[&str]) -> (PageModel, Vec<Chunk>) {
        let page = PageModel {
            nodes: texts
                .iter()
                .enumerate()
                .map(|(i, t)| PageNode {
                    id: NodeId(i),
                    tag: "p".to_string(),
                    class_and_id: String::new(),
                    ancestry: vec!["p".to_string()],
                    text: t.to_string(),
                    visible: true,
                    rect: None,
                    in_semantic_container: true,
                })
                .collect(),
            viewport_height: 900.0,
        };
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                items: vec![ContentItem {
                    node: NodeId(i),
                    text: t.to_string(),
                    tag: "p".to_string(),
                    kind: ContentKind::Paragraph,
                    priority: 1.0,
                }],
            })
            .collect();
        (page, chunks)
    }

    #[tokio::test]
    async fn chunks_run_in_order_with_summary_threading() {
        let backend = Counting::new();
        let engine = Engine::new(Some(backend.clone()));
        let (mut page, chunks) = page_and_chunks(&["first text", "second text"]);
        let mut mgr = ReplaceManager::new();

        let summary = Orchestrator::default()
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Balanced,
                &Notifier::silent(),
            )
            .await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.replaced_nodes, 2);
        assert_eq!(page.nodes[0].text, "Simple 0.");
        assert_eq!(page.nodes[1].text, "Simple 1.");

        let prompts = backend.prompts.lock().unwrap();
        assert!(!prompts[0].contains("PREVIOUS SUMMARY"));
        assert!(prompts[1].contains("sum-0"));
    }

    #[tokio::test]
    async fn failed_chunk_resets_summary_and_run_continues() {
        let backend = Counting::new();
        let engine = Engine::new(Some(backend.clone()));
        // The middle chunk is empty, which the engine rejects outright.
        let (mut page, chunks) = page_and_chunks(&["first text", "", "third text"]);
        let mut mgr = ReplaceManager::new();
        let (notifier, mut rx) = Notifier::channel();

        let summary = Orchestrator::default()
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Balanced,
                &notifier,
            )
            .await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(page.nodes[1].text, "");

        // Chunk 3 starts fresh: no continuity from before the gap.
        let prompts = backend.prompts.lock().unwrap();
        assert!(!prompts[1].contains("PREVIOUS SUMMARY"));

        assert_eq!(
            rx.recv().await,
            Some(Notice::RunStarted {
                total_chunks: 3,
                total_items: 3,
            })
        );
        assert!(matches!(
            rx.recv().await,
            Some(Notice::ChunkCompleted { index: 0, .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(Notice::ChunkFailed { index: 1, .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(Notice::ChunkCompleted { index: 2, .. })
        ));
        assert_eq!(
            rx.recv().await,
            Some(Notice::RunFinished {
                completed: 2,
                failed: 1,
                degraded: false,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_backend_exhausts_attempts_then_fails_the_chunk() {
        let engine = Engine::new(Some(Arc::new(Stuck)));
        let (mut page, chunks) = page_and_chunks(&["stuck text"]);
        let mut mgr = ReplaceManager::new();

        let orch = Orchestrator::new(Duration::from_secs(5), Duration::from_secs(600), 3);
        let summary = orch
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Balanced,
                &Notifier::silent(),
            )
            .await;

        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(page.nodes[0].text, "stuck text");
    }

    #[tokio::test(start_paused = true)]
    async fn run_timeout_fails_remaining_chunks() {
        let engine = Engine::new(Some(Arc::new(Stuck)));
        let (mut page, chunks) = page_and_chunks(&["one text", "two text", "three text"]);
        let mut mgr = ReplaceManager::new();
        let (notifier, mut rx) = Notifier::channel();

        // Single attempt per chunk; the run budget covers barely one chunk.
        let orch = Orchestrator::new(Duration::from_secs(50), Duration::from_secs(60), 1);
        let summary = orch
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Balanced,
                &notifier,
            )
            .await;

        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 3);

        let mut failures = 0;
        while let Ok(n) = rx.try_recv() {
            if matches!(n, Notice::ChunkFailed { .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_deadline_caps_retries_within_budget() {
        let engine = Engine::new(Some(Arc::new(Stuck)));
        let (mut page, chunks) = page_and_chunks(&["stuck text"]);
        let mut mgr = ReplaceManager::new();

        // The chunk timeout alone would allow 50 s per attempt; the run
        // budget must cap attempts and backoff so retries cannot push the
        // run past its ceiling.
        let orch = Orchestrator::new(Duration::from_secs(50), Duration::from_secs(10), 3);
        let started = tokio::time::Instant::now();
        let summary = orch
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Balanced,
                &Notifier::silent(),
            )
            .await;

        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 1);
        assert!(
            started.elapsed() <= Duration::from_secs(11),
            "run overshot its deadline: took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn dropped_receiver_never_affects_the_run() {
        let backend = Counting::new();
        let engine = Engine::new(Some(backend));
        let (mut page, chunks) = page_and_chunks(&["some text"]);
        let mut mgr = ReplaceManager::new();
        let (notifier, rx) = Notifier::channel();
        drop(rx);

        let summary = Orchestrator::default()
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Balanced,
                &notifier,
            )
            .await;
        assert_eq!(summary.completed, 1);
    }

    #[tokio::test]
    async fn offline_engine_marks_run_degraded() {
        let engine = Engine::offline();
        let (mut page, chunks) = page_and_chunks(&["We will utilize this."]);
        let mut mgr = ReplaceManager::new();
        let (notifier, mut rx) = Notifier::channel();

        Orchestrator::default()
            .run_all(
                &engine,
                &mut page,
                &mut mgr,
                &chunks,
                Level::Light,
                &notifier,
            )
            .await;

        let mut finished = None;
        while let Ok(n) = rx.try_recv() {
            if let Notice::RunFinished { degraded, .. } = n {
                finished = Some(degraded);
            }
        }
        assert_eq!(finished, Some(true));
    }
}
