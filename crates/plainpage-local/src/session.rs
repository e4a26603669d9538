//! Message-driven session over one page.
//!
//! This is the external surface: four request kinds, each wrapped in an
//! envelope with a correlation id so callers can match replies to requests
//! even when they interleave. All mutable state lives in one place here
//! instead of being scattered across handlers.

use crate::engine::Engine;
use crate::orchestrate::{Notifier, Orchestrator, RunSummary};
use crate::page::PageModel;
use crate::replace::ReplaceManager;
use crate::{chunk, select};
use plainpage_core::Level;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn idle_ttl_from_env() -> Duration {
    let ms = env("PLAINPAGE_IDLE_TTL_MS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(300_000)
        .clamp(1_000, 3_600_000);
    Duration::from_millis(ms)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    StartProcessing {
        level: u8,
        /// When set, already-simplified nodes are cleared and reprocessed.
        /// Otherwise they stay as they are and only new nodes are picked up.
        #[serde(default)]
        re_run: bool,
    },
    QueryState,
    QueryContentState,
    ToggleDisplay,
}

/// A request plus the correlation id its reply must carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub request: Request,
}

/// Run-level state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateView {
    pub processing: bool,
    pub level: u8,
    pub level_name: String,
    pub chunk_count: usize,
    pub completed: usize,
    pub simplified_nodes: usize,
    pub showing_simplified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Started {
        completed: usize,
        failed: usize,
        replaced_nodes: usize,
    },
    State(StateView),
    ContentState {
        has_simplified: bool,
        showing_simplified: bool,
    },
    Toggled {
        showing_simplified: bool,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    pub response: Response,
}

pub struct Session {
    page: PageModel,
    manager: ReplaceManager,
    engine: Engine,
    orchestrator: Orchestrator,
    notifier: Notifier,
    processing: bool,
    level: Level,
    chunk_count: usize,
    completed: usize,
    last_activity: Instant,
    idle_ttl: Duration,
}

impl Session {
    pub fn new(page: PageModel, engine: Engine) -> Self {
        Self {
            page,
            manager: ReplaceManager::new(),
            engine,
            orchestrator: Orchestrator::from_env(),
            notifier: Notifier::silent(),
            processing: false,
            level: Level::default(),
            chunk_count: 0,
            completed: 0,
            last_activity: Instant::now(),
            idle_ttl: idle_ttl_from_env(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Start over a page whose simplified content is already known, so the
    /// done set is honored instead of reprocessing everything.
    pub fn with_manager(mut self, manager: ReplaceManager) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn page(&self) -> &PageModel {
        &self.page
    }

    pub fn state(&self) -> StateView {
        StateView {
            processing: self.processing,
            level: self.level.as_u8(),
            level_name: self.level.display_name().to_string(),
            chunk_count: self.chunk_count,
            completed: self.completed,
            simplified_nodes: self.manager.tracked_count(),
            showing_simplified: self.manager.is_showing_simplified(),
        }
    }

    /// Drop a stale processing flag after the idle TTL. Tracked nodes and
    /// the toggle direction survive; only run bookkeeping is reset.
    fn soft_reset_if_idle(&mut self) {
        if self.processing && self.last_activity.elapsed() > self.idle_ttl {
            tracing::warn!("stale processing flag cleared after idle timeout");
            self.processing = false;
        }
    }

    /// Handle one enveloped request; the reply carries the same id.
    pub async fn handle(&mut self, envelope: Envelope) -> Reply {
        self.soft_reset_if_idle();
        self.last_activity = Instant::now();
        let response = match envelope.request {
            Request::StartProcessing { level, re_run } => {
                self.start_processing(level, re_run).await
            }
            Request::QueryState => Response::State(self.state()),
            Request::QueryContentState => Response::ContentState {
                has_simplified: self.manager.tracked_count() > 0,
                showing_simplified: self.manager.is_showing_simplified(),
            },
            Request::ToggleDisplay => {
                if self.manager.toggle(&mut self.page) {
                    Response::Toggled {
                        showing_simplified: self.manager.is_showing_simplified(),
                    }
                } else {
                    Response::Error {
                        message: "nothing to toggle: no simplified content on this page"
                            .to_string(),
                    }
                }
            }
        };
        Reply {
            id: envelope.id,
            response,
        }
    }

    async fn start_processing(&mut self, level: u8, re_run: bool) -> Response {
        if self.processing {
            return Response::Error {
                message: "a run is already in progress".to_string(),
            };
        }
        let Some(level) = Level::from_u8(level) else {
            return Response::Error {
                message: format!("unknown simplification level {level}"),
            };
        };

        // Re-run: restore every node first so selection sees original text
        // and stale simplified text never leaks into the new run.
        if re_run && self.manager.tracked_count() > 0 {
            self.manager.clear_all(&mut self.page);
        }

        let items = select::select_content(&self.page, re_run, &self.manager.done_nodes());
        if items.is_empty() {
            return Response::Error {
                message: "no readable content found on this page".to_string(),
            };
        }
        let chunks = chunk::build_chunks(items, chunk::chunk_budget_from_env());

        self.processing = true;
        self.level = level;
        self.chunk_count = chunks.len();
        self.completed = 0;
        let summary: RunSummary = self
            .orchestrator
            .run_all(
                &self.engine,
                &mut self.page,
                &mut self.manager,
                &chunks,
                level,
                &self.notifier,
            )
            .await;
        self.processing = false;
        self.completed = summary.completed;

        Response::Started {
            completed: summary.completed,
            failed: summary.failed,
            replaced_nodes: summary.replaced_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <article>
          <p>The organization will utilize a comprehensive approach to demonstrate
             the fundamental principles involved, and the committee will subsequently
             evaluate whether the approach was adequate for the task at hand.</p>
          <p>Numerous participants indicated that the preliminary results were
             significant, and the investigators will consequently examine the
             remaining data before they establish any final conclusions here.</p>
        </article>
        <footer><p>Copyright 2024 Example Corp, all rights reserved worldwide.</p></footer>
        </body></html>
    "#;

    fn session() -> Session {
        Session::new(PageModel::from_html(PAGE), Engine::offline())
    }

    fn env_req(id: u64, request: Request) -> Envelope {
        Envelope { id, request }
    }

    #[test]
    fn start_processing_parses_without_re_run_field() {
        let e: Envelope = serde_json::from_str(
            r#"{"id": 5, "request": {"type": "start_processing", "level": 2}}"#,
        )
        .unwrap();
        assert!(matches!(
            e.request,
            Request::StartProcessing {
                level: 2,
                re_run: false,
            }
        ));
    }

    #[tokio::test]
    async fn reply_carries_the_request_id() {
        let mut s = session();
        let reply = s.handle(env_req(42, Request::QueryState)).await;
        assert_eq!(reply.id, 42);
        assert!(matches!(reply.response, Response::State(_)));
    }

    #[tokio::test]
    async fn full_run_replaces_content_and_updates_state() {
        let mut s = session();
        let reply = s
            .handle(env_req(1, Request::StartProcessing { level: 2, re_run: false }))
            .await;
        match reply.response {
            Response::Started {
                completed,
                failed,
                replaced_nodes,
            } => {
                assert!(completed >= 1);
                assert_eq!(failed, 0);
                assert!(replaced_nodes >= 2);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let state = s.state();
        assert!(!state.processing);
        assert_eq!(state.level, 2);
        assert_eq!(state.level_name, "Balanced");
        assert!(state.showing_simplified);
        assert!(state.simplified_nodes >= 2);
    }

    #[tokio::test]
    async fn toggle_before_any_run_is_an_error() {
        let mut s = session();
        let reply = s.handle(env_req(1, Request::ToggleDisplay)).await;
        assert!(matches!(reply.response, Response::Error { .. }));
    }

    #[tokio::test]
    async fn toggle_after_run_round_trips_node_text() {
        let mut s = session();
        let original = s.page().nodes[0].text.clone();
        s.handle(env_req(1, Request::StartProcessing { level: 3, re_run: false }))
            .await;
        let simplified = s.page().nodes[0].text.clone();
        assert_ne!(simplified, original);

        s.handle(env_req(2, Request::ToggleDisplay)).await;
        assert_eq!(s.page().nodes[0].text, original);
        s.handle(env_req(3, Request::ToggleDisplay)).await;
        assert_eq!(s.page().nodes[0].text, simplified);
    }

    #[tokio::test]
    async fn content_state_reports_existing_simplified_text() {
        let mut s = session();
        let reply = s.handle(env_req(1, Request::QueryContentState)).await;
        assert!(matches!(
            reply.response,
            Response::ContentState {
                has_simplified: false,
                ..
            }
        ));

        s.handle(env_req(2, Request::StartProcessing { level: 1, re_run: false }))
            .await;
        let reply = s.handle(env_req(3, Request::QueryContentState)).await;
        assert!(matches!(
            reply.response,
            Response::ContentState {
                has_simplified: true,
                showing_simplified: true,
            }
        ));
    }

    #[tokio::test]
    async fn rerun_starts_from_original_text() {
        let mut s = session();
        let original = s.page().nodes[0].text.clone();
        s.handle(env_req(1, Request::StartProcessing { level: 2, re_run: false }))
            .await;
        // Show originals, then re-run at another level. The run must clear
        // first, so selection never sees simplified text as input.
        s.handle(env_req(2, Request::ToggleDisplay)).await;
        let reply = s
            .handle(env_req(3, Request::StartProcessing { level: 1, re_run: true }))
            .await;
        assert!(matches!(reply.response, Response::Started { .. }));

        s.handle(env_req(4, Request::ToggleDisplay)).await;
        assert_eq!(s.page().nodes[0].text, original);
    }

    #[tokio::test]
    async fn prepopulated_done_set_skips_known_nodes_without_re_run() {
        use crate::replace::ElementState;
        use plainpage_core::{NodeId, Tier};
        use std::collections::HashMap;

        let page = PageModel::from_html(PAGE);
        // Both content nodes are already marked done from an earlier pass.
        let mut states = HashMap::new();
        for node in &page.nodes {
            states.insert(
                node.id,
                ElementState {
                    original: node.text.clone(),
                    simplified: node.text.clone(),
                    tier: Tier::ContextAware,
                },
            );
        }
        let mut s = Session::new(page, Engine::offline())
            .with_manager(ReplaceManager::from_states(states, true));

        let reply = s
            .handle(env_req(1, Request::StartProcessing { level: 2, re_run: false }))
            .await;
        match reply.response {
            Response::Error { message } => assert!(message.contains("no readable content")),
            other => panic!("unexpected response: {other:?}"),
        }

        // A re-run processes them again.
        let reply = s
            .handle(env_req(2, Request::StartProcessing { level: 2, re_run: true }))
            .await;
        assert!(matches!(reply.response, Response::Started { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_processing_flag_clears_after_idle_ttl() {
        use crate::replace::ElementState;
        use plainpage_core::{Result, Tier, TransformBackend, TransformRequest};
        use std::collections::HashMap;
        use std::sync::Arc;

        /// Never answers; a run against it can only be abandoned.
        struct Stall;

        #[async_trait::async_trait]
        impl TransformBackend for Stall {
            async fn transform(&self, _req: &TransformRequest) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Ok(String::new())
            }
        }

        let page = PageModel::from_html(PAGE);
        // One node already simplified, so there is tracked state that the
        // soft reset must preserve.
        let first = page.nodes[0].id;
        let mut states = HashMap::new();
        states.insert(
            first,
            ElementState {
                original: "before".to_string(),
                simplified: page.nodes[0].text.clone(),
                tier: Tier::ContextAware,
            },
        );
        let mut s = Session::new(page, Engine::new(Some(Arc::new(Stall))))
            .with_manager(ReplaceManager::from_states(states, true))
            .with_idle_ttl(Duration::from_secs(5));

        // Abandon a run mid-flight: the processing flag is left stale.
        let run = s.handle(env_req(1, Request::StartProcessing { level: 2, re_run: false }));
        assert!(tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .is_err());
        assert!(s.state().processing);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let reply = s.handle(env_req(2, Request::QueryState)).await;
        match reply.response {
            Response::State(v) => {
                assert!(!v.processing);
                // Tracked nodes survive the soft reset.
                assert_eq!(v.simplified_nodes, 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        // And so does the toggle.
        let reply = s.handle(env_req(3, Request::ToggleDisplay)).await;
        assert!(matches!(reply.response, Response::Toggled { .. }));
        assert_eq!(s.page().nodes[0].text, "before");
    }

    #[tokio::test]
    async fn state_reports_run_counters() {
        let mut s = session();
        s.handle(env_req(1, Request::StartProcessing { level: 2, re_run: false }))
            .await;
        let state = s.state();
        assert_eq!(state.chunk_count, 1);
        assert_eq!(state.completed, 1);
    }

    #[tokio::test]
    async fn unknown_level_is_rejected() {
        let mut s = session();
        let reply = s
            .handle(env_req(1, Request::StartProcessing { level: 9, re_run: false }))
            .await;
        assert!(matches!(reply.response, Response::Error { .. }));
    }

    #[tokio::test]
    async fn page_without_content_reports_no_content() {
        let mut s = Session::new(
            PageModel::from_html("<html><body><nav><p>Home About</p></nav></body></html>"),
            Engine::offline(),
        );
        let reply = s
            .handle(env_req(1, Request::StartProcessing { level: 2, re_run: false }))
            .await;
        match reply.response {
            Response::Error { message } => assert!(message.contains("no readable content")),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
