use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use plainpage_core::Error;
use plainpage_local::engine::Engine;
use plainpage_local::gemini::{self, GeminiClient};
use plainpage_local::orchestrate::{Notice, Notifier};
use plainpage_local::page::PageModel;
use plainpage_local::session::{Envelope, Request, Response, Session};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "plainpage")]
#[command(about = "Simplify the readable content of a web page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract readable content from a page and rewrite it in simpler language.
    Simplify(SimplifyCmd),
    /// Diagnose configuration issues (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct SimplifyCmd {
    /// Page URL to fetch. Mutually exclusive with --file.
    #[arg(long)]
    url: Option<String>,
    /// Local HTML file to read. Mutually exclusive with --url.
    #[arg(long)]
    file: Option<std::path::PathBuf>,
    /// Simplification level: 1 (light), 2 (balanced), 3 (strong).
    #[arg(long, env = "PLAINPAGE_LEVEL", default_value_t = 2)]
    level: u8,
    /// Skip the remote transform and use offline word substitution only.
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Emit the full result as JSON instead of plain text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("plainpage/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")
}

async fn load_html(cmd: &SimplifyCmd, client: &reqwest::Client) -> Result<String> {
    match (&cmd.url, &cmd.file) {
        (Some(_), Some(_)) => bail!("pass either --url or --file, not both"),
        (None, None) => bail!("one of --url or --file is required"),
        (None, Some(path)) => {
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
        }
        (Some(url), None) => {
            let resp = client
                .get(url)
                .send()
                .await
                .with_context(|| format!("fetch {url}"))?;
            let status = resp.status();
            if !status.is_success() {
                bail!("fetch {url}: HTTP {status}");
            }
            resp.text().await.context("read response body")
        }
    }
}

fn build_engine(offline: bool, client: &reqwest::Client) -> Result<Engine> {
    if offline {
        return Ok(Engine::offline());
    }
    match GeminiClient::from_env(client.clone()) {
        Ok(gemini) => {
            tracing::info!(model = gemini.model(), "using remote transform");
            Ok(Engine::new(Some(Arc::new(gemini))))
        }
        Err(Error::NotConfigured(msg)) => {
            bail!("{msg}; set an API key or pass --offline")
        }
        Err(e) => Err(e.into()),
    }
}

async fn simplify(cmd: SimplifyCmd) -> Result<()> {
    let client = http_client()?;
    let html = load_html(&cmd, &client).await?;
    let engine = build_engine(cmd.offline, &client)?;

    let (notifier, mut rx) = Notifier::channel();
    let progress = tokio::spawn(async move {
        while let Some(notice) = rx.recv().await {
            match notice {
                Notice::RunStarted {
                    total_chunks,
                    total_items,
                } => {
                    tracing::info!(total_chunks, total_items, "found text blocks, run started");
                }
                Notice::ChunkCompleted {
                    index,
                    total,
                    tier,
                    replaced,
                } => {
                    tracing::info!(index, total, ?tier, replaced, "chunk completed");
                }
                Notice::ChunkFailed {
                    index,
                    total,
                    error,
                } => {
                    tracing::warn!(index, total, error, "chunk failed");
                }
                Notice::RunFinished {
                    completed,
                    failed,
                    degraded,
                } => {
                    tracing::info!(completed, failed, degraded, "run finished");
                }
            }
        }
    });

    let mut session =
        Session::new(PageModel::from_html(&html), engine).with_notifier(notifier);
    let reply = session
        .handle(Envelope {
            id: 1,
            request: Request::StartProcessing { level: cmd.level, re_run: false },
        })
        .await;

    let state = session.state();
    let texts: Vec<String> = session
        .page()
        .nodes
        .iter()
        .filter(|n| !n.text.is_empty())
        .map(|n| n.text.clone())
        .collect();
    // Closes the notice channel so the progress task drains and exits.
    drop(session);
    let _ = progress.await;

    match reply.response {
        Response::Started {
            completed,
            failed,
            replaced_nodes,
        } => {
            if cmd.json {
                let out = serde_json::json!({
                    "level": state.level,
                    "level_name": state.level_name,
                    "chunks_completed": completed,
                    "chunks_failed": failed,
                    "replaced_nodes": replaced_nodes,
                    "texts": texts,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for text in &texts {
                    println!("{text}");
                    println!();
                }
            }
            if failed > 0 {
                tracing::warn!(failed, "some chunks kept their original text");
            }
            Ok(())
        }
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected session response: {other:?}"),
    }
}

fn doctor() -> Result<()> {
    fn has_env(k: &str) -> bool {
        std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
    }

    // Env presence only; never print values.
    let out = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "gemini_api_key_configured": gemini::gemini_api_key_from_env().is_some(),
        "gemini_model": gemini::gemini_model_from_env(),
        "gemini_base_url": gemini::gemini_base_url_from_env(),
        "overrides": {
            "chunk_budget": has_env("PLAINPAGE_CHUNK_BUDGET"),
            "chunk_timeout_ms": has_env("PLAINPAGE_CHUNK_TIMEOUT_MS"),
            "run_timeout_ms": has_env("PLAINPAGE_RUN_TIMEOUT_MS"),
            "max_attempts": has_env("PLAINPAGE_MAX_ATTEMPTS"),
            "transform_timeout_ms": has_env("PLAINPAGE_TRANSFORM_TIMEOUT_MS"),
        },
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simplify(cmd) => simplify(cmd).await,
        Commands::Doctor => doctor(),
        Commands::Version => {
            println!("plainpage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
