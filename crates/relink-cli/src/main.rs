//! relink - update stale package links across a universe's places
//!
//! Stages a reviewable diff for every place with outdated package
//! references, then publishes only after the operator confirms. Exit status
//! is nonzero when any place ends in failure so partial runs are visible to
//! scripts.

use anyhow::{bail, Context};
use clap::Parser;
use relink_client::{AuthContext, ClientConfig, HttpPlatformClient};
use relink_core::api::ConfirmPublish;
use relink_core::types::{PlaceDiff, UniverseId};
use relink_core::{Pipeline, PipelineConfig};
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "relink", version, about)]
struct Args {
    /// Universe to update (falls back to RELINK_UNIVERSE_ID)
    #[arg(long)]
    universe: Option<u64>,

    /// Platform domain, e.g. the hosting service's apex domain
    /// (falls back to RELINK_DOMAIN)
    #[arg(long)]
    domain: Option<String>,

    /// Maximum places processed concurrently
    #[arg(long, default_value_t = 3)]
    workers: usize,

    /// Root directory for staged pre/post images
    #[arg(long, default_value = "staged")]
    staging_dir: PathBuf,

    /// Stage and report only; never prompt, never publish
    #[arg(long, conflicts_with = "yes")]
    dry_run: bool,

    /// Publish without the interactive prompt
    #[arg(long)]
    yes: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20)]
    request_timeout: u64,

    /// Transient-retry bound for idempotent requests
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Print the report as JSON instead of the human summary
    #[arg(long)]
    json: bool,
}

/// How the publish gate answers
enum Gate {
    /// Always decline; the run stops at staging
    DryRun,
    /// Approve without prompting
    AutoYes,
    /// Ask the operator over the terminal
    Prompt(Mutex<DefaultEditor>),
}

#[async_trait::async_trait]
impl ConfirmPublish for Gate {
    async fn confirm(&self, diffs: &[PlaceDiff]) -> bool {
        println!("{}", render_plan(diffs));
        match self {
            Gate::DryRun => {
                println!("dry run: leaving all diffs staged");
                false
            }
            Gate::AutoYes => true,
            Gate::Prompt(editor) => {
                let answer = editor
                    .lock()
                    .ok()
                    .and_then(|mut editor| {
                        editor.readline(":: Publish all staged places now? (yes/no)\n>> ").ok()
                    })
                    .unwrap_or_default();
                answer.trim().eq_ignore_ascii_case("yes")
            }
        }
    }
}

fn render_plan(diffs: &[PlaceDiff]) -> String {
    let mut out = String::from("staged updates:\n");
    for diff in diffs.iter().filter(|diff| !diff.is_empty()) {
        out.push_str(&format!(
            "  place {} {} ({} links)\n",
            diff.place,
            diff.name,
            diff.change_count()
        ));
        for change in &diff.changes {
            out.push_str(&format!("    {change}\n"));
        }
        if let Some(artifacts) = &diff.artifacts {
            out.push_str(&format!(
                "    pre:  {}\n    post: {}\n",
                artifacts.pre_path.display(),
                artifacts.post_path.display()
            ));
        }
    }
    out
}

fn env_or_prompt(var: &str, prompt: &str) -> anyhow::Result<String> {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            return Ok(value);
        }
    }
    let mut editor = DefaultEditor::new()?;
    Ok(editor.readline(prompt)?)
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let domain = match args.domain.or_else(|| std::env::var("RELINK_DOMAIN").ok()) {
        Some(domain) if !domain.trim().is_empty() => domain.trim().to_string(),
        _ => bail!("no platform domain; pass --domain or set RELINK_DOMAIN"),
    };

    let universe = match args.universe {
        Some(id) => UniverseId(id),
        None => env_or_prompt("RELINK_UNIVERSE_ID", ":: Universe id\n>> ")?
            .parse()
            .context("universe id is not a number")?,
    };

    let api_key = env_or_prompt("RELINK_API_KEY", ":: API key\n>> ")?;
    let mut auth = AuthContext::new(api_key.trim());
    if let Ok(cookie) = std::env::var("RELINK_SESSION") {
        if !cookie.trim().is_empty() {
            auth = auth.with_session_cookie(cookie.trim());
        }
    }

    let client_config = ClientConfig::for_domain(&domain)?
        .with_request_timeout_secs(args.request_timeout)
        .with_max_retries(args.max_retries);
    let client = Arc::new(HttpPlatformClient::new(client_config, &auth)?);

    let pipeline = Pipeline::new(
        client.clone(),
        client,
        PipelineConfig::new()
            .with_workers(args.workers)
            .with_staging_root(args.staging_dir),
    );

    // operator abort: stop dispatching publishes, let in-flight ones finish
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, no further publishes will be dispatched");
            cancel.cancel();
        }
    });

    let gate = if args.dry_run {
        Gate::DryRun
    } else if args.yes {
        Gate::AutoYes
    } else {
        Gate::Prompt(Mutex::new(DefaultEditor::new()?))
    };

    let report = pipeline.run(universe, &gate).await?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_summary());
    }

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
