//! Briefly - command-line summarizer.
//!
//! Usage: `briefly [FILE | - | --url URL]`. Without arguments, text is read
//! from stdin.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use briefly_engine::app::App;
use briefly_engine::infrastructure::ollama::OllamaEngine;
use briefly_engine::infrastructure::settings::AppConfig;
use briefly_engine::use_cases::SummaryOutcome;

enum Source {
    Stdin,
    File(String),
    Url(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "briefly_engine=info,briefly=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let source = parse_args(std::env::args().skip(1))?;
    let config = AppConfig::from_env()?;

    let engine = Arc::new(OllamaEngine::new(
        &config.ollama_base_url,
        &config.ollama_model,
    ));
    tracing::info!(
        base_url = %config.ollama_base_url,
        model = %engine.model(),
        "Connecting to Ollama"
    );
    if let Err(e) = engine.connect().await {
        tracing::error!(error = %e, "Ollama is not available");
    }

    let app = App::new(&config);
    app.attach_engine(engine);

    let _state_log = app.generation.on_state_change(
        |state| {
            tracing::debug!(
                ready = state.is_ready,
                generating = state.is_generating,
                generation_id = ?state.current_generation_id,
                error = ?state.error,
                "Generation state changed"
            );
        },
        true,
    );

    let work = run(&app, &source);
    tokio::pin!(work);

    let result = tokio::select! {
        result = &mut work => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping generation");
            app.generation.interrupt();
            tokio::select! {
                result = &mut work => result,
                _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("Aborted")),
            }
        }
    };

    app.shutdown();

    let outcome = result.context("Summarization failed")?;
    println!("{outcome}");
    Ok(())
}

async fn run(app: &App, source: &Source) -> anyhow::Result<SummaryOutcome> {
    let outcome = match source {
        Source::Url(url) => app.summarize_url(url).await?,
        Source::File(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {path}"))?;
            app.summarize_text(&text).await?
        }
        Source::Stdin => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            app.summarize_text(&text).await?
        }
    };
    Ok(outcome)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Source> {
    let source = match args.next().as_deref() {
        None | Some("-") => Source::Stdin,
        Some("--url") => Source::Url(args.next().context("--url requires a URL")?),
        Some("-h" | "--help") => {
            println!("Usage: briefly [FILE | - | --url URL]");
            std::process::exit(0);
        }
        Some(path) => Source::File(path.to_string()),
    };
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected argument: {extra}");
    }
    Ok(source)
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
