//! Command-line client for streaming debate sessions.
//!
//! `ask` opens a session, streams phase and progress telemetry to stderr
//! while the backend debates, and prints the verified answer on stdout.
//! `feedback` posts a thumbs up/down for an earlier answer.
//!
//! # Usage
//!
//! ```bash
//! # Stream a question through the debate backend
//! debate-cli ask "why is the sky blue?"
//!
//! # Reuse a session and shorten the wait
//! debate-cli ask --session support-42 --timeout-secs 30 "try again"
//!
//! # Rate an answer
//! DEBATE_FEEDBACK_URL=http://localhost:8080/feedback \
//!   debate-cli feedback <request-id> <session-id> up --model OPUS
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use synthesis::{
    new_request_id, Envelope, EventBus, FeedbackDirection, FeedbackRecord, FeedbackRecorder,
    SessionController, SynthesisConfig,
};
use tokio::sync::mpsc;
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a question and stream the debate to completion
    Ask {
        /// The question to debate
        query: String,

        /// Session identifier (a fresh one is generated when omitted)
        #[arg(long)]
        session: Option<String>,

        /// Give up when no final answer arrives in time
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },

    /// Record a thumbs up/down for an earlier answer
    Feedback {
        /// Request id of the answer being rated
        message_id: String,

        /// Session the answer belongs to
        session_id: String,

        /// "up" or "down"
        direction: String,

        /// Tier label of the model that produced the answer
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = SynthesisConfig::from_env();

    match args.command {
        Command::Ask {
            query,
            session,
            timeout_secs,
        } => ask(&config, &query, session, Duration::from_secs(timeout_secs)).await,
        Command::Feedback {
            message_id,
            session_id,
            direction,
            model,
        } => feedback(&config, message_id, session_id, &direction, model).await,
    }
}

async fn ask(
    config: &SynthesisConfig,
    query: &str,
    session: Option<String>,
    timeout: Duration,
) -> Result<()> {
    let session_id = session.unwrap_or_else(|| format!("cli-{}", new_request_id()));
    info!(backend = %config.backend_addr, session_id = %session_id, "Opening debate session");

    let controller = SessionController::new(
        session_id,
        Arc::new(config.transport()),
        EventBus::new().shared(),
    );

    let (final_tx, mut final_rx) = mpsc::unbounded_channel();
    controller.subscribe(move |envelope| match envelope {
        Envelope::State { phase, tier, .. } => match tier {
            Some(tier) => eprintln!("[{phase}] tier {tier}"),
            None => eprintln!("[{phase}]"),
        },
        Envelope::Progress {
            confidence_estimate,
            partial_output,
            ..
        } => {
            eprintln!(
                "  ~{:.0}% confident, {} chars so far",
                *confidence_estimate * 100.0,
                partial_output.len()
            );
        }
        Envelope::Final { .. } => {
            let _ = final_tx.send(());
        }
    });

    let request_id = controller.send(query).await?;

    tokio::select! {
        received = final_rx.recv() => {
            if received.is_none() {
                controller.close().await;
                bail!("event stream ended unexpectedly");
            }
        }
        _ = tokio::time::sleep(timeout) => {
            let cancelled = controller.cancel().await;
            controller.close().await;
            match cancelled {
                Some(id) => bail!(
                    "no final answer within {}s, cancelled request {id}",
                    timeout.as_secs()
                ),
                None => bail!("no final answer within {}s", timeout.as_secs()),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            let cancelled = controller.cancel().await;
            controller.close().await;
            match cancelled {
                Some(id) => bail!("cancelled request {id}"),
                None => bail!("cancelled"),
            }
        }
    }

    let answers = controller.answers().await;
    let session_state = controller.session().await;
    controller.close().await;

    let answer = match answers.final_answer {
        Some(answer) => answer,
        None => bail!("stream ended without a final answer"),
    };

    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            match &source.title {
                Some(title) => println!("  - {title}: {}", source.url),
                None => println!("  - {}", source.url),
            }
        }
    }
    eprintln!();
    eprintln!("{}", session_state.status_line());
    eprintln!("request id: {request_id} (use with `debate-cli feedback`)");
    Ok(())
}

async fn feedback(
    config: &SynthesisConfig,
    message_id: String,
    session_id: String,
    direction: &str,
    model: Option<String>,
) -> Result<()> {
    let direction = match direction {
        "up" => FeedbackDirection::Up,
        "down" => FeedbackDirection::Down,
        other => bail!("direction must be \"up\" or \"down\", got {other:?}"),
    };
    let url = config
        .feedback_url
        .clone()
        .context("DEBATE_FEEDBACK_URL is not set")?;

    let mut record = FeedbackRecord::new(message_id, session_id, direction);
    if let Some(model) = model {
        record = record.with_model(model);
    }
    FeedbackRecorder::new(url).record(&record).await?;
    println!("feedback recorded");
    Ok(())
}
