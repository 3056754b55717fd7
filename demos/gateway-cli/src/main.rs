//! Line-mode front end for the agent gateway.
//!
//! Reads its configuration from the environment (see `agent-config`).

use agentcore_gateway::config::GatewayConfig;
use agentcore_gateway::kernel::{AgentGateway, PreparedRequest, TurnResult};
use agentcore_gateway::primitives::ConversationId;
use agentcore_gateway::telemetry::{FeedbackRating, FeedbackRecord};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PREVIEW_CHARS: usize = 160;

#[derive(Parser)]
#[command(name = "gateway-cli", version, about = "Talk to a remote agent through the gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message and print the answer
    Ask {
        /// Message text
        text: String,
        /// Conversation to continue (a new one is started if omitted)
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Interactive line-mode chat; `exit` or EOF ends the session
    Chat {
        /// Conversation to continue (a new one is started if omitted)
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Record a rating for a conversation
    Feedback {
        /// Conversation being rated
        #[arg(long)]
        conversation: String,
        /// positive, neutral or negative
        #[arg(long)]
        rating: FeedbackRating,
        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env().context("failed to load gateway configuration")?;

    match cli.command {
        Command::Ask { text, conversation } => {
            let conversation = conversation_id(conversation)?;
            let gateway = start(&config).await?;
            let outcome = ask(&gateway, &conversation, &text).await;
            shutdown(&gateway).await;
            outcome
        }
        Command::Chat { conversation } => {
            let conversation = conversation_id(conversation)?;
            let gateway = start(&config).await?;
            let outcome = chat(&gateway, conversation).await;
            shutdown(&gateway).await;
            outcome
        }
        Command::Feedback {
            conversation,
            rating,
            notes,
        } => feedback(&config, ConversationId::new(conversation)?, rating, notes).await,
    }
}

async fn start(config: &GatewayConfig) -> Result<AgentGateway> {
    agentcore_gateway::connect(config)
        .await
        .context("failed to start gateway")
}

async fn shutdown(gateway: &AgentGateway) {
    gateway.close().await;
    if let Some(telemetry) = gateway.telemetry() {
        let dropped = telemetry.dropped();
        if dropped > 0 {
            info!(dropped, "telemetry batches dropped during session");
        }
    }
}

fn conversation_id(value: Option<String>) -> Result<ConversationId> {
    match value {
        Some(value) => Ok(ConversationId::new(value)?),
        None => Ok(ConversationId::random()),
    }
}

/// Records a rating without bootstrapping tools or loading the template.
async fn feedback(
    config: &GatewayConfig,
    conversation: ConversationId,
    rating: FeedbackRating,
    notes: String,
) -> Result<()> {
    let telemetry = agentcore_gateway::feedback_telemetry(config)
        .await
        .context("failed to open feedback store")?;
    let record = FeedbackRecord::new(conversation.clone(), rating, notes);
    telemetry
        .record_feedback(&record)
        .await
        .context("failed to record feedback")?;
    println!("Feedback recorded for {conversation}.");
    Ok(())
}

async fn ask(gateway: &AgentGateway, conversation: &ConversationId, text: &str) -> Result<()> {
    let result = gateway.respond(conversation, text).await?;
    print_result(&result);
    Ok(())
}

async fn chat(gateway: &AgentGateway, conversation: ConversationId) -> Result<()> {
    println!("Conversation {conversation}. Type `exit` to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let prepared = match gateway.prepare(input).await {
            Ok(prepared) => prepared,
            Err(err) => {
                eprintln!("error ({} stage): {err}", err.stage());
                continue;
            }
        };
        print_preview(&prepared);

        match gateway.complete(&conversation, prepared).await {
            Ok(result) => print_result(&result),
            Err(err) => eprintln!("error ({} stage): {err}", err.stage()),
        }
    }
    Ok(())
}

fn print_preview(prepared: &PreparedRequest) {
    let preview: String = prepared.prompt_text().chars().take(PREVIEW_CHARS).collect();
    println!("-- retrieval preview --");
    println!("prompt: {preview}");
    if prepared.citations().is_empty() {
        println!("citations: none");
    } else {
        for citation in prepared.citations() {
            println!("citation: {citation}");
        }
    }
}

fn print_result(result: &TurnResult) {
    println!();
    println!("{}", result.final_text());
    println!();

    if result.citations().is_empty() {
        println!("No citations returned by the knowledge base.");
    } else {
        println!("Sources:");
        for citation in result.citations() {
            println!("  - {citation}");
        }
    }

    if let Some(verdict) = result.safety_verdict() {
        if verdict.intervened() {
            println!(
                "Safety review intervened: {}",
                verdict.reason().unwrap_or("no reason given")
            );
        }
    }

    let metrics = result.metrics();
    println!(
        "latency: {:.2}s, output tokens: {}, provenance: {}",
        metrics.latency_seconds(),
        metrics.output_tokens(),
        result.provenance().label()
    );
}
