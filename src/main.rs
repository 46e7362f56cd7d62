use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use chorus_channel::{HttpChunkSource, HttpSourceConfig};
use chorus_core::ids::{AgentId, ConversationId};
use chorus_core::messages::{Message, Role};
use chorus_engine::{OrchestratorConfig, RequestOutcome, SessionOrchestrator};
use chorus_settings::{load_settings, resolve_database_path, ChorusSettings};
use chorus_store::SqlitePersistence;
use chorus_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "chorus", version, about = "Multi-agent streaming chat client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to an agent and print the resulting session.
    Send {
        #[arg(long, short)]
        agent: Option<String>,
        text: String,
    },
    /// List persisted conversations for an agent.
    History {
        #[arg(long, short)]
        agent: Option<String>,
    },
    /// Print one persisted conversation.
    Show {
        conversation_id: String,
        #[arg(long, short)]
        agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings().context("failed to load settings")?;
    init_telemetry(&TelemetryConfig::from_names(
        &settings.logging.level,
        &settings.logging.module_levels,
        settings.logging.json,
    ))?;

    let orch = build_orchestrator(&settings)?;
    let pick = |agent: Option<String>| {
        agent
            .map(AgentId::new)
            .unwrap_or_else(|| orch.config().default_agent.clone())
    };

    match cli.command {
        Command::Send { agent, text } => {
            let agent_id = pick(agent);
            orch.switch_visible_agent(&agent_id);
            let handle = orch.send(&agent_id, &text)?;
            tracing::info!(request_id = %handle.request_id, "request sent");

            let outcome = handle.outcome().await;
            for message in orch.visible().session.messages {
                print_message(&message);
            }
            match outcome {
                RequestOutcome::CredentialRequired => {
                    eprintln!("agent {agent_id} needs credentials before it can answer");
                }
                RequestOutcome::Failed { error } => bail!("request failed: {error}"),
                _ => {}
            }
        }
        Command::History { agent } => {
            let agent_id = pick(agent);
            for summary in orch.history(&agent_id).await? {
                println!(
                    "{}  {}  {:>3} msgs  {}",
                    summary.id,
                    summary.updated_at.format("%Y-%m-%d %H:%M"),
                    summary.message_count,
                    summary.title
                );
            }
        }
        Command::Show {
            conversation_id,
            agent,
        } => {
            let agent_id = pick(agent);
            let snapshot = orch
                .load_conversation(&agent_id, &ConversationId::from_raw(conversation_id))
                .await?;
            for message in &snapshot.messages {
                print_message(message);
            }
        }
    }

    Ok(())
}

fn build_orchestrator(settings: &ChorusSettings) -> Result<SessionOrchestrator> {
    let db_path = resolve_database_path(settings);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = SqlitePersistence::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");

    let source = HttpChunkSource::new(HttpSourceConfig {
        endpoint: settings.channel.endpoint.clone(),
        connect_timeout: Duration::from_millis(settings.channel.connect_timeout_ms),
        idle_timeout: Duration::from_millis(settings.channel.idle_timeout_ms),
        bearer_token: settings.channel.bearer_token.clone(),
    })?;

    Ok(SessionOrchestrator::new(
        OrchestratorConfig::from(&settings.orchestrator),
        Arc::new(source),
        Arc::new(store),
    ))
}

fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "agent",
        Role::Status => "status",
    };
    println!("[{label}] {}", message.content);
    for tool in &message.tool_calls {
        println!("    tool {} ({:?})", tool.name, tool.status);
    }
    if let Some(error) = &message.error {
        println!("    error: {error}");
    }
}
