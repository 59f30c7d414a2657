//! Command-line client for the agent relay dashboard's HTTP API.

mod commands;
mod http;

use clap::{Parser, Subcommand};

/// Talk to a running relay-daemon over its dashboard HTTP API.
#[derive(Parser, Debug)]
#[command(name = "relay-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the dashboard, e.g. http://127.0.0.1:8080.
    #[arg(long, env = "RELAY_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a message envelope through the router.
    Send {
        /// Sender name.
        #[arg(long)]
        from: String,
        /// Recipient name, or "*" to broadcast.
        #[arg(long)]
        to: String,
        /// Message body.
        body: String,
        /// Message topic.
        #[arg(long)]
        topic: Option<String>,
        /// Thread id.
        #[arg(long)]
        thread: Option<String>,
        /// Mark the message as urgent.
        #[arg(long)]
        urgent: bool,
    },
    /// List stored messages.
    Messages {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        thread: Option<String>,
        #[arg(long)]
        since_ts: Option<i64>,
        #[arg(long)]
        unread_only: bool,
        #[arg(long)]
        urgent_only: bool,
        #[arg(long)]
        ascending: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark a stored message as read.
    MarkRead {
        /// Message id.
        id: String,
    },
    /// List active/past sessions.
    Sessions {
        #[arg(long)]
        agent_name: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        active_only: bool,
    },
    /// List currently attached agents.
    Agents,
    /// Show a single agent's summary.
    AgentSummary {
        /// Agent name.
        name: String,
    },
    /// List dead-lettered envelopes.
    Dlq {
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        before_ts: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Purge dead-lettered envelopes matching a filter.
    DlqPurge {
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        before_ts: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Spawn a new agent.
    Spawn {
        /// Agent name.
        agent_name: String,
        /// CLI profile to launch (e.g. claude, codex, gemini).
        cli: String,
        /// Initial task description.
        task: String,
        /// Working directory for the spawned process.
        #[arg(long)]
        working_directory: Option<String>,
    },
    /// Spawn a shadow agent alongside a primary one.
    SpawnShadow {
        /// Primary agent name.
        agent_name: String,
        /// Primary CLI profile.
        cli: String,
        /// Primary task description.
        task: String,
        /// Shadow CLI profile.
        #[arg(long)]
        shadow_cli: String,
        /// Shadow task description.
        #[arg(long)]
        shadow_task: String,
        /// Shadow role: reviewer, auditor, or active.
        #[arg(long, default_value = "reviewer")]
        role: String,
        #[arg(long)]
        working_directory: Option<String>,
    },
    /// Release (stop) a running agent.
    Release {
        /// Agent name.
        name: String,
    },
    /// Create a consensus proposal.
    Propose {
        /// Proposer agent name.
        #[arg(long)]
        proposer: String,
        /// Proposal title.
        #[arg(long)]
        title: String,
        /// Proposal description.
        #[arg(long)]
        description: String,
        /// Consensus type: majority, supermajority, unanimous, weighted, quorum.
        #[arg(long)]
        consensus_type: Option<String>,
        /// Participant agent names.
        #[arg(long, required = true)]
        participant: Vec<String>,
        #[arg(long)]
        quorum: Option<u32>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        thread: Option<String>,
    },
    /// List open and resolved proposals.
    Proposals,
    /// Show a single proposal.
    Proposal {
        /// Proposal id.
        id: String,
    },
    /// Cast a vote on a proposal.
    Vote {
        /// Proposal id.
        id: String,
        /// Voting agent name.
        #[arg(long)]
        agent: String,
        /// Vote value: approve, reject, or abstain.
        #[arg(long)]
        value: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Cancel an open proposal.
    Cancel {
        /// Proposal id.
        id: String,
        /// Cancelling agent name (must be the proposer).
        #[arg(long)]
        agent: String,
    },
    /// Show aggregate dashboard stats.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = http::Client::new(cli.base_url);

    match cli.command {
        Commands::Send { from, to, body, topic, thread, urgent } => {
            commands::send(&client, from, to, body, topic, thread, urgent).await
        }
        Commands::Messages {
            from,
            to,
            topic,
            thread,
            since_ts,
            unread_only,
            urgent_only,
            ascending,
            limit,
        } => {
            commands::messages(
                &client,
                from,
                to,
                topic,
                thread,
                since_ts,
                unread_only,
                urgent_only,
                ascending,
                limit,
            )
            .await
        }
        Commands::MarkRead { id } => commands::mark_read(&client, &id).await,
        Commands::Sessions { agent_name, project_id, active_only } => {
            commands::sessions(&client, agent_name, project_id, active_only).await
        }
        Commands::Agents => commands::agents(&client).await,
        Commands::AgentSummary { name } => commands::agent_summary(&client, &name).await,
        Commands::Dlq { reason, before_ts, limit } => commands::dlq(&client, reason, before_ts, limit).await,
        Commands::DlqPurge { reason, before_ts, limit } => {
            commands::dlq_purge(&client, reason, before_ts, limit).await
        }
        Commands::Spawn { agent_name, cli, task, working_directory } => {
            commands::spawn(&client, agent_name, cli, task, working_directory).await
        }
        Commands::SpawnShadow {
            agent_name,
            cli,
            task,
            shadow_cli,
            shadow_task,
            role,
            working_directory,
        } => {
            commands::spawn_shadow(
                &client,
                agent_name,
                cli,
                task,
                working_directory,
                shadow_cli,
                shadow_task,
                role,
            )
            .await
        }
        Commands::Release { name } => commands::release(&client, &name).await,
        Commands::Propose {
            proposer,
            title,
            description,
            consensus_type,
            participant,
            quorum,
            threshold,
            timeout_ms,
            thread,
        } => {
            commands::propose(
                &client,
                proposer,
                title,
                description,
                consensus_type,
                participant,
                quorum,
                threshold,
                timeout_ms,
                thread,
            )
            .await
        }
        Commands::Proposals => commands::proposals(&client).await,
        Commands::Proposal { id } => commands::proposal(&client, &id).await,
        Commands::Vote { id, agent, value, reason } => commands::vote(&client, &id, agent, value, reason).await,
        Commands::Cancel { id, agent } => commands::cancel(&client, &id, agent).await,
        Commands::Stats => commands::stats(&client).await,
    }
}
