//! The dashboard's JSON API plus a minimal HTML index (§4.7 "Secondary
//! concerns", and the one load-bearing exception: `POST /api/envelopes`
//! is where `relay-spawner::Spawner::deliver_initial_task` sends a newly
//! spawned agent's first task, so it goes through the same routing path
//! as any other message instead of a side channel.

use std::collections::HashMap;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router as AxumRouter};
use serde::{Deserialize, Serialize};

use relay_consensus::CreateProposalRequest;
use relay_spawner::{RolePreset, ShadowSpawnRequest, SpawnRequest};
use relay_storage::StoreBackend;
use relay_types::{ConsensusType, DeadLetterFilter, Envelope, MessageFilter, SessionFilter, VoteValue};

use crate::error::WebError;
use crate::state::DashboardState;
use crate::templates::IndexTemplate;
use crate::ws;

/// Mounts every dashboard route onto a fresh [`axum::Router`], generic
/// over the storage backend `relay-daemon` opened.
pub fn dashboard_routes<B>(state: DashboardState<B>) -> AxumRouter
where
    B: StoreBackend + Send + Sync + 'static,
{
    AxumRouter::new()
        .route("/", get(index::<B>))
        .route("/api/envelopes", post(post_envelope::<B>))
        .route("/api/messages", get(list_messages::<B>))
        .route("/api/messages/{id}/read", post(mark_message_read::<B>))
        .route("/api/sessions", get(list_sessions::<B>))
        .route("/api/agents", get(list_agents::<B>))
        .route("/api/agents/{name}/summary", get(agent_summary::<B>))
        .route("/api/dlq", get(list_dead_letters::<B>))
        .route("/api/dlq", delete(purge_dead_letters::<B>))
        .route("/api/spawn", post(spawn_agent::<B>))
        .route("/api/spawn/shadow", post(spawn_shadow::<B>))
        .route("/api/release/{name}", post(release_agent::<B>))
        .route("/api/proposals", get(list_proposals::<B>))
        .route("/api/proposals", post(create_proposal::<B>))
        .route("/api/proposals/{id}", get(get_proposal::<B>))
        .route("/api/proposals/{id}/vote", post(cast_vote::<B>))
        .route("/api/proposals/{id}/cancel", post(cancel_proposal::<B>))
        .route("/api/stats", get(stats::<B>))
        .route("/ws", get(ws::upgrade::<B>))
        .with_state(state)
}

async fn index<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
) -> Result<impl IntoResponse, WebError> {
    let template = IndexTemplate {
        agent_count: state.spawner.agent_names().len(),
        total_routed: state.router.total_routed(),
        proposal_count: state.consensus.list_proposals().len(),
    };
    Ok(Html(template.render()?))
}

/// Accepts one envelope and routes it exactly as any in-process sender
/// would. This is the HTTP surface `deliver_initial_task` posts through.
async fn post_envelope<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Json(envelope): Json<Envelope>,
) -> Result<impl IntoResponse, WebError> {
    let outcomes = state.router.route(envelope).await?;
    Ok(Json(serde_json::json!({ "outcomes": format!("{outcomes:?}") })))
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    from: Option<String>,
    to: Option<String>,
    topic: Option<String>,
    thread: Option<String>,
    since_ts: Option<i64>,
    #[serde(default)]
    unread_only: bool,
    #[serde(default)]
    urgent_only: bool,
    #[serde(default)]
    ascending: bool,
    limit: Option<usize>,
}

async fn list_messages<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Query(q): Query<MessageQuery>,
) -> Result<impl IntoResponse, WebError> {
    let filter = MessageFilter {
        from: q.from,
        to: q.to,
        topic: q.topic,
        thread: q.thread,
        since_ts: q.since_ts,
        unread_only: q.unread_only,
        urgent_only: q.urgent_only,
        ascending: q.ascending,
        limit: q.limit.unwrap_or(MessageFilter::DEFAULT_LIMIT),
    };
    let messages = state.store.get_messages(&filter)?;
    Ok(Json(messages))
}

async fn mark_message_read<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    state.store.update_message_status(&id)?;
    Ok(Json(serde_json::json!({ "id": id, "status": "read" })))
}

#[derive(Debug, Deserialize, Default)]
struct SessionQuery {
    agent_name: Option<String>,
    project_id: Option<String>,
    #[serde(default)]
    active_only: bool,
}

async fn list_sessions<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, WebError> {
    let filter = SessionFilter {
        agent_name: q.agent_name,
        project_id: q.project_id,
        active_only: q.active_only,
    };
    let sessions = state.store.get_sessions(&filter)?;
    Ok(Json(sessions))
}

#[derive(Debug, Serialize)]
struct AgentView {
    agent_name: String,
    cli: String,
    started_at: i64,
    shadow_of: Option<String>,
}

async fn list_agents<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
) -> Result<impl IntoResponse, WebError> {
    let workers: Vec<AgentView> = state
        .spawner
        .workers()
        .into_iter()
        .map(|w| AgentView {
            agent_name: w.agent_name,
            cli: w.cli,
            started_at: w.started_at,
            shadow_of: w.shadow_of,
        })
        .collect();
    Ok(Json(workers))
}

async fn agent_summary<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    match state.store.get_agent_summary(&name)? {
        Some(summary) => Ok(Json(summary)),
        None => Err(WebError::NotFound(format!("no summary for agent {name}"))),
    }
}

#[derive(Debug, Deserialize, Default)]
struct DeadLetterQuery {
    reason: Option<String>,
    before_ts: Option<i64>,
    limit: Option<usize>,
}

fn parse_reason(raw: &str) -> Option<relay_types::DeadLetterReason> {
    use relay_types::DeadLetterReason::*;
    match raw {
        "max_retries_exceeded" => Some(MaxRetriesExceeded),
        "ttl_expired" => Some(TtlExpired),
        "connection_lost" => Some(ConnectionLost),
        "target_not_found" => Some(TargetNotFound),
        _ => None,
    }
}

async fn list_dead_letters<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Query(q): Query<DeadLetterQuery>,
) -> Result<impl IntoResponse, WebError> {
    let filter = DeadLetterFilter {
        reason: q.reason.as_deref().and_then(parse_reason),
        before_ts: q.before_ts,
        limit: q.limit.unwrap_or(0),
    };
    let dead_letters = state.dlq.list(&filter)?;
    Ok(Json(dead_letters))
}

async fn purge_dead_letters<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Query(q): Query<DeadLetterQuery>,
) -> Result<impl IntoResponse, WebError> {
    let filter = DeadLetterFilter {
        reason: q.reason.as_deref().and_then(parse_reason),
        before_ts: q.before_ts,
        limit: q.limit.unwrap_or(0),
    };
    let removed = state.dlq.purge(&filter)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[derive(Debug, Deserialize)]
struct SpawnBody {
    agent_name: String,
    cli: String,
    task: String,
    working_directory: Option<String>,
}

async fn spawn_agent<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Json(body): Json<SpawnBody>,
) -> Result<impl IntoResponse, WebError> {
    let cwd = body
        .working_directory
        .map(Into::into)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| ".".into()));
    let request = SpawnRequest::new(body.agent_name, body.cli, body.task, cwd);
    let wrapper = state.spawner.spawn(&request).await?;
    Ok(Json(serde_json::json!({ "agent_name": wrapper.agent_name_str() })))
}

#[derive(Debug, Deserialize)]
struct ShadowSpawnBody {
    primary: SpawnBody,
    shadow_cli: String,
    shadow_task: String,
    role: String,
}

fn parse_role(raw: &str) -> RolePreset {
    match raw {
        "auditor" => RolePreset::Auditor,
        "active" => RolePreset::Active,
        _ => RolePreset::Reviewer,
    }
}

async fn spawn_shadow<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Json(body): Json<ShadowSpawnBody>,
) -> Result<impl IntoResponse, WebError> {
    let cwd = body
        .primary
        .working_directory
        .map(Into::into)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| ".".into()));
    let primary = SpawnRequest::new(body.primary.agent_name, body.primary.cli, body.primary.task, cwd);
    let request = ShadowSpawnRequest {
        primary,
        shadow_cli: body.shadow_cli,
        shadow_task: body.shadow_task,
        role: parse_role(&body.role),
        triggers: None,
    };
    let (primary, shadow) = state.spawner.spawn_shadow(&request).await?;
    Ok(Json(serde_json::json!({
        "primary": primary.agent_name_str(),
        "shadow": shadow.map(|s| s.agent_name_str().to_string()),
    })))
}

async fn release_agent<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    state.spawner.release(&name).await?;
    Ok(Json(serde_json::json!({ "released": name })))
}

async fn list_proposals<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
) -> Result<impl IntoResponse, WebError> {
    Ok(Json(state.consensus.list_proposals()))
}

async fn get_proposal<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    match state.consensus.get_proposal(&id) {
        Some(proposal) => Ok(Json(proposal)),
        None => Err(WebError::NotFound(format!("no proposal with id {id}"))),
    }
}

#[derive(Debug, Deserialize)]
struct CreateProposalBody {
    proposer: String,
    title: String,
    description: String,
    consensus_type: Option<ConsensusType>,
    participants: Vec<String>,
    quorum: Option<u32>,
    threshold: Option<f64>,
    #[serde(default)]
    weights: HashMap<String, u32>,
    timeout_ms: Option<u64>,
    thread: Option<String>,
}

async fn create_proposal<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Json(body): Json<CreateProposalBody>,
) -> Result<impl IntoResponse, WebError> {
    let request = CreateProposalRequest {
        proposer: body.proposer,
        title: body.title,
        description: body.description,
        consensus_type: body.consensus_type,
        participants: body.participants,
        quorum: body.quorum,
        threshold: body.threshold,
        weights: body.weights,
        timeout_ms: body.timeout_ms,
        thread: body.thread,
    };
    let proposal = state.consensus.create_proposal(request).await?;
    Ok(Json(proposal))
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    agent: String,
    value: VoteValue,
    reason: Option<String>,
}

async fn cast_vote<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Path(id): Path<String>,
    Json(body): Json<VoteBody>,
) -> Result<impl IntoResponse, WebError> {
    let proposal = state
        .consensus
        .vote(&id, &body.agent, body.value, body.reason)
        .await?;
    Ok(Json(proposal))
}

#[derive(Debug, Deserialize)]
struct CancelBody {
    agent: String,
}

async fn cancel_proposal<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
    Path(id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<impl IntoResponse, WebError> {
    let proposal = state.consensus.cancel_proposal(&id, &body.agent).await?;
    Ok(Json(proposal))
}

async fn stats<B: StoreBackend + Send + Sync + 'static>(
    State(state): State<DashboardState<B>>,
) -> Result<impl IntoResponse, WebError> {
    let store_stats = state.store.stats()?;
    let sync_stats = state.sync.as_ref().map(|s| s.stats());
    let proposals_open = state
        .consensus
        .list_proposals()
        .iter()
        .filter(|p| p.status == relay_types::ProposalStatus::Pending)
        .count();
    Ok(Json(serde_json::json!({
        "agents_attached": state.spawner.agent_names().len(),
        "total_routed": state.router.total_routed(),
        "proposals_open": proposals_open,
        "store": store_stats,
        "sync": sync_stats,
    })))
}
