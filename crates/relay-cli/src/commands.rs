//! One function per subcommand, each a thin HTTP call against the
//! dashboard's JSON API.

use anyhow::Result;
use serde_json::{json, Value};

use crate::http::{query_params, Client, Json};

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn send(
    client: &Client,
    from: String,
    to: String,
    body: String,
    topic: Option<String>,
    thread: Option<String>,
    urgent: bool,
) -> Result<()> {
    let envelope = json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "ts": 0,
        "from": from,
        "to": to,
        "kind": "message",
        "body": body,
        "topic": topic,
        "thread": thread,
        "is_broadcast": to == "*",
        "is_urgent": urgent,
        "importance": 50,
    });
    let result: Json = client.post("/api/envelopes", &envelope).await?;
    print_json(&result)
}

#[allow(clippy::too_many_arguments)]
pub async fn messages(
    client: &Client,
    from: Option<String>,
    to: Option<String>,
    topic: Option<String>,
    thread: Option<String>,
    since_ts: Option<i64>,
    unread_only: bool,
    urgent_only: bool,
    ascending: bool,
    limit: Option<usize>,
) -> Result<()> {
    let mut query = query_params(vec![
        ("from", from),
        ("to", to),
        ("topic", topic),
        ("thread", thread),
        ("since_ts", since_ts.map(|v| v.to_string())),
        ("limit", limit.map(|v| v.to_string())),
    ]);
    if unread_only {
        query.push(("unread_only", "true".to_string()));
    }
    if urgent_only {
        query.push(("urgent_only", "true".to_string()));
    }
    if ascending {
        query.push(("ascending", "true".to_string()));
    }
    let result: Json = client.get("/api/messages", &query).await?;
    print_json(&result)
}

pub async fn mark_read(client: &Client, id: &str) -> Result<()> {
    let result: Json = client.post_empty(&format!("/api/messages/{id}/read")).await?;
    print_json(&result)
}

pub async fn sessions(
    client: &Client,
    agent_name: Option<String>,
    project_id: Option<String>,
    active_only: bool,
) -> Result<()> {
    let mut query = query_params(vec![("agent_name", agent_name), ("project_id", project_id)]);
    if active_only {
        query.push(("active_only", "true".to_string()));
    }
    let result: Json = client.get("/api/sessions", &query).await?;
    print_json(&result)
}

pub async fn agents(client: &Client) -> Result<()> {
    let result: Json = client.get("/api/agents", &[]).await?;
    print_json(&result)
}

pub async fn agent_summary(client: &Client, name: &str) -> Result<()> {
    let result: Json = client.get(&format!("/api/agents/{name}/summary"), &[]).await?;
    print_json(&result)
}

fn dlq_query(reason: Option<String>, before_ts: Option<i64>, limit: Option<usize>) -> Vec<(&'static str, String)> {
    query_params(vec![
        ("reason", reason),
        ("before_ts", before_ts.map(|v| v.to_string())),
        ("limit", limit.map(|v| v.to_string())),
    ])
}

pub async fn dlq(client: &Client, reason: Option<String>, before_ts: Option<i64>, limit: Option<usize>) -> Result<()> {
    let query = dlq_query(reason, before_ts, limit);
    let result: Json = client.get("/api/dlq", &query).await?;
    print_json(&result)
}

pub async fn dlq_purge(
    client: &Client,
    reason: Option<String>,
    before_ts: Option<i64>,
    limit: Option<usize>,
) -> Result<()> {
    let query = dlq_query(reason, before_ts, limit);
    let result: Json = client.delete("/api/dlq", &query).await?;
    print_json(&result)
}

pub async fn spawn(
    client: &Client,
    agent_name: String,
    cli: String,
    task: String,
    working_directory: Option<String>,
) -> Result<()> {
    let body = json!({
        "agent_name": agent_name,
        "cli": cli,
        "task": task,
        "working_directory": working_directory,
    });
    let result: Json = client.post("/api/spawn", &body).await?;
    print_json(&result)
}

#[allow(clippy::too_many_arguments)]
pub async fn spawn_shadow(
    client: &Client,
    agent_name: String,
    cli: String,
    task: String,
    working_directory: Option<String>,
    shadow_cli: String,
    shadow_task: String,
    role: String,
) -> Result<()> {
    let body = json!({
        "primary": {
            "agent_name": agent_name,
            "cli": cli,
            "task": task,
            "working_directory": working_directory,
        },
        "shadow_cli": shadow_cli,
        "shadow_task": shadow_task,
        "role": role,
    });
    let result: Json = client.post("/api/spawn/shadow", &body).await?;
    print_json(&result)
}

pub async fn release(client: &Client, name: &str) -> Result<()> {
    let result: Json = client.post_empty(&format!("/api/release/{name}")).await?;
    print_json(&result)
}

#[allow(clippy::too_many_arguments)]
pub async fn propose(
    client: &Client,
    proposer: String,
    title: String,
    description: String,
    consensus_type: Option<String>,
    participants: Vec<String>,
    quorum: Option<u32>,
    threshold: Option<f64>,
    timeout_ms: Option<u64>,
    thread: Option<String>,
) -> Result<()> {
    let body = json!({
        "proposer": proposer,
        "title": title,
        "description": description,
        "consensus_type": consensus_type,
        "participants": participants,
        "quorum": quorum,
        "threshold": threshold,
        "weights": {},
        "timeout_ms": timeout_ms,
        "thread": thread,
    });
    let result: Json = client.post("/api/proposals", &body).await?;
    print_json(&result)
}

pub async fn proposals(client: &Client) -> Result<()> {
    let result: Json = client.get("/api/proposals", &[]).await?;
    print_json(&result)
}

pub async fn proposal(client: &Client, id: &str) -> Result<()> {
    let result: Json = client.get(&format!("/api/proposals/{id}"), &[]).await?;
    print_json(&result)
}

pub async fn vote(client: &Client, id: &str, agent: String, value: String, reason: Option<String>) -> Result<()> {
    let body = json!({ "agent": agent, "value": value, "reason": reason });
    let result: Json = client.post(&format!("/api/proposals/{id}/vote"), &body).await?;
    print_json(&result)
}

pub async fn cancel(client: &Client, id: &str, agent: String) -> Result<()> {
    let body = json!({ "agent": agent });
    let result: Json = client.post(&format!("/api/proposals/{id}/cancel"), &body).await?;
    print_json(&result)
}

pub async fn stats(client: &Client) -> Result<()> {
    let result: Json = client.get("/api/stats", &[]).await?;
    print_json(&result)
}
