//! The consensus engine itself (C7, §4.8): proposal/vote state, the
//! per-type auto-resolution rule, expiry timers, and the inbound
//! interceptor that consumes `PROPOSE:`/`VOTE` bodies off the router.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use relay_router::sink::{InboundInterceptor, InterceptOutcome};
use relay_router::Router;
use relay_types::{
    Envelope, EnvelopeKind, Proposal, ProposalResult, ProposalStatus, Vote, VoteValue,
    BROADCAST_TARGET,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ConsensusConfig;
use crate::error::{ConsensusError, Result};
use crate::grammar;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Request to open a new proposal, as assembled from either a `PROPOSE:`
/// body or a future HTTP endpoint (`relay-web`/`relay-cli`).
#[derive(Debug, Clone)]
pub struct CreateProposalRequest {
    pub proposer: String,
    pub title: String,
    pub description: String,
    pub consensus_type: Option<relay_types::ConsensusType>,
    pub participants: Vec<String>,
    pub quorum: Option<u32>,
    pub threshold: Option<f64>,
    pub weights: HashMap<String, u32>,
    pub timeout_ms: Option<u64>,
    pub thread: Option<String>,
}

/// Published whenever a proposal is created, voted on, resolved, or
/// cancelled; `relay-web`'s dashboard subscribes for its live feed.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsensusEvent {
    Created(Proposal),
    Voted(Proposal),
    Resolved(Proposal),
    Cancelled(Proposal),
}

/// Application-level vote tallying layered over the router. Cheap to
/// clone: every field is an `Arc` or `Sender`, so a clone shares the same
/// proposal table and can be moved into the `tokio::spawn`ed tasks that
/// [`InboundInterceptor::intercept`] (a synchronous trait method) hands
/// the actual async work off to.
#[derive(Clone)]
pub struct ConsensusEngine {
    state: Arc<RwLock<HashMap<String, Proposal>>>,
    router: Arc<Mutex<Option<Weak<Router>>>>,
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    config: ConsensusConfig,
    events: broadcast::Sender<ConsensusEvent>,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(HashMap::new())),
            router: Arc::new(Mutex::new(None)),
            timers: Arc::new(Mutex::new(HashMap::new())),
            config,
            events,
        }
    }

    /// Gives the engine a way to send envelopes back through the router.
    /// Held weakly: the router owns neither the engine nor this handle,
    /// it only outlives the engine's announcements while a daemon is up.
    pub fn attach_router(&self, router: &Arc<Router>) {
        *self.router.lock() = Some(Arc::downgrade(router));
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConsensusEvent> {
        self.events.subscribe()
    }

    pub fn get_proposal(&self, id: &str) -> Option<Proposal> {
        self.state.read().get(id).cloned()
    }

    pub fn list_proposals(&self) -> Vec<Proposal> {
        self.state.read().values().cloned().collect()
    }

    pub async fn create_proposal(&self, request: CreateProposalRequest) -> Result<Proposal> {
        if request.participants.is_empty() {
            return Err(ConsensusError::EmptyParticipants);
        }

        let now = now_ms();
        let timeout_ms = request.timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let proposal = Proposal {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title,
            description: request.description,
            proposer: request.proposer,
            consensus_type: request
                .consensus_type
                .unwrap_or(self.config.default_consensus_type),
            participants: request.participants,
            quorum: request.quorum,
            threshold: request.threshold,
            weights: request.weights,
            created_at: now,
            expires_at: now + timeout_ms as i64,
            status: ProposalStatus::Pending,
            votes: Vec::new(),
            result: None,
            thread: request.thread,
        };

        self.state.write().insert(proposal.id.clone(), proposal.clone());
        self.spawn_expiry_timer(&proposal);
        self.announce(&proposal, AnnounceKind::Created);
        let _ = self.events.send(ConsensusEvent::Created(proposal.clone()));
        info!(id = %proposal.id, title = %proposal.title, "proposal created");
        Ok(proposal)
    }

    pub async fn vote(
        &self,
        proposal_id: &str,
        agent: &str,
        value: VoteValue,
        reason: Option<String>,
    ) -> Result<Proposal> {
        let outcome = {
            let mut state = self.state.write();
            let proposal = state
                .get_mut(proposal_id)
                .ok_or_else(|| ConsensusError::NotFound(proposal_id.to_string()))?;

            if proposal.status != ProposalStatus::Pending {
                return Err(ConsensusError::NotPending(proposal_id.to_string()));
            }
            if now_ms() >= proposal.expires_at {
                finalize(proposal, ProposalStatus::Expired);
                let expired = proposal.clone();
                drop(state);
                self.cancel_timer(proposal_id);
                self.announce(&expired, AnnounceKind::Resolved);
                let _ = self.events.send(ConsensusEvent::Resolved(expired));
                return Err(ConsensusError::Expired(proposal_id.to_string()));
            }
            if !proposal.is_participant(agent) {
                return Err(ConsensusError::NotParticipant {
                    proposal_id: proposal_id.to_string(),
                    agent: agent.to_string(),
                });
            }
            if proposal.vote_of(agent).is_some() {
                if !self.config.allow_vote_change {
                    return Err(ConsensusError::DuplicateVote {
                        proposal_id: proposal_id.to_string(),
                        agent: agent.to_string(),
                    });
                }
                proposal.votes.retain(|v| v.agent != agent);
            }

            proposal.votes.push(Vote {
                weight: proposal.weight_of(agent),
                agent: agent.to_string(),
                value,
                reason,
                ts: now_ms(),
            });

            let resolved = if self.config.auto_resolve {
                crate::resolution::evaluate(proposal)
            } else {
                None
            };
            if let Some(status) = resolved {
                finalize(proposal, status);
                ProposalOutcome::Resolved(proposal.clone())
            } else {
                ProposalOutcome::StillPending(proposal.clone())
            }
        };

        let proposal = match outcome {
            ProposalOutcome::Resolved(p) => {
                self.cancel_timer(proposal_id);
                self.announce(&p, AnnounceKind::Resolved);
                let _ = self.events.send(ConsensusEvent::Resolved(p.clone()));
                p
            }
            ProposalOutcome::StillPending(p) => {
                let _ = self.events.send(ConsensusEvent::Voted(p.clone()));
                p
            }
        };
        Ok(proposal)
    }

    pub async fn cancel_proposal(&self, proposal_id: &str, agent: &str) -> Result<Proposal> {
        let proposal = {
            let mut state = self.state.write();
            let proposal = state
                .get_mut(proposal_id)
                .ok_or_else(|| ConsensusError::NotFound(proposal_id.to_string()))?;
            if proposal.status != ProposalStatus::Pending {
                return Err(ConsensusError::NotPending(proposal_id.to_string()));
            }
            if proposal.proposer != agent {
                return Err(ConsensusError::NotProposer {
                    proposal_id: proposal_id.to_string(),
                    proposer: proposal.proposer.clone(),
                });
            }
            finalize(proposal, ProposalStatus::Cancelled);
            proposal.clone()
        };
        self.cancel_timer(proposal_id);
        self.announce(&proposal, AnnounceKind::Resolved);
        let _ = self.events.send(ConsensusEvent::Cancelled(proposal.clone()));
        Ok(proposal)
    }

    /// Aborts every still-pending expiry timer (§6 shutdown sequence:
    /// "cancels every pending consensus timer").
    pub fn shutdown(&self) {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
    }

    fn spawn_expiry_timer(&self, proposal: &Proposal) {
        let delay = (proposal.expires_at - proposal.created_at).max(0) as u64;
        let engine = self.clone();
        let id = proposal.id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            engine.expire(&id).await;
        });
        self.timers.lock().insert(proposal.id.clone(), handle);
    }

    fn cancel_timer(&self, proposal_id: &str) {
        if let Some(handle) = self.timers.lock().remove(proposal_id) {
            handle.abort();
        }
    }

    async fn expire(&self, proposal_id: &str) {
        let proposal = {
            let mut state = self.state.write();
            let Some(proposal) = state.get_mut(proposal_id) else {
                return;
            };
            if proposal.status != ProposalStatus::Pending {
                return;
            }
            finalize(proposal, ProposalStatus::Expired);
            proposal.clone()
        };
        self.timers.lock().remove(proposal_id);
        self.announce(&proposal, AnnounceKind::Resolved);
        let _ = self.events.send(ConsensusEvent::Resolved(proposal));
    }

    fn announce(&self, proposal: &Proposal, kind: AnnounceKind) {
        if !self.config.broadcast_proposals {
            return;
        }
        let Some(router) = self.router.lock().as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let body = match kind {
            AnnounceKind::Created => format!(
                "PROPOSAL {} \"{}\" ({:?}) opened by {}, expires at {}",
                proposal.id, proposal.title, proposal.consensus_type, proposal.proposer, proposal.expires_at
            ),
            AnnounceKind::Resolved => format!(
                "PROPOSAL {} \"{}\" resolved: {:?}",
                proposal.id, proposal.title, proposal.status
            ),
        };
        let Ok(envelope) = Envelope::new("consensus", BROADCAST_TARGET, EnvelopeKind::Proposal, body) else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = router.route(envelope).await {
                warn!(%err, "failed to announce proposal update");
            }
        });
    }
}

enum ProposalOutcome {
    Resolved(Proposal),
    StillPending(Proposal),
}

enum AnnounceKind {
    Created,
    Resolved,
}

/// Builds the terminal `ProposalResult` and applies it, in place, to an
/// already-locked proposal (§4.8 "Result details carried on resolution").
fn finalize(proposal: &mut Proposal, decision: ProposalStatus) {
    let approve_weight = weight_sum(proposal, VoteValue::Approve);
    let reject_weight = weight_sum(proposal, VoteValue::Reject);
    let abstain_weight = weight_sum(proposal, VoteValue::Abstain);
    let non_voters = proposal.non_voters();
    let participation_fraction = if proposal.participants.is_empty() {
        0.0
    } else {
        let voted = proposal.participants.len() - non_voters.len();
        voted as f64 / proposal.participants.len() as f64
    };
    let quorum_met = match proposal.quorum {
        Some(quorum) => proposal.votes.len() as u32 >= quorum,
        None => true,
    };

    proposal.status = decision;
    proposal.result = Some(ProposalResult {
        decision,
        approve_weight,
        reject_weight,
        abstain_weight,
        participation_fraction,
        quorum_met,
        non_voters,
        resolved_at: now_ms(),
    });
}

fn weight_sum(proposal: &Proposal, value: VoteValue) -> u32 {
    proposal
        .votes
        .iter()
        .filter(|v| v.value == value)
        .map(|v| v.weight)
        .sum()
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl InboundInterceptor for ConsensusEngine {
    fn intercept(&self, envelope: &Envelope) -> InterceptOutcome {
        if let Some(parsed) = grammar::parse_propose(&envelope.body) {
            let engine = self.clone();
            let proposer = envelope.from.clone();
            let thread = envelope.thread.clone();
            tokio::spawn(async move {
                let request = CreateProposalRequest {
                    proposer,
                    title: parsed.title,
                    description: parsed.description.unwrap_or_default(),
                    consensus_type: parsed.consensus_type,
                    participants: parsed.participants,
                    quorum: None,
                    threshold: None,
                    weights: HashMap::new(),
                    timeout_ms: None,
                    thread,
                };
                if let Err(err) = engine.create_proposal(request).await {
                    warn!(%err, "failed to create proposal from relay grammar");
                }
            });
            return InterceptOutcome::Consumed;
        }

        if let Some(parsed) = grammar::parse_vote(&envelope.body) {
            let engine = self.clone();
            let agent = envelope.from.clone();
            tokio::spawn(async move {
                if let Err(err) = engine
                    .vote(&parsed.proposal_id, &agent, parsed.value, parsed.reason)
                    .await
                {
                    warn!(%err, "vote rejected");
                }
            });
            return InterceptOutcome::Consumed;
        }

        InterceptOutcome::PassThrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::ConsensusType;

    fn engine() -> ConsensusEngine {
        ConsensusEngine::new(ConsensusConfig {
            default_timeout_ms: 60_000,
            ..ConsensusConfig::default()
        })
    }

    fn request(consensus_type: ConsensusType, participants: &[&str]) -> CreateProposalRequest {
        CreateProposalRequest {
            proposer: "Lead".into(),
            title: "Ship it".into(),
            description: "desc".into(),
            consensus_type: Some(consensus_type),
            participants: participants.iter().map(|s| s.to_string()).collect(),
            quorum: None,
            threshold: None,
            weights: HashMap::new(),
            timeout_ms: Some(60_000),
            thread: None,
        }
    }

    #[tokio::test]
    async fn s5_majority_resolves_before_all_vote() {
        let engine = engine();
        let proposal = engine
            .create_proposal(request(ConsensusType::Majority, &["Dev", "Reviewer", "QA"]))
            .await
            .unwrap();

        engine.vote(&proposal.id, "Dev", VoteValue::Approve, None).await.unwrap();
        let resolved = engine
            .vote(&proposal.id, "Reviewer", VoteValue::Approve, None)
            .await
            .unwrap();

        assert_eq!(resolved.status, ProposalStatus::Approved);
        let result = resolved.result.unwrap();
        assert_eq!(result.decision, ProposalStatus::Approved);
        assert_eq!(result.non_voters, vec!["QA".to_string()]);
    }

    #[tokio::test]
    async fn s6_unanimous_fails_fast_on_first_rejection() {
        let engine = engine();
        let proposal = engine
            .create_proposal(request(ConsensusType::Unanimous, &["Dev", "Reviewer", "QA"]))
            .await
            .unwrap();

        let resolved = engine
            .vote(&proposal.id, "Reviewer", VoteValue::Reject, None)
            .await
            .unwrap();

        assert_eq!(resolved.status, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn vote_from_non_participant_is_rejected() {
        let engine = engine();
        let proposal = engine
            .create_proposal(request(ConsensusType::Majority, &["Dev", "Reviewer"]))
            .await
            .unwrap();

        let err = engine
            .vote(&proposal.id, "Stranger", VoteValue::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn duplicate_vote_rejected_when_change_disallowed() {
        let engine = ConsensusEngine::new(ConsensusConfig {
            allow_vote_change: false,
            ..ConsensusConfig::default()
        });
        let proposal = engine
            .create_proposal(request(ConsensusType::Majority, &["Dev", "Reviewer", "QA"]))
            .await
            .unwrap();
        engine.vote(&proposal.id, "Dev", VoteValue::Approve, None).await.unwrap();
        let err = engine
            .vote(&proposal.id, "Dev", VoteValue::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::DuplicateVote { .. }));
    }

    #[tokio::test]
    async fn vote_change_allowed_when_configured() {
        let engine = engine();
        let proposal = engine
            .create_proposal(request(ConsensusType::Unanimous, &["Dev", "Reviewer"]))
            .await
            .unwrap();
        engine.vote(&proposal.id, "Dev", VoteValue::Reject, None).await.unwrap();
        let updated = engine.vote(&proposal.id, "Dev", VoteValue::Approve, None).await.unwrap();
        assert_eq!(updated.votes.len(), 1);
        assert_eq!(updated.votes[0].value, VoteValue::Approve);
    }

    #[tokio::test]
    async fn only_proposer_may_cancel() {
        let engine = engine();
        let proposal = engine
            .create_proposal(request(ConsensusType::Majority, &["Dev", "Reviewer"]))
            .await
            .unwrap();
        let err = engine.cancel_proposal(&proposal.id, "Dev").await.unwrap_err();
        assert!(matches!(err, ConsensusError::NotProposer { .. }));

        let cancelled = engine.cancel_proposal(&proposal.id, "Lead").await.unwrap();
        assert_eq!(cancelled.status, ProposalStatus::Cancelled);
    }

    #[tokio::test]
    async fn vote_on_resolved_proposal_is_rejected() {
        let engine = engine();
        let proposal = engine
            .create_proposal(request(ConsensusType::Unanimous, &["Dev", "Reviewer"]))
            .await
            .unwrap();
        engine.vote(&proposal.id, "Dev", VoteValue::Reject, None).await.unwrap();
        let err = engine
            .vote(&proposal.id, "Reviewer", VoteValue::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::NotPending(_)));
    }

    #[tokio::test]
    async fn intercept_consumes_propose_and_vote_bodies() {
        let engine = engine();
        let propose = Envelope::new(
            "Lead",
            "Dev",
            EnvelopeKind::Message,
            "PROPOSE: Ship it\nTYPE: majority\nPARTICIPANTS: Dev, Reviewer",
        )
        .unwrap();
        assert!(matches!(engine.intercept(&propose), InterceptOutcome::Consumed));

        let plain = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hello").unwrap();
        assert!(matches!(engine.intercept(&plain), InterceptOutcome::PassThrough));
    }
}
