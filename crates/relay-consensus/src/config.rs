//! Consensus-wide defaults (§6 configuration knobs: `consensus.*`).

use relay_types::ConsensusType;

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub default_timeout_ms: u64,
    pub default_consensus_type: ConsensusType,
    pub default_threshold: f64,
    pub allow_vote_change: bool,
    pub auto_resolve: bool,
    pub broadcast_proposals: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5 * 60 * 1000,
            default_consensus_type: ConsensusType::Majority,
            default_threshold: 0.67,
            allow_vote_change: true,
            auto_resolve: true,
            broadcast_proposals: true,
        }
    }
}
