//! Wrapper lifecycle manager (C5): spawns and tracks PTY wrappers,
//! gates on registration, persists workers metadata, and dispatches
//! agent-death notifications.

pub mod config;
pub mod death;
pub mod error;
pub mod metadata;
pub mod policy;
pub mod spawner;

pub use config::{
    default_cli_profiles, CliProfile, RolePreset, ShadowSpawnRequest, ShadowTrigger, SpawnRequest,
    SpawnerConfig,
};
pub use death::{AgentDeathEvent, DeathCallback, NoopDeathCallback};
pub use error::{Result, SpawnError};
pub use metadata::{WorkerRecord, WorkersFile};
pub use policy::{build_initial_task, NoopPolicyProvider, PolicyProvider, RELAY_COMMUNICATION_SNIPPET};
pub use spawner::Spawner;
