//! Callback interface a wrapper dispatches `->relay:spawn`/`->relay:release`
//! control verbs into (§4.2 step 6, §9 "Callback-injected policy/spawner
//! hooks": the spawner is required at construction rather than handed in
//! as an ad hoc closure).

use async_trait::async_trait;

/// Implemented by the spawner (`relay-spawner`); a wrapper never spawns or
/// terminates another wrapper itself.
#[async_trait]
pub trait SpawnController: Send + Sync {
    /// Dispatches `->relay:spawn <name> <cli> "<task>"`.
    async fn on_spawn(&self, name: &str, cli: &str, task: &str);

    /// Dispatches `->relay:release <name>`.
    async fn on_release(&self, name: &str);
}

/// No-op controller for tests and for wrappers that should not be able to
/// spawn sub-agents.
pub struct NoopSpawnController;

#[async_trait]
impl SpawnController for NoopSpawnController {
    async fn on_spawn(&self, _name: &str, _cli: &str, _task: &str) {}
    async fn on_release(&self, _name: &str) {}
}
