use parking_lot::RwLock;

use crate::error::{BrokerError, BrokerResult};
use crate::model::{Action, Behavior, BehaviorConfig, BehaviorPatch, PollState, ResponseSpec};
use crate::store::traits::BehaviorSource;

/// Holds the live behavior configuration.
///
/// Lookups take a shared lock; merge and reset take the exclusive lock for the
/// whole replacement.
pub struct BehaviorStore {
    current: RwLock<BehaviorConfig>,
    source: Box<dyn BehaviorSource>,
}

impl BehaviorStore {
    pub fn new(source: Box<dyn BehaviorSource>) -> BrokerResult<Self> {
        let initial = source.load()?;
        log::info!("Loaded broker behaviors from {}", source.describe());
        Ok(Self {
            current: RwLock::new(initial),
            source,
        })
    }

    /// Resolve a single-response action for `plan_id` (or the default).
    pub fn resolve(&self, action: Action, plan_id: Option<&str>) -> BrokerResult<ResponseSpec> {
        let current = self.current.read();
        match current.behaviors.lookup(action, plan_id)? {
            Behavior::Respond(spec) => Ok(spec.clone()),
            Behavior::Poll(_) => Err(BrokerError::Config(format!(
                "{} is a last-operation behavior and needs a poll state",
                action
            ))),
        }
    }

    /// Resolve the `in_progress` or `finished` half of a last-operation action.
    pub fn resolve_poll(
        &self,
        action: Action,
        plan_id: Option<&str>,
        state: PollState,
    ) -> BrokerResult<ResponseSpec> {
        let current = self.current.read();
        match current.behaviors.lookup(action, plan_id)? {
            Behavior::Poll(poll) => Ok(poll.for_state(state).clone()),
            Behavior::Respond(_) => Err(BrokerError::Config(format!(
                "{} is not a last-operation behavior",
                action
            ))),
        }
    }

    pub fn max_instance_polls(&self) -> u32 {
        self.current.read().max_fetch_service_instance_requests
    }

    pub fn max_binding_polls(&self) -> u32 {
        self.current.read().max_fetch_service_binding_requests
    }

    /// Merge a partial configuration and return the merged result.
    pub fn merge(&self, patch: BehaviorPatch) -> BehaviorConfig {
        let mut current = self.current.write();
        current.apply(patch);
        current.clone()
    }

    /// Reload from the source as at startup. A failed reload keeps the current
    /// configuration.
    pub fn reset(&self) -> BrokerResult<BehaviorConfig> {
        let mut current = self.current.write();
        let fresh = self.source.load()?;
        *current = fresh.clone();
        log::info!("Reset broker behaviors from {}", self.source.describe());
        Ok(fresh)
    }

    pub fn snapshot(&self) -> BehaviorConfig {
        self.current.read().clone()
    }
}

impl std::fmt::Debug for BehaviorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorStore")
            .field("source", &self.source.describe())
            .finish()
    }
}
