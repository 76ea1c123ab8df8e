use crate::error::BrokerResult;
use crate::model::BehaviorConfig;

/// Where the startup behavior configuration comes from.
///
/// Consulted once at boot and again on every `/config/reset`.
pub trait BehaviorSource: Send + Sync {
    fn load(&self) -> BrokerResult<BehaviorConfig>;

    /// Human readable origin, used in logs and error messages
    fn describe(&self) -> String;
}
