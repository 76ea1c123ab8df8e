pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{BrokerError, BrokerResult};
pub use logic::{AsyncGate, Broker, PlannedResponse, ResponsePlanner};
pub use model::*;
pub use store::{BehaviorSource, BehaviorStore, InstanceRegistry};

/// Build a broker from process configuration.
pub fn broker_from_config(config: &crate::config::AppConfig) -> anyhow::Result<Broker> {
    let source = crate::store::source_from_settings(&config.behaviors);
    let broker = Broker::new(source)?.with_instance_id(crate::config::broker_instance_id());
    Ok(broker)
}
