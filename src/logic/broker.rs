use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{BrokerError, BrokerResult};
use crate::logic::async_gate::AsyncGate;
use crate::logic::planner::PlannedResponse;
use crate::model::{
    string_field, Action, BehaviorConfig, BehaviorPatch, BindingLookup, ServiceInstance,
};
use crate::store::{BehaviorSource, BehaviorStore, InstanceRegistry};

pub fn instance_not_found(instance_id: &str) -> String {
    format!(
        "Broker could not find service instance by the given id {}",
        instance_id
    )
}

pub fn binding_not_found(instance_id: &str, binding_id: &str) -> String {
    format!(
        "Broker could not find service binding by the given id {} for service instance {}",
        binding_id, instance_id
    )
}

pub fn binding_of_other_instance(instance_id: &str, binding_id: &str) -> String {
    format!(
        "Service binding {} does not belong to service instance {}",
        binding_id, instance_id
    )
}

/// The broker's state and request semantics, independent of HTTP.
///
/// Every operation that touches instances or bindings holds the registry lock
/// for its whole read-resolve-mutate sequence, and always takes it before any
/// behavior lock, so a concurrent reset can never interleave with it.
/// Operations only plan responses; injected delays are served by the caller
/// after all locks are released.
#[derive(Debug)]
pub struct Broker {
    behaviors: BehaviorStore,
    registry: Mutex<InstanceRegistry>,
    instance_id: String,
}

impl Broker {
    pub fn new(source: Box<dyn BehaviorSource>) -> BrokerResult<Self> {
        Ok(Self {
            behaviors: BehaviorStore::new(source)?,
            registry: Mutex::new(InstanceRegistry::new()),
            instance_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Identity of this broker process, reported in diagnostics
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn catalog(&self) -> BrokerResult<PlannedResponse> {
        let spec = self.behaviors.resolve(Action::Catalog, None)?;
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn provision(
        &self,
        instance_id: &str,
        payload: Value,
        accepts_incomplete: bool,
    ) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let spec = self
            .behaviors
            .resolve(Action::Provision, string_field(&payload, "plan_id"))?;
        if let Some(rejection) = AsyncGate::screen(&spec, accepts_incomplete) {
            return Ok(rejection);
        }

        registry.create_instance(instance_id, payload);
        log::debug!("Provisioned service instance {}", instance_id);
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn fetch_instance(&self, instance_id: &str) -> BrokerResult<PlannedResponse> {
        let registry = self.registry.lock();
        let Some(instance) = registry.get_instance(instance_id) else {
            return Ok(PlannedResponse::message(404, instance_not_found(instance_id)));
        };

        let spec = self
            .behaviors
            .resolve(Action::FetchServiceInstance, instance.plan_id())?;
        Ok(PlannedResponse::merged_view(&instance.provision_data, &spec))
    }

    /// The behavior follows the plan the instance was provisioned with.
    pub fn update_instance(
        &self,
        instance_id: &str,
        payload: Value,
        accepts_incomplete: bool,
    ) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let plan_id = Self::instance_plan(&registry, instance_id);
        let spec = self.behaviors.resolve(Action::Update, plan_id.as_deref())?;
        if let Some(rejection) = AsyncGate::screen(&spec, accepts_incomplete) {
            return Ok(rejection);
        }

        if registry.update_instance(instance_id, &payload).is_none() {
            log::debug!("Update for unknown service instance {}", instance_id);
        }
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn deprovision(
        &self,
        instance_id: &str,
        accepts_incomplete: bool,
    ) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let plan_id = Self::instance_plan(&registry, instance_id);
        let spec = self
            .behaviors
            .resolve(Action::Deprovision, plan_id.as_deref())?;
        if let Some(rejection) = AsyncGate::screen(&spec, accepts_incomplete) {
            return Ok(rejection);
        }

        registry.delete_instance(instance_id);
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn instance_last_operation(&self, instance_id: &str) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let max = self.behaviors.max_instance_polls();
        let Some(state) = registry.increment_and_check_instance_poll(instance_id, max) else {
            return Ok(PlannedResponse::message(410, instance_not_found(instance_id)));
        };

        let plan_id = Self::instance_plan(&registry, instance_id);
        let spec = self.behaviors.resolve_poll(
            Action::FetchServiceInstanceLastOperation,
            plan_id.as_deref(),
            state,
        )?;
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        payload: Value,
        accepts_incomplete: bool,
    ) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let plan_id = string_field(&payload, "plan_id")
            .map(str::to_string)
            .or_else(|| Self::instance_plan(&registry, instance_id));
        let spec = self.behaviors.resolve(Action::Bind, plan_id.as_deref())?;
        if let Some(rejection) = AsyncGate::screen(&spec, accepts_incomplete) {
            return Ok(rejection);
        }

        registry.create_binding(instance_id, binding_id, payload);
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn fetch_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> BrokerResult<PlannedResponse> {
        let registry = self.registry.lock();
        let binding = match registry.get_binding(instance_id, binding_id) {
            BindingLookup::Found(binding) => binding,
            BindingLookup::WrongInstance => {
                return Ok(PlannedResponse::message(
                    404,
                    binding_of_other_instance(instance_id, binding_id),
                ));
            }
            BindingLookup::Missing => {
                return Ok(PlannedResponse::message(
                    404,
                    binding_not_found(instance_id, binding_id),
                ));
            }
        };

        let plan_id = registry.binding_plan_id(binding);
        let spec = self
            .behaviors
            .resolve(Action::FetchServiceBinding, plan_id.as_deref())?;
        Ok(PlannedResponse::merged_view(&binding.binding_data, &spec))
    }

    pub fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        accepts_incomplete: bool,
    ) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let plan_id = match registry.get_binding(instance_id, binding_id) {
            BindingLookup::Found(binding) => registry.binding_plan_id(binding),
            _ => None,
        };
        let spec = self.behaviors.resolve(Action::Unbind, plan_id.as_deref())?;
        if let Some(rejection) = AsyncGate::screen(&spec, accepts_incomplete) {
            return Ok(rejection);
        }

        registry.delete_binding(instance_id, binding_id);
        Ok(PlannedResponse::from_spec(&spec))
    }

    pub fn binding_last_operation(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> BrokerResult<PlannedResponse> {
        let mut registry = self.registry.lock();
        let max = self.behaviors.max_binding_polls();
        let Some(state) = registry.increment_and_check_binding_poll(instance_id, binding_id, max)
        else {
            return Ok(PlannedResponse::message(
                410,
                binding_not_found(instance_id, binding_id),
            ));
        };

        let plan_id = match registry.get_binding(instance_id, binding_id) {
            BindingLookup::Found(binding) => registry.binding_plan_id(binding),
            _ => None,
        };
        let spec = self.behaviors.resolve_poll(
            Action::FetchServiceBindingLastOperation,
            plan_id.as_deref(),
            state,
        )?;
        Ok(PlannedResponse::from_spec(&spec))
    }

    /// Behavior configuration without live instance state.
    pub fn config_snapshot(&self) -> BehaviorConfig {
        self.behaviors.snapshot()
    }

    /// Behavior configuration plus every instance and binding record.
    pub fn full_snapshot(&self) -> BrokerResult<Value> {
        let registry = self.registry.lock();
        let mut snapshot = serde_json::to_value(self.behaviors.snapshot())
            .map_err(|e| BrokerError::Internal(e.to_string()))?;
        let state =
            serde_json::to_value(&*registry).map_err(|e| BrokerError::Internal(e.to_string()))?;

        if let (Value::Object(snapshot_map), Value::Object(state_map)) = (&mut snapshot, state) {
            snapshot_map.extend(state_map);
        }
        Ok(snapshot)
    }

    pub fn merge_config(&self, patch: BehaviorPatch) -> BehaviorConfig {
        let merged = self.behaviors.merge(patch);
        log::info!("Merged new broker behaviors");
        merged
    }

    /// Reload behaviors from their source and forget every instance and binding.
    pub fn reset(&self) -> BrokerResult<BehaviorConfig> {
        let mut registry = self.registry.lock();
        let fresh = self.behaviors.reset()?;
        log::info!(
            "Cleared {} service instances and {} service bindings",
            registry.instance_count(),
            registry.binding_count()
        );
        registry.clear();
        Ok(fresh)
    }

    fn instance_plan(registry: &InstanceRegistry, instance_id: &str) -> Option<String> {
        registry
            .get_instance(instance_id)
            .and_then(ServiceInstance::plan_id)
            .map(str::to_string)
    }
}
