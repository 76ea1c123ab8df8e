use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::{deep_merge, BindingLookup, Id, PollState, ServiceBinding, ServiceInstance};

/// In-memory table of service instances and bindings.
///
/// Binding ids are broker-wide unique, so bindings are keyed by their own id
/// and carry the owning instance id for lookups.
#[derive(Debug, Default, Serialize)]
pub struct InstanceRegistry {
    service_instances: BTreeMap<Id, ServiceInstance>,
    service_bindings: BTreeMap<Id, ServiceBinding>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an instance; its poll counter starts over.
    pub fn create_instance(&mut self, id: &str, payload: Value) -> &ServiceInstance {
        let instance = ServiceInstance::new(id.to_string(), payload);
        self.service_instances.insert(id.to_string(), instance);
        &self.service_instances[id]
    }

    pub fn get_instance(&self, id: &str) -> Option<&ServiceInstance> {
        self.service_instances.get(id)
    }

    /// Merge `payload` into the stored provision data. No-op for unknown ids.
    pub fn update_instance(&mut self, id: &str, payload: &Value) -> Option<&ServiceInstance> {
        let instance = self.service_instances.get_mut(id)?;
        deep_merge(&mut instance.provision_data, payload);
        instance.poll_count = 0;
        Some(&*instance)
    }

    /// Flag an instance as deleted. The record stays retrievable.
    pub fn delete_instance(&mut self, id: &str) -> Option<&ServiceInstance> {
        let instance = self.service_instances.get_mut(id)?;
        instance.deleted = true;
        instance.poll_count = 0;
        Some(&*instance)
    }

    pub fn increment_and_check_instance_poll(&mut self, id: &str, max: u32) -> Option<PollState> {
        self.service_instances
            .get_mut(id)
            .map(|instance| instance.record_poll(max))
    }

    pub fn create_binding(
        &mut self,
        instance_id: &str,
        binding_id: &str,
        payload: Value,
    ) -> &ServiceBinding {
        let binding = ServiceBinding::new(binding_id.to_string(), instance_id.to_string(), payload);
        self.service_bindings.insert(binding_id.to_string(), binding);
        &self.service_bindings[binding_id]
    }

    pub fn get_binding(&self, instance_id: &str, binding_id: &str) -> BindingLookup<&ServiceBinding> {
        match self.service_bindings.get(binding_id) {
            Some(binding) if binding.instance_id == instance_id => BindingLookup::Found(binding),
            Some(_) => BindingLookup::WrongInstance,
            None => BindingLookup::Missing,
        }
    }

    /// Remove a binding owned by `instance_id`, returning the removed record.
    pub fn delete_binding(&mut self, instance_id: &str, binding_id: &str) -> Option<ServiceBinding> {
        match self.service_bindings.get(binding_id) {
            Some(binding) if binding.instance_id == instance_id => {
                self.service_bindings.remove(binding_id)
            }
            _ => None,
        }
    }

    pub fn increment_and_check_binding_poll(
        &mut self,
        instance_id: &str,
        binding_id: &str,
        max: u32,
    ) -> Option<PollState> {
        self.service_bindings
            .get_mut(binding_id)
            .filter(|binding| binding.instance_id == instance_id)
            .map(|binding| binding.record_poll(max))
    }

    /// Plan governing a binding: its own `plan_id`, else its instance's.
    pub fn binding_plan_id(&self, binding: &ServiceBinding) -> Option<String> {
        binding
            .plan_id()
            .or_else(|| {
                self.get_instance(&binding.instance_id)
                    .and_then(ServiceInstance::plan_id)
            })
            .map(str::to_string)
    }

    pub fn clear(&mut self) {
        self.service_instances.clear();
        self.service_bindings.clear();
    }

    pub fn instance_count(&self) -> usize {
        self.service_instances.len()
    }

    pub fn binding_count(&self) -> usize {
        self.service_bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_overwrites_and_resets_polls() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({"plan_id": "p"}));
        registry.increment_and_check_instance_poll("i-1", 1);
        assert_eq!(registry.get_instance("i-1").unwrap().poll_count, 1);

        registry.create_instance("i-1", json!({"plan_id": "q"}));
        let instance = registry.get_instance("i-1").unwrap();
        assert_eq!(instance.poll_count, 0);
        assert_eq!(instance.plan_id(), Some("q"));
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn test_update_merges_and_ignores_unknown_ids() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({"plan_id": "p", "parameters": {"a": 1}}));
        registry.increment_and_check_instance_poll("i-1", 1);

        let updated = registry
            .update_instance("i-1", &json!({"parameters": {"b": 2}}))
            .unwrap();
        assert_eq!(
            updated.provision_data,
            json!({"plan_id": "p", "parameters": {"a": 1, "b": 2}})
        );
        assert_eq!(updated.poll_count, 0);

        assert!(registry.update_instance("ghost", &json!({})).is_none());
        assert!(registry.get_instance("ghost").is_none());
    }

    #[test]
    fn test_delete_flags_and_keeps_record() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({"plan_id": "p"}));
        registry.increment_and_check_instance_poll("i-1", 5);

        registry.delete_instance("i-1");
        registry.delete_instance("i-1");
        let instance = registry.get_instance("i-1").unwrap();
        assert!(instance.deleted);
        assert_eq!(instance.poll_count, 0);
        assert!(registry.delete_instance("ghost").is_none());
    }

    #[test]
    fn test_instance_poll_sequence() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({}));

        let states: Vec<_> = (0..4)
            .map(|_| registry.increment_and_check_instance_poll("i-1", 2).unwrap())
            .collect();
        assert_eq!(
            states,
            vec![
                PollState::InProgress,
                PollState::InProgress,
                PollState::Finished,
                PollState::Finished
            ]
        );
        assert!(registry.increment_and_check_instance_poll("ghost", 2).is_none());
    }

    #[test]
    fn test_binding_lookup_distinguishes_owner() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({"plan_id": "p"}));
        registry.create_binding("i-1", "b-1", json!({}));

        assert!(matches!(registry.get_binding("i-1", "b-1"), BindingLookup::Found(_)));
        assert_eq!(registry.get_binding("i-2", "b-1"), BindingLookup::WrongInstance);
        assert_eq!(registry.get_binding("i-1", "b-2"), BindingLookup::Missing);

        assert!(registry.delete_binding("i-2", "b-1").is_none());
        assert!(registry.delete_binding("i-1", "b-1").is_some());
        assert_eq!(registry.get_binding("i-1", "b-1"), BindingLookup::Missing);
        assert_eq!(registry.binding_count(), 0);
    }

    #[test]
    fn test_binding_plan_falls_back_to_instance() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({"plan_id": "instance-plan"}));
        let inherited = registry.create_binding("i-1", "b-1", json!({})).clone();
        let explicit = registry
            .create_binding("i-1", "b-2", json!({"plan_id": "binding-plan"}))
            .clone();

        assert_eq!(registry.binding_plan_id(&inherited).as_deref(), Some("instance-plan"));
        assert_eq!(registry.binding_plan_id(&explicit).as_deref(), Some("binding-plan"));
    }

    #[test]
    fn test_clear_and_serialize() {
        let mut registry = InstanceRegistry::new();
        registry.create_instance("i-1", json!({"plan_id": "p"}));
        registry.create_binding("i-1", "b-1", json!({}));

        let rendered = serde_json::to_value(&registry).unwrap();
        assert_eq!(rendered["service_instances"]["i-1"]["deleted"], json!(false));
        assert_eq!(rendered["service_bindings"]["b-1"]["instance_id"], json!("i-1"));

        registry.clear();
        assert_eq!(registry.instance_count(), 0);
        assert_eq!(registry.binding_count(), 0);
    }
}
