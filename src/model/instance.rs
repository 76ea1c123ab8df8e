use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::value::string_field;
use crate::model::PollState;

pub type Id = String;

/// Poll counters advance on every last-operation fetch.
fn poll_state(poll_count: u32, max_in_progress: u32) -> PollState {
    if poll_count > max_in_progress {
        PollState::Finished
    } else {
        PollState::InProgress
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: Id,
    /// Payload of the provision request, merged with later updates
    pub provision_data: Value,
    pub poll_count: u32,
    pub deleted: bool,
}

impl ServiceInstance {
    pub fn new(id: Id, provision_data: Value) -> Self {
        Self {
            id,
            provision_data,
            poll_count: 0,
            deleted: false,
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        string_field(&self.provision_data, "plan_id")
    }

    pub fn record_poll(&mut self, max_in_progress: u32) -> PollState {
        self.poll_count = self.poll_count.saturating_add(1);
        poll_state(self.poll_count, max_in_progress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub id: Id,
    /// Owning instance; a lookup key only
    pub instance_id: Id,
    pub binding_data: Value,
    pub poll_count: u32,
}

impl ServiceBinding {
    pub fn new(id: Id, instance_id: Id, binding_data: Value) -> Self {
        Self {
            id,
            instance_id,
            binding_data,
            poll_count: 0,
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        string_field(&self.binding_data, "plan_id")
    }

    pub fn record_poll(&mut self, max_in_progress: u32) -> PollState {
        self.poll_count = self.poll_count.saturating_add(1);
        poll_state(self.poll_count, max_in_progress)
    }
}

/// Outcome of looking a binding up under a specific instance.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingLookup<T> {
    Found(T),
    /// The binding exists but belongs to another instance
    WrongInstance,
    Missing,
}
