use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BrokerError, BrokerResult};

/// Plan selector used when no plan-specific behavior matches.
pub const DEFAULT_PLAN: &str = "default";

/// Every broker operation whose response can be reprogrammed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Catalog,
    Provision,
    Update,
    Deprovision,
    Bind,
    Unbind,
    FetchServiceInstance,
    FetchServiceBinding,
    FetchServiceInstanceLastOperation,
    FetchServiceBindingLastOperation,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Catalog => "catalog",
            Action::Provision => "provision",
            Action::Update => "update",
            Action::Deprovision => "deprovision",
            Action::Bind => "bind",
            Action::Unbind => "unbind",
            Action::FetchServiceInstance => "fetch_service_instance",
            Action::FetchServiceBinding => "fetch_service_binding",
            Action::FetchServiceInstanceLastOperation => "fetch_service_instance_last_operation",
            Action::FetchServiceBindingLastOperation => "fetch_service_binding_last_operation",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a configured response carries as its body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Serialized as JSON on the way out
    Structured(Value),
    /// Sent verbatim, including the empty string
    Raw(String),
    Empty,
}

/// A single programmable response: status, injected delay and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResponseSpecRepr", into = "ResponseSpecRepr")]
pub struct ResponseSpec {
    pub status: u16,
    pub sleep_seconds: f64,
    pub body: ResponseBody,
    /// Reject callers that do not send `accepts_incomplete=true`
    pub async_only: bool,
}

/// Wire shape of [`ResponseSpec`]; `body` and `raw_body` are mutually exclusive.
#[derive(Serialize, Deserialize)]
struct ResponseSpecRepr {
    status: u16,
    #[serde(default)]
    sleep_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_body: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    async_only: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TryFrom<ResponseSpecRepr> for ResponseSpec {
    type Error = String;

    fn try_from(repr: ResponseSpecRepr) -> Result<Self, Self::Error> {
        if !(100..=999).contains(&repr.status) {
            return Err(format!("status {} is not a valid HTTP status", repr.status));
        }
        if Duration::try_from_secs_f64(repr.sleep_seconds).is_err() {
            return Err(format!(
                "sleep_seconds must be a non-negative number of seconds a timer can hold, got {}",
                repr.sleep_seconds
            ));
        }

        let body = match (repr.body, repr.raw_body) {
            (Some(_), Some(_)) => {
                return Err("a response sets both body and raw_body".to_string());
            }
            (Some(value), None) => ResponseBody::Structured(value),
            (None, Some(raw)) => ResponseBody::Raw(raw),
            (None, None) => ResponseBody::Empty,
        };

        Ok(Self {
            status: repr.status,
            sleep_seconds: repr.sleep_seconds,
            body,
            async_only: repr.async_only,
        })
    }
}

impl From<ResponseSpec> for ResponseSpecRepr {
    fn from(spec: ResponseSpec) -> Self {
        let (body, raw_body) = match spec.body {
            ResponseBody::Structured(value) => (Some(value), None),
            ResponseBody::Raw(raw) => (None, Some(raw)),
            ResponseBody::Empty => (None, None),
        };
        Self {
            status: spec.status,
            sleep_seconds: spec.sleep_seconds,
            body,
            raw_body,
            async_only: spec.async_only,
        }
    }
}

impl ResponseSpec {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            sleep_seconds: 0.0,
            body,
            async_only: false,
        }
    }

    pub fn with_sleep(mut self, seconds: f64) -> Self {
        self.sleep_seconds = seconds;
        self
    }

    pub fn async_only(mut self) -> Self {
        self.async_only = true;
        self
    }

    /// Injected delay. Values beyond what a `Duration` holds wait forever.
    pub fn delay(&self) -> Duration {
        if self.sleep_seconds > 0.0 {
            Duration::try_from_secs_f64(self.sleep_seconds).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

/// Where an asynchronous operation stands for a polling caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    InProgress,
    Finished,
}

/// Last-operation behavior: one response while in progress, another once finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSpec {
    pub in_progress: ResponseSpec,
    pub finished: ResponseSpec,
}

impl PollSpec {
    pub fn for_state(&self, state: PollState) -> &ResponseSpec {
        match state {
            PollState::InProgress => &self.in_progress,
            PollState::Finished => &self.finished,
        }
    }
}

/// Behaviors of one action keyed by plan id, with `"default"` as fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanBehaviors<T>(BTreeMap<String, T>);

impl<T> Default for PlanBehaviors<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> PlanBehaviors<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Plan-specific entry when one exists, otherwise the default entry.
    pub fn select(&self, plan_id: Option<&str>) -> Option<&T> {
        plan_id
            .and_then(|id| self.0.get(id))
            .or_else(|| self.0.get(DEFAULT_PLAN))
    }

    pub fn insert(&mut self, plan_id: impl Into<String>, behavior: T) {
        self.0.insert(plan_id.into(), behavior);
    }

    /// Incoming plan entries replace existing ones wholesale.
    pub fn merge(&mut self, incoming: PlanBehaviors<T>) {
        self.0.extend(incoming.0);
    }
}

/// A behavior resolved for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior<'a> {
    Respond(&'a ResponseSpec),
    Poll(&'a PollSpec),
}

/// The per-action behavior table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Behaviors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub provision: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub update: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub deprovision: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub bind: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub unbind: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub fetch_service_instance: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub fetch_service_binding: PlanBehaviors<ResponseSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub fetch_service_instance_last_operation: PlanBehaviors<PollSpec>,
    #[serde(default, skip_serializing_if = "PlanBehaviors::is_empty")]
    pub fetch_service_binding_last_operation: PlanBehaviors<PollSpec>,
}

impl Behaviors {
    /// Resolve the behavior for `action`, preferring the `plan_id` entry.
    ///
    /// Catalog has no plan dimension. A missing action or a missing default
    /// entry is a configuration error.
    pub fn lookup(&self, action: Action, plan_id: Option<&str>) -> BrokerResult<Behavior<'_>> {
        let plans = match action {
            Action::Catalog => {
                return self
                    .catalog
                    .as_ref()
                    .map(Behavior::Respond)
                    .ok_or_else(|| BrokerError::missing_action(action.as_str()));
            }
            Action::FetchServiceInstanceLastOperation => {
                return select(action, &self.fetch_service_instance_last_operation, plan_id)
                    .map(Behavior::Poll);
            }
            Action::FetchServiceBindingLastOperation => {
                return select(action, &self.fetch_service_binding_last_operation, plan_id)
                    .map(Behavior::Poll);
            }
            Action::Provision => &self.provision,
            Action::Update => &self.update,
            Action::Deprovision => &self.deprovision,
            Action::Bind => &self.bind,
            Action::Unbind => &self.unbind,
            Action::FetchServiceInstance => &self.fetch_service_instance,
            Action::FetchServiceBinding => &self.fetch_service_binding,
        };
        select(action, plans, plan_id).map(Behavior::Respond)
    }

    /// Overlay `incoming` action by action; plan entries replace wholesale.
    pub fn merge(&mut self, incoming: Behaviors) {
        if incoming.catalog.is_some() {
            self.catalog = incoming.catalog;
        }
        self.provision.merge(incoming.provision);
        self.update.merge(incoming.update);
        self.deprovision.merge(incoming.deprovision);
        self.bind.merge(incoming.bind);
        self.unbind.merge(incoming.unbind);
        self.fetch_service_instance.merge(incoming.fetch_service_instance);
        self.fetch_service_binding.merge(incoming.fetch_service_binding);
        self.fetch_service_instance_last_operation
            .merge(incoming.fetch_service_instance_last_operation);
        self.fetch_service_binding_last_operation
            .merge(incoming.fetch_service_binding_last_operation);
    }
}

fn select<'a, T>(
    action: Action,
    plans: &'a PlanBehaviors<T>,
    plan_id: Option<&str>,
) -> BrokerResult<&'a T> {
    if plans.is_empty() {
        return Err(BrokerError::missing_action(action.as_str()));
    }
    plans
        .select(plan_id)
        .ok_or_else(|| BrokerError::missing_default(action.as_str()))
}

fn default_max_fetch_requests() -> u32 {
    1
}

/// Process-wide broker behavior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub behaviors: Behaviors,
    /// Polls answered "in progress" before an instance operation finishes
    #[serde(default = "default_max_fetch_requests")]
    pub max_fetch_service_instance_requests: u32,
    /// Polls answered "in progress" before a binding operation finishes
    #[serde(default = "default_max_fetch_requests")]
    pub max_fetch_service_binding_requests: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            behaviors: Behaviors::default(),
            max_fetch_service_instance_requests: default_max_fetch_requests(),
            max_fetch_service_binding_requests: default_max_fetch_requests(),
        }
    }
}

/// A partial configuration posted to `/config`.
///
/// Unknown top-level keys (such as live instance state copied from
/// `/config/all`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BehaviorPatch {
    #[serde(default)]
    pub behaviors: Behaviors,
    #[serde(default)]
    pub max_fetch_service_instance_requests: Option<u32>,
    #[serde(default)]
    pub max_fetch_service_binding_requests: Option<u32>,
}

impl BehaviorConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn apply(&mut self, patch: BehaviorPatch) {
        self.behaviors.merge(patch.behaviors);
        if let Some(max) = patch.max_fetch_service_instance_requests {
            self.max_fetch_service_instance_requests = max;
        }
        if let Some(max) = patch.max_fetch_service_binding_requests {
            self.max_fetch_service_binding_requests = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> BehaviorConfig {
        serde_json::from_value(json!({
            "behaviors": {
                "catalog": {"status": 200, "sleep_seconds": 0, "body": {"services": []}},
                "provision": {
                    "default": {"status": 201, "sleep_seconds": 0, "body": {}},
                    "async-plan": {"status": 202, "sleep_seconds": 0, "body": {}, "async_only": true}
                },
                "fetch_service_instance_last_operation": {
                    "default": {
                        "in_progress": {"status": 200, "sleep_seconds": 0, "body": {"state": "in progress"}},
                        "finished": {"status": 200, "sleep_seconds": 0, "body": {"state": "succeeded"}}
                    }
                },
                "update": {
                    "only-plan": {"status": 200, "sleep_seconds": 0, "raw_body": ""}
                }
            },
            "max_fetch_service_instance_requests": 3
        }))
        .unwrap()
    }

    #[test]
    fn test_plan_specific_entry_wins() {
        let config = sample_config();
        match config.behaviors.lookup(Action::Provision, Some("async-plan")).unwrap() {
            Behavior::Respond(spec) => {
                assert_eq!(spec.status, 202);
                assert!(spec.async_only);
            }
            other => panic!("unexpected behavior {:?}", other),
        }
    }

    #[test]
    fn test_unknown_or_missing_plan_falls_back_to_default() {
        let config = sample_config();
        for plan in [Some("no-such-plan"), None] {
            match config.behaviors.lookup(Action::Provision, plan).unwrap() {
                Behavior::Respond(spec) => assert_eq!(spec.status, 201),
                other => panic!("unexpected behavior {:?}", other),
            }
        }
    }

    #[test]
    fn test_catalog_ignores_plan() {
        let config = sample_config();
        match config.behaviors.lookup(Action::Catalog, Some("async-plan")).unwrap() {
            Behavior::Respond(spec) => {
                assert_eq!(spec.body, ResponseBody::Structured(json!({"services": []})))
            }
            other => panic!("unexpected behavior {:?}", other),
        }
    }

    #[test]
    fn test_poll_actions_resolve_to_poll_specs() {
        let config = sample_config();
        match config
            .behaviors
            .lookup(Action::FetchServiceInstanceLastOperation, Some("anything"))
            .unwrap()
        {
            Behavior::Poll(poll) => {
                assert_eq!(
                    poll.for_state(PollState::Finished).body,
                    ResponseBody::Structured(json!({"state": "succeeded"}))
                );
            }
            other => panic!("unexpected behavior {:?}", other),
        }
    }

    #[test]
    fn test_missing_action_and_missing_default_are_config_errors() {
        let config = sample_config();

        let err = config.behaviors.lookup(Action::Bind, None).unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
        assert_eq!(err.to_string(), "Could not find behavior for bind");

        assert!(config.behaviors.lookup(Action::Update, Some("only-plan")).is_ok());
        let err = config.behaviors.lookup(Action::Update, Some("other")).unwrap_err();
        assert_eq!(err.to_string(), "Could not find default behavior for update");
    }

    #[test]
    fn test_body_variants() {
        let raw: ResponseSpec =
            serde_json::from_value(json!({"status": 200, "raw_body": ""})).unwrap();
        assert_eq!(raw.body, ResponseBody::Raw(String::new()));
        assert_eq!(raw.sleep_seconds, 0.0);
        assert!(!raw.async_only);

        let empty: ResponseSpec =
            serde_json::from_value(json!({"status": 204, "body": null})).unwrap();
        assert_eq!(empty.body, ResponseBody::Empty);

        let both = serde_json::from_value::<ResponseSpec>(
            json!({"status": 200, "body": {}, "raw_body": "x"}),
        );
        assert!(both.is_err());
    }

    #[test]
    fn test_invalid_status_and_sleep_rejected() {
        assert!(serde_json::from_value::<ResponseSpec>(json!({"status": 42})).is_err());
        assert!(serde_json::from_value::<ResponseSpec>(
            json!({"status": 200, "sleep_seconds": -1.0})
        )
        .is_err());
        assert!(serde_json::from_value::<ResponseSpec>(
            json!({"status": 200, "sleep_seconds": 1e300})
        )
        .is_err());
    }

    #[test]
    fn test_delay_never_truncates() {
        let spec = ResponseSpec::new(200, ResponseBody::Empty);
        assert_eq!(spec.delay(), Duration::ZERO);
        assert_eq!(spec.clone().with_sleep(1.5).delay(), Duration::from_millis(1500));
        assert_eq!(spec.with_sleep(1e300).delay(), Duration::MAX);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = serde_json::from_value::<BehaviorConfig>(json!({
            "behaviors": {"provison": {"default": {"status": 201}}}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_max_fetch_requests_default_to_one() {
        let config = sample_config();
        assert_eq!(config.max_fetch_service_instance_requests, 3);
        assert_eq!(config.max_fetch_service_binding_requests, 1);
    }

    #[test]
    fn test_apply_patch_replaces_plan_entries_wholesale() {
        let mut config = sample_config();
        let patch: BehaviorPatch = serde_json::from_value(json!({
            "behaviors": {
                "provision": {
                    "default": {"status": 200, "raw_body": "ok"},
                    "new-plan": {"status": 500, "body": {"description": "boom"}}
                }
            },
            "max_fetch_service_binding_requests": 4,
            "service_instances": {"ignored": true}
        }))
        .unwrap();
        config.apply(patch);

        match config.behaviors.lookup(Action::Provision, None).unwrap() {
            Behavior::Respond(spec) => {
                assert_eq!(spec.status, 200);
                assert_eq!(spec.body, ResponseBody::Raw("ok".to_string()));
            }
            other => panic!("unexpected behavior {:?}", other),
        }
        // Untouched plans and actions survive
        assert!(config.behaviors.lookup(Action::Provision, Some("async-plan")).is_ok());
        assert!(config.behaviors.catalog.is_some());
        assert_eq!(config.max_fetch_service_instance_requests, 3);
        assert_eq!(config.max_fetch_service_binding_requests, 4);
    }

    #[test]
    fn test_serialized_config_reparses_identically() {
        let config = sample_config();
        let rendered = serde_json::to_string_pretty(&config).unwrap();
        let reparsed = BehaviorConfig::from_json(&rendered).unwrap();
        assert_eq!(config, reparsed);
        assert!(!rendered.contains("\"async_only\": false"));
    }
}
