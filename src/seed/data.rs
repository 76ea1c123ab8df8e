use crate::model::BehaviorConfig;

/// Behavior document shipped with the broker, used when no other source is configured.
pub const DEFAULT_BEHAVIORS: &str = include_str!("data.json");

/// Plan answered synchronously by the default document.
pub const FAKE_PLAN_ID: &str = "f52eabf8-e38d-422f-8ef9-9dc83b75cc05";

/// Plan whose mutating operations are `async_only` in the default document.
pub const FAKE_ASYNC_PLAN_ID: &str = "0a3e2f43-8e4f-4e68-9a0f-2f5a7c1d8b11";

pub fn default_behaviors() -> Result<BehaviorConfig, serde_json::Error> {
    BehaviorConfig::from_json(DEFAULT_BEHAVIORS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Behavior};

    #[test]
    fn test_async_plan_is_async_only_for_mutations() {
        let config = default_behaviors().unwrap();
        for action in [
            Action::Provision,
            Action::Update,
            Action::Deprovision,
            Action::Bind,
            Action::Unbind,
        ] {
            match config.behaviors.lookup(action, Some(FAKE_ASYNC_PLAN_ID)).unwrap() {
                Behavior::Respond(spec) => {
                    assert!(spec.async_only, "{} should be async only", action);
                    assert_eq!(spec.status, 202);
                }
                other => panic!("unexpected behavior {:?}", other),
            }
            match config.behaviors.lookup(action, Some(FAKE_PLAN_ID)).unwrap() {
                Behavior::Respond(spec) => assert!(!spec.async_only),
                other => panic!("unexpected behavior {:?}", other),
            }
        }
    }

    #[test]
    fn test_catalog_lists_both_plans() {
        let config = default_behaviors().unwrap();
        let rendered = serde_json::to_value(&config).unwrap();
        let plans = &rendered["behaviors"]["catalog"]["body"]["services"][0]["plans"];
        let ids: Vec<_> = plans
            .as_array()
            .unwrap()
            .iter()
            .map(|plan| plan["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec![FAKE_PLAN_ID.to_string(), FAKE_ASYNC_PLAN_ID.to_string()]);
    }
}
