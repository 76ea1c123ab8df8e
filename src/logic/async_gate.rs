use serde_json::json;

use crate::logic::planner::PlannedResponse;
use crate::model::{ResponseBody, ResponseSpec};

pub const ASYNC_REQUIRED_STATUS: u16 = 422;
pub const ASYNC_REQUIRED_DESCRIPTION: &str =
    "This service plan requires client support for asynchronous service operations.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Reject,
}

/// Enforces `accepts_incomplete` for plans whose behavior is `async_only`.
///
/// Applies to provision, update, deprovision, bind and unbind.
pub struct AsyncGate;

impl AsyncGate {
    pub fn check(spec: &ResponseSpec, accepts_incomplete: bool) -> GateDecision {
        if spec.async_only && !accepts_incomplete {
            GateDecision::Reject
        } else {
            GateDecision::Allow
        }
    }

    /// Fixed 422 answer; configured behaviors never influence it.
    pub fn rejection() -> PlannedResponse {
        PlannedResponse::immediate(
            ASYNC_REQUIRED_STATUS,
            ResponseBody::Structured(json!({
                "error": "AsyncRequired",
                "description": ASYNC_REQUIRED_DESCRIPTION,
            })),
        )
    }

    /// The rejection to send instead of `spec`, if any.
    pub fn screen(spec: &ResponseSpec, accepts_incomplete: bool) -> Option<PlannedResponse> {
        match Self::check(spec, accepts_incomplete) {
            GateDecision::Allow => None,
            GateDecision::Reject => Some(Self::rejection()),
        }
    }
}
