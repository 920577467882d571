//! A single mapping rule: handler name plus match expression.

use serde::{Deserialize, Serialize};

use crate::routing::matcher::{MatchExpression, Matcher};
use crate::sip::SipRequest;

/// Routes requests matching `pattern` to the handler named `handler`.
///
/// The handler name is not checked against the registry on construction;
/// rules may be loaded before their handlers are registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    handler: String,
    pattern: MatchExpression,
}

impl MappingRule {
    pub fn new(handler: impl Into<String>, pattern: MatchExpression) -> Self {
        Self {
            handler: handler.into(),
            pattern,
        }
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn pattern(&self) -> &MatchExpression {
        &self.pattern
    }

    pub fn matches(&self, req: &SipRequest) -> bool {
        self.pattern.matches(req)
    }

    pub fn describe(&self) -> String {
        self.pattern.describe()
    }
}
