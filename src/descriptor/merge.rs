//! Copying generic deployment settings from a base descriptor.
//!
//! # Responsibilities
//! - Expose base descriptor fields by name (`FieldSource`)
//! - Copy each generic target field present in the base with the same kind
//! - Record every field that could not be copied
//!
//! # Design Decisions
//! - Target fields are a static table of (name, kind, setter)
//! - A missing or mistyped field is skipped and logged, never fatal
//! - Base fields with no target counterpart are ignored
//! - The session manager factory is shared by reference, everything else by value

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::descriptor::types::{InMemorySessionManagerFactory, SharedSessionManagerFactory};

/// Kind of a mergeable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Str,
    Int,
    Bool,
    SessionManagerFactory,
    Float,
    Array,
    Table,
    Datetime,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::Str => "string",
            FieldKind::Int => "integer",
            FieldKind::Bool => "boolean",
            FieldKind::SessionManagerFactory => "session manager factory",
            FieldKind::Float => "float",
            FieldKind::Array => "array",
            FieldKind::Table => "table",
            FieldKind::Datetime => "datetime",
        })
    }
}

/// A field value read from a base descriptor.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    SessionManagerFactory(SharedSessionManagerFactory),
    /// Present in the base, but of a kind no target field accepts.
    Other(FieldKind),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Str(_) => FieldKind::Str,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::SessionManagerFactory(_) => FieldKind::SessionManagerFactory,
            FieldValue::Other(kind) => *kind,
        }
    }
}

/// Read-only, by-name access to a base descriptor's fields.
///
/// `None` means the base has no such field.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// A table from a config file can act as a base descriptor.
impl FieldSource for toml::Table {
    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match self.get(name)? {
            toml::Value::String(s) => FieldValue::Str(s.clone()),
            toml::Value::Integer(i) => FieldValue::Int(*i),
            toml::Value::Boolean(b) => FieldValue::Bool(*b),
            toml::Value::Float(_) => FieldValue::Other(FieldKind::Float),
            toml::Value::Array(_) => FieldValue::Other(FieldKind::Array),
            toml::Value::Table(_) => FieldValue::Other(FieldKind::Table),
            toml::Value::Datetime(_) => FieldValue::Other(FieldKind::Datetime),
        })
    }
}

/// Why a field was not copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The base has no field by that name.
    Missing,
    /// The base field exists with a different kind.
    KindMismatch { expected: FieldKind, found: FieldKind },
}

/// A target field left untouched by a merge.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("merge skipped field `{field}`: {}", describe_reason(.reason))]
pub struct MergeFieldSkipped {
    pub field: &'static str,
    #[serde(flatten)]
    pub reason: SkipReason,
}

fn describe_reason(reason: &SkipReason) -> String {
    match reason {
        SkipReason::Missing => "not present in base".to_string(),
        SkipReason::KindMismatch { expected, found } => {
            format!("expected {}, found {}", expected, found)
        }
    }
}

/// Outcome of a merge; partial success is normal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub copied: Vec<&'static str>,
    pub skipped: Vec<MergeFieldSkipped>,
}

/// Generic (non-SIP) deployment settings carried by an application descriptor.
#[derive(Debug, Clone)]
pub struct DeploymentSettings {
    pub deployment_name: String,
    pub display_name: Option<String>,
    pub context_path: String,
    /// Seconds; 0 or less disables expiry.
    pub default_session_timeout: i64,
    pub distributable: bool,
    pub session_manager_factory: SharedSessionManagerFactory,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            deployment_name: String::new(),
            display_name: None,
            context_path: "/".to_string(),
            default_session_timeout: 30 * 60,
            distributable: false,
            session_manager_factory: Arc::new(InMemorySessionManagerFactory),
        }
    }
}

struct FieldSlot {
    name: &'static str,
    kind: FieldKind,
    apply: fn(&mut DeploymentSettings, FieldValue),
}

const FIELDS: &[FieldSlot] = &[
    FieldSlot {
        name: "deployment_name",
        kind: FieldKind::Str,
        apply: |s, v| {
            if let FieldValue::Str(v) = v {
                s.deployment_name = v;
            }
        },
    },
    FieldSlot {
        name: "display_name",
        kind: FieldKind::Str,
        apply: |s, v| {
            if let FieldValue::Str(v) = v {
                s.display_name = Some(v);
            }
        },
    },
    FieldSlot {
        name: "context_path",
        kind: FieldKind::Str,
        apply: |s, v| {
            if let FieldValue::Str(v) = v {
                s.context_path = v;
            }
        },
    },
    FieldSlot {
        name: "default_session_timeout",
        kind: FieldKind::Int,
        apply: |s, v| {
            if let FieldValue::Int(v) = v {
                s.default_session_timeout = v;
            }
        },
    },
    FieldSlot {
        name: "distributable",
        kind: FieldKind::Bool,
        apply: |s, v| {
            if let FieldValue::Bool(v) = v {
                s.distributable = v;
            }
        },
    },
    FieldSlot {
        name: "session_manager_factory",
        kind: FieldKind::SessionManagerFactory,
        apply: |s, v| {
            if let FieldValue::SessionManagerFactory(v) = v {
                s.session_manager_factory = v;
            }
        },
    },
];

impl DeploymentSettings {
    /// Names of the fields a merge can copy.
    pub fn field_names() -> impl Iterator<Item = &'static str> {
        FIELDS.iter().map(|f| f.name)
    }

    /// Copy every field present in `base` with a matching kind.
    pub fn merge_from(&mut self, base: &dyn FieldSource) -> MergeReport {
        let mut report = MergeReport::default();
        for slot in FIELDS {
            let reason = match base.field(slot.name) {
                Some(value) if value.kind() == slot.kind => {
                    (slot.apply)(self, value);
                    report.copied.push(slot.name);
                    continue;
                }
                Some(value) => SkipReason::KindMismatch {
                    expected: slot.kind,
                    found: value.kind(),
                },
                None => SkipReason::Missing,
            };

            let skipped = MergeFieldSkipped { field: slot.name, reason };
            match skipped.reason {
                SkipReason::Missing => tracing::debug!(field = slot.name, "{}", skipped),
                SkipReason::KindMismatch { .. } => tracing::warn!(field = slot.name, "{}", skipped),
            }
            report.skipped.push(skipped);
        }
        report
    }
}

/// The generic base deployment descriptor built by the host container.
#[derive(Debug, Clone, Default)]
pub struct DeploymentInfo {
    pub deployment_name: String,
    pub display_name: Option<String>,
    pub context_path: Option<String>,
    pub default_session_timeout: Option<i64>,
    pub distributable: bool,
    pub session_manager_factory: Option<SharedSessionManagerFactory>,
}

impl FieldSource for DeploymentInfo {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "deployment_name" => Some(FieldValue::Str(self.deployment_name.clone())),
            "display_name" => self.display_name.clone().map(FieldValue::Str),
            "context_path" => self.context_path.clone().map(FieldValue::Str),
            "default_session_timeout" => self.default_session_timeout.map(FieldValue::Int),
            "distributable" => Some(FieldValue::Bool(self.distributable)),
            "session_manager_factory" => self
                .session_manager_factory
                .clone()
                .map(FieldValue::SessionManagerFactory),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::types::SessionManagerFactory;

    #[derive(Debug)]
    struct ReplicatedFactory;

    impl SessionManagerFactory for ReplicatedFactory {
        fn name(&self) -> &str {
            "replicated"
        }
    }

    #[test]
    fn test_copies_matching_int_field() {
        let mut settings = DeploymentSettings::default();
        let mut base = toml::Table::new();
        base.insert("default_session_timeout".into(), toml::Value::Integer(600));

        let report = settings.merge_from(&base);
        assert_eq!(settings.default_session_timeout, 600);
        assert!(report.copied.contains(&"default_session_timeout"));
    }

    #[test]
    fn test_missing_field_leaves_target_untouched() {
        let mut settings = DeploymentSettings::default();
        settings.default_session_timeout = 120;

        let mut base = toml::Table::new();
        for name in DeploymentSettings::field_names() {
            if name != "default_session_timeout" && name != "session_manager_factory" {
                base.insert(name.into(), toml::Value::String("x".into()));
            }
        }
        base.insert("distributable".into(), toml::Value::Boolean(true));

        let report = settings.merge_from(&base);
        assert_eq!(settings.default_session_timeout, 120);
        let missing: Vec<_> = report
            .skipped
            .iter()
            .filter(|s| s.field == "default_session_timeout")
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].reason, SkipReason::Missing);
    }

    #[test]
    fn test_kind_mismatch_is_skipped_not_fatal() {
        let mut settings = DeploymentSettings::default();
        let mut base = toml::Table::new();
        base.insert("distributable".into(), toml::Value::String("yes".into()));
        base.insert("context_path".into(), toml::Value::String("/conf".into()));

        let report = settings.merge_from(&base);
        assert!(!settings.distributable);
        assert_eq!(settings.context_path, "/conf");
        assert!(report.skipped.contains(&MergeFieldSkipped {
            field: "distributable",
            reason: SkipReason::KindMismatch {
                expected: FieldKind::Bool,
                found: FieldKind::Str,
            },
        }));
    }

    #[test]
    fn test_unsupported_toml_kind_is_a_mismatch() {
        let mut settings = DeploymentSettings::default();
        let base: toml::Table = toml::from_str(
            r#"
            default_session_timeout = 600.0
            context_path = ["/a", "/b"]
            "#,
        )
        .unwrap();

        let report = settings.merge_from(&base);
        assert_eq!(settings.default_session_timeout, 30 * 60);
        assert_eq!(settings.context_path, "/");
        assert!(report.skipped.contains(&MergeFieldSkipped {
            field: "default_session_timeout",
            reason: SkipReason::KindMismatch {
                expected: FieldKind::Int,
                found: FieldKind::Float,
            },
        }));
        assert!(report.skipped.contains(&MergeFieldSkipped {
            field: "context_path",
            reason: SkipReason::KindMismatch {
                expected: FieldKind::Str,
                found: FieldKind::Array,
            },
        }));
    }

    #[test]
    fn test_session_factory_is_shared_by_reference() {
        let factory: SharedSessionManagerFactory = Arc::new(ReplicatedFactory);
        let base = DeploymentInfo {
            deployment_name: "conf.war".into(),
            session_manager_factory: Some(factory.clone()),
            ..Default::default()
        };

        let mut settings = DeploymentSettings::default();
        let report = settings.merge_from(&base);

        assert!(Arc::ptr_eq(&settings.session_manager_factory, &factory));
        assert_eq!(settings.deployment_name, "conf.war");
        assert_eq!(settings.context_path, "/");
        assert_eq!(
            report.copied,
            vec!["deployment_name", "distributable", "session_manager_factory"]
        );
        assert_eq!(report.skipped.len(), 3);
    }

    #[test]
    fn test_skip_message() {
        let skipped = MergeFieldSkipped {
            field: "distributable",
            reason: SkipReason::KindMismatch { expected: FieldKind::Bool, found: FieldKind::Int },
        };
        assert_eq!(
            skipped.to_string(),
            "merge skipped field `distributable`: expected boolean, found integer"
        );
    }
}
