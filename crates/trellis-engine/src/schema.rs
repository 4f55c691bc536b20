//! JSON Schema generation for all public engine types.
//!
//! Only available when the `schemars` feature is enabled.

use schemars::{schema_for, JsonSchema};
use serde_json::Value;
use std::collections::BTreeMap;

/// Generate JSON Schema for a single type.
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).expect("schema serialization")
}

/// Generate all engine type schemas, keyed by type name.
pub fn all_schemas() -> BTreeMap<String, Value> {
    let mut schemas = BTreeMap::new();

    schemas.insert("GlobalError".into(), schema_of::<crate::GlobalError>());
    schemas.insert("Response".into(), schema_of::<crate::Response>());
    schemas.insert("Rendered".into(), schema_of::<crate::Rendered>());
    schemas.insert("RequestFacts".into(), schema_of::<crate::RequestFacts>());
    schemas.insert("FieldType".into(), schema_of::<crate::FieldType>());
    schemas.insert("FieldDef".into(), schema_of::<crate::FieldDef>());
    schemas.insert("NodeMeta".into(), schema_of::<crate::NodeMeta>());
    schemas.insert("StepKind".into(), schema_of::<crate::StepKind>());
    schemas.insert("StepDef".into(), schema_of::<crate::StepDef>());
    schemas.insert("GuardedSteps".into(), schema_of::<crate::GuardedSteps>());
    schemas.insert(
        "ConditionBranch".into(),
        schema_of::<crate::ConditionBranch>(),
    );
    schemas.insert("Element".into(), schema_of::<crate::Element>());
    schemas.insert("MethodMatch".into(), schema_of::<crate::MethodMatch>());
    schemas.insert("TriggerDef".into(), schema_of::<crate::TriggerDef>());
    schemas.insert("WorkflowDef".into(), schema_of::<crate::WorkflowDef>());
    schemas.insert("RunStatus".into(), schema_of::<crate::RunStatus>());
    schemas.insert("StepStatus".into(), schema_of::<crate::StepStatus>());
    schemas.insert("StepRecord".into(), schema_of::<crate::StepRecord>());
    schemas.insert("Execution".into(), schema_of::<crate::Execution>());

    schemas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_of_produces_valid_json_schema() {
        let schema = schema_of::<crate::WorkflowDef>();
        assert!(schema.is_object());
        let obj = schema.as_object().unwrap();
        assert!(obj.contains_key("title") || obj.contains_key("type") || obj.contains_key("$ref"));
    }

    #[test]
    fn all_schemas_non_empty() {
        let schemas = all_schemas();
        assert!(
            schemas.len() >= 15,
            "Expected at least 15 schemas, got {}",
            schemas.len()
        );
    }
}
