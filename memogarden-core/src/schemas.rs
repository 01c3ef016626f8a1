//! Bundled schema resources: SQL bootstrap scripts and JSON type
//! schemas, with a development fallback to the files beside the source
//! tree.

use std::path::PathBuf;

use crate::config::runtime::Layer;
use crate::errors::{GardenResult, MemoGardenError, StorageError};

/// Which family of type schemas to look in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCategory {
    Facts,
    Entities,
}

impl SchemaCategory {
    fn dir_name(self) -> &'static str {
        match self {
            SchemaCategory::Facts => "facts",
            SchemaCategory::Entities => "entities",
        }
    }
}

static SOIL_SQL: &str = include_str!("../schemas/sql/soil.sql");
static CORE_SQL: &str = include_str!("../schemas/sql/core.sql");

static FACT_SCHEMAS: &[(&str, &str)] = &[
    ("fact", include_str!("../schemas/types/facts/fact.schema.json")),
    ("Note", include_str!("../schemas/types/facts/Note.schema.json")),
    (
        "Message",
        include_str!("../schemas/types/facts/Message.schema.json"),
    ),
    (
        "Email",
        include_str!("../schemas/types/facts/Email.schema.json"),
    ),
    (
        "ToolCall",
        include_str!("../schemas/types/facts/ToolCall.schema.json"),
    ),
    (
        "EntityDelta",
        include_str!("../schemas/types/facts/EntityDelta.schema.json"),
    ),
    (
        "SystemEvent",
        include_str!("../schemas/types/facts/SystemEvent.schema.json"),
    ),
    (
        "ArtifactDelta",
        include_str!("../schemas/types/facts/ArtifactDelta.schema.json"),
    ),
];

static ENTITY_SCHEMAS: &[(&str, &str)] = &[
    (
        "entity",
        include_str!("../schemas/types/entities/entity.schema.json"),
    ),
    (
        "Transaction",
        include_str!("../schemas/types/entities/Transaction.schema.json"),
    ),
    (
        "Recurrence",
        include_str!("../schemas/types/entities/Recurrence.schema.json"),
    ),
    (
        "Artifact",
        include_str!("../schemas/types/entities/Artifact.schema.json"),
    ),
    (
        "ConversationLog",
        include_str!("../schemas/types/entities/ConversationLog.schema.json"),
    ),
    (
        "Scope",
        include_str!("../schemas/types/entities/Scope.schema.json"),
    ),
    (
        "View",
        include_str!("../schemas/types/entities/View.schema.json"),
    ),
];

/// SQL bootstrap script for a database layer.
pub fn get_sql_schema(layer: Layer) -> &'static str {
    match layer {
        Layer::Soil => SOIL_SQL,
        Layer::Core => CORE_SQL,
    }
}

/// JSON schema for a named type. Bundled resources first, then a
/// filesystem fallback beside the source tree.
pub fn get_type_schema(
    category: SchemaCategory,
    type_name: &str,
) -> GardenResult<serde_json::Value> {
    let bundled = bundle_for(category)
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, src)| *src);

    let text = match bundled {
        Some(src) => src.to_string(),
        None => {
            let path = dev_schema_path(category, type_name);
            std::fs::read_to_string(&path).map_err(|_| {
                MemoGardenError::not_found(
                    "type schema",
                    format!("{}/{type_name}", category.dir_name()),
                )
            })?
        }
    };

    serde_json::from_str(&text).map_err(|e| {
        StorageError::Serialization {
            message: format!("schema {type_name}: {e}"),
        }
        .into()
    })
}

/// Names of every available type schema in a category.
pub fn list_type_schemas(category: SchemaCategory) -> Vec<&'static str> {
    bundle_for(category).iter().map(|(name, _)| *name).collect()
}

fn bundle_for(category: SchemaCategory) -> &'static [(&'static str, &'static str)] {
    match category {
        SchemaCategory::Facts => FACT_SCHEMAS,
        SchemaCategory::Entities => ENTITY_SCHEMAS,
    }
}

fn dev_schema_path(category: SchemaCategory, type_name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("schemas/types")
        .join(category.dir_name())
        .join(format!("{type_name}.schema.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_schemas_declare_the_current_version() {
        assert!(get_sql_schema(Layer::Soil).contains("20260130"));
        assert!(get_sql_schema(Layer::Core).contains("20260130"));
    }

    #[test]
    fn type_schema_lookup_and_shape() {
        let schema = get_type_schema(SchemaCategory::Entities, "Scope").unwrap();
        assert_eq!(schema["title"], "Scope");
        assert!(schema.get("$schema").is_some());
        assert!(schema.get("allOf").is_some() || schema.get("properties").is_some());
    }

    #[test]
    fn unknown_type_schema_is_not_found() {
        let err = get_type_schema(SchemaCategory::Facts, "Hologram").unwrap_err();
        assert!(matches!(err, MemoGardenError::NotFound { .. }));
    }

    #[test]
    fn listings_include_known_types() {
        let entities = list_type_schemas(SchemaCategory::Entities);
        assert!(entities.contains(&"Scope"));
        assert!(entities.contains(&"Transaction"));
        let facts = list_type_schemas(SchemaCategory::Facts);
        assert!(facts.contains(&"Email"));
        assert!(facts.contains(&"ArtifactDelta"));
    }
}
