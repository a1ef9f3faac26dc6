use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named node. Names are globally unique, case-sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
}

impl Entity {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, entity_type: T) -> Self {
        Entity {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
        }
    }

    pub fn with_observations<N, T>(name: N, entity_type: T, observations: Vec<String>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Entity {
            name: name.into(),
            entity_type: entity_type.into(),
            observations,
        }
    }
}

/// A directed typed edge. The `(from, to, relation_type)` tuple is
/// unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl Relation {
    pub fn new<F, T, R>(from: F, to: T, relation_type: R) -> Self
    where
        F: Into<String>,
        T: Into<String>,
        R: Into<String>,
    {
        Relation {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// One line of the on-disk log. Self-describing via the `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRecord {
    Entity(Entity),
    Relation(Relation),
}

/// Counts returned by `delete_entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCounts {
    pub entities_removed: usize,
    pub relations_removed: usize,
}

/// One neighbour in `entity_connections` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub entity: String,
    pub relation_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConnections {
    pub entity: String,
    pub incoming: Vec<ConnectionInfo>,
    pub outgoing: Vec<ConnectionInfo>,
}

/// A neighbour returned by `related_entities`; observations truncated
/// to the first three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

/// Alternating entity/relation records making up one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathSegment {
    Entity {
        name: String,
        entity_type: String,
    },
    Relation {
        from: String,
        to: String,
        relation_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarName {
    pub name: String,
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_records_match_the_line_grammar() {
        let entity = LogRecord::Entity(Entity::with_observations(
            "tag:rust",
            "tag",
            vec!["Document tag: rust".to_string()],
        ));
        assert_eq!(
            serde_json::to_string(&entity).unwrap(),
            r#"{"type":"entity","name":"tag:rust","entity_type":"tag","observations":["Document tag: rust"]}"#
        );

        let relation = LogRecord::Relation(Relation::new("a", "b", "tagged_with"));
        assert_eq!(
            serde_json::to_string(&relation).unwrap(),
            r#"{"type":"relation","from":"a","to":"b","relation_type":"tagged_with"}"#
        );

        let parsed: LogRecord =
            serde_json::from_str(r#"{"type":"entity","name":"x","entity_type":"thing"}"#).unwrap();
        match parsed {
            LogRecord::Entity(e) => {
                assert_eq!(e.name, "x");
                assert!(e.observations.is_empty());
            }
            LogRecord::Relation(_) => panic!("expected entity record"),
        }
    }
}
