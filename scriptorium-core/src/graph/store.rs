use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

use crate::errors::StoreError;

use super::memgraph::MemGraph;
use super::queries;
use super::similarity::name_ratio;
use super::types::{
    DeleteCounts, Entity, EntityConnections, KnowledgeGraph, PathSegment, RelatedEntity, Relation,
    SimilarName,
};
use super::{log, read_log};

struct Inner {
    snapshot: KnowledgeGraph,
    mem: Option<MemGraph>,
}

/// Entity/relation store kept in two redundant forms: the append-only
/// log on disk (source of truth across restarts) and an optional
/// in-memory multigraph serving traversal queries.
///
/// A single mutex serialises mutations and snapshotting reads. The log
/// is rewritten before the in-memory state is touched, so an I/O
/// failure leaves both forms at the prior state.
pub struct GraphStore {
    log_path: PathBuf,
    inner: Mutex<Inner>,
}

impl GraphStore {
    pub fn open(log_path: PathBuf, use_in_memory_graph: bool) -> Result<Self, StoreError> {
        let snapshot = read_log(&log_path)?;
        let mem = use_in_memory_graph.then(|| MemGraph::rebuild(&snapshot));

        Ok(GraphStore {
            log_path,
            inner: Mutex::new(Inner { snapshot, mem }),
        })
    }

    /// Insert entities whose names are not already present; returns the
    /// inserted subset.
    pub fn create_entities(&self, entities: Vec<Entity>) -> Result<Vec<Entity>, StoreError> {
        let mut inner = self.inner.lock();

        let mut next = inner.snapshot.clone();
        let mut added = Vec::new();
        for entity in entities {
            if next.entities.iter().any(|e| e.name == entity.name) {
                continue;
            }
            next.entities.push(entity.clone());
            added.push(entity);
        }

        if added.is_empty() {
            return Ok(added);
        }

        log::write_log(&self.log_path, &next)?;
        for entity in &added {
            if let Some(mem) = inner.mem.as_mut() {
                mem.add_entity(entity);
            }
        }
        inner.snapshot = next;
        Ok(added)
    }

    /// Insert relations whose tuple is new and whose endpoints exist;
    /// returns the inserted subset. Rows referencing missing entities
    /// are logged and skipped.
    pub fn create_relations(&self, relations: Vec<Relation>) -> Result<Vec<Relation>, StoreError> {
        let mut inner = self.inner.lock();

        let mut next = inner.snapshot.clone();
        let mut added = Vec::new();
        for relation in relations {
            let endpoints_exist = next.entities.iter().any(|e| e.name == relation.from)
                && next.entities.iter().any(|e| e.name == relation.to);
            if !endpoints_exist {
                warn!(
                    from = %relation.from,
                    to = %relation.to,
                    "skipping relation with missing endpoint"
                );
                continue;
            }
            if next.relations.contains(&relation) {
                continue;
            }
            next.relations.push(relation.clone());
            added.push(relation);
        }

        if added.is_empty() {
            return Ok(added);
        }

        log::write_log(&self.log_path, &next)?;
        for relation in &added {
            if let Some(mem) = inner.mem.as_mut() {
                mem.add_relation(relation);
            }
        }
        inner.snapshot = next;
        Ok(added)
    }

    /// Append observations to an entity, skipping ones already present;
    /// returns the observations actually added.
    pub fn add_observations(
        &self,
        entity_name: &str,
        contents: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();

        let mut next = inner.snapshot.clone();
        let entity = next
            .entities
            .iter_mut()
            .find(|e| e.name == entity_name)
            .ok_or_else(|| StoreError::not_found(format!("entity `{entity_name}`")))?;

        let mut added = Vec::new();
        for content in contents {
            if entity.observations.contains(content) || added.contains(content) {
                continue;
            }
            entity.observations.push(content.clone());
            added.push(content.clone());
        }
        let observations = entity.observations.clone();

        if added.is_empty() {
            return Ok(added);
        }

        log::write_log(&self.log_path, &next)?;
        if let Some(mem) = inner.mem.as_mut() {
            mem.set_observations(entity_name, observations);
        }
        inner.snapshot = next;
        Ok(added)
    }

    /// Remove entities and every incident edge.
    pub fn delete_entities(&self, names: &[String]) -> Result<DeleteCounts, StoreError> {
        let mut inner = self.inner.lock();

        let mut next = inner.snapshot.clone();
        let entities_before = next.entities.len();
        next.entities.retain(|e| !names.contains(&e.name));
        let entities_removed = entities_before - next.entities.len();

        let relations_before = next.relations.len();
        next.relations
            .retain(|r| !names.contains(&r.from) && !names.contains(&r.to));
        let relations_removed = relations_before - next.relations.len();

        let counts = DeleteCounts {
            entities_removed,
            relations_removed,
        };
        if entities_removed == 0 && relations_removed == 0 {
            return Ok(counts);
        }

        log::write_log(&self.log_path, &next)?;
        for name in names {
            if let Some(mem) = inner.mem.as_mut() {
                mem.remove_entity(name);
            }
        }
        inner.snapshot = next;
        Ok(counts)
    }

    /// Remove exactly the given edges; returns how many were removed.
    pub fn delete_relations(&self, relations: &[Relation]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();

        let mut next = inner.snapshot.clone();
        let before = next.relations.len();
        next.relations.retain(|r| !relations.contains(r));
        let removed = before - next.relations.len();

        if removed == 0 {
            return Ok(0);
        }

        log::write_log(&self.log_path, &next)?;
        for relation in relations {
            if let Some(mem) = inner.mem.as_mut() {
                mem.remove_relation(relation);
            }
        }
        inner.snapshot = next;
        Ok(removed)
    }

    pub fn search_nodes(&self, query: &str) -> KnowledgeGraph {
        let inner = self.inner.lock();
        queries::search_nodes(&inner.snapshot, query)
    }

    pub fn open_nodes(&self, names: &[String]) -> KnowledgeGraph {
        let inner = self.inner.lock();
        queries::open_nodes(&inner.snapshot, names)
    }

    pub fn get_full_graph(&self) -> KnowledgeGraph {
        self.inner.lock().snapshot.clone()
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        let inner = self.inner.lock();
        inner.snapshot.entities.iter().any(|e| e.name == name)
    }

    pub fn entity_connections(&self, name: &str) -> Result<EntityConnections, StoreError> {
        let inner = self.inner.lock();
        if !inner.snapshot.entities.iter().any(|e| e.name == name) {
            return Err(StoreError::not_found(format!("entity `{name}`")));
        }

        Ok(match inner.mem.as_ref() {
            Some(mem) => queries::connections(mem, name),
            None => queries::connections_from_snapshot(&inner.snapshot, name),
        })
    }

    pub fn related_entities(
        &self,
        name: &str,
        max_depth: usize,
    ) -> Result<Vec<RelatedEntity>, StoreError> {
        let inner = self.inner.lock();
        let mem = inner
            .mem
            .as_ref()
            .ok_or_else(|| StoreError::unavailable("in-memory graph is disabled"))?;
        if !mem.contains(name) {
            return Err(StoreError::not_found(format!("entity `{name}`")));
        }

        Ok(queries::related_entities(mem, name, max_depth))
    }

    pub fn find_paths(
        &self,
        from: &str,
        to: &str,
        max_length: usize,
    ) -> Result<Vec<Vec<PathSegment>>, StoreError> {
        let inner = self.inner.lock();
        let mem = inner
            .mem
            .as_ref()
            .ok_or_else(|| StoreError::unavailable("in-memory graph is disabled"))?;
        for name in [from, to] {
            if !mem.contains(name) {
                return Err(StoreError::not_found(format!("entity `{name}`")));
            }
        }

        Ok(queries::find_paths(mem, from, to, max_length))
    }

    /// All names whose case-folded similarity ratio meets `threshold`,
    /// most similar first.
    pub fn similar_names(&self, name: &str, threshold: f64) -> Vec<SimilarName> {
        let inner = self.inner.lock();

        let mut matches: Vec<SimilarName> = inner
            .snapshot
            .entities
            .iter()
            .filter_map(|entity| {
                let similarity = name_ratio(name, &entity.name);
                (similarity >= threshold).then(|| SimilarName {
                    name: entity.name.clone(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.name.cmp(&b.name))
        });
        matches
    }
}
