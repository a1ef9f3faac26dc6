use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use serde_json::Map;

use super::memgraph::MemGraph;
use super::types::{
    ConnectionInfo, Entity, EntityConnections, KnowledgeGraph, PathSegment, RelatedEntity,
};

/// Entities whose name, type, or any observation contains `query`
/// (case-insensitive), plus the edges induced on that set.
pub(crate) fn search_nodes(snapshot: &KnowledgeGraph, query: &str) -> KnowledgeGraph {
    let needle = query.to_lowercase();

    let entities: Vec<Entity> = snapshot
        .entities
        .iter()
        .filter(|entity| {
            entity.name.to_lowercase().contains(&needle)
                || entity.entity_type.to_lowercase().contains(&needle)
                || entity
                    .observations
                    .iter()
                    .any(|obs| obs.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();

    induced(snapshot, entities)
}

/// The induced sub-graph over exactly the given names.
pub(crate) fn open_nodes(snapshot: &KnowledgeGraph, names: &[String]) -> KnowledgeGraph {
    let entities: Vec<Entity> = snapshot
        .entities
        .iter()
        .filter(|entity| names.iter().any(|name| *name == entity.name))
        .cloned()
        .collect();

    induced(snapshot, entities)
}

fn induced(snapshot: &KnowledgeGraph, entities: Vec<Entity>) -> KnowledgeGraph {
    let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    let relations = snapshot
        .relations
        .iter()
        .filter(|r| names.contains(r.from.as_str()) && names.contains(r.to.as_str()))
        .cloned()
        .collect();

    KnowledgeGraph {
        entities,
        relations,
    }
}

fn connection_info(entries: Vec<(String, String)>) -> Vec<ConnectionInfo> {
    entries
        .into_iter()
        .map(|(entity, relation_type)| ConnectionInfo {
            entity,
            relation_type,
            properties: Map::new(),
        })
        .collect()
}

pub(crate) fn connections(mem: &MemGraph, name: &str) -> EntityConnections {
    EntityConnections {
        entity: name.to_string(),
        incoming: connection_info(mem.edges_directed(name, Direction::Incoming)),
        outgoing: connection_info(mem.edges_directed(name, Direction::Outgoing)),
    }
}

/// Log-snapshot fallback for deployments running without the multigraph.
pub(crate) fn connections_from_snapshot(
    snapshot: &KnowledgeGraph,
    name: &str,
) -> EntityConnections {
    let incoming = snapshot
        .relations
        .iter()
        .filter(|r| r.to == name)
        .map(|r| (r.from.clone(), r.relation_type.clone()))
        .collect();
    let outgoing = snapshot
        .relations
        .iter()
        .filter(|r| r.from == name)
        .map(|r| (r.to.clone(), r.relation_type.clone()))
        .collect();

    EntityConnections {
        entity: name.to_string(),
        incoming: connection_info(incoming),
        outgoing: connection_info(outgoing),
    }
}

/// Undirected BFS out to `max_depth` hops. The start entity is
/// excluded; observations are truncated to the first three.
pub(crate) fn related_entities(
    mem: &MemGraph,
    name: &str,
    max_depth: usize,
) -> Vec<RelatedEntity> {
    let mut visited: HashSet<String> = HashSet::from([name.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(name.to_string(), 0)]);
    let mut related = Vec::new();

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for neighbour in mem.neighbours(&node) {
            if visited.insert(neighbour.clone()) {
                if let Some(data) = mem.node(&neighbour) {
                    related.push(RelatedEntity {
                        name: neighbour.clone(),
                        entity_type: data.entity_type.clone(),
                        observations: data.observations.iter().take(3).cloned().collect(),
                    });
                }
                queue.push_back((neighbour, depth + 1));
            }
        }
    }

    related
}

/// All simple paths `from -> to` of at most `max_length` edges, as
/// alternating entity/relation records.
pub(crate) fn find_paths(
    mem: &MemGraph,
    from: &str,
    to: &str,
    max_length: usize,
) -> Vec<Vec<PathSegment>> {
    let Some(from_ix) = mem.index_of(from) else {
        return Vec::new();
    };
    let Some(to_ix) = mem.index_of(to) else {
        return Vec::new();
    };

    if from == to {
        let node = mem.node_at(from_ix);
        return vec![vec![PathSegment::Entity {
            name: node.name.clone(),
            entity_type: node.entity_type.clone(),
        }]];
    }
    if max_length == 0 {
        return Vec::new();
    }

    // Parallel edges make the neighbour walk revisit the same node
    // sequence; keep each sequence once.
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for node_path in petgraph::algo::all_simple_paths::<Vec<_>, _>(
        mem.inner(),
        from_ix,
        to_ix,
        0,
        Some(max_length - 1),
    ) {
        if !seen.insert(node_path.clone()) {
            continue;
        }

        let mut segments = Vec::with_capacity(node_path.len() * 2 - 1);
        for (i, ix) in node_path.iter().enumerate() {
            let node = mem.node_at(*ix);
            segments.push(PathSegment::Entity {
                name: node.name.clone(),
                entity_type: node.entity_type.clone(),
            });

            if i + 1 < node_path.len() {
                let next = mem.node_at(node_path[i + 1]);
                let relation_type = mem
                    .relation_between(&node.name, &next.name)
                    .unwrap_or_else(|| "related_to".to_string());
                segments.push(PathSegment::Relation {
                    from: node.name.clone(),
                    to: next.name.clone(),
                    relation_type,
                });
            }
        }
        paths.push(segments);
    }

    paths
}
