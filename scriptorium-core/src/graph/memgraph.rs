use std::collections::HashMap;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use super::types::{Entity, KnowledgeGraph, Relation};

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeData {
    pub relation_type: String,
}

/// The in-memory form: a directed multigraph rebuilt from the log at
/// startup and kept in lockstep with it afterwards.
pub(crate) struct MemGraph {
    graph: StableDiGraph<NodeData, EdgeData>,
    names: HashMap<String, NodeIndex>,
}

impl MemGraph {
    pub fn rebuild(snapshot: &KnowledgeGraph) -> Self {
        let mut mem = MemGraph {
            graph: StableDiGraph::new(),
            names: HashMap::new(),
        };
        for entity in &snapshot.entities {
            mem.add_entity(entity);
        }
        for relation in &snapshot.relations {
            mem.add_relation(relation);
        }
        mem
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeData> {
        self.index_of(name).map(|ix| &self.graph[ix])
    }

    pub fn node_at(&self, ix: NodeIndex) -> &NodeData {
        &self.graph[ix]
    }

    pub fn add_entity(&mut self, entity: &Entity) {
        if self.names.contains_key(&entity.name) {
            return;
        }
        let ix = self.graph.add_node(NodeData {
            name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
            observations: entity.observations.clone(),
        });
        self.names.insert(entity.name.clone(), ix);
    }

    pub fn remove_entity(&mut self, name: &str) {
        if let Some(ix) = self.names.remove(name) {
            // incident edges go with the node
            self.graph.remove_node(ix);
        }
    }

    pub fn set_observations(&mut self, name: &str, observations: Vec<String>) {
        if let Some(ix) = self.index_of(name) {
            self.graph[ix].observations = observations;
        }
    }

    pub fn add_relation(&mut self, relation: &Relation) {
        let (Some(from), Some(to)) = (self.index_of(&relation.from), self.index_of(&relation.to))
        else {
            return;
        };
        self.graph.add_edge(
            from,
            to,
            EdgeData {
                relation_type: relation.relation_type.clone(),
            },
        );
    }

    pub fn remove_relation(&mut self, relation: &Relation) {
        let (Some(from), Some(to)) = (self.index_of(&relation.from), self.index_of(&relation.to))
        else {
            return;
        };
        let matching: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .filter(|edge| {
                edge.target() == to && edge.weight().relation_type == relation.relation_type
            })
            .map(|edge| edge.id())
            .collect();
        for edge in matching {
            self.graph.remove_edge(edge);
        }
    }

    /// Directed edges touching `name`: `(peer, relation_type)` pairs.
    pub fn edges_directed(&self, name: &str, direction: Direction) -> Vec<(String, String)> {
        let Some(ix) = self.index_of(name) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(ix, direction)
            .map(|edge| {
                let peer = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (
                    self.graph[peer].name.clone(),
                    edge.weight().relation_type.clone(),
                )
            })
            .collect()
    }

    /// Deduplicated undirected neighbours of `name`.
    pub fn neighbours(&self, name: &str) -> Vec<String> {
        let Some(ix) = self.index_of(name) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for peer in self
            .graph
            .neighbors_directed(ix, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(ix, Direction::Incoming))
        {
            let peer_name = self.graph[peer].name.as_str();
            if !seen.iter().any(|existing: &String| existing == peer_name) {
                seen.push(peer_name.to_string());
            }
        }
        seen
    }

    /// First recorded relation type on an edge `from -> to`, if any.
    pub fn relation_between(&self, from: &str, to: &str) -> Option<String> {
        let (from_ix, to_ix) = (self.index_of(from)?, self.index_of(to)?);
        self.graph
            .edges_directed(from_ix, Direction::Outgoing)
            .find(|edge| edge.target() == to_ix)
            .map(|edge| edge.weight().relation_type.clone())
    }

    pub(crate) fn inner(&self) -> &StableDiGraph<NodeData, EdgeData> {
        &self.graph
    }
}
