mod log;
mod memgraph;
mod queries;
mod similarity;
mod store;
mod types;

pub use log::{read_log, write_log};
pub use similarity::name_ratio;
pub use store::GraphStore;
pub use types::{
    ConnectionInfo, DeleteCounts, Entity, EntityConnections, KnowledgeGraph, LogRecord,
    PathSegment, RelatedEntity, Relation, SimilarName,
};
