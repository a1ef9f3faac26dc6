pub const DEFAULT_ROOT_PATH: &str = "data/documents";
pub const DEFAULT_AUTHOR: &str = "Scriptorium";
pub const DEFAULT_EMAIL: &str = "scriptorium@local";
pub const DEFAULT_GRAPH_LOG: &str = "memory.jsonl";
pub const DEFAULT_USE_IN_MEMORY_GRAPH: bool = true;
pub const DEFAULT_SEMANTIC_INDEX_ENABLED: bool = false;
pub const DEFAULT_LARGE_CONTENT_THRESHOLD: usize = 100_000;

/// Prefix for environment overrides, e.g. `SCRIPTORIUM_ROOT_PATH`.
pub const ENV_PREFIX: &str = "SCRIPTORIUM_";
