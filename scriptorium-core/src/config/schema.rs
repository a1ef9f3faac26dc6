use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Recognised settings and their effects.
///
/// `graph_log_path` is resolved relative to `root_path` when it is not
/// absolute, so the default layout keeps the log file next to the
/// documents it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where documents live; created (and initialised as a repository)
    /// on first open.
    pub root_path: PathBuf,
    /// Commit identity used when the caller does not override it.
    pub default_author: String,
    pub default_email: String,
    /// Append-only entity/relation log.
    pub graph_log_path: PathBuf,
    /// Enables the in-memory multigraph form of the graph store.
    pub use_in_memory_graph: bool,
    /// Attempts to construct the embedding model at startup; failure
    /// leaves the semantic index disabled.
    pub semantic_index_enabled: bool,
    /// Informational marker for callers that chunk large payloads.
    pub large_content_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            root_path: PathBuf::from(defaults::DEFAULT_ROOT_PATH),
            default_author: defaults::DEFAULT_AUTHOR.to_string(),
            default_email: defaults::DEFAULT_EMAIL.to_string(),
            graph_log_path: PathBuf::from(defaults::DEFAULT_GRAPH_LOG),
            use_in_memory_graph: defaults::DEFAULT_USE_IN_MEMORY_GRAPH,
            semantic_index_enabled: defaults::DEFAULT_SEMANTIC_INDEX_ENABLED,
            large_content_threshold: defaults::DEFAULT_LARGE_CONTENT_THRESHOLD,
        }
    }
}

impl Settings {
    /// The graph log location with relative paths anchored at the root.
    pub fn resolved_graph_log_path(&self) -> PathBuf {
        if self.graph_log_path.is_absolute() {
            self.graph_log_path.clone()
        } else {
            self.root_path.join(&self.graph_log_path)
        }
    }
}
