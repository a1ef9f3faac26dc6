use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::StoreError;

use super::types::{KnowledgeGraph, LogRecord};

/// Read the newline-delimited log into a graph snapshot. A missing file
/// is an empty graph; blank lines are skipped.
pub fn read_log(path: &Path) -> Result<KnowledgeGraph, StoreError> {
    if !path.exists() {
        return Ok(KnowledgeGraph::default());
    }

    let raw = fs::read_to_string(path)?;
    let mut graph = KnowledgeGraph::default();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = serde_json::from_str(line).map_err(|err| {
            StoreError::internal(format!("corrupt graph log line `{line}`: {err}"))
        })?;
        match record {
            LogRecord::Entity(entity) => graph.entities.push(entity),
            LogRecord::Relation(relation) => graph.relations.push(relation),
        }
    }

    Ok(graph)
}

/// Rewrite the whole log: temp file in the same directory, fsync, then
/// rename over the old file so readers never observe a partial write.
pub fn write_log(path: &Path, graph: &KnowledgeGraph) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut lines = Vec::with_capacity(graph.entities.len() + graph.relations.len());
    for entity in &graph.entities {
        lines.push(serde_json::to_string(&LogRecord::Entity(entity.clone()))?);
    }
    for relation in &graph.relations {
        lines.push(serde_json::to_string(&LogRecord::Relation(relation.clone()))?);
    }

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(lines.join("\n").as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|err| StoreError::internal(format!("failed to swap graph log: {err}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::types::{Entity, Relation};
    use super::*;

    #[test]
    fn missing_log_reads_as_empty_graph() {
        let dir = tempfile::TempDir::new().unwrap();
        let graph = read_log(&dir.path().join("memory.jsonl")).unwrap();
        assert!(graph.entities.is_empty());
        assert!(graph.relations.is_empty());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memory.jsonl");

        let mut graph = KnowledgeGraph::default();
        graph.entities.push(Entity::new("a", "thing"));
        graph.entities.push(Entity::with_observations(
            "b",
            "thing",
            vec!["seen once".to_string()],
        ));
        graph.relations.push(Relation::new("a", "b", "points_at"));

        write_log(&path, &graph).unwrap();
        assert_eq!(read_log(&path).unwrap(), graph);

        // a rewrite replaces, not appends
        graph.relations.clear();
        write_log(&path, &graph).unwrap();
        assert_eq!(read_log(&path).unwrap(), graph);
    }

    #[test]
    fn blank_lines_are_tolerated() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memory.jsonl");
        std::fs::write(
            &path,
            "\n{\"type\":\"entity\",\"name\":\"a\",\"entity_type\":\"thing\"}\n\n",
        )
        .unwrap();

        let graph = read_log(&path).unwrap();
        assert_eq!(graph.entities.len(), 1);
    }

    #[test]
    fn corrupt_lines_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memory.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        assert!(read_log(&path).is_err());
    }
}
