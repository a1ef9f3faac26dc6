//! The orchestrator owning the write path across the version store,
//! document index, knowledge graph, and semantic index.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::config::Settings;
use crate::contracts::{
    CreateDocumentRequest, DocumentContent, DocumentDiff, DocumentSummary, DocumentType,
    DocumentVersion, DocumentView, UpdateDocumentRequest,
};
use crate::errors::StoreError;
use crate::frontmatter::{self, Frontmatter};
use crate::graph::{Entity, GraphStore, Relation};
use crate::index::{DocumentIndex, DocumentRecord};
use crate::semantic::{Embedder, SemanticIndex, TrigramEmbedder};
use crate::vcs;

const PREVIEW_LENGTH: usize = 500;
const VERSION_SCAN_DEPTH: usize = 100;

const README_SEED: &str = "# Document Storage\n\n\
This directory contains documents managed by the scriptorium document\n\
service. It holds manuscripts, documentation, datasets, scraped web\n\
pages, and generic content, each versioned through the repository\n\
history.\n";

fn now_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

fn generate_id(now: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("doc_{now}_{}", &suffix[..8])
}

fn sanitize_source_url(url: &str) -> String {
    url.replace("://", "_").replace('/', "_")
}

pub struct DocumentStore {
    settings: Settings,
    root: PathBuf,
    index: DocumentIndex,
    graph: GraphStore,
    semantic: SemanticIndex,
    doc_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentStore {
    /// Open the store, bootstrapping the root on first use: one
    /// subdirectory per document type, a seeded README committed as the
    /// repository's first document revision, and the index, graph, and
    /// vector directories.
    pub fn open(settings: Settings) -> Result<Self, StoreError> {
        let embedder: Option<Box<dyn Embedder>> = settings
            .semantic_index_enabled
            .then(|| Box::new(TrigramEmbedder::new()) as Box<dyn Embedder>);
        Self::open_with_embedder(settings, embedder)
    }

    /// Same as `open`, with the embedding model supplied by the caller.
    pub fn open_with_embedder(
        settings: Settings,
        embedder: Option<Box<dyn Embedder>>,
    ) -> Result<Self, StoreError> {
        let root = settings.root_path.clone();
        fs::create_dir_all(&root)?;

        vcs::open(&root, &settings.default_author, &settings.default_email)?;

        for doc_type in DocumentType::ALL {
            fs::create_dir_all(root.join(doc_type.as_str()))?;
        }

        let readme = root.join("README.md");
        if !readme.exists() {
            fs::write(&readme, README_SEED)?;
            vcs::stage(&root, &["README.md"])?;
            vcs::commit(
                &root,
                "Initialize document repository",
                &settings.default_author,
                &settings.default_email,
            )?;
        }

        let index = DocumentIndex::open(root.join(".index"))?;
        let graph = GraphStore::open(
            settings.resolved_graph_log_path(),
            settings.use_in_memory_graph,
        )?;
        let semantic = SemanticIndex::open(root.join(".vectors"), embedder)?;

        Ok(DocumentStore {
            settings,
            root,
            index,
            graph,
            semantic,
            doc_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Graph surface; tag and source entities created during syncs are
    /// queried through here.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn semantic(&self) -> &SemanticIndex {
        &self.semantic
    }

    // Serialises writers to the same document id.
    fn doc_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.doc_locks
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    fn record_for(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        self.index
            .get(id)?
            .ok_or_else(|| StoreError::not_found(format!("document `{id}`")))
    }

    fn primitive_metadata(metadata: &Map<String, Value>) -> Map<String, Value> {
        metadata
            .iter()
            .filter(|(_, value)| frontmatter::is_primitive(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn create(&self, req: CreateDocumentRequest) -> Result<DocumentView, StoreError> {
        if req.title.trim().is_empty() {
            return Err(StoreError::invalid("title must not be empty"));
        }

        let now = now_seconds();
        let id = generate_id(now);
        let lock = self.doc_lock(&id);
        let _guard = lock.lock();

        let fm = Frontmatter {
            title: req.title.clone(),
            created_at: now,
            updated_at: now,
            id: id.clone(),
            document_type: req.document_type,
            tags: req.tags.clone(),
            source_url: req.source_url.clone(),
            metadata: Self::primitive_metadata(&req.metadata),
        };
        let full = frontmatter::render(&fm, &req.content);

        let rel_path = format!("{}/{id}.md", req.document_type);
        let doc_path = self.root.join(&rel_path);
        if let Some(parent) = doc_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&doc_path, &full)?;

        let record = DocumentRecord {
            id: id.clone(),
            title: req.title.clone(),
            document_type: req.document_type,
            created_at: now,
            updated_at: now,
            tags: req.tags,
            metadata: req.metadata,
            size_bytes: full.len() as u64,
            source_url: req.source_url,
            path: rel_path.clone(),
        };
        self.index.put(&record)?;

        vcs::stage(&self.root, &[rel_path.as_str()])?;
        vcs::commit(
            &self.root,
            &format!("Created document: {}", req.title),
            &self.settings.default_author,
            &self.settings.default_email,
        )?;

        if let Err(err) = self.sync_graph(&record) {
            warn!(id = %id, %err, "graph sync failed; document write succeeded");
        }
        if let Err(err) = self.semantic.index(&id, &req.content) {
            warn!(id = %id, %err, "embedding failed; document stays searchable via the index");
        }

        self.get(&id)
    }

    pub fn update(
        &self,
        id: &str,
        req: UpdateDocumentRequest,
    ) -> Result<DocumentView, StoreError> {
        let lock = self.doc_lock(id);
        let _guard = lock.lock();

        let record = self.record_for(id)?;

        // Advisory only: a missing log must not fail the update.
        if let Some(expected) = &req.expected_version {
            match vcs::log(&self.root, 1, Some(&record.path)) {
                Ok(entries) => {
                    if let Some(newest) = entries.first()
                        && newest.id != *expected
                    {
                        return Err(StoreError::conflict(
                            "document has been modified since you loaded it; refresh and retry",
                        ));
                    }
                }
                Err(err) => warn!(id, %err, "version check skipped"),
            }
        }

        let doc_path = self.root.join(&record.path);
        let current = fs::read_to_string(&doc_path)
            .map_err(|_| StoreError::not_found(format!("document file `{}`", record.path)))?;
        let (mut fm, existing_body) = frontmatter::parse(&current)?;

        let now = now_seconds();
        fm.updated_at = now;
        if let Some(title) = &req.title {
            fm.title = title.clone();
        }
        if let Some(tags) = &req.tags {
            fm.tags = tags.clone();
        }
        if let Some(metadata) = &req.metadata {
            for (key, value) in Self::primitive_metadata(metadata) {
                fm.metadata.insert(key, value);
            }
        }

        let body_changed = req.content.is_some();
        let body = req.content.clone().unwrap_or(existing_body);
        let full = frontmatter::render(&fm, &body);
        fs::write(&doc_path, &full)?;

        let mut patch = Map::new();
        patch.insert("updated_at".to_string(), json!(now));
        patch.insert("size_bytes".to_string(), json!(full.len() as u64));
        if let Some(title) = &req.title {
            patch.insert("title".to_string(), json!(title));
        }
        if let Some(tags) = &req.tags {
            patch.insert("tags".to_string(), json!(tags));
        }
        if let Some(metadata) = &req.metadata {
            let mut merged = record.metadata.clone();
            for (key, value) in metadata {
                merged.insert(key.clone(), value.clone());
            }
            patch.insert("metadata".to_string(), Value::Object(merged));
        }
        self.index.upsert(id, Value::Object(patch))?;

        vcs::stage(&self.root, &[record.path.as_str()])?;
        let message = req.commit_message.as_deref().unwrap_or("Updated document");
        match vcs::commit(
            &self.root,
            message,
            &self.settings.default_author,
            &self.settings.default_email,
        ) {
            Ok(_) => {}
            // an update that changes nothing should not fail the caller
            Err(StoreError::PreconditionFailed(_)) => {
                warn!(id, "update produced no changes to commit");
            }
            Err(err) => return Err(err),
        }

        match self.index.get(id)? {
            Some(updated) => {
                if let Err(err) = self.sync_graph(&updated) {
                    warn!(id, %err, "graph sync failed; document write succeeded");
                }
            }
            None => warn!(id, "index record vanished during update"),
        }

        if body_changed
            && let Err(err) = self.semantic.index(id, &body)
        {
            warn!(id, %err, "re-embedding failed; document stays searchable via the index");
        }

        self.get(id)
    }

    pub fn get(&self, id: &str) -> Result<DocumentView, StoreError> {
        let record = self.record_for(id)?;

        let doc_path = self.root.join(&record.path);
        let full = fs::read_to_string(&doc_path)
            .map_err(|_| StoreError::not_found(format!("document file `{}`", record.path)))?;
        let body = frontmatter::strip(&full);

        let mut preview: String = body.chars().take(PREVIEW_LENGTH).collect();
        if body.chars().count() > PREVIEW_LENGTH {
            preview.push_str("...");
        }

        let version_count = match vcs::log(&self.root, VERSION_SCAN_DEPTH, Some(&record.path)) {
            Ok(entries) if !entries.is_empty() => entries.len(),
            _ => 1,
        };

        Ok(DocumentView {
            id: record.id,
            title: record.title,
            document_type: record.document_type,
            created_at: record.created_at,
            updated_at: record.updated_at,
            tags: record.tags,
            metadata: record.metadata,
            content_preview: preview,
            size_bytes: record.size_bytes,
            version_count,
            content_available: true,
            source_url: record.source_url,
        })
    }

    /// Body without frontmatter, from the working tree or from a given
    /// revision.
    pub fn get_content(
        &self,
        id: &str,
        revision: Option<&str>,
    ) -> Result<DocumentContent, StoreError> {
        let record = self.record_for(id)?;

        let full = match revision {
            Some(revision) => vcs::show(&self.root, &record.path, revision)?,
            None => fs::read_to_string(self.root.join(&record.path))
                .map_err(|_| StoreError::not_found(format!("document file `{}`", record.path)))?,
        };

        Ok(DocumentContent {
            id: record.id,
            title: record.title,
            content: frontmatter::strip(&full).to_string(),
            revision: revision.map(str::to_string),
        })
    }

    pub fn list_versions(
        &self,
        id: &str,
        max_versions: usize,
    ) -> Result<Vec<DocumentVersion>, StoreError> {
        let record = self.record_for(id)?;
        let entries = vcs::log(&self.root, max_versions, Some(&record.path))?;

        Ok(entries
            .into_iter()
            .map(|entry| DocumentVersion {
                revision: entry.id,
                message: entry.message,
                author: entry.author,
                timestamp: entry.timestamp,
            })
            .collect())
    }

    /// Scan the index records. A record passes when the type matches
    /// (if given), every requested tag is present, and a non-empty
    /// query appears in the title or the body.
    pub fn search(
        &self,
        query: &str,
        doc_type: Option<DocumentType>,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();

        for record in self.index.scan()? {
            if results.len() >= limit {
                break;
            }
            if let Some(wanted) = doc_type
                && record.document_type != wanted
            {
                continue;
            }
            if !tags.iter().all(|tag| record.tags.contains(tag)) {
                continue;
            }

            if !needle.is_empty() {
                let title_hit = record.title.to_lowercase().contains(&needle);
                let body_hit = !title_hit
                    && fs::read_to_string(self.root.join(&record.path))
                        .map(|full| frontmatter::strip(&full).to_lowercase().contains(&needle))
                        .unwrap_or(false);
                if !title_hit && !body_hit {
                    continue;
                }
            }

            results.push(DocumentSummary {
                id: record.id,
                title: record.title,
                document_type: record.document_type,
                created_at: record.created_at,
                updated_at: record.updated_at,
                tags: record.tags,
                metadata: record.metadata,
                size_bytes: record.size_bytes,
                source_url: record.source_url,
            });
        }

        Ok(results)
    }

    /// Top-k documents by vector similarity; `Unavailable` when the
    /// embedding model is absent.
    pub fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<DocumentView>, StoreError> {
        let hits = self.semantic.search(query, k)?;

        let mut views = Vec::with_capacity(hits.len());
        for (doc_id, _score) in hits {
            match self.get(&doc_id) {
                Ok(view) => views.push(view),
                Err(err) if err.is_not_found() => {
                    warn!(doc_id = %doc_id, "vector without index record; skipping")
                }
                Err(err) => return Err(err),
            }
        }
        Ok(views)
    }

    pub fn diff(
        &self,
        id: &str,
        from_revision: &str,
        to_revision: Option<&str>,
    ) -> Result<DocumentDiff, StoreError> {
        let record = self.record_for(id)?;
        let to = to_revision.unwrap_or("HEAD");
        let patch = vcs::diff_between(&self.root, from_revision, to, Some(&record.path))?;

        Ok(DocumentDiff {
            id: record.id,
            title: record.title,
            from_revision: from_revision.to_string(),
            to_revision: to.to_string(),
            diff: patch,
        })
    }

    /// Remove the file, its revision-store entry, index record, graph
    /// node (with incident edges), and embedding. Tag and source
    /// entities outlive their documents.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let lock = self.doc_lock(id);
        let _guard = lock.lock();

        let record = self.record_for(id)?;
        let doc_path = self.root.join(&record.path);
        if !doc_path.exists() {
            return Err(StoreError::not_found(format!(
                "document file `{}`",
                record.path
            )));
        }

        vcs::remove_file(&self.root, &record.path)?;
        vcs::commit(
            &self.root,
            &format!("Deleted document: {}", record.title),
            &self.settings.default_author,
            &self.settings.default_email,
        )?;

        self.index.remove(id)?;
        self.graph
            .delete_entities(&[format!("document:{id}")])?;
        self.semantic.remove(id)?;

        Ok(())
    }

    /// Re-apply the body recorded at `revision` as a new revision.
    pub fn restore_version(&self, id: &str, revision: &str) -> Result<DocumentView, StoreError> {
        let content = self.get_content(id, Some(revision))?.content;

        self.update(
            id,
            UpdateDocumentRequest {
                content: Some(content),
                commit_message: Some(format!("Restored document to {revision}")),
                ..UpdateDocumentRequest::default()
            },
        )
    }

    // Graph synchronisation: upsert the document node, its tag and
    // source entities, and the edges between them. Stale tagged_with
    // edges from a shrunk tag set are removed; the tag entities
    // themselves stay, shared across documents.
    fn sync_graph(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let doc_entity = format!("document:{}", record.id);

        let mut observations = vec![
            format!("Title: {}", record.title),
            format!("Type: {}", record.document_type),
        ];
        if !record.tags.is_empty() {
            observations.push(format!("Tags: {}", record.tags.join(", ")));
        }
        if let Some(url) = &record.source_url {
            observations.push(format!("Source URL: {url}"));
        }
        for (key, value) in &record.metadata {
            if frontmatter::is_primitive(value) {
                observations.push(format!("{key}: {}", frontmatter::render_value(value)));
            }
        }

        let created = self.graph.create_entities(vec![Entity::with_observations(
            doc_entity.clone(),
            "document",
            observations.clone(),
        )])?;
        if created.is_empty() {
            // already present: fold in whatever is new
            self.graph.add_observations(&doc_entity, &observations)?;
        }

        let mut relations = Vec::new();
        for tag in &record.tags {
            let tag_entity = format!("tag:{tag}");
            self.graph.create_entities(vec![Entity::with_observations(
                tag_entity.clone(),
                "tag",
                vec![format!("Document tag: {tag}")],
            )])?;
            relations.push(Relation::new(
                doc_entity.clone(),
                tag_entity,
                "tagged_with",
            ));
        }

        if let Some(url) = &record.source_url {
            let source_entity = format!("source:{}", sanitize_source_url(url));
            self.graph.create_entities(vec![Entity::with_observations(
                source_entity.clone(),
                "source",
                vec![format!("URL: {url}")],
            )])?;
            relations.push(Relation::new(
                doc_entity.clone(),
                source_entity,
                "sourced_from",
            ));
        }

        if !relations.is_empty() {
            self.graph.create_relations(relations)?;
        }

        let connections = self.graph.entity_connections(&doc_entity)?;
        let stale: Vec<Relation> = connections
            .outgoing
            .iter()
            .filter(|conn| {
                conn.relation_type == "tagged_with"
                    && !record
                        .tags
                        .iter()
                        .any(|tag| conn.entity == format!("tag:{tag}"))
            })
            .map(|conn| Relation::new(doc_entity.clone(), conn.entity.clone(), "tagged_with"))
            .collect();
        if !stale.is_empty() {
            self.graph.delete_relations(&stale)?;
        }

        Ok(())
    }
}
