//! Transport-agnostic request and response shapes for the document
//! surface. Whatever transport a deployment bolts on serialises these
//! directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Manuscript,
    Documentation,
    Dataset,
    Webpage,
    #[default]
    Generic,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Manuscript,
        DocumentType::Documentation,
        DocumentType::Dataset,
        DocumentType::Webpage,
        DocumentType::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Manuscript => "manuscript",
            DocumentType::Documentation => "documentation",
            DocumentType::Dataset => "dataset",
            DocumentType::Webpage => "webpage",
            DocumentType::Generic => "generic",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manuscript" => Ok(DocumentType::Manuscript),
            "documentation" => Ok(DocumentType::Documentation),
            "dataset" => Ok(DocumentType::Dataset),
            "webpage" => Ok(DocumentType::Webpage),
            "generic" => Ok(DocumentType::Generic),
            other => Err(StoreError::invalid(format!(
                "unknown document type `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl CreateDocumentRequest {
    pub fn new<T: Into<String>, C: Into<String>>(title: T, content: C) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            document_type: DocumentType::Generic,
            metadata: Map::new(),
            tags: Vec::new(),
            source_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub expected_version: Option<String>,
}

/// Public view returned by `create`, `get`, and `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: String,
    pub title: String,
    pub document_type: DocumentType,
    pub created_at: i64,
    pub updated_at: i64,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub content_preview: String,
    pub size_bytes: u64,
    pub version_count: usize,
    pub content_available: bool,
    pub source_url: Option<String>,
}

/// Listing/search row: the index record without the content preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub document_type: DocumentType,
    pub created_at: i64,
    pub updated_at: i64,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub size_bytes: u64,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub id: String,
    pub title: String,
    pub content: String,
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub revision: String,
    pub message: String,
    pub author: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDiff {
    pub id: String,
    pub title: String,
    pub from_revision: String,
    pub to_revision: String,
    pub diff: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_round_trips_through_str() {
        for ty in DocumentType::ALL {
            assert_eq!(ty.as_str().parse::<DocumentType>().unwrap(), ty);
        }
        assert!("novel".parse::<DocumentType>().is_err());
    }

    #[test]
    fn update_request_defaults_to_no_changes() {
        let req: UpdateDocumentRequest = serde_json::from_str("{}").unwrap();
        assert!(req.title.is_none());
        assert!(req.content.is_none());
        assert!(req.tags.is_none());
        assert!(req.expected_version.is_none());
    }
}
