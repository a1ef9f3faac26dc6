//! The leading `---…---` block of a document file: fixed key order on
//! write, tolerant parsing on read (unknown keys become metadata, the
//! body keeps its blank lines).

use serde_json::{Map, Value};

use crate::contracts::DocumentType;
use crate::errors::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter {
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub id: String,
    pub document_type: DocumentType,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    /// Primitive-valued extras; anything non-primitive is dropped at
    /// render time.
    pub metadata: Map<String, Value>,
}

pub(crate) fn is_primitive(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_)
    )
}

pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render the frontmatter block, a blank line, then the body.
pub fn render(fm: &Frontmatter, body: &str) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!("title: {}\n", fm.title));
    out.push_str(&format!("created_at: {}\n", fm.created_at));
    out.push_str(&format!("updated_at: {}\n", fm.updated_at));
    out.push_str(&format!("id: {}\n", fm.id));
    out.push_str(&format!("document_type: {}\n", fm.document_type));

    if !fm.tags.is_empty() {
        out.push_str(&format!("tags: {}\n", fm.tags.join(", ")));
    }
    if let Some(url) = &fm.source_url {
        out.push_str(&format!("source_url: {url}\n"));
    }
    for (key, value) in &fm.metadata {
        if is_primitive(value) {
            out.push_str(&format!("{key}: {}\n", render_value(value)));
        }
    }

    out.push_str("---\n\n");
    out.push_str(body);
    out
}

/// Split a document file into frontmatter and body.
pub fn parse(full: &str) -> Result<(Frontmatter, String), StoreError> {
    let rest = full
        .strip_prefix("---\n")
        .ok_or_else(|| StoreError::invalid("missing frontmatter"))?;
    let end = rest
        .find("\n---\n")
        .ok_or_else(|| StoreError::invalid("unterminated frontmatter"))?;

    let block = &rest[..end];
    let mut body = &rest[end + "\n---\n".len()..];
    // the grammar puts one blank line between frontmatter and body
    body = body.strip_prefix('\n').unwrap_or(body);

    let mut fm = Frontmatter {
        title: String::new(),
        created_at: 0,
        updated_at: 0,
        id: String::new(),
        document_type: DocumentType::Generic,
        tags: Vec::new(),
        source_url: None,
        metadata: Map::new(),
    };

    for line in block.lines() {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        match key {
            "title" => fm.title = value.to_string(),
            "created_at" => {
                fm.created_at = value
                    .trim()
                    .parse()
                    .map_err(|_| StoreError::invalid(format!("bad created_at `{value}`")))?;
            }
            "updated_at" => {
                fm.updated_at = value
                    .trim()
                    .parse()
                    .map_err(|_| StoreError::invalid(format!("bad updated_at `{value}`")))?;
            }
            "id" => fm.id = value.to_string(),
            "document_type" => {
                fm.document_type = value.trim().parse().unwrap_or(DocumentType::Generic);
            }
            "tags" => {
                fm.tags = value
                    .split(',')
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect();
            }
            "source_url" => fm.source_url = Some(value.to_string()),
            other => {
                fm.metadata
                    .insert(other.to_string(), Value::String(value.to_string()));
            }
        }
    }

    Ok((fm, body.to_string()))
}

/// The body without its frontmatter; content with no recognisable
/// frontmatter passes through whole.
pub fn strip(full: &str) -> &str {
    let Some(rest) = full.strip_prefix("---\n") else {
        return full;
    };
    let Some(end) = rest.find("\n---\n") else {
        return full;
    };
    let body = &rest[end + "\n---\n".len()..];
    body.strip_prefix('\n').unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Frontmatter {
        let mut metadata = Map::new();
        metadata.insert("genre".to_string(), json!("mystery"));
        metadata.insert("draft".to_string(), json!(true));
        metadata.insert("chapters".to_string(), json!(12));
        metadata.insert("nested".to_string(), json!({"not": "primitive"}));

        Frontmatter {
            title: "Hello".to_string(),
            created_at: 1700000000,
            updated_at: 1700000001,
            id: "doc_1700000000_ab12cd34".to_string(),
            document_type: DocumentType::Manuscript,
            tags: vec!["t1".to_string(), "t2".to_string()],
            source_url: Some("https://example.com/a".to_string()),
            metadata,
        }
    }

    #[test]
    fn render_uses_the_fixed_key_order() {
        let rendered = render(&sample(), "World");
        let expected_head = "---\n\
title: Hello\n\
created_at: 1700000000\n\
updated_at: 1700000001\n\
id: doc_1700000000_ab12cd34\n\
document_type: manuscript\n\
tags: t1, t2\n\
source_url: https://example.com/a\n";
        assert!(rendered.starts_with(expected_head), "got:\n{rendered}");
        assert!(rendered.ends_with("---\n\nWorld"));
        // non-primitive metadata never reaches the file
        assert!(!rendered.contains("nested"));
        assert!(rendered.contains("draft: true\n"));
        assert!(rendered.contains("chapters: 12\n"));
    }

    #[test]
    fn parse_round_trips_and_keeps_blank_lines_in_the_body() {
        let body = "first paragraph\n\nsecond paragraph\n\n";
        let rendered = render(&sample(), body);
        let (fm, parsed_body) = parse(&rendered).unwrap();

        assert_eq!(fm.title, "Hello");
        assert_eq!(fm.id, "doc_1700000000_ab12cd34");
        assert_eq!(fm.document_type, DocumentType::Manuscript);
        assert_eq!(fm.tags, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(fm.source_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn unknown_keys_become_metadata() {
        let raw = "---\ntitle: X\ncreated_at: 1\nupdated_at: 2\nid: doc_1_aaaaaaaa\ndocument_type: generic\nauthor_note: keep me\n---\n\nbody";
        let (fm, _) = parse(raw).unwrap();
        assert_eq!(
            fm.metadata.get("author_note"),
            Some(&Value::String("keep me".to_string()))
        );
    }

    #[test]
    fn malformed_frontmatter_is_rejected() {
        assert!(parse("no frontmatter at all").is_err());
        assert!(parse("---\ntitle: X\nnever terminated").is_err());
        assert!(parse("---\ncreated_at: not-a-number\n---\n\nbody").is_err());
    }

    #[test]
    fn strip_tolerates_plain_content() {
        let rendered = render(&sample(), "Only the body");
        assert_eq!(strip(&rendered), "Only the body");
        assert_eq!(strip("plain text"), "plain text");
    }
}
