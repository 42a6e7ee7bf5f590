use super::embedding::{cosine_similarity, embed_text};
use super::{CapabilityIndex, IndexError, RetrievedApi};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const SUPPORTED_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "md", "txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDocument {
    pub api_name: String,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: ApiDocument,
    embedding: Option<Vec<f32>>,
}

/// In-memory capability index over API documentation.
#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    entries: Vec<IndexedDocument>,
}

impl DocumentIndex {
    /// Builds an index from documents; exact duplicate texts are indexed once.
    pub fn from_documents(documents: impl IntoIterator<Item = ApiDocument>) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for document in documents {
            if !seen.insert(content_digest(&document.text)) {
                continue;
            }
            let embedding = embed_text(&format!("{}\n{}", document.api_name, document.text));
            entries.push(IndexedDocument {
                document,
                embedding,
            });
        }
        Self { entries }
    }

    /// Loads every supported file directly under `dir`, in file-name order.
    ///
    /// A structured file (`.json`, `.yaml`, `.yml`) holding an object documents one API named by
    /// its `name` or `api_name` field; an array of such objects documents several, each with
    /// source `<path>#<name>`. Any other file documents one API named after the file stem.
    pub fn load_dir(dir: &Path) -> Result<Self, IndexError> {
        let read_dir = fs::read_dir(dir).map_err(|source| IndexError::Read {
            path: dir.display().to_string(),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| IndexError::Read {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && has_supported_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in &paths {
            documents.extend(read_documents(path)?);
        }
        if documents.is_empty() {
            return Err(IndexError::EmptyCatalog {
                path: dir.display().to_string(),
            });
        }
        Ok(Self::from_documents(documents))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CapabilityIndex for DocumentIndex {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedApi>, IndexError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(query_embedding) = embed_text(query) else {
            return Ok(Vec::new());
        };

        let mut ranked = self
            .entries
            .iter()
            .filter_map(|entry| {
                let embedding = entry.embedding.as_ref()?;
                Some((entry, cosine_similarity(&query_embedding, embedding)))
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|(a, a_score), (b, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.document.api_name.cmp(&b.document.api_name))
        });

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(entry, similarity)| RetrievedApi {
                api_name: entry.document.api_name.clone(),
                source: entry.document.source.clone(),
                text: entry.document.text.clone(),
                similarity,
            })
            .collect())
    }

    fn documentation(&self, source: &str) -> Result<String, IndexError> {
        self.entries
            .iter()
            .find(|entry| entry.document.source == source)
            .map(|entry| entry.document.text.clone())
            .ok_or_else(|| IndexError::UnknownSource {
                source_locator: source.to_string(),
            })
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_documents(path: &Path) -> Result<Vec<ApiDocument>, IndexError> {
    let raw = fs::read_to_string(path).map_err(|source| IndexError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let source = path.display().to_string();
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();

    let structured = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Some(serde_json::from_str::<Value>(&raw).map_err(|err| err.to_string())),
        Some("yaml") | Some("yml") => {
            Some(serde_yaml::from_str::<Value>(&raw).map_err(|err| err.to_string()))
        }
        _ => None,
    };
    let Some(structured) = structured else {
        return Ok(vec![ApiDocument {
            api_name: stem,
            source,
            text: raw,
        }]);
    };
    let value = structured.map_err(|reason| IndexError::InvalidDocument {
        path: source.clone(),
        reason,
    })?;

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let name = declared_name(item).ok_or_else(|| IndexError::InvalidDocument {
                    path: source.clone(),
                    reason: "array entries must declare `name` or `api_name`".to_string(),
                })?;
                Ok(ApiDocument {
                    source: format!("{source}#{name}"),
                    text: render_document(item),
                    api_name: name,
                })
            })
            .collect(),
        other => Ok(vec![ApiDocument {
            api_name: declared_name(&other).unwrap_or(stem),
            source,
            text: raw,
        }]),
    }
}

fn declared_name(value: &Value) -> Option<String> {
    ["name", "api_name"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn render_document(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn content_digest(text: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, text: &str) -> ApiDocument {
        ApiDocument {
            api_name: name.to_string(),
            source: format!("docs/{name}.json"),
            text: text.to_string(),
        }
    }

    #[test]
    fn duplicate_texts_are_indexed_once() {
        let index = DocumentIndex::from_documents(vec![
            doc("a", "same text"),
            doc("b", "same text"),
            doc("c", "other text"),
        ]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn retrieve_respects_top_k_and_ranks_best_first() {
        let index = DocumentIndex::from_documents(vec![
            doc("who_am_i", "returns the id of the current user"),
            doc("works_list", "returns a list of work items matching filters"),
            doc("summarize_objects", "summarizes a list of objects"),
        ]);

        let hits = index.retrieve("summarize objects", 2).expect("retrieve");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].api_name, "summarize_objects");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[test]
    fn empty_query_and_zero_top_k_return_nothing() {
        let index = DocumentIndex::from_documents(vec![doc("a", "alpha")]);
        assert!(index.retrieve("", 5).expect("retrieve").is_empty());
        assert!(index.retrieve("alpha", 0).expect("retrieve").is_empty());
    }

    #[test]
    fn documentation_lookup_by_source() {
        let index = DocumentIndex::from_documents(vec![doc("a", "alpha docs")]);
        assert_eq!(
            index.documentation("docs/a.json").expect("docs"),
            "alpha docs"
        );
        let err = index.documentation("docs/missing.json").expect_err("unknown");
        assert!(err.to_string().contains("docs/missing.json"));
    }
}
