//! Subfield/field taxonomy keyed on the bibliographic source's own ids.
//!
//! The taxonomy is an arena: fields and subfields live in flat vectors and are
//! addressed through an id index, so lookups stay O(1) as the taxonomy grows.
//! Each subfield carries the keywords used to recognize it in journal names.
//! A default taxonomy is embedded in the binary; a replacement can be loaded
//! from a JSON file with the same shape.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

const EMBEDDED_TAXONOMY: &str = include_str!("default_taxonomy.json");

/// Errors raised while building a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// Taxonomy file could not be read
    #[error("cannot read taxonomy file '{path}': {source}")]
    Io {
        /// The taxonomy file path
        path: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Taxonomy JSON is malformed
    #[error("invalid taxonomy JSON: {0}\n  Suggestion: Expected {{\"fields\": [...], \"subfields\": [...]}}")]
    Parse(#[from] serde_json::Error),

    /// A subfield references a field id that is not declared
    #[error("subfield {subfield_id} references unknown field {field_id}")]
    UnknownField {
        /// The offending subfield id
        subfield_id: u32,
        /// The missing field id
        field_id: u32,
    },

    /// An id appears more than once
    #[error("duplicate {kind} id {id} in taxonomy")]
    DuplicateId {
        /// "field" or "subfield"
        kind: &'static str,
        /// The duplicated id
        id: u32,
    },
}

/// A top-level discipline (e.g. Medicine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Field {
    pub id: u32,
    pub name: String,
}

/// A narrower discipline under a [`Field`] (e.g. Oncology).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subfield {
    pub id: u32,
    pub name: String,
    pub field_id: u32,
    /// Lowercase keywords that identify this subfield in free text.
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    fields: Vec<Field>,
    subfields: Vec<Subfield>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldIdx(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SubfieldIdx(usize);

/// Arena of fields and subfields with id indexes.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    fields: Vec<Field>,
    subfields: Vec<Subfield>,
    field_index: HashMap<u32, FieldIdx>,
    subfield_index: HashMap<u32, SubfieldIdx>,
}

impl Taxonomy {
    /// Builds the taxonomy bundled with the crate.
    ///
    /// # Errors
    /// Returns [`TaxonomyError`] if the embedded data is inconsistent.
    pub fn embedded() -> Result<Self, TaxonomyError> {
        Self::from_json_str(EMBEDDED_TAXONOMY)
    }

    /// Loads a taxonomy from a JSON file.
    ///
    /// # Errors
    /// Returns [`TaxonomyError`] on IO, parse or consistency failures.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and indexes taxonomy JSON.
    ///
    /// # Errors
    /// Returns [`TaxonomyError`] on parse or consistency failures.
    pub fn from_json_str(raw: &str) -> Result<Self, TaxonomyError> {
        let file: TaxonomyFile = serde_json::from_str(raw)?;
        Self::build(file.fields, file.subfields)
    }

    fn build(fields: Vec<Field>, mut subfields: Vec<Subfield>) -> Result<Self, TaxonomyError> {
        let mut field_index = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if field_index.insert(field.id, FieldIdx(idx)).is_some() {
                return Err(TaxonomyError::DuplicateId {
                    kind: "field",
                    id: field.id,
                });
            }
        }

        let mut subfield_index = HashMap::with_capacity(subfields.len());
        for (idx, subfield) in subfields.iter_mut().enumerate() {
            if !field_index.contains_key(&subfield.field_id) {
                return Err(TaxonomyError::UnknownField {
                    subfield_id: subfield.id,
                    field_id: subfield.field_id,
                });
            }
            if subfield_index.insert(subfield.id, SubfieldIdx(idx)).is_some() {
                return Err(TaxonomyError::DuplicateId {
                    kind: "subfield",
                    id: subfield.id,
                });
            }
            for keyword in &mut subfield.keywords {
                *keyword = keyword.trim().to_lowercase();
            }
            subfield.keywords.retain(|k| !k.is_empty());
        }

        debug!(
            fields = fields.len(),
            subfields = subfields.len(),
            "Taxonomy indexed"
        );

        Ok(Self {
            fields,
            subfields,
            field_index,
            subfield_index,
        })
    }

    #[must_use]
    pub fn subfield(&self, id: u32) -> Option<&Subfield> {
        self.subfield_index.get(&id).map(|idx| &self.subfields[idx.0])
    }

    #[must_use]
    pub fn field(&self, id: u32) -> Option<&Field> {
        self.field_index.get(&id).map(|idx| &self.fields[idx.0])
    }

    /// Returns the parent field of a subfield.
    #[must_use]
    pub fn field_of(&self, subfield_id: u32) -> Option<&Field> {
        self.subfield(subfield_id)
            .and_then(|subfield| self.field(subfield.field_id))
    }

    /// Returns true if `text` mentions the subfield's name or one of its keywords
    /// as a whole-word phrase.
    #[must_use]
    pub fn mentions_subfield(&self, subfield_id: u32, text: &str) -> bool {
        let Some(subfield) = self.subfield(subfield_id) else {
            return false;
        };
        let haystack = word_sequence(text);
        std::iter::once(subfield.name.to_lowercase())
            .chain(subfield.keywords.iter().cloned())
            .any(|needle| contains_words(&haystack, &word_sequence(&needle)))
    }

    #[must_use]
    pub fn subfield_count(&self) -> usize {
        self.subfields.len()
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Lowercase alphanumeric words of `text`.
pub(crate) fn word_sequence(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Returns true when `needle` occurs as a contiguous word run in `haystack`.
pub(crate) fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
