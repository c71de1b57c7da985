//! Dictionary entries.
//!
//! An [`Entry`] is one word record as stored under `words/{id}`. The stored
//! document is camelCase JSON; every field is optional on read so that a
//! half-written or legacy child never fails the whole snapshot; missing or
//! wrong-typed fields take their defaults (`isFavorite` → false,
//! timestamps → 0). Only a child that is not an object is rejected.
//!
//! User input arrives as an [`EntryDraft`] and is normalized into a
//! [`NormalizedDraft`] (trimmed, `textLower` derived, empty example dropped)
//! before anything is written.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::EntryId;

/// Stored field names, for partial updates.
pub mod fields {
    pub const TEXT: &str = "text";
    pub const TEXT_LOWER: &str = "textLower";
    pub const MEANING: &str = "meaning";
    pub const EXAMPLE: &str = "example";
    pub const IS_FAVORITE: &str = "isFavorite";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const CREATED_BY: &str = "createdBy";
    pub const CREATED_BY_DISPLAY_NAME: &str = "createdByDisplayName";
    pub const LAST_MODIFIED_BY: &str = "lastModifiedBy";
    pub const LAST_MODIFIED_BY_DISPLAY_NAME: &str = "lastModifiedByDisplayName";
}

/// A word record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entry {
    /// Store key. Not part of the stored document.
    #[serde(skip)]
    pub id: EntryId,
    /// Headword or phrase, trimmed.
    #[serde(deserialize_with = "lenient::string")]
    pub text: String,
    /// `lower(text)`; absent on legacy records.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub text_lower: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub meaning: String,
    /// Usage example; absent when not provided (never stored as "").
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub example: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_favorite: bool,
    /// Unix millis, set once at creation.
    #[serde(deserialize_with = "lenient::millis")]
    pub created_at: u64,
    /// Unix millis, refreshed on every write.
    #[serde(deserialize_with = "lenient::millis")]
    pub updated_at: u64,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub created_by_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub last_modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub last_modified_by_display_name: Option<String>,
}

/// Field readers that take the default instead of failing on a wrong type.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_string(d)?.unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    /// `true`/`false`, or their string spellings.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }

    /// Non-negative integral millis; integral floats are accepted.
    pub fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let Value::Number(n) = Value::deserialize(d)? else {
            return Ok(0);
        };
        Ok(n.as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            })
            .unwrap_or(0))
    }
}

impl Entry {
    /// Deserialize a stored child, attaching its key.
    ///
    /// An empty `example` is read back as absent.
    pub fn from_value(id: EntryId, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut entry: Entry = serde_json::from_value(value)?;
        entry.id = id;
        if entry.example.as_deref().is_some_and(|e| e.trim().is_empty()) {
            entry.example = None;
        }
        Ok(entry)
    }

    /// The stored document (without the key).
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Case-insensitive ordering key: `textLower`, else `lower(text)`.
    pub fn sort_key(&self) -> Cow<'_, str> {
        match self.text_lower.as_deref() {
            Some(lower) if !lower.is_empty() => Cow::Borrowed(lower),
            _ => Cow::Owned(self.text.to_lowercase()),
        }
    }

    /// Author display string, falling back to the author id.
    pub fn author_label(&self) -> Option<&str> {
        self.created_by_display_name
            .as_deref()
            .or(self.created_by.as_deref())
    }
}

/// Raw user input for a create or update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryDraft {
    pub text: String,
    pub meaning: String,
    pub example: Option<String>,
}

impl EntryDraft {
    pub fn new(
        text: impl Into<String>,
        meaning: impl Into<String>,
        example: Option<impl Into<String>>,
    ) -> Self {
        Self {
            text: text.into(),
            meaning: meaning.into(),
            example: example.map(Into::into),
        }
    }

    /// Trim every field, derive `textLower`, and reject empty required fields.
    pub fn normalize(&self) -> Result<NormalizedDraft, ValidationError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyField(fields::TEXT));
        }
        let meaning = self.meaning.trim();
        if meaning.is_empty() {
            return Err(ValidationError::EmptyField(fields::MEANING));
        }
        let example = self
            .example
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(NormalizedDraft {
            text: text.to_string(),
            text_lower: text.to_lowercase(),
            meaning: meaning.to_string(),
            example,
        })
    }
}

/// Validated content fields, ready to be stamped and written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedDraft {
    pub text: String,
    pub text_lower: String,
    pub meaning: String,
    pub example: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let draft = EntryDraft::new("  Efímero ", " que dura poco ", Some("  "));
        let norm = draft.normalize().unwrap();
        assert_eq!(norm.text, "Efímero");
        assert_eq!(norm.text_lower, "efímero");
        assert_eq!(norm.meaning, "que dura poco");
        assert_eq!(norm.example, None);
    }

    #[test]
    fn test_normalize_keeps_trimmed_example() {
        let draft = EntryDraft::new("a", "b", Some(" un ejemplo "));
        assert_eq!(draft.normalize().unwrap().example.as_deref(), Some("un ejemplo"));
    }

    #[test]
    fn test_normalize_rejects_empty_text() {
        let draft = EntryDraft::new("   ", "meaning", None::<String>);
        assert_eq!(draft.normalize(), Err(ValidationError::EmptyField("text")));
    }

    #[test]
    fn test_normalize_rejects_empty_meaning() {
        let draft = EntryDraft::new("word", "\t\n", None::<String>);
        let err = draft.normalize().unwrap_err();
        assert_eq!(err.field(), "meaning");
    }

    #[test]
    fn test_from_value_defaults_missing_fields() {
        let entry = Entry::from_value(EntryId::new("k"), json!({"text": "Hola"})).unwrap();
        assert_eq!(entry.id.as_str(), "k");
        assert!(!entry.is_favorite);
        assert_eq!(entry.meaning, "");
        assert_eq!(entry.created_by, None);
        assert_eq!(entry.created_at, 0);
    }

    #[test]
    fn test_from_value_drops_empty_example() {
        let entry = Entry::from_value(
            EntryId::new("k"),
            json!({"text": "a", "meaning": "b", "example": ""}),
        )
        .unwrap();
        assert_eq!(entry.example, None);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Entry::from_value(EntryId::new("k"), json!("Hola")).is_err());
        assert!(Entry::from_value(EntryId::new("k"), json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_value_defaults_wrong_typed_fields() {
        let entry = Entry::from_value(
            EntryId::new("k"),
            json!({
                "text": "Sol",
                "meaning": 42,
                "isFavorite": "true",
                "createdAt": 1700000000000.0,
                "updatedAt": -5,
                "createdBy": null,
                "example": ["x"],
            }),
        )
        .unwrap();
        assert_eq!(entry.text, "Sol");
        assert_eq!(entry.meaning, "");
        assert!(entry.is_favorite);
        assert_eq!(entry.created_at, 1_700_000_000_000);
        assert_eq!(entry.updated_at, 0);
        assert_eq!(entry.created_by, None);
        assert_eq!(entry.example, None);

        let fractional =
            Entry::from_value(EntryId::new("k"), json!({"createdAt": 1.5, "isFavorite": 1})).unwrap();
        assert_eq!(fractional.created_at, 0);
        assert!(!fractional.is_favorite);
    }

    #[test]
    fn test_to_value_omits_absent_fields_and_id() {
        let entry = Entry {
            id: EntryId::new("k"),
            text: "Sol".into(),
            text_lower: Some("sol".into()),
            meaning: "estrella".into(),
            ..Default::default()
        };
        let value = entry.to_value().unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("example"));
        assert_eq!(obj["textLower"], "sol");
        assert_eq!(obj["isFavorite"], false);
    }

    #[test]
    fn test_sort_key_falls_back_to_text() {
        let mut entry = Entry {
            text: "Árbol".into(),
            ..Default::default()
        };
        assert_eq!(entry.sort_key(), "árbol");
        entry.text_lower = Some(String::new());
        assert_eq!(entry.sort_key(), "árbol");
        entry.text_lower = Some("arbol".into());
        assert_eq!(entry.sort_key(), "arbol");
    }

    #[test]
    fn test_author_label() {
        let mut entry = Entry::default();
        assert_eq!(entry.author_label(), None);
        entry.created_by = Some("u1".into());
        assert_eq!(entry.author_label(), Some("u1"));
        entry.created_by_display_name = Some("Ana".into());
        assert_eq!(entry.author_label(), Some("Ana"));
    }
}
