//! Named collections and the typed documents stored in them.
//!
//! The durable store only understands "a collection is a list of JSON
//! documents keyed by `id`". This module bridges that untyped view and the
//! typed records the ledger works with.

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Name of a collection in the store.
///
/// Well-known collections are available as associated constants.
///
/// # Examples
///
/// ```
/// use arena_core::collection::CollectionName;
///
/// assert_eq!(CollectionName::TOURNAMENTS.as_str(), "tournaments");
/// assert_eq!(CollectionName::new("scratch").to_string(), "scratch");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionName(Cow<'static, str>);

impl CollectionName {
    /// Tournaments, including their embedded enrollments.
    pub const TOURNAMENTS: Self = Self::from_static("tournaments");
    /// User accounts carrying wallet balances.
    pub const USERS: Self = Self::from_static("users");
    /// The append-only ledger transaction log.
    pub const TRANSACTIONS: Self = Self::from_static("transactions");
    /// Payment top-up requests.
    pub const PAYMENT_REQUESTS: Self = Self::from_static("payment_requests");

    /// Create a collection name from a static string.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Create a collection name from any string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed record persisted in a named collection.
///
/// Implementors declare which collection they live in and expose their
/// document id, which must be unique within that collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this document type is stored in.
    const COLLECTION: CollectionName;

    /// Unique id of this document within its collection.
    fn document_id(&self) -> &str;
}

/// Decode raw store documents into typed records.
///
/// # Errors
///
/// Returns `StoreError::SerializationError` naming the offending document
/// index if any document does not match the expected shape.
pub fn decode_documents<T: Document>(raw: Vec<Value>) -> Result<Vec<T>, StoreError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|e| {
                StoreError::SerializationError(format!(
                    "document {index} in collection {}: {e}",
                    T::COLLECTION
                ))
            })
        })
        .collect()
}

/// Encode typed records into raw store documents.
///
/// # Errors
///
/// Returns `StoreError::SerializationError` if a record cannot be encoded.
pub fn encode_documents<T: Document>(documents: &[T]) -> Result<Vec<Value>, StoreError> {
    documents
        .iter()
        .map(|doc| {
            serde_json::to_value(doc)
                .map_err(|e| StoreError::SerializationError(format!("{}: {e}", doc.document_id())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Document for Note {
        const COLLECTION: CollectionName = CollectionName::from_static("notes");

        fn document_id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn decode_reports_offending_index() {
        let raw = vec![
            serde_json::json!({"id": "a", "body": "ok"}),
            serde_json::json!({"id": "b"}),
        ];
        let err = decode_documents::<Note>(raw).err().map(|e| e.to_string());
        assert!(err.is_some_and(|msg| msg.contains("document 1 in collection notes")));
    }

    #[test]
    fn encode_then_decode_preserves_order() {
        let notes = vec![
            Note { id: "a".into(), body: "first".into() },
            Note { id: "b".into(), body: "second".into() },
        ];
        let decoded = encode_documents(&notes).and_then(decode_documents::<Note>);
        assert_eq!(decoded.ok(), Some(notes));
    }

    #[test]
    fn well_known_names_compare_equal_to_owned() {
        assert_eq!(CollectionName::USERS, CollectionName::new("users"));
    }
}
