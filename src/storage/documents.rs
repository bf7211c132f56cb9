use async_trait::async_trait;
use serde_json::{Map, Value};

use super::db::{Database, DatabaseError};
use super::models::{Document, Query};
use super::tables::*;
use super::{DocumentStore, DocumentStoreError};

/// Table key for a record: "{collection}/{id}"
fn document_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// Key range covering every record of a collection. `0` sorts right after `/`.
fn collection_range(collection: &str) -> (String, String) {
    (format!("{collection}/"), format!("{collection}0"))
}

impl Database {
    // ========================================================================
    // Document operations
    // ========================================================================

    /// Store a new record, assigning its id and creation timestamp
    pub fn insert_document(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, DatabaseError> {
        debug_assert!(!collection.is_empty(), "collection must not be empty");
        debug_assert!(
            !collection.contains('/'),
            "collection must not contain '/'"
        );

        let doc = Document {
            id: uuid::Uuid::new_v4().simple().to_string()[..20].to_string(),
            collection: collection.to_string(),
            created_at: self.next_timestamp(),
            fields,
        };

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let data = rmp_serde::to_vec_named(&doc)?;
            let key = document_key(collection, &doc.id);
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(doc)
    }

    /// Get a record by collection and id
    pub fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        let key = document_key(collection, id);
        match table.get(key.as_str())? {
            Some(data) => {
                let doc: Document = rmp_serde::from_slice(data.value())?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Delete a record, returning whether it existed
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let key = document_key(collection, id);
            let removed = table.remove(key.as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// All records of a collection, in key order
    pub fn collection_documents(&self, collection: &str) -> Result<Vec<Document>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        let (start, end) = collection_range(collection);
        let mut docs = Vec::new();
        for result in table.range::<&str>(start.as_str()..end.as_str())? {
            let (_, value) = result?;
            let doc: Document = rmp_serde::from_slice(value.value())?;
            docs.push(doc);
        }

        Ok(docs)
    }

    /// Run a filtered, ordered read over one collection
    pub fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, DatabaseError> {
        Ok(query.apply(self.collection_documents(collection)?))
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn insert(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, DocumentStoreError> {
        let doc = self.insert_document(collection, fields)?;
        tracing::debug!(collection = %collection, id = %doc.id, "Inserted document");
        Ok(doc.id)
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        Ok(self.get_document(collection, id)?)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, DocumentStoreError> {
        Ok(self.delete_document(collection, id)?)
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        Ok(self.query_documents(collection, query)?)
    }
}
