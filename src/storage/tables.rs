use redb::TableDefinition;

/// Documents: "{collection}/{id}" -> StoredDocument (msgpack)
pub const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
