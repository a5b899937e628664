//! Content-addressed code vault.
//!
//! Blobs are keyed by the SHA-256 of their text.  Upsert is idempotent: a
//! novel hash inserts, a known hash updates only the code type.  Reads are
//! always re-hashed by the caller via [`VaultEntry::verify`]; a mismatch
//! fails the current call and is never repaired automatically.

use rusqlite::{OptionalExtension, params};

use crate::error::{EngineError, EngineResult};
use crate::hash::ContentHash;
use crate::model::CodeType;
use crate::store::MetaStore;

/// A blob fetched from the vault, not yet trusted.
#[derive(Debug, Clone)]
pub struct VaultEntry {
    pub hash: ContentHash,
    pub code_blob: String,
    pub code_type: CodeType,
}

impl VaultEntry {
    /// Re-hash the blob and compare against the stored key.
    pub fn verify(&self) -> EngineResult<()> {
        self.hash.verify(&self.code_blob)
    }
}

/// Store a blob, returning its content hash.
pub fn upsert(store: &MetaStore, code: &str, code_type: CodeType) -> EngineResult<ContentHash> {
    let hash = ContentHash::of(code);
    let sql = format!(
        "INSERT INTO {t} (hash, code_blob, code_type) VALUES (?1, ?2, ?3)
         ON CONFLICT(hash) DO UPDATE SET code_type = excluded.code_type",
        t = store.tables().code_vault
    );
    store
        .conn()
        .execute(&sql, params![hash.as_str(), code, code_type.as_str()])?;
    Ok(hash)
}

/// Fetch a blob by hash.  Missing rows and unknown code types are
/// integrity errors: the registry claimed a reference that does not
/// resolve to usable code.
pub fn get(store: &MetaStore, hash: &ContentHash) -> EngineResult<VaultEntry> {
    let sql = format!(
        "SELECT code_blob, code_type FROM {t} WHERE hash = ?1",
        t = store.tables().code_vault
    );
    let row = store
        .conn()
        .query_row(&sql, params![hash.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .optional()?;

    let Some((code_blob, type_text)) = row else {
        return Err(EngineError::Integrity {
            detail: format!("code not found for hash '{hash}'"),
        });
    };
    let Some(code_type) = CodeType::parse(&type_text) else {
        return Err(EngineError::Integrity {
            detail: format!("unknown code type '{type_text}' for hash '{hash}'"),
        });
    };

    Ok(VaultEntry {
        hash: hash.clone(),
        code_blob,
        code_type,
    })
}
