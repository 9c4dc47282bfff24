//! The backup document and its on-disk store.

use crate::error::{CoreError, CoreResult};
use docvault_storage::{atomic, StorageResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated backup document.
///
/// Any well-formed JSON value whose top level is an object or an array.
/// The content is otherwise opaque to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    value: Value,
}

impl Document {
    /// Parses and validates candidate bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the bytes exceed `max_size`, are
    /// not JSON, or are a JSON scalar.
    pub fn parse(bytes: &[u8], max_size: usize) -> CoreResult<Self> {
        if bytes.len() > max_size {
            return Err(CoreError::validation(format!(
                "document is {} bytes, limit is {max_size}",
                bytes.len()
            )));
        }
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::validation(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Wraps an already-parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for scalar top-level values.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        if value.is_object() || value.is_array() {
            Ok(Self { value })
        } else {
            Err(CoreError::validation(
                "top level must be a JSON object or array",
            ))
        }
    }

    /// The empty-object document served before the first save.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            value: Value::Object(serde_json::Map::new()),
        }
    }

    /// Returns the JSON value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the document and returns the JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns `meta.author` when the document carries one.
    #[must_use]
    pub fn author_hint(&self) -> Option<&str> {
        self.value
            .get("meta")?
            .get("author")?
            .as_str()
            .map(str::trim)
            .filter(|author| !author.is_empty())
    }

    /// Encodes the document in the stored (pretty-printed) form.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(&self.value)
            .map_err(|e| CoreError::validation(format!("cannot encode document: {e}")))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Replaces a file's content in one step.
type ReplaceFn = fn(&Path, &[u8]) -> StorageResult<()>;

/// Reads and atomically replaces the working document file.
///
/// The store is the sole owner of the working state. Readers never take a
/// lock: every replacement is a rename, so a read sees either the old or the
/// new file.
///
/// While a save is in flight the store keeps a pre-image: the bytes being
/// replaced, or an empty file if no document existed. Valid documents are
/// never empty, so the two cases cannot be confused.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    preimage_path: PathBuf,
    max_size: usize,
    replace: ReplaceFn,
}

impl DocumentStore {
    /// Creates a store for the file at `path`, staging pre-images at
    /// `preimage_path`.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        preimage_path: impl Into<PathBuf>,
        max_size: usize,
    ) -> Self {
        Self {
            path: path.into(),
            preimage_path: preimage_path.into(),
            max_size,
            replace: atomic::replace_file,
        }
    }

    /// Swaps the function used to replace the working document.
    #[cfg(test)]
    pub(crate) fn with_replace(mut self, replace: ReplaceFn) -> Self {
        self.replace = replace;
        self
    }

    /// Returns the working document's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a working document exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the current document.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if nothing has been saved
    /// - [`CoreError::Corruption`] if the file is not a valid document
    pub fn read(&self) -> CoreResult<Document> {
        let bytes = self.read_raw()?.ok_or(CoreError::NotFound)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::corruption(format!("{} is not valid JSON: {e}", self.path.display()))
        })?;
        Document::from_value(value).map_err(|_| {
            CoreError::corruption(format!(
                "{} does not hold a JSON object or array",
                self.path.display()
            ))
        })
    }

    /// Reads the raw file bytes, or `None` if no document exists.
    pub fn read_raw(&self) -> CoreResult<Option<Vec<u8>>> {
        Ok(atomic::read_file(&self.path)?)
    }

    /// Validates candidate bytes without touching storage.
    pub fn validate(&self, candidate: &[u8]) -> CoreResult<Document> {
        Document::parse(candidate, self.max_size)
    }

    /// Validates `candidate`, then atomically replaces the working document.
    ///
    /// Returns the bytes that were stored. No I/O happens if validation fails.
    pub fn write(&self, candidate: &[u8]) -> CoreResult<Vec<u8>> {
        let document = self.validate(candidate)?;
        self.write_document(&document)
    }

    /// Atomically replaces the working document with `document`.
    pub fn write_document(&self, document: &Document) -> CoreResult<Vec<u8>> {
        let bytes = document.to_bytes()?;
        (self.replace)(&self.path, &bytes)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "wrote working document");
        Ok(bytes)
    }

    /// Re-installs a previous state: the given bytes, or no file at all.
    pub fn restore(&self, previous: Option<&[u8]>) -> CoreResult<()> {
        match previous {
            Some(bytes) => (self.replace)(&self.path, bytes)?,
            None => {
                atomic::remove_file(&self.path)?;
            }
        }
        Ok(())
    }

    /// Durably records `previous` as the state to return to if the save in
    /// flight does not complete.
    pub fn stage_preimage(&self, previous: Option<&[u8]>) -> CoreResult<()> {
        atomic::replace_file(&self.preimage_path, previous.unwrap_or_default())?;
        Ok(())
    }

    /// Returns the staged pre-image, if a save was interrupted.
    ///
    /// The inner `None` means no working document existed before that save.
    pub fn staged_preimage(&self) -> CoreResult<Option<Option<Vec<u8>>>> {
        let staged = atomic::read_file(&self.preimage_path)?;
        Ok(staged.map(|bytes| (!bytes.is_empty()).then_some(bytes)))
    }

    /// Drops the pre-image once the save has committed or rolled back.
    pub fn clear_preimage(&self) -> CoreResult<()> {
        atomic::remove_file(&self.preimage_path)?;
        Ok(())
    }
}
