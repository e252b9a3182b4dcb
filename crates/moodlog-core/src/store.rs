use std::collections::BTreeMap;

use crate::{Error, NoteInfo, NoteMeta};

/// Storage abstraction for notes keyed by sanitized title.
///
/// Implementations sanitize every incoming title with
/// [`sanitize_title`](crate::sanitize_title) and keep the index free of
/// entries whose content is gone.
pub trait NoteStore {
    /// Create or overwrite a note and return its sanitized title.
    ///
    /// The date is always reset to now. `emotions` replaces the stored
    /// labels when `Some`; `None` keeps the existing labels.
    fn upsert(
        &self,
        title: &str,
        content: &str,
        emotions: Option<Vec<String>>,
    ) -> Result<String, Error>;

    /// Move a note to a new title and return the sanitized new title.
    fn rename(&self, old_title: &str, new_title: &str) -> Result<String, Error>;

    /// Delete a note. Fails with `NotFound` if its content is missing.
    fn delete(&self, title: &str) -> Result<(), Error>;

    /// The full title -> metadata mapping.
    fn list(&self) -> Result<BTreeMap<String, NoteMeta>, Error>;

    /// Fetch a note's content and metadata.
    fn get_info(&self, title: &str) -> Result<NoteInfo, Error>;

    /// Drop index entries without content and return how many were removed.
    fn prune(&self) -> Result<usize, Error>;
}

impl<S: NoteStore + ?Sized> NoteStore for &S {
    fn upsert(
        &self,
        title: &str,
        content: &str,
        emotions: Option<Vec<String>>,
    ) -> Result<String, Error> {
        (**self).upsert(title, content, emotions)
    }

    fn rename(&self, old_title: &str, new_title: &str) -> Result<String, Error> {
        (**self).rename(old_title, new_title)
    }

    fn delete(&self, title: &str) -> Result<(), Error> {
        (**self).delete(title)
    }

    fn list(&self) -> Result<BTreeMap<String, NoteMeta>, Error> {
        (**self).list()
    }

    fn get_info(&self, title: &str) -> Result<NoteInfo, Error> {
        (**self).get_info(title)
    }

    fn prune(&self) -> Result<usize, Error> {
        (**self).prune()
    }
}
