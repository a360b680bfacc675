use std::path::{Path, PathBuf};

use crate::error::KaskadeError;
use crate::session::model::Session;

/// The on-disk session document: the full session collection serialized as
/// one pretty-printed JSON array.
///
/// The bridge is the single writer to the file; every write is a
/// whole-document replace, never a partial patch. Callers are expected to
/// serialize their mutations (the store takes `&mut self` for every durable
/// operation), so two saves can never interleave partial content.
#[derive(Debug, Clone)]
pub struct DataFile {
    path: PathBuf,
    template: Option<PathBuf>,
}

impl DataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            template: None,
        }
    }

    /// Use a bundled template document to seed the file on first run.
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the session collection from disk.
    ///
    /// A missing file is repaired before reading: the bundled template is
    /// copied into place if one is configured and present, otherwise an
    /// empty document (`[]`) is created. A file that exists but does not
    /// parse is a persistence error, never silently replaced.
    pub async fn load(&self) -> Result<Vec<Session>, KaskadeError> {
        self.ensure_parent_dir().await?;

        if !file_exists(&self.path).await {
            self.seed().await?;
        }

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            KaskadeError::Persistence(format!("failed to read {}: {e}", self.path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            KaskadeError::Persistence(format!(
                "invalid session document {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Replace the file's entire contents with the serialized collection.
    ///
    /// On failure the error is returned and the caller's in-memory state is
    /// untouched, so the save can simply be retried.
    pub async fn save(&self, sessions: &[Session]) -> Result<(), KaskadeError> {
        self.ensure_parent_dir().await?;

        let content = serde_json::to_string_pretty(sessions).map_err(|e| {
            KaskadeError::Persistence(format!("failed to serialize session document: {e}"))
        })?;

        tokio::fs::write(&self.path, content).await.map_err(|e| {
            KaskadeError::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    async fn ensure_parent_dir(&self) -> Result<(), KaskadeError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                KaskadeError::Persistence(format!("failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    async fn seed(&self) -> Result<(), KaskadeError> {
        if let Some(template) = &self.template {
            if file_exists(template).await {
                match tokio::fs::copy(template, &self.path).await {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        // Fall through to the empty document; a broken
                        // template must not keep the app from starting.
                        tracing::warn!(
                            template = %template.display(),
                            error = %e,
                            "failed to copy session template, creating empty document"
                        );
                    }
                }
            }
        }

        tokio::fs::write(&self.path, "[]").await.map_err(|e| {
            KaskadeError::Persistence(format!("failed to create {}: {e}", self.path.display()))
        })
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::Request;

    fn make_session(id: i64, name: &str) -> Session {
        let mut session = Session::new(id, "tester");
        session.session_name = name.to_string();
        session
    }

    #[tokio::test]
    async fn load_missing_file_creates_empty_document() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        let datafile = DataFile::new(&path);

        let sessions = datafile.load().await.expect("load should succeed");
        assert!(sessions.is_empty());

        // The repaired file must exist on disk and contain an empty array.
        let content = tokio::fs::read_to_string(&path).await.expect("file should exist");
        assert_eq!(content, "[]");
    }

    #[tokio::test]
    async fn load_missing_file_seeds_from_template() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let template_path = dir.path().join("template.json");
        let seeded = vec![make_session(1, "Seeded Session")];
        tokio::fs::write(&template_path, serde_json::to_string(&seeded).unwrap())
            .await
            .expect("template write should succeed");

        let path = dir.path().join("data").join("datafile.json");
        let datafile = DataFile::new(&path).with_template(&template_path);

        let sessions = datafile.load().await.expect("load should succeed");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_name, "Seeded Session");
    }

    #[tokio::test]
    async fn load_with_absent_template_falls_back_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        let datafile = DataFile::new(&path).with_template(dir.path().join("missing.json"));

        let sessions = datafile.load().await.expect("load should succeed");
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn load_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("deep").join("nested").join("datafile.json");
        let datafile = DataFile::new(&path);

        let sessions = datafile.load().await.expect("load should succeed");
        assert!(sessions.is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn load_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        tokio::fs::write(&path, "{ not an array").await.expect("write should succeed");

        let datafile = DataFile::new(&path);
        let result = datafile.load().await;
        assert!(matches!(result, Err(KaskadeError::Persistence(_))));
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        let datafile = DataFile::new(&path);

        let mut session = make_session(1700000000000, "Round Trip");
        session.requests.push(Request::new(1700000000001));
        let sessions = vec![session];

        datafile.save(&sessions).await.expect("save should succeed");
        let loaded = datafile.load().await.expect("load should succeed");
        assert_eq!(loaded, sessions);
    }

    #[tokio::test]
    async fn save_replaces_whole_document() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        let datafile = DataFile::new(&path);

        datafile
            .save(&[make_session(1, "First"), make_session(2, "Second")])
            .await
            .expect("save should succeed");
        datafile
            .save(&[make_session(3, "Only")])
            .await
            .expect("save should succeed");

        let loaded = datafile.load().await.expect("load should succeed");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].session_name, "Only");
    }

    #[tokio::test]
    async fn save_produces_pretty_json() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        let datafile = DataFile::new(&path);

        datafile.save(&[make_session(1, "Pretty")]).await.expect("save should succeed");
        let content = tokio::fs::read_to_string(&path).await.expect("file should be readable");
        assert!(content.contains('\n'));
        assert!(content.contains("  "));
    }

    #[tokio::test]
    async fn existing_file_is_not_overwritten_by_load() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("datafile.json");
        let datafile = DataFile::new(&path);

        datafile.save(&[make_session(9, "Kept")]).await.expect("save should succeed");

        // Configure a template after the fact; it must be ignored because
        // the file already exists.
        let template_path = dir.path().join("template.json");
        tokio::fs::write(&template_path, "[]").await.expect("write should succeed");
        let datafile = DataFile::new(&path).with_template(&template_path);

        let loaded = datafile.load().await.expect("load should succeed");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].session_name, "Kept");
    }
}
