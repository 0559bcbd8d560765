//! Directory-backed store
//!
//! Layout: `<root>/<agent-id>/<kind>.json`. Writes go to a temp file that is
//! synced and then renamed over the target, so a crash or despawn mid-write
//! leaves either the old or the new payload, never a torn one.
//!
//! `save` fsyncs on the calling thread, which for the brain is the tick
//! thread. Keep the persistence tier interval coarse.

use crate::core::error::{MindError, Result};
use crate::core::types::AgentId;
use crate::persistence::{DataKind, Persistence};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, agent: AgentId, kind: DataKind) -> PathBuf {
        self.root
            .join(agent.to_string())
            .join(format!("{}.json", kind.file_stem()))
    }
}

impl Persistence for FileStore {
    fn save(&self, agent: AgentId, kind: DataKind, payload: &str) -> Result<()> {
        let path = self.path_for(agent, kind);
        let dir = path
            .parent()
            .ok_or_else(|| MindError::Persistence(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let tmp_path = path.with_extension("json.tmp");
        let written = write_synced(&tmp_path, payload).and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                tracing::debug!(path = %tmp_path.display(), error = %cleanup, "Temp file not removed");
            }
            return Err(e.into());
        }

        tracing::debug!(%agent, ?kind, path = %path.display(), "Saved payload");
        Ok(())
    }

    fn load(&self, agent: AgentId, kind: DataKind) -> Option<String> {
        let path = self.path_for(agent, kind);
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable payload treated as absent");
                None
            }
        }
    }
}

fn write_synced(path: &Path, payload: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    f.write_all(payload.as_bytes())?;
    f.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let agent = AgentId::from_name("steve");

        store.save(agent, DataKind::Skills, "[1,2,3]").unwrap();
        assert_eq!(store.load(agent, DataKind::Skills).as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let agent = AgentId::from_name("steve");

        store.save(agent, DataKind::SpatialKnowledge, "{}").unwrap();
        store.save(agent, DataKind::SpatialKnowledge, "{\"v\":2}").unwrap();

        let agent_dir = dir.path().join(agent.to_string());
        let names: Vec<String> = fs::read_dir(&agent_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["spatial.json".to_string()]);
        assert_eq!(store.load(agent, DataKind::SpatialKnowledge).as_deref(), Some("{\"v\":2}"));
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let agent = AgentId::from_name("steve");

        // A non-empty directory in the target's place makes the rename fail
        let agent_dir = dir.path().join(agent.to_string());
        let blocker = agent_dir.join("skills.json");
        fs::create_dir_all(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        assert!(store.save(agent, DataKind::Skills, "[]").is_err());
        assert!(!agent_dir.join("skills.json.tmp").exists());
        assert!(blocker.join("keep").exists());
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load(AgentId::from_name("nobody"), DataKind::Skills).is_none());
    }
}
