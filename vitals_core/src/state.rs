//! Profile state persistence with file locking.
//!
//! Holds the biometric profile and the open sleep session's start instant.
//! Loads are forgiving (missing or corrupt files fall back to defaults) and
//! saves are atomic.

use crate::{BiometricProfile, Error, EventStore, Result, SleepSession, SleepTimer};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Everything the profile store persists for the single local user
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileState {
    #[serde(default)]
    pub profile: BiometricProfile,
    #[serde(default)]
    pub sleep_started_at: Option<DateTime<Utc>>,
}

impl ProfileState {
    /// Load state from a file with shared locking
    ///
    /// Returns default state if file doesn't exist.
    /// If file is corrupted, logs a warning and returns default state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No profile file found, using default profile");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open profile file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock profile file {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read profile file {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<ProfileState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded profile state from {:?}", path);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse profile file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save state atomically: temp file, fsync, rename over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "profile path missing parent",
            ))
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved profile state to {:?}", path);
        Ok(())
    }

    /// Close the open sleep session, persist the cleared timer, then record the session
    ///
    /// If the save fails the state is left unchanged and nothing is recorded.
    /// If recording fails after the save, the error names the lost session.
    pub fn finish_sleep(
        &mut self,
        path: &Path,
        store: &EventStore,
        now: DateTime<Utc>,
    ) -> Result<SleepSession> {
        let mut timer = SleepTimer::resume(self.sleep_started_at);
        let session = timer.stop(now)?;

        let previous = self.sleep_started_at;
        self.sleep_started_at = timer.persisted();
        if let Err(e) = self.save(path) {
            self.sleep_started_at = previous;
            return Err(e);
        }

        store.append_sleep(&session).map_err(|e| {
            tracing::error!("Sleep session {} closed but not recorded: {}", session.id, e);
            Error::Other(format!(
                "Sleep session {} to {} was closed but could not be recorded: {}",
                session.start, session.end, e
            ))
        })?;
        Ok(session)
    }

    /// Load state, modify it, and save it back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut ProfileState) -> Result<()>,
    {
        let mut state = Self::load(path)?;
        f(&mut state)?;
        state.save(path)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gender;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");

        let state = ProfileState {
            profile: BiometricProfile {
                height_cm: Some(175.0),
                weight_kg: Some(70.0),
                gender: Gender::Female,
            },
            sleep_started_at: Some(Utc::now()),
        };
        state.save(&path).unwrap();

        let loaded = ProfileState::load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = ProfileState::load(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(state, ProfileState::default());
    }

    #[test]
    fn test_corrupted_file_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let state = ProfileState::load(&path).unwrap();
        assert_eq!(state, ProfileState::default());
    }

    #[test]
    fn test_sleep_timer_survives_restart_through_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        let started = Utc::now() - chrono::Duration::hours(6);

        ProfileState::update(&path, |state| {
            let mut timer = SleepTimer::resume(state.sleep_started_at);
            timer.start(started)?;
            state.sleep_started_at = timer.persisted();
            Ok(())
        })
        .unwrap();

        // Fresh load, as after a process restart
        let state = ProfileState::load(&path).unwrap();
        let mut timer = SleepTimer::resume(state.sleep_started_at);
        let session = timer.stop(started + chrono::Duration::hours(7)).unwrap();
        assert_eq!(session.duration_ms, 7 * 3_600_000);
        assert_eq!(timer.persisted(), None);
    }

    fn sleeping_state(path: &Path, started: DateTime<Utc>) -> ProfileState {
        let state = ProfileState {
            sleep_started_at: Some(started),
            ..ProfileState::default()
        };
        state.save(path).unwrap();
        state
    }

    #[test]
    fn test_finish_sleep_records_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        let store = EventStore::open(temp_dir.path().join("events"));
        let started = Utc::now() - chrono::Duration::hours(8);

        let mut state = sleeping_state(&path, started);
        let session = state
            .finish_sleep(&path, &store, started + chrono::Duration::hours(8))
            .unwrap();
        assert_eq!(session.duration_ms, 8 * 3_600_000);
        assert_eq!(ProfileState::load(&path).unwrap().sleep_started_at, None);

        let err = state.finish_sleep(&path, &store, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::NotActive));
        assert_eq!(store.read_sleep().unwrap().len(), 1);
    }

    #[test]
    fn test_finish_sleep_failed_save_records_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        let store = EventStore::open(temp_dir.path().join("events"));
        let started = Utc::now() - chrono::Duration::hours(7);
        let mut state = sleeping_state(&path, started);

        // Parent of the target is a regular file, so the save cannot succeed
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let unsavable = blocker.join("profile.json");

        assert!(state.finish_sleep(&unsavable, &store, Utc::now()).is_err());
        assert_eq!(state.sleep_started_at, Some(started));
        assert!(store.read_sleep().unwrap().is_empty());

        // Stopping again against the real path records exactly one session
        state.finish_sleep(&path, &store, Utc::now()).unwrap();
        assert_eq!(store.read_sleep().unwrap().len(), 1);
    }

    #[test]
    fn test_finish_sleep_failed_append_reports_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        let events = temp_dir.path().join("events");
        std::fs::write(&events, "").unwrap();
        let store = EventStore::open(&events);
        let mut state = sleeping_state(&path, Utc::now() - chrono::Duration::hours(6));

        let err = state.finish_sleep(&path, &store, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("could not be recorded"), "{}", err);
        assert_eq!(ProfileState::load(&path).unwrap().sleep_started_at, None);
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");

        ProfileState::default().save(&path).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "profile.json")
            .collect();
        assert!(extras.is_empty(), "Found extras: {:?}", extras);
    }
}
