use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use pantry_core::identity::Session;

/// The signed-in session, kept between runs in the data directory.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing, unreadable or expired session counts as signed out.
    pub fn load(&self) -> Option<Session> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.is_expired(chrono::Utc::now()) => {
                tracing::info!("stored session has expired");
                None
            }
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file: {e}");
                None
            }
        }
    }

    /// Write the session to a file only the owner can read. The token is
    /// never on disk with wider permissions.
    pub fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .context("Failed to open session file")?;
        #[cfg(unix)]
        {
            // `mode` only applies on creation; tighten a file left by an older run.
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        file.write_all(json.as_bytes())
            .context("Failed to write session file")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}
