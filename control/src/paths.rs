//! Workspace and socket path resolution.
//!
//! Exactly two environment inputs exist: a workspace-path override and a
//! socket-path override. Both are optional with per-user defaults.

use std::path::{Path, PathBuf};

/// Overrides the workspace directory holding `config.json` / `state.json`.
pub const WORKSPACE_ENV: &str = "HELMSMAN_WORKSPACE";

/// Overrides the daemon control socket path.
pub const SOCKET_ENV: &str = "HELMSMAN_SOCKET";

const CONFIG_FILE: &str = "config.json";
const STATE_FILE: &str = "state.json";

/// Resolved locations for one workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    workspace_dir: PathBuf,
    socket_path: PathBuf,
}

impl WorkspacePaths {
    /// Resolve from the environment, falling back to per-user defaults.
    pub fn resolve() -> Self {
        let workspace_dir = std::env::var_os(WORKSPACE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_workspace_dir);
        let socket_path = std::env::var_os(SOCKET_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_socket_path);
        Self {
            workspace_dir,
            socket_path,
        }
    }

    /// Explicit locations, bypassing the environment. Used by the daemon's
    /// CLI flags and by tests.
    pub fn new(workspace_dir: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            socket_path: socket_path.into(),
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Durable Workspace Configuration document.
    pub fn config_path(&self) -> PathBuf {
        self.workspace_dir.join(CONFIG_FILE)
    }

    /// Runtime State document mirroring live status.
    pub fn state_path(&self) -> PathBuf {
        self.workspace_dir.join(STATE_FILE)
    }
}

/// Default workspace directory under the platform data dir.
pub fn default_workspace_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("helmsman")
}

/// Default control socket under the platform cache dir.
pub fn default_socket_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("helmsman")
        .join("daemon.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_paths_live_under_workspace_dir() {
        let paths = WorkspacePaths::new("/ws", "/run/helmsman.sock");
        assert_eq!(paths.config_path(), PathBuf::from("/ws/config.json"));
        assert_eq!(paths.state_path(), PathBuf::from("/ws/state.json"));
        assert_eq!(paths.socket_path(), Path::new("/run/helmsman.sock"));
    }

    #[test]
    fn defaults_are_per_user_locations() {
        assert!(default_workspace_dir().ends_with("helmsman"));
        assert!(default_socket_path().ends_with("helmsman/daemon.sock"));
    }
}
