//! On-disk documents: Workspace Configuration and Runtime State.
//!
//! Configuration is canonical for which terminals should exist and how
//! they are set up; State mirrors what is currently running. The daemon is
//! the sole writer of both while it is alive; everything else reads them
//! as snapshots. Both documents preserve unknown JSON fields across
//! read-modify-write cycles so older binaries never destroy data written
//! by newer ones.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ControlError, ControlResult};

/// Current schema version of both documents.
pub const SCHEMA_VERSION: u32 = 1;

/// Live status of a terminal. Written only by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    #[default]
    Idle,
    Busy,
    NeedsInput,
    Error,
    Stopped,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Idle => "idle",
            TerminalStatus::Busy => "busy",
            TerminalStatus::NeedsInput => "needs_input",
            TerminalStatus::Error => "error",
            TerminalStatus::Stopped => "stopped",
        }
    }
}

/// Behavior profile of a terminal. A closed set of known kinds plus a
/// free-form escape hatch, never untyped string dispatch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleConfig {
    /// Interactive shell, no agent attached.
    #[default]
    Plain,
    /// A known agent CLI identified by its worker type.
    Worker {
        worker_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt_file: Option<PathBuf>,
    },
    /// Anything else, referenced by a free-form prompt-file path.
    Custom { reference: String },
}

/// Autonomous-mode settings. An interval of 0 means disabled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutonomousConfig {
    #[serde(default)]
    pub target_interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_prompt: Option<String>,
}

impl AutonomousConfig {
    pub fn enabled(&self) -> bool {
        self.target_interval_ms > 0
    }
}

/// One terminal's durable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: RoleConfig,
    #[serde(default)]
    pub autonomous: AutonomousConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Underlying session handle, stable across daemon restarts.
    pub session_name: String,
    pub created_at: DateTime<Utc>,
    /// Fields this version does not know about, carried through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update for [`configure`](crate::client::ControlClient::configure_terminal):
/// unset fields leave the existing value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl TerminalPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.target_interval_ms.is_none()
            && self.interval_prompt.is_none()
            && self.working_dir.is_none()
    }

    /// Merge into an existing config. Never a full overwrite.
    pub fn apply(&self, config: &mut TerminalConfig) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(role) = &self.role {
            config.role = role.clone();
        }
        if let Some(interval) = self.target_interval_ms {
            config.autonomous.target_interval_ms = interval;
        }
        if let Some(prompt) = &self.interval_prompt {
            config.autonomous.interval_prompt = Some(prompt.clone());
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = Some(dir.clone());
        }
    }
}

/// The durable, versioned Workspace Configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: u32,
    /// Monotonic counter naming non-explicit terminals. Persists across
    /// restarts and never decreases.
    #[serde(default = "first_agent_number")]
    pub next_agent_number: u64,
    /// Insertion order is preserved; it drives default UI ordering only.
    #[serde(default)]
    pub terminals: Vec<TerminalConfig>,
    #[serde(default)]
    pub offline: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn first_agent_number() -> u64 {
    1
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            next_agent_number: 1,
            terminals: Vec::new(),
            offline: false,
            extra: Map::new(),
        }
    }
}

impl WorkspaceConfig {
    /// Load from disk. A missing file is an empty workspace; malformed
    /// JSON is surfaced as `Internal`, never auto-repaired.
    pub fn load(path: &Path) -> ControlResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ControlError::Internal(format!(
                    "malformed workspace config at {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ControlError::Internal(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn save(&self, path: &Path) -> ControlResult<()> {
        write_atomic(path, self)
    }

    pub fn terminal(&self, id: &str) -> Option<&TerminalConfig> {
        self.terminals.iter().find(|t| t.id == id)
    }

    pub fn terminal_mut(&mut self, id: &str) -> Option<&mut TerminalConfig> {
        self.terminals.iter_mut().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.terminal(id).is_some()
    }

    /// Append a terminal, enforcing id uniqueness. The document is left
    /// unchanged on `Conflict`.
    pub fn insert(&mut self, config: TerminalConfig) -> ControlResult<()> {
        if self.contains(&config.id) {
            return Err(ControlError::Conflict(format!(
                "terminal id '{}' already exists",
                config.id
            )));
        }
        self.terminals.push(config);
        Ok(())
    }

    /// Remove a terminal. Unknown ids surface `NotFound` so callers can
    /// detect drift instead of silently succeeding.
    pub fn remove(&mut self, id: &str) -> ControlResult<TerminalConfig> {
        match self.terminals.iter().position(|t| t.id == id) {
            Some(idx) => Ok(self.terminals.remove(idx)),
            None => Err(ControlError::NotFound(id.to_string())),
        }
    }
}

/// Per-terminal live fields. Written only by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalRuntime {
    #[serde(default)]
    pub status: TerminalStatus,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interval_run: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The Runtime State document: a durable mirror of live status.
///
/// Terminals are keyed in a `BTreeMap` so repeated serialization of
/// unchanged state is byte-identical — the MCP layer and its tests rely
/// on that determinism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_pid: Option<u32>,
    #[serde(default = "first_agent_number")]
    pub next_agent_number: u64,
    #[serde(default)]
    pub terminals: BTreeMap<String, TerminalRuntime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_terminal: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            daemon_pid: None,
            next_agent_number: 1,
            terminals: BTreeMap::new(),
            selected_terminal: None,
            updated_at: Utc::now(),
            extra: Map::new(),
        }
    }
}

impl RuntimeState {
    pub fn load(path: &Path) -> ControlResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ControlError::Internal(format!(
                    "malformed runtime state at {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ControlError::Internal(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn save(&self, path: &Path) -> ControlResult<()> {
        write_atomic(path, self)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Mark `id` primary and every other terminal non-primary, as one
    /// document update. There is no intermediate zero-primary or
    /// multi-primary document to observe.
    pub fn set_primary(&mut self, id: &str) -> ControlResult<()> {
        if !self.terminals.contains_key(id) {
            return Err(ControlError::NotFound(id.to_string()));
        }
        for (tid, runtime) in self.terminals.iter_mut() {
            runtime.is_primary = tid == id;
        }
        self.touch();
        Ok(())
    }

    /// The current primary terminal id, if any.
    pub fn primary(&self) -> Option<&str> {
        self.terminals
            .iter()
            .find(|(_, r)| r.is_primary)
            .map(|(id, _)| id.as_str())
    }
}

/// Serialize to a temp file in the target directory, then rename over the
/// destination. A crash mid-write leaves the old document intact.
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> ControlResult<()> {
    let parent = path.parent().ok_or_else(|| {
        ControlError::Internal(format!("document path has no parent: {}", path.display()))
    })?;
    std::fs::create_dir_all(parent).map_err(|e| {
        ControlError::Internal(format!("failed to create {}: {}", parent.display(), e))
    })?;

    let content = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut tmp = std::fs::File::create(&tmp_path).map_err(|e| {
            ControlError::Internal(format!("failed to create {}: {}", tmp_path.display(), e))
        })?;
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| {
        ControlError::Internal(format!(
            "failed to replace {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn sample_terminal(id: &str) -> TerminalConfig {
        TerminalConfig {
            id: id.to_string(),
            name: format!("Agent {}", id),
            role: RoleConfig::Plain,
            autonomous: AutonomousConfig::default(),
            working_dir: None,
            session_name: format!("hm-{}", id),
            created_at: Utc::now(),
            extra: Map::new(),
        }
    }

    #[test]
    fn missing_files_load_as_empty_documents() {
        let dir = TempDir::new().unwrap();
        let config = WorkspaceConfig::load(&dir.path().join("config.json")).unwrap();
        assert!(config.terminals.is_empty());
        assert_eq!(config.next_agent_number, 1);

        let state = RuntimeState::load(&dir.path().join("state.json")).unwrap();
        assert!(state.terminals.is_empty());
    }

    #[test]
    fn malformed_json_is_internal_not_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = WorkspaceConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        // The broken file is still there, untouched.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = WorkspaceConfig::default();
        config.insert(sample_terminal("t-1")).unwrap();
        config.next_agent_number = 2;
        config.save(&path).unwrap();

        let reloaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(reloaded.next_agent_number, 2);
        assert_eq!(reloaded.terminals.len(), 1);
        assert_eq!(reloaded.terminals[0].id, "t-1");
    }

    #[test]
    fn unknown_fields_survive_read_modify_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "version": 1,
                "next_agent_number": 5,
                "terminals": [],
                "future_feature": {"enabled": true}
            }"#,
        )
        .unwrap();

        let mut config = WorkspaceConfig::load(&path).unwrap();
        config.insert(sample_terminal("t-5")).unwrap();
        config.save(&path).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["future_feature"]["enabled"], Value::Bool(true));
        assert_eq!(raw["next_agent_number"], 5);
    }

    #[test]
    fn insert_conflict_leaves_document_unchanged() {
        let mut config = WorkspaceConfig::default();
        config.insert(sample_terminal("t-1")).unwrap();

        let err = config.insert(sample_terminal("t-1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(config.terminals.len(), 1);
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let mut config = WorkspaceConfig::default();
        let err = config.remove("t-9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn patch_merges_without_touching_other_fields() {
        let mut terminal = sample_terminal("t-1");
        terminal.autonomous.target_interval_ms = 300_000;
        terminal.autonomous.interval_prompt = Some("continue".into());

        let patch = TerminalPatch {
            name: Some("Builder".into()),
            ..Default::default()
        };
        patch.apply(&mut terminal);

        assert_eq!(terminal.name, "Builder");
        assert_eq!(terminal.autonomous.target_interval_ms, 300_000);
        assert_eq!(terminal.autonomous.interval_prompt.as_deref(), Some("continue"));
        assert_eq!(terminal.role, RoleConfig::Plain);
    }

    #[test]
    fn empty_patch_is_detectable() {
        assert!(TerminalPatch::default().is_empty());
        let patch = TerminalPatch {
            target_interval_ms: Some(0),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn set_primary_is_exclusive() {
        let mut state = RuntimeState::default();
        state.terminals.insert(
            "t-1".into(),
            TerminalRuntime {
                is_primary: true,
                ..Default::default()
            },
        );
        state
            .terminals
            .insert("t-2".into(), TerminalRuntime::default());

        state.set_primary("t-2").unwrap();
        assert_eq!(state.primary(), Some("t-2"));
        assert!(!state.terminals["t-1"].is_primary);

        // Exactly one primary after every call.
        let primaries = state.terminals.values().filter(|r| r.is_primary).count();
        assert_eq!(primaries, 1);
    }

    #[test]
    fn set_primary_unknown_id_leaves_state_unchanged() {
        let mut state = RuntimeState::default();
        state.terminals.insert(
            "t-1".into(),
            TerminalRuntime {
                is_primary: true,
                ..Default::default()
            },
        );
        let err = state.set_primary("t-9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(state.primary(), Some("t-1"));
    }

    #[test]
    fn state_serialization_is_deterministic() {
        let mut state = RuntimeState::default();
        state
            .terminals
            .insert("t-2".into(), TerminalRuntime::default());
        state
            .terminals
            .insert("t-1".into(), TerminalRuntime::default());

        let a = serde_json::to_string_pretty(&state).unwrap();
        let b = serde_json::to_string_pretty(&state).unwrap();
        assert_eq!(a, b);
        // BTreeMap ordering: t-1 before t-2 regardless of insertion order.
        assert!(a.find("t-1").unwrap() < a.find("t-2").unwrap());
    }

    #[test]
    fn role_config_tagged_representation() {
        let role = RoleConfig::Worker {
            worker_type: "claude".into(),
            prompt_file: None,
        };
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["kind"], "worker");
        assert_eq!(json["worker_type"], "claude");

        let custom: RoleConfig =
            serde_json::from_value(serde_json::json!({"kind": "custom", "reference": "roles/reviewer.md"}))
                .unwrap();
        assert_eq!(
            custom,
            RoleConfig::Custom {
                reference: "roles/reviewer.md".into()
            }
        );
    }
}
