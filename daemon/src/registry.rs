//! The registry: single logical owner of every session and both on-disk
//! documents.
//!
//! All mutations flow through one task consuming a command queue;
//! connection handlers only enqueue a request and await a oneshot reply.
//! Serialization per terminal id falls out of the single consumer, and
//! the registry is the sole writer of the Runtime State document while
//! the daemon is alive. Reader threads and interval timers feed back in
//! through an event channel instead of touching state themselves.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use helmsman_control::{
    AgentMetrics, ControlError, ControlResult, CreateSpec, DaemonRequest, DaemonResponse,
    RuntimeState, TerminalConfig, TerminalPatch, TerminalRuntime, TerminalStatus, TerminalSummary,
    WorkspaceConfig, WorkspacePaths,
};

use crate::session::{OutputBuffer, SessionHandle};
use crate::status;

/// Internal feedback from reader threads and interval timers.
#[derive(Debug)]
pub enum Event {
    Output { id: String, chunk: String },
    Exited { id: String },
    Tick { id: String },
}

/// One queued request with its reply slot.
pub struct Command {
    pub request: DaemonRequest,
    pub reply: oneshot::Sender<DaemonResponse>,
}

/// Cheap clonable entry point into the registry's command queue.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<Command>,
}

impl RegistryHandle {
    pub async fn dispatch(&self, request: DaemonRequest) -> DaemonResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = Command {
            request,
            reply: reply_tx,
        };
        if self.tx.send(command).await.is_err() {
            return DaemonResponse::Error {
                kind: helmsman_control::ErrorKind::Internal,
                message: "daemon is shutting down".into(),
            };
        }
        reply_rx.await.unwrap_or(DaemonResponse::Error {
            kind: helmsman_control::ErrorKind::Internal,
            message: "daemon dropped the request".into(),
        })
    }
}

/// Live bookkeeping for one terminal, alongside its config entry.
struct Session {
    handle: Option<SessionHandle>,
    output: OutputBuffer,
    metrics: AgentMetrics,
    /// Interval timer: configured period in ms plus the running task.
    timer: Option<(u64, JoinHandle<()>)>,
}

impl Session {
    fn new(handle: SessionHandle) -> Self {
        Self {
            handle: Some(handle),
            output: OutputBuffer::default(),
            metrics: AgentMetrics::default(),
            timer: None,
        }
    }
}

pub struct Registry {
    paths: WorkspacePaths,
    config: WorkspaceConfig,
    state: RuntimeState,
    sessions: HashMap<String, Session>,
    events_tx: mpsc::Sender<Event>,
    shutting_down: bool,
}

impl Registry {
    /// Load both documents, reconcile them, and record this process as
    /// the running daemon. Sessions are not spawned yet; `start` does
    /// that.
    pub fn new(paths: WorkspacePaths, events_tx: mpsc::Sender<Event>) -> ControlResult<Self> {
        let mut config = WorkspaceConfig::load(&paths.config_path())?;
        let mut state = RuntimeState::load(&paths.state_path())?;

        // Configuration is canonical for which terminals exist; drop
        // state entries that lost their config entry.
        state
            .terminals
            .retain(|id, _| config.terminal(id).is_some());

        // The counter only ever moves forward, whichever document saw it
        // last.
        let next = config.next_agent_number.max(state.next_agent_number);
        config.next_agent_number = next;
        state.next_agent_number = next;

        state.daemon_pid = Some(std::process::id());
        state.touch();
        config.save(&paths.config_path())?;
        state.save(&paths.state_path())?;

        Ok(Self {
            paths,
            config,
            state,
            sessions: HashMap::new(),
            events_tx,
            shutting_down: false,
        })
    }

    /// Spawn sessions for every configured terminal and resume enabled
    /// interval timers. Per-terminal failures are recorded as `Error`
    /// status, not fatal.
    pub fn start(&mut self) {
        let ids: Vec<String> = self.config.terminals.iter().map(|t| t.id.clone()).collect();
        for id in ids {
            match self.spawn_session(&id) {
                Ok(()) => {
                    if self.autonomous_ready(&id) {
                        self.ensure_timer(&id);
                    }
                }
                Err(e) => {
                    tracing::error!(terminal = %id, error = %e, "failed to start session");
                    self.set_status(&id, TerminalStatus::Error);
                }
            }
        }
        self.persist_state();
    }

    /// Consume commands and events until shutdown, then tear everything
    /// down.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: mpsc::Receiver<Event>) {
        while !self.shutting_down {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command { request, reply }) => {
                        let response = self.handle_request(request).await;
                        let _ = reply.send(response);
                    }
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        self.finalize();
    }

    pub fn handle(tx: mpsc::Sender<Command>) -> RegistryHandle {
        RegistryHandle { tx }
    }

    /// Dispatch one request. Every error becomes a typed wire error with
    /// the original message preserved.
    pub async fn handle_request(&mut self, request: DaemonRequest) -> DaemonResponse {
        let result = match request {
            DaemonRequest::Ping => Ok(DaemonResponse::Pong),
            DaemonRequest::ListTerminals => Ok(DaemonResponse::Terminals {
                terminals: self.summaries(),
            }),
            DaemonRequest::GetOutput { id, lines } => self.get_output(&id, lines),
            DaemonRequest::SendInput { id, text } => self.send_input(&id, &text),
            DaemonRequest::Create { spec } => self.create(spec),
            DaemonRequest::Delete { id } => self.delete(&id),
            DaemonRequest::Restart { id } => self.restart(&id),
            DaemonRequest::Configure { id, patch } => self.configure(&id, patch),
            DaemonRequest::SetPrimary { id } => self.set_primary(&id),
            DaemonRequest::StartInterval { id } => self.start_interval(&id),
            DaemonRequest::StopInterval { id } => self.stop_interval(&id),
            DaemonRequest::RunIntervalNow { id } => self.run_interval_now(&id),
            DaemonRequest::GetMetrics { id } => self.get_metrics(&id),
            DaemonRequest::Shutdown => {
                tracing::info!("shutdown requested");
                self.shutting_down = true;
                Ok(DaemonResponse::Ok)
            }
        };

        result.unwrap_or_else(|e| DaemonResponse::Error {
            kind: e.kind(),
            message: e.to_string(),
        })
    }

    /// Apply one internal event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Output { id, chunk } => {
                let inferred = {
                    let Some(session) = self.sessions.get_mut(&id) else {
                        return;
                    };
                    session.output.push(chunk);
                    status::infer(&session.output.tail_lines(30))
                };
                if let Some(new_status) = inferred {
                    let current = self
                        .state
                        .terminals
                        .get(&id)
                        .map(|r| r.status)
                        .unwrap_or_default();
                    if current != new_status && current != TerminalStatus::Stopped {
                        self.set_status(&id, new_status);
                        self.persist_state();
                    }
                }
            }
            Event::Exited { id } => {
                tracing::info!(terminal = %id, "session exited");
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.handle = None;
                }
                self.set_status(&id, TerminalStatus::Stopped);
                self.persist_state();
            }
            Event::Tick { id } => {
                if self.autonomous_ready(&id) {
                    if let Err(e) = self.inject_interval(&id) {
                        tracing::warn!(terminal = %id, error = %e, "interval injection failed");
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    fn summaries(&self) -> Vec<TerminalSummary> {
        self.config
            .terminals
            .iter()
            .map(|t| {
                let runtime = self.state.terminals.get(&t.id).cloned().unwrap_or_default();
                TerminalSummary::from_parts(t, runtime.status, runtime.is_primary)
            })
            .collect()
    }

    fn get_output(&self, id: &str, lines: usize) -> ControlResult<DaemonResponse> {
        if !self.config.contains(id) {
            return Err(ControlError::NotFound(id.to_string()));
        }
        let text = self
            .sessions
            .get(id)
            .map(|s| s.output.tail_lines(lines))
            .unwrap_or_default();
        Ok(DaemonResponse::Output {
            id: id.to_string(),
            text,
        })
    }

    fn send_input(&mut self, id: &str, text: &str) -> ControlResult<DaemonResponse> {
        if !self.config.contains(id) {
            return Err(ControlError::NotFound(id.to_string()));
        }
        self.write_to_session(id, text)?;
        if let Some(session) = self.sessions.get_mut(id) {
            session.metrics.inputs_sent += 1;
        }
        Ok(DaemonResponse::Ok)
    }

    fn create(&mut self, spec: CreateSpec) -> ControlResult<DaemonResponse> {
        if let Some(id) = &spec.id {
            if id.is_empty() {
                return Err(ControlError::Invalid("terminal id must not be empty".into()));
            }
            if self.config.contains(id) {
                return Err(ControlError::Conflict(format!(
                    "terminal id '{}' already exists",
                    id
                )));
            }
        }

        // Generated ids and names come from the persisted counter; it
        // advances past any explicit id it would collide with, and only
        // moves when it was actually consumed.
        let counter_used = spec.id.is_none() || spec.name.is_none();
        let mut number = self.config.next_agent_number;
        let id = match spec.id {
            Some(id) => id,
            None => loop {
                let candidate = format!("t-{}", number);
                if !self.config.contains(&candidate) {
                    break candidate;
                }
                number += 1;
            },
        };
        let name = spec
            .name
            .unwrap_or_else(|| format!("Agent {}", number));
        if counter_used {
            self.config.next_agent_number = number + 1;
            self.state.next_agent_number = number + 1;
        }

        let terminal = TerminalConfig {
            id: id.clone(),
            name,
            role: spec.role,
            autonomous: spec.autonomous,
            working_dir: spec.working_dir,
            session_name: format!("hm-{}", id),
            created_at: Utc::now(),
            extra: Default::default(),
        };
        self.config.insert(terminal)?;

        if let Err(e) = self.spawn_session(&id) {
            // Creation failed; leave no trace in either document.
            let _ = self.config.remove(&id);
            return Err(e);
        }

        let first = self.state.terminals.is_empty();
        self.state.terminals.insert(
            id.clone(),
            TerminalRuntime {
                status: TerminalStatus::Idle,
                is_primary: first,
                agent_pid: self.sessions.get(&id).and_then(|s| {
                    s.handle.as_ref().and_then(|h| h.pid())
                }),
                ..Default::default()
            },
        );
        self.state.touch();
        self.persist_config();
        self.persist_state();

        if self.autonomous_ready(&id) {
            self.ensure_timer(&id);
        }

        let config = self.config.terminal(&id).cloned().ok_or_else(|| {
            ControlError::Internal(format!("terminal '{}' vanished during create", id))
        })?;
        let runtime = self.state.terminals.get(&id).cloned().unwrap_or_default();
        Ok(DaemonResponse::Created {
            terminal: TerminalSummary::from_parts(&config, runtime.status, runtime.is_primary),
        })
    }

    /// Tear down a session and remove every reference to it. Teardown
    /// completes before the reply is sent, so a colliding create can
    /// never observe a half-destroyed terminal.
    fn delete(&mut self, id: &str) -> ControlResult<DaemonResponse> {
        self.config.remove(id)?;
        self.stop_timer(id);
        if let Some(mut session) = self.sessions.remove(id) {
            if let Some(handle) = session.handle.as_mut() {
                handle.kill();
            }
        }
        self.state.terminals.remove(id);
        if self.state.selected_terminal.as_deref() == Some(id) {
            self.state.selected_terminal = None;
        }
        self.state.touch();
        self.persist_config();
        self.persist_state();
        Ok(DaemonResponse::Ok)
    }

    /// Recreate the underlying session with cleared history. The config
    /// entry is untouched, so repeating this is harmless.
    fn restart(&mut self, id: &str) -> ControlResult<DaemonResponse> {
        if !self.config.contains(id) {
            return Err(ControlError::NotFound(id.to_string()));
        }
        let previous_metrics = self
            .sessions
            .get(id)
            .map(|s| s.metrics.clone())
            .unwrap_or_default();
        if let Some(mut session) = self.sessions.remove(id) {
            if let Some(handle) = session.handle.as_mut() {
                handle.kill();
            }
        }
        self.spawn_session(id)?;
        if let Some(session) = self.sessions.get_mut(id) {
            session.metrics = previous_metrics;
            session.metrics.restarts += 1;
        }
        self.set_status(id, TerminalStatus::Idle);
        if let Some(runtime) = self.state.terminals.get_mut(id) {
            runtime.agent_pid = self
                .sessions
                .get(id)
                .and_then(|s| s.handle.as_ref().and_then(|h| h.pid()));
        }
        self.persist_state();
        Ok(DaemonResponse::Ok)
    }

    fn configure(&mut self, id: &str, patch: TerminalPatch) -> ControlResult<DaemonResponse> {
        let interval_touched = patch.target_interval_ms.is_some() || patch.interval_prompt.is_some();
        {
            let terminal = self
                .config
                .terminal_mut(id)
                .ok_or_else(|| ControlError::NotFound(id.to_string()))?;
            patch.apply(terminal);
        }
        self.persist_config();

        if interval_touched {
            if self.autonomous_ready(id) {
                self.restart_timer(id);
            } else {
                self.stop_timer(id);
            }
        }
        Ok(DaemonResponse::Ok)
    }

    fn set_primary(&mut self, id: &str) -> ControlResult<DaemonResponse> {
        self.state.set_primary(id)?;
        self.persist_state();
        Ok(DaemonResponse::Ok)
    }

    fn start_interval(&mut self, id: &str) -> ControlResult<DaemonResponse> {
        let terminal = self
            .config
            .terminal(id)
            .ok_or_else(|| ControlError::NotFound(id.to_string()))?;
        if !terminal.autonomous.enabled() {
            return Err(ControlError::Invalid(format!(
                "terminal '{}' has target_interval_ms = 0 (autonomous mode disabled)",
                id
            )));
        }
        if terminal.autonomous.interval_prompt.is_none() {
            return Err(ControlError::Invalid(format!(
                "terminal '{}' has no interval_prompt configured",
                id
            )));
        }
        self.ensure_timer(id);
        Ok(DaemonResponse::Ok)
    }

    fn stop_interval(&mut self, id: &str) -> ControlResult<DaemonResponse> {
        if !self.config.contains(id) {
            return Err(ControlError::NotFound(id.to_string()));
        }
        self.stop_timer(id);
        Ok(DaemonResponse::Ok)
    }

    /// One immediate injection, leaving the running schedule's next fire
    /// time untouched.
    fn run_interval_now(&mut self, id: &str) -> ControlResult<DaemonResponse> {
        let terminal = self
            .config
            .terminal(id)
            .ok_or_else(|| ControlError::NotFound(id.to_string()))?;
        if terminal.autonomous.interval_prompt.is_none() {
            return Err(ControlError::Invalid(format!(
                "terminal '{}' has no interval_prompt configured",
                id
            )));
        }
        self.inject_interval(id)?;
        Ok(DaemonResponse::Ok)
    }

    fn get_metrics(&self, id: &str) -> ControlResult<DaemonResponse> {
        if !self.config.contains(id) {
            return Err(ControlError::NotFound(id.to_string()));
        }
        let metrics = self
            .sessions
            .get(id)
            .map(|s| s.metrics.clone())
            .unwrap_or_default();
        Ok(DaemonResponse::Metrics {
            id: id.to_string(),
            metrics,
        })
    }

    // ------------------------------------------------------------------
    // Session plumbing
    // ------------------------------------------------------------------

    fn spawn_session(&mut self, id: &str) -> ControlResult<()> {
        let config = self
            .config
            .terminal(id)
            .ok_or_else(|| ControlError::NotFound(id.to_string()))?;
        let (handle, reader) = SessionHandle::spawn(config)?;
        spawn_reader(id.to_string(), reader, self.events_tx.clone());

        match self.sessions.get_mut(id) {
            Some(session) => {
                session.handle = Some(handle);
                session.output.clear();
            }
            None => {
                self.sessions.insert(id.to_string(), Session::new(handle));
            }
        }
        tracing::info!(terminal = %id, "session started");
        Ok(())
    }

    fn write_to_session(&mut self, id: &str, text: &str) -> ControlResult<()> {
        let session = self
            .sessions
            .get_mut(id)
            .and_then(|s| s.handle.as_mut())
            .ok_or_else(|| {
                ControlError::Internal(format!(
                    "session for terminal '{}' is not running (restart it first)",
                    id
                ))
            })?;
        // Input is submitted, not just typed.
        if text.ends_with('\n') {
            session.write(text.as_bytes())
        } else {
            session.write(format!("{}\n", text).as_bytes())
        }
    }

    fn inject_interval(&mut self, id: &str) -> ControlResult<()> {
        let prompt = self
            .config
            .terminal(id)
            .and_then(|t| t.autonomous.interval_prompt.clone())
            .ok_or_else(|| {
                ControlError::Invalid(format!("terminal '{}' has no interval_prompt", id))
            })?;
        self.write_to_session(id, &prompt)?;

        let now = Utc::now();
        if let Some(session) = self.sessions.get_mut(id) {
            session.metrics.interval_runs += 1;
            session.metrics.last_interval_run = Some(now);
        }
        if let Some(runtime) = self.state.terminals.get_mut(id) {
            runtime.last_interval_run = Some(now);
        }
        self.state.touch();
        self.persist_state();
        Ok(())
    }

    fn autonomous_ready(&self, id: &str) -> bool {
        self.config
            .terminal(id)
            .map(|t| t.autonomous.enabled() && t.autonomous.interval_prompt.is_some())
            .unwrap_or(false)
    }

    /// Start the interval timer unless one with the same period is
    /// already running. Starting twice never stacks timers.
    fn ensure_timer(&mut self, id: &str) {
        let Some(period_ms) = self
            .config
            .terminal(id)
            .map(|t| t.autonomous.target_interval_ms)
        else {
            return;
        };
        if period_ms == 0 {
            return;
        }
        if let Some(session) = self.sessions.get(id) {
            if let Some((running_period, handle)) = &session.timer {
                if *running_period == period_ms && !handle.is_finished() {
                    return;
                }
            }
        }
        self.stop_timer(id);

        let events_tx = self.events_tx.clone();
        let terminal_id = id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_millis(period_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; the schedule starts
            // one full period out.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if events_tx
                    .send(Event::Tick {
                        id: terminal_id.clone(),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        if let Some(session) = self.sessions.get_mut(id) {
            session.timer = Some((period_ms, handle));
            tracing::info!(terminal = %id, period_ms, "interval timer started");
        } else {
            handle.abort();
        }
    }

    fn restart_timer(&mut self, id: &str) {
        let was_running = self
            .sessions
            .get(id)
            .map(|s| s.timer.is_some())
            .unwrap_or(false);
        if was_running {
            self.stop_timer(id);
        }
        self.ensure_timer(id);
    }

    fn stop_timer(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            if let Some((_, handle)) = session.timer.take() {
                handle.abort();
                tracing::info!(terminal = %id, "interval timer stopped");
            }
        }
    }

    fn set_status(&mut self, id: &str, new_status: TerminalStatus) {
        if let Some(runtime) = self.state.terminals.get_mut(id) {
            runtime.status = new_status;
            self.state.touch();
        }
    }

    fn persist_config(&self) {
        if let Err(e) = self.config.save(&self.paths.config_path()) {
            tracing::error!(error = %e, "failed to persist workspace config");
        }
    }

    fn persist_state(&self) {
        if let Err(e) = self.state.save(&self.paths.state_path()) {
            tracing::error!(error = %e, "failed to persist runtime state");
        }
    }

    /// Final teardown: stop timers, kill sessions, mark everything
    /// stopped, and release the daemon pid.
    fn finalize(&mut self) {
        let ids: Vec<String> = self.sessions.keys().cloned().collect();
        for id in ids {
            self.stop_timer(&id);
            if let Some(session) = self.sessions.get_mut(&id) {
                if let Some(handle) = session.handle.as_mut() {
                    handle.kill();
                }
            }
        }
        for runtime in self.state.terminals.values_mut() {
            runtime.status = TerminalStatus::Stopped;
            runtime.agent_pid = None;
        }
        self.state.daemon_pid = None;
        self.state.touch();
        self.persist_state();
        tracing::info!("registry finalized");
    }
}

/// Drain a session's PTY output on a dedicated thread, forwarding chunks
/// into the registry's event queue.
fn spawn_reader(id: String, mut reader: Box<dyn std::io::Read + Send>, tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => {
                    let chunk = String::from_utf8_lossy(&buffer[..count]).to_string();
                    if tx
                        .blocking_send(Event::Output {
                            id: id.clone(),
                            chunk,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.blocking_send(Event::Exited { id });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_control::{AutonomousConfig, ErrorKind};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        registry: Registry,
        events_rx: mpsc::Receiver<Event>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let paths = WorkspacePaths::new(dir.path(), dir.path().join("daemon.sock"));
        let (events_tx, events_rx) = mpsc::channel(1024);
        let registry = Registry::new(paths, events_tx).unwrap();
        Fixture {
            registry,
            events_rx,
            _dir: dir,
        }
    }

    fn expect_error(response: DaemonResponse) -> (ErrorKind, String) {
        match response {
            DaemonResponse::Error { kind, message } => (kind, message),
            other => panic!("expected error, got {:?}", other),
        }
    }

    async fn create_named(registry: &mut Registry, name: &str) -> TerminalSummary {
        let spec = CreateSpec {
            name: Some(name.to_string()),
            ..Default::default()
        };
        match registry
            .handle_request(DaemonRequest::Create { spec })
            .await
        {
            DaemonResponse::Created { terminal } => terminal,
            other => panic!("create failed: {:?}", other),
        }
    }

    async fn list_ids(registry: &mut Registry) -> Vec<String> {
        match registry.handle_request(DaemonRequest::ListTerminals).await {
            DaemonResponse::Terminals { terminals } => {
                terminals.into_iter().map(|t| t.id).collect()
            }
            other => panic!("list failed: {:?}", other),
        }
    }

    /// Feed pending reader/timer events back into the registry for a
    /// while, the way the run loop would.
    async fn pump_events(fixture_registry: &mut Registry, rx: &mut mpsc::Receiver<Event>, for_ms: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(for_ms);
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => fixture_registry.handle_event(event),
                _ => break,
            }
        }
    }

    #[tokio::test]
    async fn create_then_delete_scenario() {
        let mut fx = fixture();

        let created = create_named(&mut fx.registry, "Builder").await;
        assert_eq!(created.name, "Builder");
        assert!(list_ids(&mut fx.registry).await.contains(&created.id));

        let response = fx
            .registry
            .handle_request(DaemonRequest::Delete {
                id: created.id.clone(),
            })
            .await;
        assert!(matches!(response, DaemonResponse::Ok));
        assert!(!list_ids(&mut fx.registry).await.contains(&created.id));

        // Deleting again surfaces the drift instead of silently passing.
        let (kind, _) = expect_error(
            fx.registry
                .handle_request(DaemonRequest::Delete { id: created.id })
                .await,
        );
        assert_eq!(kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn explicit_id_conflict_leaves_config_unchanged() {
        let mut fx = fixture();
        let spec = CreateSpec {
            id: Some("t-7".into()),
            ..Default::default()
        };
        let response = fx
            .registry
            .handle_request(DaemonRequest::Create { spec: spec.clone() })
            .await;
        assert!(matches!(response, DaemonResponse::Created { .. }));

        let (kind, message) =
            expect_error(fx.registry.handle_request(DaemonRequest::Create { spec }).await);
        assert_eq!(kind, ErrorKind::Conflict);
        assert!(message.contains("t-7"));
        assert_eq!(list_ids(&mut fx.registry).await, vec!["t-7".to_string()]);
    }

    #[tokio::test]
    async fn generated_ids_skip_explicit_collisions() {
        let mut fx = fixture();
        let spec = CreateSpec {
            id: Some("t-1".into()),
            ..Default::default()
        };
        fx.registry
            .handle_request(DaemonRequest::Create { spec })
            .await;

        let generated = create_named(&mut fx.registry, "Second").await;
        assert_eq!(generated.id, "t-2");
    }

    #[tokio::test]
    async fn configure_round_trips_and_touches_nothing_else() {
        let mut fx = fixture();
        let created = create_named(&mut fx.registry, "Agent").await;
        let before = fx.registry.config.terminal(&created.id).cloned().unwrap();

        let patch = TerminalPatch {
            name: Some("X".into()),
            ..Default::default()
        };
        let response = fx
            .registry
            .handle_request(DaemonRequest::Configure {
                id: created.id.clone(),
                patch,
            })
            .await;
        assert!(matches!(response, DaemonResponse::Ok));

        let after = fx.registry.config.terminal(&created.id).cloned().unwrap();
        assert_eq!(after.name, "X");
        assert_eq!(after.role, before.role);
        assert_eq!(after.autonomous, before.autonomous);
        assert_eq!(after.session_name, before.session_name);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn restart_preserves_configuration() {
        let mut fx = fixture();
        let created = create_named(&mut fx.registry, "Agent").await;
        let before = fx.registry.config.terminal(&created.id).cloned().unwrap();

        for _ in 0..2 {
            let response = fx
                .registry
                .handle_request(DaemonRequest::Restart {
                    id: created.id.clone(),
                })
                .await;
            assert!(matches!(response, DaemonResponse::Ok));
            let after = fx.registry.config.terminal(&created.id).cloned().unwrap();
            assert_eq!(after, before);
        }

        match fx
            .registry
            .handle_request(DaemonRequest::GetMetrics {
                id: created.id.clone(),
            })
            .await
        {
            DaemonResponse::Metrics { metrics, .. } => assert_eq!(metrics.restarts, 2),
            other => panic!("metrics failed: {:?}", other),
        }
    }

    #[tokio::test]
    async fn first_terminal_becomes_primary_and_switch_is_exclusive() {
        let mut fx = fixture();
        let first = create_named(&mut fx.registry, "One").await;
        assert!(first.is_primary);
        let second = create_named(&mut fx.registry, "Two").await;
        assert!(!second.is_primary);

        let response = fx
            .registry
            .handle_request(DaemonRequest::SetPrimary {
                id: second.id.clone(),
            })
            .await;
        assert!(matches!(response, DaemonResponse::Ok));

        let state = &fx.registry.state;
        assert!(!state.terminals[&first.id].is_primary);
        assert!(state.terminals[&second.id].is_primary);
        assert_eq!(
            state.terminals.values().filter(|r| r.is_primary).count(),
            1
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let mut fx = fixture();
        for request in [
            DaemonRequest::GetOutput {
                id: "t-9".into(),
                lines: 10,
            },
            DaemonRequest::SendInput {
                id: "t-9".into(),
                text: "hi".into(),
            },
            DaemonRequest::GetMetrics { id: "t-9".into() },
            DaemonRequest::Restart { id: "t-9".into() },
        ] {
            let (kind, _) = expect_error(fx.registry.handle_request(request).await);
            assert_eq!(kind, ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn output_starts_empty_not_erroring() {
        let mut fx = fixture();
        let created = create_named(&mut fx.registry, "Quiet").await;
        // Ask immediately, before the shell could possibly print.
        match fx
            .registry
            .handle_request(DaemonRequest::GetOutput {
                id: created.id,
                lines: 10,
            })
            .await
        {
            DaemonResponse::Output { text, .. } => {
                // Possibly empty, never an error; content depends on how
                // fast the shell banner arrives, which we have not pumped.
                assert!(text.is_empty());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn disabled_interval_never_injects() {
        let mut fx = fixture();
        let created = create_named(&mut fx.registry, "Gated").await;

        let (kind, _) = expect_error(
            fx.registry
                .handle_request(DaemonRequest::StartInterval {
                    id: created.id.clone(),
                })
                .await,
        );
        assert_eq!(kind, ErrorKind::Invalid);

        pump_events(&mut fx.registry, &mut fx.events_rx, 200).await;

        match fx
            .registry
            .handle_request(DaemonRequest::GetMetrics { id: created.id })
            .await
        {
            DaemonResponse::Metrics { metrics, .. } => assert_eq!(metrics.interval_runs, 0),
            other => panic!("metrics failed: {:?}", other),
        }
    }

    #[tokio::test]
    async fn enabled_interval_injects_and_counts() {
        let mut fx = fixture();
        let spec = CreateSpec {
            name: Some("Ticker".into()),
            autonomous: AutonomousConfig {
                target_interval_ms: 50,
                interval_prompt: Some("keep going".into()),
            },
            ..Default::default()
        };
        let created = match fx
            .registry
            .handle_request(DaemonRequest::Create { spec })
            .await
        {
            DaemonResponse::Created { terminal } => terminal,
            other => panic!("create failed: {:?}", other),
        };

        // Starting twice must not stack timers.
        for _ in 0..2 {
            let response = fx
                .registry
                .handle_request(DaemonRequest::StartInterval {
                    id: created.id.clone(),
                })
                .await;
            assert!(matches!(response, DaemonResponse::Ok));
        }

        pump_events(&mut fx.registry, &mut fx.events_rx, 400).await;

        let runs = match fx
            .registry
            .handle_request(DaemonRequest::GetMetrics {
                id: created.id.clone(),
            })
            .await
        {
            DaemonResponse::Metrics { metrics, .. } => {
                assert!(metrics.last_interval_run.is_some());
                metrics.interval_runs
            }
            other => panic!("metrics failed: {:?}", other),
        };
        assert!(runs >= 1, "expected at least one injection, got {}", runs);
        // A single timer at 50ms over ~400ms cannot plausibly fire more
        // than ~9 times; a stacked duplicate would roughly double that.
        assert!(runs <= 10, "suspiciously many injections: {}", runs);

        let response = fx
            .registry
            .handle_request(DaemonRequest::StopInterval { id: created.id })
            .await;
        assert!(matches!(response, DaemonResponse::Ok));
    }

    #[tokio::test]
    async fn launch_interval_requires_prompt_but_not_schedule() {
        let mut fx = fixture();
        let spec = CreateSpec {
            name: Some("Manual".into()),
            autonomous: AutonomousConfig {
                target_interval_ms: 0,
                interval_prompt: Some("one shot".into()),
            },
            ..Default::default()
        };
        let created = match fx
            .registry
            .handle_request(DaemonRequest::Create { spec })
            .await
        {
            DaemonResponse::Created { terminal } => terminal,
            other => panic!("create failed: {:?}", other),
        };

        let response = fx
            .registry
            .handle_request(DaemonRequest::RunIntervalNow {
                id: created.id.clone(),
            })
            .await;
        assert!(matches!(response, DaemonResponse::Ok));

        match fx
            .registry
            .handle_request(DaemonRequest::GetMetrics { id: created.id })
            .await
        {
            DaemonResponse::Metrics { metrics, .. } => assert_eq!(metrics.interval_runs, 1),
            other => panic!("metrics failed: {:?}", other),
        }
    }

    #[tokio::test]
    async fn state_document_mirrors_mutations() {
        let mut fx = fixture();
        let created = create_named(&mut fx.registry, "Mirrored").await;

        let state_path = fx.registry.paths.state_path();
        let on_disk = RuntimeState::load(&state_path).unwrap();
        assert!(on_disk.terminals.contains_key(&created.id));
        assert_eq!(on_disk.daemon_pid, Some(std::process::id()));

        fx.registry
            .handle_request(DaemonRequest::Delete { id: created.id.clone() })
            .await;
        let on_disk = RuntimeState::load(&state_path).unwrap();
        assert!(!on_disk.terminals.contains_key(&created.id));
    }
}
