//! PTY-backed terminal sessions.
//!
//! Each session is one pseudo-terminal running either a plain shell or an
//! agent CLI selected by the terminal's role. The handle owns the writer
//! and child; output is drained by a dedicated reader thread owned by the
//! registry.

use std::collections::VecDeque;
use std::io::{Read, Write};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};

use helmsman_control::{ControlError, ControlResult, RoleConfig, TerminalConfig};

const PTY_ROWS: u16 = 40;
const PTY_COLS: u16 = 120;

/// Captured-output cap per session, in bytes.
const MAX_OUTPUT_BYTES: usize = 256 * 1024;

/// Handle to one live PTY session.
pub struct SessionHandle {
    writer: Box<dyn Write + Send>,
    child: Box<dyn portable_pty::Child + Send>,
    // Kept alive for the lifetime of the session; dropping the master
    // closes the PTY under the child.
    _master: Box<dyn portable_pty::MasterPty + Send>,
}

impl SessionHandle {
    /// Open a PTY and spawn the command the terminal's role calls for.
    /// Returns the handle and the raw output reader.
    pub fn spawn(config: &TerminalConfig) -> ControlResult<(Self, Box<dyn Read + Send>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ControlError::Internal(format!("failed to open pty: {}", e)))?;

        let cmd = command_for(config);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ControlError::Internal(format!("failed to spawn session: {}", e)))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ControlError::Internal(format!("failed to open pty reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ControlError::Internal(format!("failed to open pty writer: {}", e)))?;

        Ok((
            Self {
                writer,
                child,
                _master: pair.master,
            },
            reader,
        ))
    }

    /// Deliver bytes to the session's input stream.
    pub fn write(&mut self, data: &[u8]) -> ControlResult<()> {
        self.writer
            .write_all(data)
            .and_then(|_| self.writer.flush())
            .map_err(|e| ControlError::Internal(format!("failed to write to session: {}", e)))
    }

    /// Process id of the session's child, if still known.
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Build the command line for a terminal's role. Plain and custom roles
/// get an interactive shell; worker roles run the agent CLI named by the
/// worker type, with its prompt file as the single argument when present.
fn command_for(config: &TerminalConfig) -> CommandBuilder {
    let mut cmd = match &config.role {
        RoleConfig::Worker {
            worker_type,
            prompt_file,
        } => {
            let mut cmd = CommandBuilder::new(worker_type);
            if let Some(path) = prompt_file {
                cmd.arg(path);
            }
            cmd
        }
        RoleConfig::Plain | RoleConfig::Custom { .. } => {
            let mut cmd = CommandBuilder::new(shell_path());
            cmd.arg("-i");
            cmd
        }
    };

    if let Some(dir) = &config.working_dir {
        cmd.cwd(dir);
    }
    cmd.env("TERM", "xterm-256color");
    cmd
}

fn shell_path() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

/// Capped history of a session's raw output.
///
/// Whole chunks are dropped from the front once the cap is exceeded; a
/// ragged first line after truncation is acceptable, losing recent output
/// is not.
#[derive(Default)]
pub struct OutputBuffer {
    chunks: VecDeque<String>,
    bytes: usize,
}

impl OutputBuffer {
    pub fn push(&mut self, chunk: String) {
        self.bytes += chunk.len();
        self.chunks.push_back(chunk);
        while self.bytes > MAX_OUTPUT_BYTES {
            match self.chunks.pop_front() {
                Some(dropped) => self.bytes -= dropped.len(),
                None => break,
            }
        }
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.bytes = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The most recent `lines` lines. Empty string when nothing was
    /// captured yet.
    pub fn tail_lines(&self, lines: usize) -> String {
        if self.chunks.is_empty() || lines == 0 {
            return String::new();
        }
        let all: String = self.chunks.iter().map(String::as_str).collect();
        let tail: Vec<&str> = all.lines().rev().take(lines).collect();
        tail.into_iter().rev().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_tail_is_empty_string() {
        let buffer = OutputBuffer::default();
        assert_eq!(buffer.tail_lines(10), "");
    }

    #[test]
    fn tail_returns_most_recent_lines() {
        let mut buffer = OutputBuffer::default();
        buffer.push("one\ntwo\n".into());
        buffer.push("three\nfour".into());

        assert_eq!(buffer.tail_lines(2), "three\nfour");
        assert_eq!(buffer.tail_lines(100), "one\ntwo\nthree\nfour");
    }

    #[test]
    fn buffer_drops_oldest_chunks_past_the_cap() {
        let mut buffer = OutputBuffer::default();
        let chunk = "x".repeat(64 * 1024);
        for _ in 0..8 {
            buffer.push(chunk.clone());
        }
        assert!(buffer.bytes <= MAX_OUTPUT_BYTES);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn clear_resets_history() {
        let mut buffer = OutputBuffer::default();
        buffer.push("output".into());
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.tail_lines(5), "");
    }
}
