use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct TerminalState {
    input: VecDeque<u8>,
    output: Vec<u8>,
    echo_stdout: bool,
}

/// The host end of the serial line. Bytes typed here arrive on the board's
/// RX pin; bytes the board transmits are collected (and optionally echoed to
/// stdout). Clones share the same line.
#[derive(Debug, Clone, Default)]
pub struct Terminal(Arc<Mutex<TerminalState>>);

impl Terminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout_echo(echo: bool) -> Self {
        let terminal = Self::new();
        terminal.lock().echo_stdout = echo;
        terminal
    }

    fn lock(&self) -> MutexGuard<'_, TerminalState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes for the board to receive.
    pub fn type_bytes(&self, bytes: &[u8]) {
        self.lock().input.extend(bytes.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.lock().input.len()
    }

    /// Everything the board transmitted so far.
    pub fn received(&self) -> Vec<u8> {
        self.lock().output.clone()
    }

    pub(crate) fn pop_input(&self) -> Option<u8> {
        self.lock().input.pop_front()
    }

    pub(crate) fn push_output(&self, byte: u8) {
        let mut state = self.lock();
        state.output.push(byte);
        if state.echo_stdout {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(&[byte]);
            let _ = stdout.flush();
        }
    }
}
