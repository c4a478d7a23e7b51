use crate::clock::Clock;
use crate::snapshot::{SessionSnapshot, SymbolSnapshot};
use crate::stats::SessionStats;
use crate::symbol::{Correctness, Symbol};
use crate::task::Task;

/// One attempt at typing a task's code, keystroke by keystroke.
///
/// The session exclusively owns its symbols; every mutation goes through
/// `input`/`backspace`/`reset` and is followed by completion
/// re-evaluation. Timestamps are plain milliseconds from the injected
/// [`Clock`].
#[derive(Debug, Clone)]
pub struct Session {
    pub task: Task,
    pub symbols: Vec<Symbol>,
    /// Index of the next symbol awaiting input, in `[0, len]`.
    pub cursor: usize,
    /// Time banked from earlier, interrupted attempts.
    pub duration_ms: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub active: bool,
    /// Set once every symbol is correct; terminal until `reset`.
    pub finished: bool,
    pub at_end: bool,
}

fn build_symbols(code: &str) -> Vec<Symbol> {
    code.chars()
        .enumerate()
        .map(|(i, ch)| Symbol::new(ch, i))
        .collect()
}

impl Session {
    pub fn new(task: Task) -> Self {
        let symbols = build_symbols(&task.code);
        let mut session = Self {
            task,
            symbols,
            cursor: 0,
            duration_ms: 0,
            started_at: None,
            ended_at: None,
            active: false,
            finished: false,
            at_end: false,
        };
        // A zero-length task is finished from the first observation.
        session.sync_completion(None);
        session
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Idempotent: only the first call records `started_at`.
    pub fn start(&mut self, clock: &dyn Clock) {
        if !self.active && self.started_at.is_none() {
            self.active = true;
            self.started_at = Some(clock.now_ms());
        }
    }

    /// Apply one keystroke at the cursor. A no-op once finished, and a
    /// no-op at the end of the text while errors remain: the only way
    /// forward from there is `backspace`.
    pub fn input(&mut self, typed: char, clock: &dyn Clock) {
        self.sync_completion(None);
        if self.finished || self.at_end {
            return;
        }
        self.start(clock);

        let predecessor_correct = self.cursor == 0
            || self.symbols[self.cursor - 1].correctness == Correctness::Correct;
        self.symbols[self.cursor].record(typed, predecessor_correct);
        self.cursor += 1;

        self.sync_completion(Some(clock.now_ms()));
    }

    /// Step back one position, tainting the symbol it lands on. A no-op
    /// at cursor 0 and once finished.
    pub fn backspace(&mut self, clock: &dyn Clock) {
        self.sync_completion(None);
        if self.cursor == 0 || self.finished {
            return;
        }
        self.start(clock);

        // A cursor held past the last symbol steps back onto it.
        if self.at_end {
            self.cursor = self.symbols.len();
        }
        self.cursor -= 1;
        self.symbols[self.cursor].erase();

        self.sync_completion(None);
    }

    pub fn is_passed(&self) -> bool {
        self.symbols
            .iter()
            .all(|s| s.correctness == Correctness::Correct)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.active = false;
        self.at_end = true;
        self.cursor = self.symbols.len();
    }

    /// Completion re-evaluation, run after every mutation and when a
    /// session is built or rehydrated.
    fn sync_completion(&mut self, now_ms: Option<u64>) {
        let n = self.symbols.len();
        self.at_end = self.cursor >= n;

        if n == 0 {
            self.started_at = None;
            self.ended_at = None;
            self.duration_ms = 0;
            self.finish();
            return;
        }

        if self.finished {
            self.finish();
            return;
        }

        if self.at_end && self.is_passed() {
            if self.ended_at.is_none() {
                self.ended_at = now_ms;
            }
            self.finish();
            return;
        }

        if self.at_end {
            // Reached the end with errors: hold the cursor here. Input
            // freezes; backspace pulls it back for correction.
            self.cursor = n;
        }
    }

    /// Full restart, error history included.
    pub fn reset(&mut self) {
        for s in &mut self.symbols {
            s.reset();
        }
        self.clear_attempt_fields();
    }

    /// Start the attempt over but keep the taint flags, so already-made
    /// mistakes still count against strict accuracy. Caller-level
    /// convenience; it lives here because the session owns its symbols.
    pub fn restart_attempt(&mut self) {
        for s in &mut self.symbols {
            s.clear_entry();
        }
        self.clear_attempt_fields();
    }

    fn clear_attempt_fields(&mut self) {
        self.cursor = 0;
        self.duration_ms = 0;
        self.started_at = None;
        self.ended_at = None;
        self.active = false;
        self.finished = false;
        self.at_end = false;
        self.sync_completion(None);
    }

    /// Elapsed time including banked duration from interrupted attempts.
    pub fn elapsed_ms(&self, clock: &dyn Clock) -> u64 {
        if self.finished {
            if let (Some(start), Some(end)) = (self.started_at, self.ended_at) {
                return self.duration_ms + end.saturating_sub(start);
            }
        } else if self.active {
            if let Some(start) = self.started_at {
                return self.duration_ms + clock.now_ms().saturating_sub(start);
            }
        }
        self.duration_ms
    }

    pub fn stats(&self, clock: &dyn Clock) -> SessionStats {
        SessionStats::compute(self, clock)
    }

    pub fn to_snapshot(&self, clock: &dyn Clock) -> SessionSnapshot {
        SessionSnapshot {
            task_id: self.task.id.clone(),
            cursor: self.cursor,
            duration_ms: self.elapsed_ms(clock),
            finished: self.finished,
            active: self.active,
            at_end: self.at_end,
            symbols: self.symbols.iter().map(SymbolSnapshot::of).collect(),
        }
    }

    /// Rehydrate from a persisted payload. Symbols are rebuilt from the
    /// task text and overlaid by index; a symbol-count mismatch skips the
    /// excess instead of failing. A loaded session always starts paused.
    pub fn from_snapshot(task: Task, snap: &SessionSnapshot) -> Self {
        let mut session = Session::new(task);
        session.cursor = snap.cursor;
        session.duration_ms = snap.duration_ms;
        session.finished = snap.finished;
        session.at_end = snap.at_end;
        session.active = false;
        for (symbol, persisted) in session.symbols.iter_mut().zip(&snap.symbols) {
            persisted.overlay(symbol);
        }
        session.sync_completion(None);
        session
    }
}
