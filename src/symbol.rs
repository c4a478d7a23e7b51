use serde::{Deserialize, Serialize};

/// Entry state of one position. `Pending` doubles as "nothing typed here",
/// so an untouched cell can never carry a stray verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    #[default]
    Pending,
    Correct,
    Incorrect,
}

/// Render-facing classification; not authoritative for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    Pending,
    Correct,
    Wrong,
}

/// One character-position cell of the target text.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub expected: char,
    pub index: usize,
    pub typed: Option<char>,
    pub correctness: Correctness,
    /// Taint: set once the position is ever backspaced over. Survives
    /// re-entry; only a full reset clears it.
    pub fixed: bool,
}

impl Symbol {
    pub fn new(expected: char, index: usize) -> Self {
        Self {
            expected,
            index,
            typed: None,
            correctness: Correctness::Pending,
            fixed: false,
        }
    }

    pub fn entered(&self) -> bool {
        self.correctness != Correctness::Pending
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self.expected, ' ' | '\n' | '\t')
    }

    /// Record a keystroke. Any char is accepted; the verdict is `Correct`
    /// only when it matches verbatim AND the predecessor is currently
    /// correct, so one stale error taints everything typed after it.
    pub fn record(&mut self, typed: char, predecessor_correct: bool) {
        self.typed = Some(typed);
        self.correctness = if typed == self.expected && predecessor_correct {
            Correctness::Correct
        } else {
            Correctness::Incorrect
        };
    }

    /// Backspace over this position: taint it, clear the entry.
    pub fn erase(&mut self) {
        self.fixed = true;
        self.clear_entry();
    }

    /// Clear the entry without touching the taint (soft restart).
    pub fn clear_entry(&mut self) {
        self.typed = None;
        self.correctness = Correctness::Pending;
    }

    /// Full reset; the only way the taint comes off.
    pub fn reset(&mut self) {
        self.clear_entry();
        self.fixed = false;
    }

    pub fn classify(&self) -> SymbolClass {
        match self.correctness {
            Correctness::Pending => SymbolClass::Pending,
            Correctness::Correct => SymbolClass::Correct,
            Correctness::Incorrect => SymbolClass::Wrong,
        }
    }
}
