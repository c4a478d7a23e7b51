use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::symbol::{Correctness, Symbol};

/// Bump when the payload layout changes. Envelopes written under another
/// version are treated as absent data; there are no migrations.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Versioned wrapper actually written to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u32,
    pub saved_at: DateTime<Local>,
    pub payload: SessionSnapshot,
}

impl Envelope {
    pub fn new(payload: SessionSnapshot) -> Self {
        Self {
            v: SNAPSHOT_VERSION,
            saved_at: Local::now(),
            payload,
        }
    }

    /// Parse a stored envelope. Fails closed: malformed JSON or a version
    /// mismatch yields None and the caller builds a fresh session.
    pub fn parse(raw: &str) -> Option<Envelope> {
        let envelope: Envelope = serde_json::from_str(raw).ok()?;
        if envelope.v != SNAPSHOT_VERSION {
            return None;
        }
        Some(envelope)
    }
}

/// Point-in-time session payload. `expected` and `index` are not
/// persisted; symbols are rebuilt from the task text on load and the
/// saved fields overlaid by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub task_id: String,
    pub cursor: usize,
    /// Elapsed time banked at encode time, so paused time is captured.
    pub duration_ms: u64,
    pub finished: bool,
    pub active: bool,
    pub at_end: bool,
    pub symbols: Vec<SymbolSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub typed: Option<char>,
    pub correctness: Correctness,
    pub fixed: bool,
}

impl SymbolSnapshot {
    pub fn of(symbol: &Symbol) -> Self {
        Self {
            typed: symbol.typed,
            correctness: symbol.correctness,
            fixed: symbol.fixed,
        }
    }

    pub fn overlay(&self, symbol: &mut Symbol) {
        symbol.typed = self.typed;
        symbol.correctness = self.correctness;
        symbol.fixed = self.fixed;
    }
}

/// On-demand dump for download/debugging. One-way: never read back.
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub task_id: String,
    pub saved_at: DateTime<Local>,
    pub session: SessionSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> SessionSnapshot {
        SessionSnapshot {
            task_id: "1:1:1".into(),
            cursor: 2,
            duration_ms: 1500,
            finished: false,
            active: true,
            at_end: false,
            symbols: vec![
                SymbolSnapshot {
                    typed: Some('a'),
                    correctness: Correctness::Correct,
                    fixed: false,
                },
                SymbolSnapshot {
                    typed: Some('x'),
                    correctness: Correctness::Incorrect,
                    fixed: true,
                },
                SymbolSnapshot {
                    typed: None,
                    correctness: Correctness::Pending,
                    fixed: false,
                },
            ],
        }
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let envelope = Envelope::new(sample_payload());
        let raw = serde_json::to_string(&envelope).unwrap();
        let parsed = Envelope::parse(&raw).unwrap();
        assert_eq!(parsed.payload, envelope.payload);
    }

    #[test]
    fn version_mismatch_reads_as_absent() {
        let mut envelope = Envelope::new(sample_payload());
        envelope.v = SNAPSHOT_VERSION + 1;
        let raw = serde_json::to_string(&envelope).unwrap();
        assert!(Envelope::parse(&raw).is_none());
    }

    #[test]
    fn garbage_reads_as_absent() {
        assert!(Envelope::parse("not json at all").is_none());
        assert!(Envelope::parse("{\"v\":2}").is_none());
        assert!(Envelope::parse("").is_none());
    }

    #[test]
    fn symbol_snapshot_overlay_restores_fields() {
        let mut symbol = Symbol::new('a', 0);
        let snap = SymbolSnapshot {
            typed: Some('b'),
            correctness: Correctness::Incorrect,
            fixed: true,
        };
        snap.overlay(&mut symbol);
        assert_eq!(symbol.typed, Some('b'));
        assert_eq!(symbol.correctness, Correctness::Incorrect);
        assert!(symbol.fixed);
        // expected/index come from the rebuilt symbol, not the snapshot
        assert_eq!(symbol.expected, 'a');
        assert_eq!(symbol.index, 0);
    }
}
