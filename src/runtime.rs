use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Unified event type consumed by the trainer loop
#[derive(Clone, Debug)]
pub enum TrainerEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if one arrives before the timeout, or Err(Timeout).
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<TrainerEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(TrainerEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(TrainerEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source fed from a plain channel
pub struct TestEventSource {
    rx: Receiver<TrainerEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TrainerEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the application one event at a time, turning quiet periods
/// into ticks so time-derived stats keep refreshing.
pub struct Runner<E: EventSource> {
    event_source: E,
    tick: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(event_source: E, tick: Duration) -> Self {
        Self { event_source, tick }
    }

    /// Blocks up to the tick interval and returns the next event, or
    /// Tick on timeout.
    pub fn step(&self) -> TrainerEvent {
        match self.event_source.recv_timeout(self.tick) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                TrainerEvent::Tick
            }
        }
    }
}

/// Deadline for advancing to the next task after a finish. Armed when a
/// session completes with auto-next on; must be cancelled on retry or a
/// manual switch, and the caller re-checks session state at fire time.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAdvance {
    deadline_ms: Option<u64>,
}

impl AutoAdvance {
    pub fn arm(&mut self, now_ms: u64, delay_ms: u64) {
        self.deadline_ms = Some(now_ms + delay_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// True once the deadline has passed; disarms itself when it fires.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
