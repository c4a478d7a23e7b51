use strum_macros::Display;

use crate::clock::Clock;
use crate::session::Session;
use crate::symbol::Correctness;

/// Metrics bundle derived on demand from symbol state and elapsed time.
/// Nothing here is cached; callers recompute per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub total: usize,
    pub entered: usize,
    /// Chained correctness: one stale error deflates this for everything
    /// typed after it.
    pub correct: usize,
    /// The "never needed correction" subset.
    pub correct_not_fixed: usize,
    pub wrong: usize,
    pub cpm: u64,
    /// Strict accuracy in `[0, 1]`: corrected mistakes stay deducted.
    pub accuracy: f64,
    pub elapsed_ms: u64,
    pub finished: bool,
    pub cursor: usize,
}

impl SessionStats {
    pub fn compute(session: &Session, clock: &dyn Clock) -> Self {
        let mut entered = 0;
        let mut correct = 0;
        let mut correct_not_fixed = 0;
        for s in &session.symbols {
            if s.entered() {
                entered += 1;
            }
            if s.correctness == Correctness::Correct {
                correct += 1;
                if !s.fixed {
                    correct_not_fixed += 1;
                }
            }
        }

        let elapsed_ms = session.elapsed_ms(clock);
        // 3-second floor keeps the first keystrokes from producing
        // absurd rates.
        let minutes = (elapsed_ms as f64 / 60_000.0).max(3.0 / 60.0);
        let cpm = (correct as f64 / minutes).round() as u64;
        let accuracy = if entered > 0 {
            correct_not_fixed as f64 / entered as f64
        } else {
            1.0
        };

        Self {
            total: session.len(),
            entered,
            correct,
            correct_not_fixed,
            wrong: entered - correct,
            cpm,
            accuracy,
            elapsed_ms,
            finished: session.finished,
            cursor: session.cursor,
        }
    }

    pub fn accuracy_pct(&self) -> u64 {
        (self.accuracy * 100.0).round() as u64
    }
}

/// Results-screen rank ladder keyed on strict accuracy and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rank {
    #[strum(serialize = "Bot")]
    Bot,
    #[strum(serialize = "Foot Typist")]
    FootTypist,
    #[strum(serialize = "Novice")]
    Novice,
    #[strum(serialize = "Turbo Fumbler")]
    TurboFumbler,
    #[strum(serialize = "Hit or Miss")]
    HitOrMiss,
    #[strum(serialize = "Typewriter")]
    Typewriter,
    #[strum(serialize = "Rewriter")]
    Rewriter,
    #[strum(serialize = "Sniper")]
    Sniper,
    #[strum(serialize = "Master")]
    Master,
    #[strum(serialize = "Programmer")]
    Programmer,
    #[strum(serialize = "Perfectionist")]
    Perfectionist,
    #[strum(serialize = "Maintainer")]
    Maintainer,
    #[strum(serialize = "Cheater")]
    Cheater,
}

impl Rank {
    pub fn for_stats(stats: &SessionStats) -> Rank {
        let acc = stats.accuracy_pct();
        let cpm = stats.cpm;

        if acc < 20 {
            return Rank::Bot;
        }
        if acc < 50 {
            return Rank::FootTypist;
        }
        if acc < 70 {
            return Rank::Novice;
        }
        if acc < 80 {
            return if cpm > 100 {
                Rank::TurboFumbler
            } else {
                Rank::HitOrMiss
            };
        }
        if acc < 90 {
            return if cpm > 100 {
                Rank::Typewriter
            } else {
                Rank::Rewriter
            };
        }
        if acc < 100 {
            return if cpm < 100 {
                Rank::Sniper
            } else if cpm < 200 {
                Rank::Master
            } else {
                Rank::Programmer
            };
        }

        if cpm < 150 {
            Rank::Perfectionist
        } else if cpm < 300 {
            Rank::Maintainer
        } else {
            Rank::Cheater
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::task::Task;

    fn task(code: &str) -> Task {
        Task {
            id: "3:1:1".into(),
            type_id: "3".into(),
            subtype_id: "1".into(),
            variant_id: "1".into(),
            title: "Task 3".into(),
            code: code.into(),
            tags: vec![],
            level: None,
        }
    }

    #[test]
    fn untouched_session_has_perfect_accuracy() {
        let clock = ManualClock::new(0);
        let session = Session::new(task("abc"));
        let stats = session.stats(&clock);
        assert_eq!(stats.entered, 0);
        assert_eq!(stats.accuracy, 1.0);
        assert_eq!(stats.cpm, 0);
        assert_eq!(stats.elapsed_ms, 0);
    }

    #[test]
    fn wrong_is_entered_minus_correct() {
        let clock = ManualClock::new(0);
        let mut session = Session::new(task("abc"));
        session.input('a', &clock);
        session.input('x', &clock);
        let stats = session.stats(&clock);
        assert_eq!(stats.entered, 2);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.wrong, 1);
    }

    #[test]
    fn cpm_uses_three_second_floor() {
        // one correct char in 100ms would be 600 cpm without the floor
        let clock = ManualClock::new(0);
        let mut session = Session::new(task("ab"));
        session.input('a', &clock);
        clock.advance(100);
        let stats = session.stats(&clock);
        assert_eq!(stats.cpm, 20);
    }

    #[test]
    fn cpm_reflects_elapsed_time_past_the_floor() {
        let clock = ManualClock::new(0);
        let mut session = Session::new(task("abcdef"));
        for ch in "abcde".chars() {
            session.input(ch, &clock);
        }
        clock.advance(60_000);
        let stats = session.stats(&clock);
        assert_eq!(stats.cpm, 5);
    }

    #[test]
    fn chained_error_deflates_correct_count() {
        let clock = ManualClock::new(0);
        let mut session = Session::new(task("abc"));
        session.input('x', &clock);
        session.input('b', &clock);
        session.input('c', &clock);
        let stats = session.stats(&clock);
        assert_eq!(stats.correct, 0);
        assert_eq!(stats.wrong, 3);
    }

    #[test]
    fn accuracy_pct_rounds() {
        let clock = ManualClock::new(0);
        let mut session = Session::new(task("abc"));
        session.input('a', &clock);
        session.input('b', &clock);
        session.input('x', &clock);
        let stats = session.stats(&clock);
        assert_eq!(stats.accuracy_pct(), 67);
    }

    #[test]
    fn rank_ladder_extremes() {
        let mk = |accuracy: f64, cpm: u64| SessionStats {
            total: 10,
            entered: 10,
            correct: 10,
            correct_not_fixed: 10,
            wrong: 0,
            cpm,
            accuracy,
            elapsed_ms: 10_000,
            finished: true,
            cursor: 10,
        };

        assert_eq!(Rank::for_stats(&mk(0.1, 500)), Rank::Bot);
        assert_eq!(Rank::for_stats(&mk(0.6, 50)), Rank::Novice);
        assert_eq!(Rank::for_stats(&mk(0.75, 150)), Rank::TurboFumbler);
        assert_eq!(Rank::for_stats(&mk(0.85, 80)), Rank::Rewriter);
        assert_eq!(Rank::for_stats(&mk(0.95, 150)), Rank::Master);
        assert_eq!(Rank::for_stats(&mk(1.0, 100)), Rank::Perfectionist);
        assert_eq!(Rank::for_stats(&mk(1.0, 400)), Rank::Cheater);
    }

    #[test]
    fn rank_displays_human_names() {
        assert_eq!(Rank::FootTypist.to_string(), "Foot Typist");
        assert_eq!(Rank::Perfectionist.to_string(), "Perfectionist");
    }
}
