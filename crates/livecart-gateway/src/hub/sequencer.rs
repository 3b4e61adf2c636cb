use chrono::{DateTime, TimeDelta, Utc};
use livecart_core::time::{now_millis, truncate_millis};

/// Wall-clock source, swappable so tests can move time backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now_millis()
    }
}

/// Stamps every event with a strictly increasing `seq` and a non-decreasing
/// millisecond `ts`.
///
/// Not synchronised on its own: the hub only calls `next` inside its
/// critical section.
pub struct Sequencer {
    last_seq: u64,
    last_ts: Option<DateTime<Utc>>,
    clock: Box<dyn Clock>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            last_seq: 0,
            last_ts: None,
            clock,
        }
    }

    /// Next `(seq, ts)`. The first event gets `seq = 1`.
    pub fn next(&mut self) -> (u64, DateTime<Utc>) {
        self.last_seq += 1;

        let now = truncate_millis(self.clock.now());
        let ts = match self.last_ts {
            // clock stepped backwards: keep the stream monotonic
            Some(last) if now < last => last + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.last_ts = Some(ts);

        (self.last_seq, ts)
    }

    /// Last `seq` handed out, 0 before the first event.
    #[cfg(test)]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    /// Replays a scripted list of instants, repeating the last one.
    struct ScriptedClock(Arc<Mutex<Vec<DateTime<Utc>>>>);

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            let mut script = self.0.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0]
            }
        }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 18, 0, 0).unwrap() + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn seq_starts_at_one_and_increments() {
        let mut seq = Sequencer::new();
        assert_eq!(seq.last_seq(), 0);
        let (a, _) = seq.next();
        let (b, _) = seq.next();
        let (c, _) = seq.next();
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(seq.last_seq(), 3);
    }

    #[test]
    fn backwards_clock_yields_last_plus_one_ms() {
        let script = vec![at(500), at(100), at(90), at(800)];
        let mut seq = Sequencer::with_clock(Box::new(ScriptedClock(Arc::new(Mutex::new(script)))));

        assert_eq!(seq.next().1, at(500));
        assert_eq!(seq.next().1, at(501));
        assert_eq!(seq.next().1, at(502));
        assert_eq!(seq.next().1, at(800));
    }

    #[test]
    fn equal_timestamps_are_kept() {
        let script = vec![at(10), at(10)];
        let mut seq = Sequencer::with_clock(Box::new(ScriptedClock(Arc::new(Mutex::new(script)))));
        let (s1, t1) = seq.next();
        let (s2, t2) = seq.next();
        assert!(s2 > s1);
        assert_eq!(t1, t2);
    }

    #[test]
    fn sub_millisecond_precision_is_dropped() {
        let script = vec![at(10) + TimeDelta::microseconds(700)];
        let mut seq = Sequencer::with_clock(Box::new(ScriptedClock(Arc::new(Mutex::new(script)))));
        assert_eq!(seq.next().1, at(10));
    }
}
