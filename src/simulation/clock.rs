use chrono::{DateTime, Duration, Utc};

/// Discrete simulation time. Every timestamp the simulation mints comes from here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    start: DateTime<Utc>,
    tick: u64,
    tick_seconds: u32,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>, tick_seconds: u32) -> Self {
        Self {
            start,
            tick: 0,
            tick_seconds,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.at(self.tick)
    }

    pub fn at(&self, tick: u64) -> DateTime<Utc> {
        self.start
            .checked_add_signed(self.span(tick))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The instant `ticks` ticks before now.
    pub fn ago(&self, ticks: u64) -> DateTime<Utc> {
        self.now()
            .checked_sub_signed(self.span(ticks))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Span covered by `ticks` ticks.
    pub fn span(&self, ticks: u64) -> Duration {
        let seconds = i64::try_from(ticks.saturating_mul(u64::from(self.tick_seconds)))
            .unwrap_or(i64::MAX);
        Duration::try_seconds(seconds).unwrap_or(Duration::MAX)
    }

    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
