//! World clock for the Delve simulation.
//!
//! The tick number is the only temporal state the scheduler keeps. It
//! starts at zero and is advanced once at every Idle to `TickOngoing`
//! transition, so the first tick is tick 1.

/// Failure to advance the [`WorldClock`].
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The world already ran `u64::MAX` ticks.
    #[error("world clock exhausted at tick {}", u64::MAX)]
    TickOverflow,
}

/// Monotonic tick counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldClock {
    /// Number of the current (or last finished) tick.
    tick: u64,
}

impl WorldClock {
    /// A clock at tick 0, before the first tick.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// A clock resumed at `tick` (state restoration and tests).
    pub const fn at(tick: u64) -> Self {
        Self { tick }
    }

    /// Start the next tick and return its number. The clock is left
    /// untouched on overflow.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let next = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.tick = next;
        Ok(next)
    }

    /// The current tick.
    pub const fn tick(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_tick_zero() {
        assert_eq!(WorldClock::new().tick(), 0);
    }

    #[test]
    fn clock_advances() {
        let mut clock = WorldClock::new();
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn overflow_is_an_error() {
        let mut clock = WorldClock::at(u64::MAX);
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
        assert_eq!(clock.tick(), u64::MAX);
    }
}
