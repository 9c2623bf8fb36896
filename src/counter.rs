use crate::error::CounterError;

/// Integer cursor confined to `[min, max]`, moving `step` at a time.
///
/// A wrapping counter jumps to the opposite bound when a step would leave the
/// range; a clamping counter ignores such a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    value: i64,
    min: i64,
    max: i64,
    step: i64,
    wraps: bool,
}

impl Counter {
    pub fn wrapping(min: i64, max: i64, step: i64) -> Self {
        Self::new(min, max, step, true)
    }

    pub fn clamping(min: i64, max: i64, step: i64) -> Self {
        Self::new(min, max, step, false)
    }

    fn new(min: i64, max: i64, step: i64, wraps: bool) -> Self {
        debug_assert!(min <= max && step > 0);
        Self { value: min, min, max, step, wraps }
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    pub fn set(&mut self, value: i64) -> Result<(), CounterError> {
        if value < self.min || value > self.max {
            return Err(CounterError::OutOfRange { value, min: self.min, max: self.max });
        }
        self.value = value;
        Ok(())
    }

    pub fn reset(&mut self) -> i64 {
        self.value = self.min;
        self.value
    }

    pub fn increment(&mut self) -> i64 {
        self.value = self.stepped(self.value, 1);
        self.value
    }

    pub fn decrement(&mut self) -> i64 {
        self.value = self.stepped(self.value, -1);
        self.value
    }

    /// Value after `k` increments (or `-k` decrements), leaving `self` untouched.
    pub fn offset(&self, k: i64) -> i64 {
        let dir = k.signum();
        (0..k.abs()).fold(self.value, |v, _| self.stepped(v, dir))
    }

    fn stepped(&self, v: i64, dir: i64) -> i64 {
        let next = v + dir * self.step;
        if next > self.max {
            if self.wraps { self.min } else { v }
        } else if next < self.min {
            if self.wraps { self.max } else { v }
        } else {
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_counter_wraps_both_ways() {
        let mut c = Counter::wrapping(0, 3, 1);
        assert_eq!(c.decrement(), 3);
        assert_eq!(c.increment(), 0);
        for _ in 0..4 {
            c.increment();
        }
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn clamping_counter_stops_at_bounds() {
        let mut c = Counter::clamping(0, 10, 1);
        assert_eq!(c.decrement(), 0);
        c.set(10).unwrap();
        assert_eq!(c.increment(), 10);
    }

    #[test]
    fn clamping_step_that_overshoots_is_ignored() {
        let mut c = Counter::clamping(0, 5, 2);
        c.increment();
        c.increment();
        assert_eq!(c.get(), 4);
        assert_eq!(c.increment(), 4);
    }

    #[test]
    fn offset_does_not_mutate() {
        let mut c = Counter::wrapping(0, 4, 1);
        c.set(0).unwrap();
        assert_eq!(c.offset(-1), 4);
        assert_eq!(c.offset(1), 1);
        assert_eq!(c.offset(7), 2);
        assert_eq!(c.offset(0), 0);
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn set_rejects_out_of_range() {
        let mut c = Counter::wrapping(0, 2, 1);
        let err = c.set(3).unwrap_err();
        assert!(matches!(err, CounterError::OutOfRange { value: 3, min: 0, max: 2 }));
        assert_eq!(c.get(), 0);
        assert_eq!(c.reset(), 0);
    }
}
