//! Time/load stepping.

use crate::error::{FemError, Result};

/// Context of the step being solved, passed explicitly to everything that
/// needs the current time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Zero-based step index
    pub step: usize,
    /// Analysis time of this step
    pub time: f64,
    /// Increment from the previous step (the first step starts from t = 0)
    pub dt: f64,
}

impl StepContext {
    /// Stand-alone context for evaluating at time `t` outside a schedule.
    pub fn at(time: f64) -> Self {
        Self {
            step: 0,
            time,
            dt: time,
        }
    }
}

/// Ordered list of analysis times.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAssistant {
    times: Vec<f64>,
    cursor: usize,
}

impl TimeAssistant {
    /// Times must be finite, non-empty and strictly increasing.
    pub fn new(times: Vec<f64>) -> Result<Self> {
        if times.is_empty() {
            return Err(FemError::InvalidTimeSchedule(
                "at least one time value is required".to_string(),
            ));
        }
        if let Some(t) = times.iter().find(|t| !t.is_finite()) {
            return Err(FemError::InvalidTimeSchedule(format!(
                "non-finite time value {t}"
            )));
        }
        if let Some(w) = times.windows(2).find(|w| w[1] <= w[0]) {
            return Err(FemError::InvalidTimeSchedule(format!(
                "times must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self { times, cursor: 0 })
    }

    /// A single step at time `t`
    pub fn single(time: f64) -> Result<Self> {
        Self::new(vec![time])
    }

    /// `count` evenly spaced times from `start` to `end` inclusive
    pub fn linspace(start: f64, end: f64, count: usize) -> Result<Self> {
        let times = match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (end - start) / (count - 1) as f64;
                (0..count)
                    .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                    .collect()
            }
        };
        Self::new(times)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time of the most recently yielded step
    pub fn current_time(&self) -> Option<f64> {
        self.cursor.checked_sub(1).map(|i| self.times[i])
    }

    /// Time before the most recently yielded step (0 for the first step)
    pub fn previous_time(&self) -> f64 {
        match self.cursor {
            0 | 1 => 0.0,
            c => self.times[c - 2],
        }
    }

    /// Move to the next step
    pub fn advance(&mut self) -> Option<StepContext> {
        let time = *self.times.get(self.cursor)?;
        self.cursor += 1;
        Some(StepContext {
            step: self.cursor - 1,
            time,
            dt: time - self.previous_time(),
        })
    }

    /// Rewind to before the first step
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// All step contexts, independent of the cursor
    pub fn steps(&self) -> impl Iterator<Item = StepContext> + '_ {
        self.times.iter().enumerate().map(|(step, &time)| StepContext {
            step,
            time,
            dt: time - if step == 0 { 0.0 } else { self.times[step - 1] },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let ta = TimeAssistant::linspace(0.0, 1.0, 20).unwrap();
        assert_eq!(ta.len(), 20);
        assert_eq!(ta.times()[0], 0.0);
        assert_eq!(ta.times()[19], 1.0);
        assert!((ta.times()[1] - 1.0 / 19.0).abs() < 1e-15);
    }

    #[test]
    fn advance_tracks_increments() {
        let mut ta = TimeAssistant::new(vec![0.5, 1.0, 2.0]).unwrap();
        assert_eq!(ta.current_time(), None);

        let first = ta.advance().unwrap();
        assert_eq!(first, StepContext { step: 0, time: 0.5, dt: 0.5 });
        assert_eq!(ta.previous_time(), 0.0);

        let second = ta.advance().unwrap();
        assert_eq!(second.step, 1);
        assert!((second.dt - 0.5).abs() < 1e-15);

        let third = ta.advance().unwrap();
        assert_eq!(third.dt, 1.0);
        assert_eq!(ta.current_time(), Some(2.0));
        assert_eq!(ta.previous_time(), 1.0);
        assert!(ta.advance().is_none());

        ta.reset();
        let replay: Vec<_> = ta.steps().collect();
        assert_eq!(replay, vec![first, second, third]);
    }

    #[test]
    fn rejects_bad_schedules() {
        assert!(TimeAssistant::new(vec![]).is_err());
        assert!(TimeAssistant::new(vec![0.0, 0.0]).is_err());
        assert!(TimeAssistant::new(vec![1.0, 0.5]).is_err());
        assert!(TimeAssistant::new(vec![f64::NAN]).is_err());
        assert!(TimeAssistant::linspace(0.0, 1.0, 0).is_err());
        assert_eq!(TimeAssistant::linspace(3.0, 9.0, 1).unwrap().times(), &[3.0]);
    }
}
