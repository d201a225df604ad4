//! Interval-driven background cycling.
//!
//! The scheduler is a small finite state machine. Time advances one word at a time; once the
//! time spent on the current background reaches the pending threshold, the next background
//! becomes active and the clock restarts. Thresholds are consumed by background index: after a
//! switch to index `i`, the pending threshold becomes `thresholds[i]` if such an entry exists.
//! When the new index has no threshold entry the schedule is exhausted and never switches
//! again, however long the narration runs.

use crate::foundation::error::{ReelError, ReelResult};

/// Snapshot of the cycling state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleState {
    /// Index of the active background.
    pub current_index: usize,
    /// Seconds accumulated since the last switch.
    pub elapsed_since_switch: f64,
    /// Pending switch threshold; `None` once the threshold list is exhausted.
    pub next_threshold: Option<f64>,
}

/// Background cycling configuration plus its current state.
#[derive(Clone, Debug)]
pub struct BackgroundScheduler {
    thresholds: Vec<f64>,
    image_count: usize,
    state: ScheduleState,
}

impl BackgroundScheduler {
    /// Build a scheduler over `image_count` backgrounds.
    pub fn new(thresholds: Vec<f64>, image_count: usize) -> ReelResult<Self> {
        if image_count == 0 {
            return Err(ReelError::invalid_input(
                "at least one background image is required",
            ));
        }
        let Some(&first) = thresholds.first() else {
            return Err(ReelError::invalid_input(
                "at least one background interval threshold is required",
            ));
        };
        if thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(ReelError::invalid_input(
                "background interval thresholds must be finite and > 0",
            ));
        }

        Ok(Self {
            state: ScheduleState {
                current_index: 0,
                elapsed_since_switch: 0.0,
                next_threshold: Some(first),
            },
            thresholds,
            image_count,
        })
    }

    /// State the scheduler starts from.
    pub fn initial_state(&self) -> ScheduleState {
        ScheduleState {
            current_index: 0,
            elapsed_since_switch: 0.0,
            next_threshold: self.thresholds.first().copied(),
        }
    }

    /// Pure transition: the state reached from `state` after `duration_secs` more narration.
    pub fn transition(&self, state: ScheduleState, duration_secs: f64) -> ScheduleState {
        self.step(state, duration_secs).0
    }

    fn step(&self, state: ScheduleState, duration_secs: f64) -> (ScheduleState, bool) {
        let elapsed = state.elapsed_since_switch + duration_secs;
        match state.next_threshold {
            Some(threshold) if elapsed >= threshold => {
                let current_index = (state.current_index + 1) % self.image_count;
                let next = ScheduleState {
                    current_index,
                    elapsed_since_switch: 0.0,
                    next_threshold: self.thresholds.get(current_index).copied(),
                };
                (next, true)
            }
            _ => {
                let next = ScheduleState {
                    elapsed_since_switch: elapsed,
                    ..state
                };
                (next, false)
            }
        }
    }

    /// Advance the held state by `duration_secs`. Returns `true` when the background switched.
    pub fn advance(&mut self, duration_secs: f64) -> bool {
        let before = self.state;
        let (after, switched) = self.step(before, duration_secs);
        self.state = after;

        if switched {
            tracing::debug!(
                from = before.current_index,
                to = self.state.current_index,
                next_threshold = ?self.state.next_threshold,
                "background switch"
            );
            if self.state.next_threshold.is_none() {
                tracing::warn!(
                    index = self.state.current_index,
                    "background thresholds exhausted; background stays fixed from here on"
                );
            }
        }
        switched
    }

    /// Index of the active background. Does not mutate state.
    pub fn active_index(&self) -> usize {
        self.state.current_index
    }

    /// Current state snapshot.
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// `true` once no further switch can happen.
    pub fn is_exhausted(&self) -> bool {
        self.state.next_threshold.is_none()
    }

    /// Simulate the whole timeline from the initial state.
    ///
    /// Entry `i` is the background active while word `i` is displayed, i.e. the index before
    /// that word's duration is applied.
    pub fn plan(&self, durations: impl IntoIterator<Item = f64>) -> Vec<usize> {
        let mut state = self.initial_state();
        durations
            .into_iter()
            .map(|d| {
                let active = state.current_index;
                state = self.transition(state, d);
                active
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch_times(sched: &mut BackgroundScheduler, step: f64, steps: usize) -> Vec<(f64, usize)> {
        let mut out = Vec::new();
        for i in 1..=steps {
            if sched.advance(step) {
                out.push((i as f64 * step, sched.active_index()));
            }
        }
        out
    }

    #[test]
    fn rejects_missing_inputs() {
        assert!(BackgroundScheduler::new(vec![10.0], 0).is_err());
        assert!(BackgroundScheduler::new(vec![], 2).is_err());
        assert!(BackgroundScheduler::new(vec![0.0], 2).is_err());
    }

    #[test]
    fn first_switch_happens_at_first_threshold() {
        let mut s = BackgroundScheduler::new(vec![10.0, 22.0, 35.0], 5).unwrap();
        assert_eq!(s.active_index(), 0);
        assert!(!s.advance(5.0));
        assert_eq!(s.active_index(), 0);
        assert!(s.advance(5.0));
        assert_eq!(s.active_index(), 1);
        assert_eq!(s.state().elapsed_since_switch, 0.0);
        assert_eq!(s.state().next_threshold, Some(22.0));
    }

    #[test]
    fn thresholds_consumed_then_switching_stops() {
        let mut s = BackgroundScheduler::new(vec![10.0, 22.0, 35.0], 5).unwrap();
        let switches = switch_times(&mut s, 5.0, 200);
        // 10s on bg 0, 25s on bg 1 (first multiple of 5 >= 22), 35s on bg 2, then index 3 has
        // no threshold entry.
        assert_eq!(switches, vec![(10.0, 1), (35.0, 2), (70.0, 3)]);
        assert!(s.is_exhausted());
        assert_eq!(s.active_index(), 3);
    }

    #[test]
    fn wrapping_into_range_keeps_cycling() {
        // With three images the index wraps back to 0, which still has a threshold.
        let mut s = BackgroundScheduler::new(vec![10.0, 22.0, 35.0], 3).unwrap();
        let switches = switch_times(&mut s, 5.0, 30);
        assert_eq!(
            switches,
            vec![(10.0, 1), (35.0, 2), (70.0, 0), (80.0, 1), (105.0, 2), (140.0, 0), (150.0, 1)]
        );
        assert!(!s.is_exhausted());
    }

    #[test]
    fn single_image_wraps_to_itself() {
        let mut s = BackgroundScheduler::new(vec![1.0], 1).unwrap();
        for _ in 0..10 {
            s.advance(0.75);
            assert_eq!(s.active_index(), 0);
        }
        assert!(!s.is_exhausted());
    }

    #[test]
    fn active_index_does_not_mutate() {
        let mut s = BackgroundScheduler::new(vec![2.0], 2).unwrap();
        s.advance(1.0);
        let before = s.state();
        let _ = s.active_index();
        let _ = s.active_index();
        assert_eq!(s.state(), before);
    }

    #[test]
    fn plan_matches_sequential_advance() {
        let s = BackgroundScheduler::new(vec![10.0, 22.0, 35.0], 4).unwrap();
        let durations = vec![2.5; 60];

        let planned = s.plan(durations.iter().copied());

        let mut live = s.clone();
        let mut sequential = Vec::new();
        for d in &durations {
            sequential.push(live.active_index());
            live.advance(*d);
        }
        assert_eq!(planned, sequential);
        assert_eq!(planned[0], 0);
        // Word 4 starts at 10.0s and is the first one shown on the second background.
        assert_eq!(planned[3], 0);
        assert_eq!(planned[4], 1);
    }

    #[test]
    fn transition_is_pure() {
        let s = BackgroundScheduler::new(vec![3.0], 2).unwrap();
        let st = s.initial_state();
        assert_eq!(s.transition(st, 1.0), s.transition(st, 1.0));
        assert_eq!(s.state(), st);
    }
}
