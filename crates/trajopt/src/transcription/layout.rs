//! Decision-vector layout of the transcribed problem.
//!
//! Variables are ordered interval by interval, `u_0, x_1, u_1, x_2, ...,
//! u_{N-1}, x_N`, followed by `T` when the transfer time is free. The fixed
//! initial state `x_0` is a constant, not a variable. Keeping each interval's
//! unknowns adjacent makes the normal matrix banded.

use transfer_core::{Control, State};

/// Values per interval block: two control components and four state components.
const BLOCK: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransferTime {
    Free,
    Fixed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    intervals: usize,
    initial: State,
    duration: TransferTime,
}

impl Layout {
    /// Layout with a free transfer time.
    pub fn free_time(intervals: usize, initial: State) -> Self {
        Self {
            intervals,
            initial,
            duration: TransferTime::Free,
        }
    }

    /// Layout with the transfer time pinned to `duration`.
    pub fn fixed_time(intervals: usize, initial: State, duration: f64) -> Self {
        Self {
            intervals,
            initial,
            duration: TransferTime::Fixed(duration),
        }
    }

    pub fn intervals(&self) -> usize {
        self.intervals
    }

    pub fn initial_state(&self) -> &State {
        &self.initial
    }

    pub fn variable_count(&self) -> usize {
        BLOCK * self.intervals + usize::from(self.time_column().is_some())
    }

    /// First column of `u_i`.
    #[inline]
    pub fn control_column(&self, interval: usize) -> usize {
        BLOCK * interval
    }

    /// First column of `x_knot`, `None` for the fixed initial state.
    #[inline]
    pub fn state_column(&self, knot: usize) -> Option<usize> {
        (knot > 0).then(|| BLOCK * (knot - 1) + 2)
    }

    /// Column of `T` when it is free.
    #[inline]
    pub fn time_column(&self) -> Option<usize> {
        match self.duration {
            TransferTime::Free => Some(BLOCK * self.intervals),
            TransferTime::Fixed(_) => None,
        }
    }

    /// Transfer time at `x`; free values are floored to stay positive.
    pub fn duration(&self, x: &[f64]) -> f64 {
        match self.duration {
            TransferTime::Free => x[BLOCK * self.intervals].max(1e-9),
            TransferTime::Fixed(t) => t,
        }
    }

    /// Uniform step `h = T / N`.
    pub fn step(&self, x: &[f64]) -> f64 {
        self.duration(x) / self.intervals as f64
    }

    pub fn state(&self, x: &[f64], knot: usize) -> State {
        match self.state_column(knot) {
            Some(c) => State::new(x[c], x[c + 1], x[c + 2], x[c + 3]),
            None => self.initial,
        }
    }

    pub fn control(&self, x: &[f64], interval: usize) -> Control {
        let c = self.control_column(interval);
        Control::new(x[c], x[c + 1])
    }

    /// Write `state` into the columns of `knot` (no-op for the initial knot).
    pub fn set_state(&self, x: &mut [f64], knot: usize, state: &State) {
        if let Some(c) = self.state_column(knot) {
            x[c..c + 4].copy_from_slice(state.as_slice());
        }
    }

    pub fn set_control(&self, x: &mut [f64], interval: usize, control: &Control) {
        let c = self.control_column(interval);
        x[c..c + 2].copy_from_slice(control.as_slice());
    }

    pub fn set_duration(&self, x: &mut [f64], duration: f64) {
        if let Some(c) = self.time_column() {
            x[c] = duration;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_interleave_controls_and_states() {
        let layout = Layout::free_time(3, State::zeros());
        assert_eq!(layout.variable_count(), 19);
        assert_eq!(layout.control_column(0), 0);
        assert_eq!(layout.state_column(0), None);
        assert_eq!(layout.state_column(1), Some(2));
        assert_eq!(layout.control_column(1), 6);
        assert_eq!(layout.state_column(3), Some(14));
        assert_eq!(layout.time_column(), Some(18));
    }

    #[test]
    fn fixed_time_drops_the_time_column() {
        let layout = Layout::fixed_time(4, State::zeros(), 2.0);
        assert_eq!(layout.variable_count(), 24);
        assert_eq!(layout.time_column(), None);
        assert_eq!(layout.step(&[0.0; 24]), 0.5);
    }

    #[test]
    fn state_roundtrip_keeps_initial_constant() {
        let initial = State::new(1.0, 2.0, 3.0, 4.0);
        let layout = Layout::free_time(2, initial);
        let mut x = vec![0.0; layout.variable_count()];
        layout.set_state(&mut x, 0, &State::repeat(9.0));
        layout.set_state(&mut x, 2, &State::new(5.0, 6.0, 7.0, 8.0));
        assert_eq!(layout.state(&x, 0), initial);
        assert_eq!(layout.state(&x, 2), State::new(5.0, 6.0, 7.0, 8.0));
    }
}
