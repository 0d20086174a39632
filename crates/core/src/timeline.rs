//! Time cursor over an immutable step sequence, with cancellable playback.
//!
//! Every state change ends in exactly one notification carrying the snapshot
//! for the new cursor; that notification is the only way the rendered world
//! learns about the timeline.

use std::time::Duration;

use mosaic_protocol::{Snapshot, TraceCursor};

use crate::config::PlaybackConfig;
use crate::model::SnapshotProvider;

/// Payload delivered to timeline listeners.
#[derive(Debug, Clone, Copy)]
pub struct TimelineUpdate<'a> {
    pub cursor: TraceCursor,
    pub playing: bool,
    pub snapshot: &'a Snapshot,
}

pub type TimelineListener = Box<dyn FnMut(&TimelineUpdate<'_>) + Send>;

/// Fixed-interval timer driven by elapsed frame time.
///
/// Owned by the controller while playing; dropping it cancels playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTimer {
    interval: Duration,
    elapsed: Duration,
}

impl PlaybackTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Accumulate `dt` and return how many whole intervals elapsed.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        self.elapsed += dt;
        let mut fired = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            fired += 1;
        }
        fired
    }
}

pub struct TimelineController<P: SnapshotProvider> {
    provider: P,
    cursor: TraceCursor,
    speed: Duration,
    timer: Option<PlaybackTimer>,
    snapshot: Snapshot,
    listeners: Vec<TimelineListener>,
}

impl<P: SnapshotProvider> TimelineController<P> {
    pub fn new(provider: P, playback: &PlaybackConfig) -> Self {
        let cursor = TraceCursor::BEFORE_START;
        let snapshot = provider.snapshot_at(cursor);
        Self {
            provider,
            cursor,
            speed: Self::clamp_speed(playback.speed_ms),
            timer: None,
            snapshot,
            listeners: Vec::new(),
        }
    }

    fn clamp_speed(ms: u64) -> Duration {
        Duration::from_millis(ms.max(PlaybackConfig::MIN_SPEED_MS))
    }

    pub fn subscribe(&mut self, listener: TimelineListener) {
        self.listeners.push(listener);
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cursor(&self) -> TraceCursor {
        self.cursor
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn len(&self) -> usize {
        self.provider.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provider.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        self.timer.is_some()
    }

    pub fn speed(&self) -> Duration {
        self.speed
    }

    fn last(&self) -> i64 {
        self.provider.len() as i64 - 1
    }

    fn notify(&mut self) {
        self.snapshot = self.provider.snapshot_at(self.cursor);
        let update = TimelineUpdate {
            cursor: self.cursor,
            playing: self.timer.is_some(),
            snapshot: &self.snapshot,
        };
        for listener in &mut self.listeners {
            listener(&update);
        }
    }

    /// Move the cursor, clamped to `[-1, len - 1]`.
    pub fn seek_to(&mut self, index: i64) -> TraceCursor {
        let clamped = index.clamp(-1, self.last().max(-1));
        if clamped != index {
            tracing::debug!(requested = index, clamped, "seek clamped");
        }
        self.cursor = TraceCursor::new(clamped);
        self.notify();
        self.cursor
    }

    /// Advance one step. Notifies even when already at the last step.
    pub fn step_forward(&mut self) -> bool {
        let advanced = self.cursor.value() < self.last();
        if advanced {
            self.cursor = TraceCursor::new(self.cursor.value() + 1);
        }
        self.notify();
        advanced
    }

    pub fn step_backward(&mut self) -> bool {
        let moved = self.cursor.value() > -1;
        if moved {
            self.cursor = TraceCursor::new(self.cursor.value() - 1);
        }
        self.notify();
        moved
    }

    /// Start playback. Returns `false` if it was already running.
    pub fn play(&mut self) -> bool {
        if self.timer.is_some() {
            return false;
        }
        tracing::debug!(speed_ms = self.speed.as_millis() as u64, "playback started");
        self.timer = Some(PlaybackTimer::new(self.speed));
        self.notify();
        true
    }

    /// Cancel playback. Idempotent: returns `false` when already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.halt() {
            return false;
        }
        self.notify();
        true
    }

    /// Drop the timer without notifying; callers notify once afterwards.
    fn halt(&mut self) -> bool {
        if self.timer.take().is_none() {
            return false;
        }
        tracing::debug!(cursor = self.cursor.value(), "playback stopped");
        true
    }

    /// Returns the resulting playing state.
    pub fn toggle_play(&mut self) -> bool {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
        self.is_playing()
    }

    /// Change the playback interval, restarting a running timer so no tick is
    /// skipped or doubled.
    pub fn set_speed(&mut self, ms: u64) {
        self.speed = Self::clamp_speed(ms);
        if let Some(timer) = &mut self.timer {
            *timer = PlaybackTimer::new(self.speed);
        }
        self.notify();
    }

    pub fn go_to_start(&mut self) -> TraceCursor {
        self.halt();
        self.seek_to(-1)
    }

    pub fn go_to_end(&mut self) -> TraceCursor {
        self.halt();
        let last = self.last();
        self.seek_to(last)
    }

    /// Drive the playback timer by `dt`. Returns the number of steps taken.
    ///
    /// Playback stops on the first tick that cannot advance.
    pub fn tick(&mut self, dt: Duration) -> usize {
        let fired = match &mut self.timer {
            Some(timer) => timer.advance(dt),
            None => return 0,
        };
        let mut advanced = 0;
        for _ in 0..fired {
            if self.cursor.value() < self.last() {
                self.step_forward();
                advanced += 1;
            } else {
                // The failed step and the stop share one notification.
                self.halt();
                self.notify();
                break;
            }
        }
        advanced
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::TraceSnapshots;
    use mosaic_protocol::{ExecutionStep, StepKind, Trace, TraceMetadata};

    fn controller(n: usize) -> TimelineController<TraceSnapshots> {
        let steps = (0..n)
            .map(|i| ExecutionStep::new(StepKind::Decl, format!("v{i}")).with_value("0"))
            .collect();
        let trace = Arc::new(Trace::new(TraceMetadata::default(), steps));
        TimelineController::new(TraceSnapshots::new(trace), &PlaybackConfig { speed_ms: 100 })
    }

    fn recorder(tl: &mut TimelineController<TraceSnapshots>) -> Arc<Mutex<Vec<i64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tl.subscribe(Box::new(move |update| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(update.cursor.value());
            }
        }));
        seen
    }

    fn count(seen: &Arc<Mutex<Vec<i64>>>) -> usize {
        seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    #[test]
    fn seek_clamps_and_notifies_once() {
        let mut tl = controller(3);
        let seen = recorder(&mut tl);
        assert_eq!(tl.seek_to(10).value(), 2);
        assert_eq!(tl.seek_to(-7).value(), -1);
        assert_eq!(count(&seen), 2);
    }

    #[test]
    fn step_forward_at_end_is_a_notified_no_op() {
        let mut tl = controller(2);
        tl.seek_to(1);
        let seen = recorder(&mut tl);
        assert!(!tl.step_forward());
        assert_eq!(tl.cursor().value(), 1);
        assert_eq!(count(&seen), 1);
    }

    #[test]
    fn step_backward_floors_at_before_start() {
        let mut tl = controller(2);
        assert!(!tl.step_backward());
        assert_eq!(tl.cursor(), TraceCursor::BEFORE_START);
        tl.step_forward();
        assert!(tl.step_backward());
        assert_eq!(tl.cursor(), TraceCursor::BEFORE_START);
    }

    #[test]
    fn playback_stops_after_exactly_n_advancing_ticks() {
        let n = 4;
        let mut tl = controller(n);
        assert!(tl.play());
        let mut advanced = 0;
        for _ in 0..(n + 3) {
            advanced += tl.tick(Duration::from_millis(100));
        }
        assert_eq!(advanced, n);
        assert!(!tl.is_playing());
        assert_eq!(tl.cursor().value(), n as i64 - 1);
    }

    #[test]
    fn large_frame_delta_fires_multiple_ticks() {
        let mut tl = controller(10);
        tl.play();
        assert_eq!(tl.tick(Duration::from_millis(350)), 3);
        assert_eq!(tl.tick(Duration::from_millis(50)), 1);
        assert_eq!(tl.cursor().value(), 3);
    }

    #[test]
    fn play_is_idempotent_and_stop_is_idempotent() {
        let mut tl = controller(3);
        assert!(tl.play());
        assert!(!tl.play());
        assert!(tl.stop());
        assert!(!tl.stop());
        assert_eq!(tl.tick(Duration::from_secs(5)), 0);
    }

    #[test]
    fn toggle_reports_resulting_state() {
        let mut tl = controller(3);
        assert!(tl.toggle_play());
        assert!(!tl.toggle_play());
    }

    #[test]
    fn set_speed_restarts_running_timer() {
        let mut tl = controller(10);
        tl.play();
        tl.tick(Duration::from_millis(90));
        tl.set_speed(200);
        // The 90ms accumulated under the old speed are discarded.
        assert_eq!(tl.tick(Duration::from_millis(150)), 0);
        assert_eq!(tl.tick(Duration::from_millis(50)), 1);
        assert_eq!(tl.speed(), Duration::from_millis(200));
    }

    #[test]
    fn speed_is_clamped_to_minimum() {
        let mut tl = controller(1);
        tl.set_speed(0);
        assert_eq!(
            tl.speed(),
            Duration::from_millis(PlaybackConfig::MIN_SPEED_MS)
        );
    }

    #[test]
    fn go_to_end_stops_playback_first() {
        let mut tl = controller(5);
        tl.play();
        assert_eq!(tl.go_to_end().value(), 4);
        assert!(!tl.is_playing());
        assert_eq!(tl.go_to_start(), TraceCursor::BEFORE_START);
    }

    #[test]
    fn every_mutation_notifies_exactly_once() {
        let mut tl = controller(3);
        tl.seek_to(2);
        tl.play();
        let seen = recorder(&mut tl);
        tl.go_to_start();
        assert_eq!(count(&seen), 1);

        tl.play();
        let seen = recorder(&mut tl);
        tl.go_to_end();
        assert_eq!(count(&seen), 1);

        let seen = recorder(&mut tl);
        tl.set_speed(250);
        assert_eq!(count(&seen), 1);

        tl.play();
        let seen = recorder(&mut tl);
        assert_eq!(tl.tick(Duration::from_millis(250)), 0);
        assert_eq!(count(&seen), 1);
        assert!(!tl.is_playing());
    }

    #[test]
    fn auto_stop_notification_reports_stopped() {
        let mut tl = controller(1);
        tl.play();
        tl.tick(Duration::from_millis(100));
        let playing = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&playing);
        tl.subscribe(Box::new(move |update| {
            if let Ok(mut playing) = sink.lock() {
                playing.push(update.playing);
            }
        }));
        assert_eq!(tl.tick(Duration::from_millis(100)), 0);
        let playing = playing.lock().map(|p| p.clone()).unwrap_or_default();
        assert_eq!(playing, vec![false]);
    }

    #[test]
    fn notification_carries_fresh_snapshot() {
        let mut tl = controller(3);
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        tl.subscribe(Box::new(move |update| {
            if let Ok(mut sizes) = sink.lock() {
                sizes.push(update.snapshot.variables.len());
            }
        }));
        tl.seek_to(1);
        tl.step_forward();
        let sizes = sizes.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(sizes, vec![2, 3]);
    }

    #[test]
    fn empty_trace_stays_before_start() {
        let mut tl = controller(0);
        assert_eq!(tl.seek_to(3), TraceCursor::BEFORE_START);
        assert!(!tl.step_forward());
        tl.play();
        assert_eq!(tl.tick(Duration::from_secs(1)), 0);
        assert!(!tl.is_playing());
    }
}
