// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adaptive publish-rate scheduling.
//!
//! The controller is quiet most of the time, so readings are published at a
//! slow snooze rate, starting from boot. A wake request from a remote command
//! switches to the fast wake rate for a burst of [`WAKE_COUNT`] publishes,
//! after which the scheduler drops back to snooze on its own unless
//! stay-awake is set.
//!
//! All timestamps are milliseconds from an arbitrary monotonic origin. The
//! stored timestamps are deadlines: a publish is due once `now` reaches
//! `last_publish_ts`, which is then moved to `now + current_rate`.
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::scheduler::{PublishMode, PublishScheduler, SchedulerConfig};
//!
//! let mut scheduler = PublishScheduler::new(SchedulerConfig::default(), 0);
//! assert_eq!(scheduler.mode(), PublishMode::Snooze);
//!
//! // First publish waits one poll interval so the first banks can arrive.
//! assert!(!scheduler.on_tick(1_000));
//! assert!(scheduler.on_tick(5_000));
//! assert!(!scheduler.on_tick(10_000));
//!
//! scheduler.wake();
//! assert!(scheduler.on_tick(10_000));
//! assert!(!scheduler.on_tick(14_999));
//! assert!(scheduler.on_tick(15_000));
//! ```

use crate::error::ValueError;
use crate::types::PublishRate;

/// Interval between register polls (ms).
pub const MODBUS_POLL_RATE: u64 = 5_000;
/// Publish interval while awake (ms).
pub const WAKE_PUBLISH_RATE: u64 = PublishRate::DEFAULT;
/// Publish interval while snoozing (ms).
pub const SNOOZE_PUBLISH_RATE: u64 = 300_000;
/// Number of wake-rate publishes before dropping to snooze.
pub const WAKE_COUNT: u32 = 60;

/// Scheduler tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Initial wake publish rate.
    pub wake_rate: PublishRate,
    /// Snooze publish interval (ms).
    pub snooze_rate: u64,
    /// Wake publishes before snoozing.
    pub wake_count: u32,
    /// Register poll interval (ms).
    pub poll_rate: u64,
    /// Cadence at boot.
    pub initial_mode: PublishMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            wake_rate: PublishRate::default(),
            snooze_rate: SNOOZE_PUBLISH_RATE,
            wake_count: WAKE_COUNT,
            poll_rate: MODBUS_POLL_RATE,
            initial_mode: PublishMode::Snooze,
        }
    }
}

/// Publish cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishMode {
    /// Fast publishing at the wake rate.
    Wake,
    /// Slow publishing at the snooze rate.
    Snooze,
}

/// Mutable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    /// Deadline of the next publish (ms).
    pub last_publish_ts: u64,
    /// Deadline of the next register poll (ms).
    pub last_poll_ts: u64,
    /// Current cadence; selects the current rate.
    pub mode: PublishMode,
    /// Wake publish rate.
    pub wake_rate: PublishRate,
    /// Suppresses the automatic drop to snooze.
    pub stay_awake: bool,
    /// Publishes made in the current wake burst.
    pub publish_count: u32,
}

/// Decides when to poll and when to publish.
#[derive(Debug, Clone)]
pub struct PublishScheduler {
    snooze_rate: u64,
    wake_count: u32,
    poll_rate: u64,
    state: ScheduleState,
}

impl PublishScheduler {
    /// Creates a scheduler in the configured initial mode (snooze by
    /// default) at time `now`.
    ///
    /// The first poll is due immediately; the first publish is due one poll
    /// interval later.
    #[must_use]
    pub fn new(config: SchedulerConfig, now: u64) -> Self {
        Self {
            snooze_rate: config.snooze_rate,
            wake_count: config.wake_count,
            poll_rate: config.poll_rate,
            state: ScheduleState {
                last_publish_ts: now.saturating_add(config.poll_rate),
                last_poll_ts: 0,
                mode: config.initial_mode,
                wake_rate: config.wake_rate,
                stay_awake: false,
                publish_count: 0,
            },
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    /// Returns the current cadence.
    #[must_use]
    pub fn mode(&self) -> PublishMode {
        self.state.mode
    }

    /// Returns the publish interval for the current cadence (ms).
    #[must_use]
    pub fn current_rate(&self) -> u64 {
        match self.state.mode {
            PublishMode::Wake => self.state.wake_rate.millis(),
            PublishMode::Snooze => self.snooze_rate,
        }
    }

    /// Returns true if a register poll is due, and schedules the next one.
    pub fn poll_due(&mut self, now: u64) -> bool {
        if now < self.state.last_poll_ts {
            return false;
        }
        self.state.last_poll_ts = now.saturating_add(self.poll_rate);
        true
    }

    /// Returns true if a publish is due, and schedules the next one.
    ///
    /// Publishes are counted only while awake. When the count reaches the
    /// wake limit and stay-awake is off, the scheduler switches to snooze and
    /// the next publish is a full snooze interval away.
    pub fn on_tick(&mut self, now: u64) -> bool {
        if now < self.state.last_publish_ts {
            return false;
        }
        if self.state.mode == PublishMode::Wake {
            self.state.publish_count = self.state.publish_count.saturating_add(1);
            if self.state.publish_count >= self.wake_count && !self.state.stay_awake {
                self.state.mode = PublishMode::Snooze;
                self.state.publish_count = 0;
                tracing::info!(
                    snooze_rate_ms = self.snooze_rate,
                    "Wake burst finished, snoozing"
                );
            }
        }
        self.state.last_publish_ts = now.saturating_add(self.current_rate());
        true
    }

    /// Switches to wake mode and makes the next poll and publish due
    /// immediately.
    pub fn wake(&mut self) {
        self.state.mode = PublishMode::Wake;
        self.state.publish_count = 0;
        self.state.last_publish_ts = 0;
        self.state.last_poll_ts = 0;
        tracing::debug!(wake_rate = %self.state.wake_rate, "Wake");
    }

    /// Sets the stay-awake override.
    pub fn set_stay_awake(&mut self, stay_awake: bool) {
        self.state.stay_awake = stay_awake;
    }

    /// Changes the wake publish rate.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `millis` is outside the allowed
    /// range. The previous rate is kept.
    pub fn set_wake_rate(&mut self, millis: u64) -> Result<(), ValueError> {
        match PublishRate::new(millis) {
            Ok(rate) => {
                self.state.wake_rate = rate;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    requested_ms = millis,
                    current = %self.state.wake_rate,
                    "Rejected wake publish rate: {err}"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_times(scheduler: &mut PublishScheduler, mut now: u64, n: u32) -> u64 {
        let mut published = 0;
        while published < n {
            if scheduler.on_tick(now) {
                published += 1;
            }
            now += 100;
        }
        now
    }

    fn awake(config: SchedulerConfig) -> PublishScheduler {
        PublishScheduler::new(
            SchedulerConfig {
                initial_mode: PublishMode::Wake,
                ..config
            },
            0,
        )
    }

    #[test]
    fn boots_snoozing_until_woken() {
        let mut scheduler = PublishScheduler::new(SchedulerConfig::default(), 0);
        assert_eq!(scheduler.mode(), PublishMode::Snooze);
        assert_eq!(scheduler.current_rate(), SNOOZE_PUBLISH_RATE);

        let mut published = 0;
        for now in (0..=300_000).step_by(100) {
            if scheduler.on_tick(now) {
                published += 1;
            }
        }
        assert_eq!(published, 1);
        assert_eq!(scheduler.mode(), PublishMode::Snooze);
        assert_eq!(scheduler.state().publish_count, 0);

        scheduler.wake();
        assert_eq!(scheduler.mode(), PublishMode::Wake);
    }

    #[test]
    fn snoozes_after_wake_count() {
        let mut scheduler = PublishScheduler::new(SchedulerConfig::default(), 0);
        scheduler.wake();
        publish_times(&mut scheduler, 5_000, WAKE_COUNT - 1);
        assert_eq!(scheduler.mode(), PublishMode::Wake);
        assert_eq!(scheduler.state().publish_count, WAKE_COUNT - 1);

        publish_times(&mut scheduler, 1_000_000, 1);
        assert_eq!(scheduler.mode(), PublishMode::Snooze);
        assert_eq!(scheduler.state().publish_count, 0);
        assert_eq!(scheduler.current_rate(), SNOOZE_PUBLISH_RATE);
    }

    #[test]
    fn last_wake_publish_schedules_snooze_interval() {
        let mut scheduler = awake(SchedulerConfig {
            wake_count: 1,
            ..SchedulerConfig::default()
        });
        assert!(scheduler.on_tick(5_000));
        assert_eq!(scheduler.mode(), PublishMode::Snooze);
        assert_eq!(scheduler.state().last_publish_ts, 5_000 + SNOOZE_PUBLISH_RATE);
    }

    #[test]
    fn stay_awake_prevents_snooze() {
        let mut scheduler = awake(SchedulerConfig::default());
        scheduler.set_stay_awake(true);
        publish_times(&mut scheduler, 5_000, WAKE_COUNT * 2);
        assert_eq!(scheduler.mode(), PublishMode::Wake);
        assert_eq!(scheduler.current_rate(), WAKE_PUBLISH_RATE);
    }

    #[test]
    fn snooze_publishes_are_not_counted() {
        let mut scheduler = awake(SchedulerConfig {
            wake_count: 2,
            ..SchedulerConfig::default()
        });
        publish_times(&mut scheduler, 5_000, 2);
        assert_eq!(scheduler.mode(), PublishMode::Snooze);
        publish_times(&mut scheduler, 10_000_000, 3);
        assert_eq!(scheduler.state().publish_count, 0);
    }

    #[test]
    fn wake_resets_deadlines_and_count() {
        let mut scheduler = awake(SchedulerConfig {
            wake_count: 2,
            ..SchedulerConfig::default()
        });
        publish_times(&mut scheduler, 5_000, 2);
        assert_eq!(scheduler.mode(), PublishMode::Snooze);

        scheduler.wake();
        assert_eq!(scheduler.mode(), PublishMode::Wake);
        assert_eq!(scheduler.state().publish_count, 0);
        assert!(scheduler.poll_due(1));
        assert!(scheduler.on_tick(1));
    }

    #[test]
    fn deadline_moves_by_current_rate() {
        let mut scheduler = PublishScheduler::new(SchedulerConfig::default(), 1_000);
        assert!(!scheduler.on_tick(5_999));
        assert!(scheduler.on_tick(6_000));
        assert_eq!(scheduler.state().last_publish_ts, 6_000 + SNOOZE_PUBLISH_RATE);

        scheduler.wake();
        assert!(scheduler.on_tick(7_000));
        assert_eq!(scheduler.state().last_publish_ts, 12_000);
    }

    #[test]
    fn poll_due_every_poll_rate() {
        let mut scheduler = PublishScheduler::new(SchedulerConfig::default(), 0);
        assert!(scheduler.poll_due(0));
        assert!(!scheduler.poll_due(4_999));
        assert!(scheduler.poll_due(5_000));
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let mut scheduler = awake(SchedulerConfig::default());
        assert!(scheduler.set_wake_rate(999).is_err());
        assert!(scheduler.set_wake_rate(60_001).is_err());
        assert_eq!(scheduler.state().wake_rate.millis(), WAKE_PUBLISH_RATE);

        scheduler.set_wake_rate(2_000).unwrap();
        assert_eq!(scheduler.current_rate(), 2_000);
    }
}
