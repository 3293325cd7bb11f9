//! Deterministic wave scheduler emitting spawn events on a virtual clock.

use serde::{Deserialize, Serialize};
use sim_core::{Wave, WaveSet};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Spawning,
    Paused,
    Complete,
}

/// "Spawn one enemy of this type now."
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnEvent {
    pub wave_number: u32,
    pub enemy_type: String,
    /// Index of the spawn group inside the wave.
    pub group_index: usize,
    /// Position in the wave's spawn order, starting at 0.
    pub spawn_index: u32,
    /// Virtual seconds since the wave started.
    pub time: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerEvent {
    Spawn(SpawnEvent),
    WaveCompleted { wave_number: u32, total_spawned: u32 },
}

/// Spawns the groups of one wave in order, one group at a time.
///
/// The scheduler works on its own copy of the wave, so the configuration it
/// was started from is never mutated.
#[derive(Clone, Debug)]
pub struct WaveScheduler {
    wave: Option<Wave>,
    state: SchedulerState,
    clock: f64,
    next_spawn_at: f64,
    cursor: usize,
    spawned: u32,
    completion_reported: bool,
}

impl Default for WaveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveScheduler {
    pub fn new() -> Self {
        Self {
            wave: None,
            state: SchedulerState::Idle,
            clock: 0.0,
            next_spawn_at: 0.0,
            cursor: 0,
            spawned: 0,
            completion_reported: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SchedulerState::Spawning | SchedulerState::Paused)
    }

    pub fn is_complete(&self) -> bool {
        self.state == SchedulerState::Complete
    }

    /// Virtual seconds since the current wave started.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn total_spawned(&self) -> u32 {
        self.spawned
    }

    /// Enemies still waiting to spawn in the current wave.
    pub fn remaining(&self) -> u32 {
        self.wave.as_ref().map_or(0, Wave::total_enemies)
    }

    pub fn wave_number(&self) -> Option<u32> {
        self.wave.as_ref().map(|w| w.wave_number)
    }

    /// Seconds until the next spawn is due, while spawning.
    pub fn next_spawn_in(&self) -> Option<f64> {
        (self.state == SchedulerState::Spawning).then(|| self.next_spawn_at - self.clock)
    }

    /// Start wave `wave_number` (1-based) of `wave_set`.
    ///
    /// Out-of-range numbers are logged and rejected without changing state.
    pub fn start_wave(&mut self, wave_set: &WaveSet, wave_number: u32) -> bool {
        match wave_set.wave(wave_number) {
            Some(wave) => self.start(wave),
            None => {
                warn!(
                    wave_number,
                    total = wave_set.total_waves(),
                    "rejected wave start: number out of range"
                );
                false
            }
        }
    }

    /// Start spawning `wave`. Rejected while another wave is active, or when
    /// the wave has invalid timing.
    pub fn start(&mut self, wave: &Wave) -> bool {
        if self.is_active() {
            warn!(
                requested = wave.wave_number,
                active = ?self.wave_number(),
                "rejected wave start: a wave is already active"
            );
            return false;
        }
        if let Err(error) = wave.validate() {
            warn!(wave = wave.wave_number, %error, "rejected wave start: invalid wave");
            return false;
        }
        let working = wave.clone();
        self.clock = 0.0;
        self.spawned = 0;
        self.completion_reported = false;
        match first_pending(&working, 0) {
            Some(idx) => {
                self.cursor = idx;
                self.next_spawn_at = f64::from(working.pre_wave_delay)
                    + f64::from(working.enemy_groups[idx].start_delay);
                self.state = SchedulerState::Spawning;
            }
            None => {
                self.cursor = working.enemy_groups.len();
                self.state = SchedulerState::Complete;
            }
        }
        debug!(wave = working.wave_number, enemies = working.total_enemies(), "wave started");
        self.wave = Some(working);
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != SchedulerState::Spawning {
            return false;
        }
        self.state = SchedulerState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != SchedulerState::Paused {
            return false;
        }
        self.state = SchedulerState::Spawning;
        true
    }

    /// Advance the virtual clock by `dt` seconds and emit every due event.
    ///
    /// Does nothing while idle or paused. A completed wave reports
    /// [`SchedulerEvent::WaveCompleted`] exactly once.
    pub fn advance(&mut self, dt: f64, out: &mut Vec<SchedulerEvent>) {
        match self.state {
            SchedulerState::Idle | SchedulerState::Paused => return,
            SchedulerState::Complete => {
                self.report_completion(out);
                return;
            }
            SchedulerState::Spawning => {}
        }
        self.clock += dt;
        while self.state == SchedulerState::Spawning && self.next_spawn_at <= self.clock {
            self.spawn_next(out);
        }
    }

    /// Jump the clock straight to the next spawn and emit it.
    ///
    /// Returns `None` while idle or paused, and after completion was reported.
    pub fn next_event(&mut self) -> Option<SchedulerEvent> {
        let mut out = Vec::with_capacity(2);
        match self.state {
            SchedulerState::Idle | SchedulerState::Paused => return None,
            SchedulerState::Complete => self.report_completion(&mut out),
            SchedulerState::Spawning => {
                self.clock = self.clock.max(self.next_spawn_at);
                self.spawn_next(&mut out);
            }
        }
        // a spawn that finishes the wave also queues its completion
        if out.len() > 1 {
            self.completion_reported = false;
            out.truncate(1);
        }
        out.into_iter().next()
    }

    fn spawn_next(&mut self, out: &mut Vec<SchedulerEvent>) {
        let Some(wave) = self.wave.as_mut() else {
            self.state = SchedulerState::Idle;
            return;
        };
        let group = &mut wave.enemy_groups[self.cursor];
        group.count -= 1;
        let interval = f64::from(group.spawn_interval);
        out.push(SchedulerEvent::Spawn(SpawnEvent {
            wave_number: wave.wave_number,
            enemy_type: group.enemy_type.clone(),
            group_index: self.cursor,
            spawn_index: self.spawned,
            time: self.next_spawn_at,
        }));
        self.spawned += 1;

        if group.count > 0 {
            self.next_spawn_at += interval;
            return;
        }
        match first_pending(wave, self.cursor + 1) {
            Some(idx) => {
                self.cursor = idx;
                self.next_spawn_at += interval + f64::from(wave.enemy_groups[idx].start_delay);
            }
            None => {
                self.state = SchedulerState::Complete;
                self.report_completion(out);
            }
        }
    }

    fn report_completion(&mut self, out: &mut Vec<SchedulerEvent>) {
        if self.completion_reported {
            return;
        }
        self.completion_reported = true;
        let wave_number = self.wave_number().unwrap_or(0);
        debug!(wave = wave_number, spawned = self.spawned, "wave spawning complete");
        out.push(SchedulerEvent::WaveCompleted {
            wave_number,
            total_spawned: self.spawned,
        });
    }
}

fn first_pending(wave: &Wave, from: usize) -> Option<usize> {
    wave.enemy_groups
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, g)| g.count > 0)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::EnemySpawnGroup;

    fn drain(s: &mut WaveScheduler, dt: f64) -> Vec<SchedulerEvent> {
        let mut out = Vec::new();
        let mut guard = 0;
        while !out
            .iter()
            .any(|e| matches!(e, SchedulerEvent::WaveCompleted { .. }))
        {
            s.advance(dt, &mut out);
            guard += 1;
            assert!(guard < 1_000_000, "scheduler never completed");
        }
        out
    }

    fn spawns(events: &[SchedulerEvent]) -> Vec<&SpawnEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Spawn(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn mixed_wave() -> Wave {
        Wave::new(1, "mixed")
            .with_group(EnemySpawnGroup::new("basic", 3, 1.0))
            .with_group(EnemySpawnGroup::new("fast", 2, 0.5).with_start_delay(2.0))
    }

    #[test]
    fn groups_spawn_in_order_without_interleaving() {
        let mut s = WaveScheduler::new();
        assert!(s.start(&mixed_wave()));
        let events = drain(&mut s, 0.1);
        let kinds: Vec<&str> = spawns(&events).iter().map(|e| e.enemy_type.as_str()).collect();
        assert_eq!(kinds, ["basic", "basic", "basic", "fast", "fast"]);
        let times: Vec<f64> = spawns(&events).iter().map(|e| e.time).collect();
        assert_eq!(times, [0.0, 1.0, 2.0, 5.0, 5.5]);
        assert_eq!(
            events.last(),
            Some(&SchedulerEvent::WaveCompleted {
                wave_number: 1,
                total_spawned: 5
            })
        );
        assert!(s.is_complete());
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn source_wave_is_not_mutated() {
        let wave = mixed_wave();
        let mut s = WaveScheduler::new();
        s.start(&wave);
        drain(&mut s, 1.0);
        assert_eq!(wave.total_enemies(), 5);
    }

    #[test]
    fn empty_wave_completes_immediately() {
        let mut s = WaveScheduler::new();
        let wave = Wave::new(3, "nothing").with_group(EnemySpawnGroup::new("basic", 0, 1.0));
        assert!(s.start(&wave));
        assert!(s.is_complete());
        let mut out = Vec::new();
        s.advance(0.1, &mut out);
        assert_eq!(
            out,
            vec![SchedulerEvent::WaveCompleted {
                wave_number: 3,
                total_spawned: 0
            }]
        );
        out.clear();
        s.advance(0.1, &mut out);
        assert!(out.is_empty(), "completion reported once");
    }

    #[test]
    fn rejects_out_of_range_and_double_start() {
        let set = WaveSet {
            waves: vec![mixed_wave()],
            ..WaveSet::default()
        };
        let mut s = WaveScheduler::new();
        assert!(!s.start_wave(&set, 0));
        assert!(!s.start_wave(&set, 2));
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.start_wave(&set, 1));
        assert!(!s.start_wave(&set, 1));
        assert!(s.pause());
        assert!(!s.start(&mixed_wave()));
    }

    #[test]
    fn pause_keeps_progress() {
        let mut s = WaveScheduler::new();
        s.start(&mixed_wave());
        let mut out = Vec::new();
        s.advance(1.0, &mut out);
        assert_eq!(spawns(&out).len(), 2);
        assert!(s.pause());
        assert!(!s.pause());
        s.advance(100.0, &mut out);
        assert_eq!(spawns(&out).len(), 2);
        assert_eq!(s.remaining(), 3);
        assert!(s.resume());
        let rest = drain(&mut s, 1.0);
        assert_eq!(spawns(&rest).len(), 3);
        assert_eq!(s.total_spawned(), 5);
    }

    #[test]
    fn next_event_steps_one_spawn_at_a_time() {
        let mut s = WaveScheduler::new();
        s.start(&mixed_wave());
        let mut seen = 0;
        let mut completed = false;
        while let Some(ev) = s.next_event() {
            match ev {
                SchedulerEvent::Spawn(_) => seen += 1,
                SchedulerEvent::WaveCompleted { total_spawned, .. } => {
                    assert_eq!(total_spawned, 5);
                    completed = true;
                }
            }
        }
        assert_eq!(seen, 5);
        assert!(completed);
        assert_eq!(s.clock(), 5.5);
    }

    #[test]
    fn rejects_waves_with_broken_timing() {
        let mut s = WaveScheduler::new();
        let nan = Wave::new(1, "nan").with_group(EnemySpawnGroup::new("basic", 2, f32::NAN));
        assert!(!s.start(&nan));
        let mut stalled = mixed_wave();
        stalled.enemy_groups[1].start_delay = f32::INFINITY;
        assert!(!s.start(&stalled));
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.next_spawn_in(), None);
    }

    #[test]
    fn next_spawn_in_tracks_the_clock() {
        let mut s = WaveScheduler::new();
        let mut wave = mixed_wave();
        wave.pre_wave_delay = 3.0;
        s.start(&wave);
        assert_eq!(s.next_spawn_in(), Some(3.0));
        let mut out = Vec::new();
        s.advance(1.0, &mut out);
        assert!(out.is_empty());
        assert_eq!(s.next_spawn_in(), Some(2.0));
        s.advance(2.0, &mut out);
        assert_eq!(spawns(&out).len(), 1);
        assert_eq!(s.next_spawn_in(), Some(1.0));
        assert!(s.pause());
        assert_eq!(s.next_spawn_in(), None);
    }

    #[test]
    fn pre_wave_delay_shifts_first_spawn() {
        let mut wave = mixed_wave();
        wave.pre_wave_delay = 3.0;
        let mut s = WaveScheduler::new();
        s.start(&wave);
        let events = drain(&mut s, 0.5);
        assert_eq!(spawns(&events)[0].time, 3.0);
    }

    proptest! {
        #[test]
        fn emits_exactly_total_enemies(counts in proptest::collection::vec(0u32..40, 0..6),
                                       interval in 0.05f32..3.0,
                                       dt in 0.01f64..5.0) {
            let mut wave = Wave::new(1, "p");
            for c in &counts {
                wave = wave.with_group(EnemySpawnGroup::new("basic", *c, interval));
            }
            let mut s = WaveScheduler::new();
            prop_assert!(s.start(&wave));
            let events = drain(&mut s, dt);
            prop_assert_eq!(spawns(&events).len() as u32, wave.total_enemies());
            let completions = events.iter().filter(|e| matches!(e, SchedulerEvent::WaveCompleted { .. })).count();
            prop_assert_eq!(completions, 1);
        }
    }
}
