use rand::seq::SliceRandom;
use rand::Rng;
use strum::Display;

/// A directional head-movement task within an active liveness challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LivenessTask {
    /// Turn the head to the left.
    LookLeft,
    /// Turn the head to the right.
    LookRight,
    /// Tilt the head upward.
    LookUp,
}

impl LivenessTask {
    /// All tasks, in canonical order. A challenge runs a shuffled permutation
    /// of these.
    pub const ALL: [Self; 3] = [Self::LookLeft, Self::LookRight, Self::LookUp];

    /// Number of frames snapshotted when a task completes. Two back-to-back
    /// captures reduce the chance that motion blur ruins the proof image.
    pub const FRAMES_PER_COMPLETED_TASK: usize = 2;
}

/// Events emitted by [`LivenessChallenge`] for the orchestrator to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    /// Snapshot the current frame as a liveness proof image.
    CaptureImage,
    /// A single task finished; the challenge moved on to the next one.
    TaskCompleted(LivenessTask),
    /// Every task finished. Terminal.
    ChallengeCompleted,
    /// A task's time budget ran out. Terminal for the whole challenge.
    ChallengeTimedOut,
}

/// Progress state of the challenge.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeState {
    /// `start` has not been called.
    NotStarted,
    /// A task is active and accumulating progress.
    TaskActive {
        /// The task the user must currently perform.
        task: LivenessTask,
        /// Monotonic progress toward completion, in `[0, 1]`.
        progress: f64,
        /// Whole seconds elapsed since the task became active.
        elapsed_secs: u64,
    },
    /// All tasks passed. Terminal.
    Completed,
    /// A task's budget was exhausted. Terminal.
    TimedOut,
}

/// Tunable thresholds for the liveness challenge.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Angle (radians) at which directional progress starts accumulating.
    pub min_angle: f64,
    /// Angle (radians) at which a task is considered fully performed.
    pub max_angle: f64,
    /// Wall-clock budget per task, in seconds.
    pub task_timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            min_angle: 0.15,
            max_angle: 0.3,
            task_timeout_secs: 120,
        }
    }
}

/// Sequencer for the three-task active liveness challenge.
///
/// The task order is shuffled once at [`LivenessChallenge::start`] and never
/// re-shuffled mid-challenge. Per-task progress is monotonic: once advanced
/// it never decreases. The task timer is externally driven through
/// [`LivenessChallenge::on_timer_tick`] at a 1-second cadence.
#[derive(Debug)]
pub struct LivenessChallenge {
    config: LivenessConfig,
    sequence: Vec<LivenessTask>,
    current_index: usize,
    state: ChallengeState,
}

impl Default for LivenessChallenge {
    fn default() -> Self {
        Self::new(LivenessConfig::default())
    }
}

impl LivenessChallenge {
    /// Creates an idle challenge with the given thresholds.
    #[must_use]
    pub const fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            sequence: Vec::new(),
            current_index: 0,
            state: ChallengeState::NotStarted,
        }
    }

    /// Current challenge state.
    #[must_use]
    pub const fn state(&self) -> &ChallengeState {
        &self.state
    }

    /// The task the user must currently perform, if one is active.
    #[must_use]
    pub const fn current_task(&self) -> Option<LivenessTask> {
        match self.state {
            ChallengeState::TaskActive { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Whether the challenge has reached `Completed` or `TimedOut`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ChallengeState::Completed | ChallengeState::TimedOut
        )
    }

    /// Starts the challenge with a freshly shuffled task order.
    ///
    /// No-op if the challenge already started.
    pub fn start(&mut self) {
        self.start_with_rng(&mut rand::thread_rng());
    }

    /// Starts the challenge using the provided RNG for the task shuffle.
    pub fn start_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !matches!(self.state, ChallengeState::NotStarted) {
            return;
        }
        let mut sequence = LivenessTask::ALL.to_vec();
        sequence.shuffle(rng);
        self.activate(sequence);
    }

    /// Starts the challenge with an explicit task order. Intended for hosts
    /// that need reproducible flows (demos, tests).
    pub fn start_with_sequence(&mut self, sequence: [LivenessTask; 3]) {
        if !matches!(self.state, ChallengeState::NotStarted) {
            return;
        }
        self.activate(sequence.to_vec());
    }

    fn activate(&mut self, sequence: Vec<LivenessTask>) {
        self.current_index = 0;
        self.state = ChallengeState::TaskActive {
            task: sequence[0],
            progress: 0.0,
            elapsed_secs: 0,
        };
        self.sequence = sequence;
    }

    /// Returns the challenge to `NotStarted`, dropping all progress.
    pub fn reset(&mut self) {
        self.sequence.clear();
        self.current_index = 0;
        self.state = ChallengeState::NotStarted;
    }

    /// Feeds one frame's head pose into the active task.
    ///
    /// Returns the events produced by this measurement, in order. Completing
    /// a task yields exactly [`LivenessTask::FRAMES_PER_COMPLETED_TASK`]
    /// `CaptureImage` events followed by `TaskCompleted`, and
    /// `ChallengeCompleted` when it was the last task. Measurements outside
    /// an active task are ignored.
    pub fn on_measurement(&mut self, yaw: f64, pitch: f64) -> Vec<LivenessEvent> {
        let ChallengeState::TaskActive { task, progress, .. } = &mut self.state else {
            return Vec::new();
        };

        let raw = match task {
            LivenessTask::LookLeft if yaw < -self.config.min_angle => {
                normalized(yaw, -self.config.min_angle, -self.config.max_angle)
            }
            LivenessTask::LookRight if yaw > self.config.min_angle => {
                normalized(yaw, self.config.min_angle, self.config.max_angle)
            }
            LivenessTask::LookUp if pitch < -self.config.min_angle => {
                normalized(pitch, -self.config.min_angle, -self.config.max_angle)
            }
            _ => return Vec::new(),
        };

        // Progress only ever moves forward within a task.
        *progress = raw.max(*progress).min(1.0);
        if *progress < 1.0 {
            return Vec::new();
        }
        self.complete_current_task()
    }

    /// Advances the externally driven 1-second task timer.
    ///
    /// Returns `ChallengeTimedOut` when the active task's budget is
    /// exhausted. Ticks outside an active task are ignored.
    pub fn on_timer_tick(&mut self) -> Option<LivenessEvent> {
        let ChallengeState::TaskActive { elapsed_secs, .. } = &mut self.state else {
            return None;
        };
        *elapsed_secs += 1;
        if *elapsed_secs < self.config.task_timeout_secs {
            return None;
        }
        self.state = ChallengeState::TimedOut;
        Some(LivenessEvent::ChallengeTimedOut)
    }

    fn complete_current_task(&mut self) -> Vec<LivenessEvent> {
        let completed = self.sequence[self.current_index];
        let mut events =
            vec![LivenessEvent::CaptureImage; LivenessTask::FRAMES_PER_COMPLETED_TASK];
        events.push(LivenessEvent::TaskCompleted(completed));

        if self.current_index + 1 < self.sequence.len() {
            self.current_index += 1;
            // Entering a new task resets progress and its time budget.
            self.state = ChallengeState::TaskActive {
                task: self.sequence[self.current_index],
                progress: 0.0,
                elapsed_secs: 0,
            };
        } else {
            self.state = ChallengeState::Completed;
            events.push(LivenessEvent::ChallengeCompleted);
        }
        events
    }
}

/// Linear map of `value` from `[min, max]` onto `[0, 1]`, unclamped.
fn normalized(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}
