use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use vigil_core::{
    AggregateMetrics, InputEvent, MetricsAggregator, ResponseKind, TrialOutcome, TrialSpec,
    classify,
};
use vigil_timing::{Clock, FiredTimer, TimerHandle, TimerQueue};

use crate::config::{RunConfig, RunMode};
use crate::gate::ResponseGate;
use crate::sequence;

/// Number of countdown steps shown before the first trial.
pub const COUNTDOWN_STEPS: u32 = 3;

/// What a pending timer means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPurpose {
    CountdownStep,
    StimulusWindow,
    Feedback,
    InterTrialInterval,
}

/// Stale-callback guard: a fired timer acts only if its token still names
/// the machine's current trial and the purpose its state expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub trial: usize,
    pub purpose: TimerPurpose,
}

/// Run lifecycle states. `Presenting` is transient: presentation arms the
/// gate and schedules the stimulus window in the same call, leaving the
/// machine in `AwaitingResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Countdown { steps_left: u32 },
    Presenting,
    AwaitingResponse,
    Feedback,
    InterTrialInterval,
    Completed,
    Aborted,
}

/// Orchestrates one run: sequences trials, owns the timer queue and the
/// response gate, resolves each trial into a [`TrialOutcome`], and feeds
/// the aggregator (main mode only).
///
/// Single-threaded by construction: the machine is `&mut self` throughout,
/// and timer/input deliveries are serialized by whoever pumps it.
pub struct TrialStateMachine<C: Clock, R: Rng> {
    config: RunConfig,
    clock: C,
    rng: R,
    sequence: Vec<TrialSpec>,
    state: RunState,
    trial_index: usize,
    gate: ResponseGate,
    timers: TimerQueue<TimerToken>,
    pending: Option<TimerHandle>,
    stimulus_start_ns: u64,
    outcomes: Vec<TrialOutcome>,
    aggregator: MetricsAggregator,
    summary: Option<AggregateMetrics>,
}

impl<C: Clock, R: Rng> TrialStateMachine<C, R> {
    pub fn new(config: RunConfig, clock: C, mut rng: R) -> Self {
        let sequence = sequence::generate(&config, &mut rng);
        info!(
            group = config.group.as_u8(),
            mode = ?config.mode,
            trials = sequence.len(),
            "run initialized"
        );
        Self {
            config,
            clock,
            rng,
            sequence,
            state: RunState::Idle,
            trial_index: 0,
            gate: ResponseGate::new(),
            timers: TimerQueue::new(),
            pending: None,
            stimulus_start_ns: 0,
            outcomes: Vec::new(),
            aggregator: MetricsAggregator::new(),
            summary: None,
        }
    }

    /// Begin the run: the one-time countdown, then the first presentation.
    /// No-op unless the machine is still `Idle`.
    pub fn start(&mut self) {
        if self.state != RunState::Idle {
            return;
        }
        self.state = RunState::Countdown { steps_left: COUNTDOWN_STEPS };
        self.schedule(self.config.timing.countdown_step_ms, TimerPurpose::CountdownStep);
    }

    /// Deliver one recognized input event. Returns `true` if it resolved
    /// the current trial; late, early and repeated inputs return `false`.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        if self.state != RunState::AwaitingResponse {
            return false;
        }
        if !self.gate.capture(event.kind, event.at_ns) {
            return false;
        }

        // first valid input wins: stop the stimulus timer before anything
        // else can observe it
        if let Some(handle) = self.pending.take() {
            self.timers.cancel(handle);
        }

        let reaction_time_ms = event.at_ns.saturating_sub(self.stimulus_start_ns) / 1_000_000;
        self.resolve(Some(event.kind), Some(reaction_time_ms));
        true
    }

    /// Deliver a fired timer. Stale deliveries (wrong handle, wrong trial,
    /// or a state that no longer expects this purpose) are dropped.
    pub fn handle_timer(&mut self, fired: FiredTimer<TimerToken>) {
        let token = fired.token;
        if self.pending != Some(fired.handle) || token.trial != self.trial_index {
            debug!(?token, trial = self.trial_index, "dropping stale timer");
            return;
        }
        self.pending = None;

        match (self.state, token.purpose) {
            (RunState::Countdown { steps_left }, TimerPurpose::CountdownStep) => {
                let remaining = steps_left.saturating_sub(1);
                if remaining == 0 {
                    self.begin_trial_or_complete();
                } else {
                    self.state = RunState::Countdown { steps_left: remaining };
                    self.schedule(self.config.timing.countdown_step_ms, TimerPurpose::CountdownStep);
                }
            }
            (RunState::AwaitingResponse, TimerPurpose::StimulusWindow) => {
                if self.gate.expire() {
                    self.resolve(None, None);
                }
            }
            (RunState::Feedback, TimerPurpose::Feedback) => {
                self.enter_interval();
            }
            (RunState::InterTrialInterval, TimerPurpose::InterTrialInterval) => {
                self.trial_index += 1;
                self.begin_trial_or_complete();
            }
            (state, purpose) => {
                debug!(?state, ?purpose, "timer fired outside its state; ignoring");
            }
        }
    }

    /// Fire every timer due at the current clock reading, in deadline
    /// order. The pump for both the blocking runner and tests.
    pub fn tick(&mut self) {
        let now = self.clock.now_ns();
        while let Some(fired) = self.timers.pop_due(now) {
            self.handle_timer(fired);
        }
    }

    /// Cancel the run from any non-terminal state. Pending timers are
    /// canceled and the gate disarmed before this returns, so no stale
    /// callback can mutate state afterward.
    pub fn abort(&mut self) {
        if matches!(self.state, RunState::Completed | RunState::Aborted) {
            return;
        }
        if let Some(handle) = self.pending.take() {
            self.timers.cancel(handle);
        }
        self.gate.disarm();
        self.state = RunState::Aborted;
        info!(trial = self.trial_index, "run aborted");
    }

    fn begin_trial_or_complete(&mut self) {
        if self.trial_index < self.sequence.len() {
            self.present_current();
        } else {
            self.complete();
        }
    }

    fn present_current(&mut self) {
        self.state = RunState::Presenting;
        let spec = self.sequence[self.trial_index];
        self.stimulus_start_ns = self.clock.now_ns();
        self.gate.arm();

        let timing = &self.config.timing;
        let duration_ms = self.rng.random_range(timing.stimulus_min_ms..=timing.stimulus_max_ms);
        debug!(trial = self.trial_index, ?spec, duration_ms, "presenting stimulus");

        self.state = RunState::AwaitingResponse;
        self.schedule(duration_ms, TimerPurpose::StimulusWindow);
    }

    fn resolve(&mut self, response: Option<ResponseKind>, reaction_time_ms: Option<u64>) {
        let spec = self.sequence[self.trial_index];
        let category = classify(spec.stimulus, response);
        let outcome = TrialOutcome {
            index: self.trial_index,
            spec,
            response,
            reaction_time_ms,
            stimulus_start_ns: self.stimulus_start_ns,
            stimulus_end_ns: self.clock.now_ns(),
            category,
        };
        debug!(trial = self.trial_index, ?category, ?response, "trial resolved");

        // practice trials are never aggregated into saved metrics
        if self.config.mode == RunMode::Main {
            self.aggregator.record(&outcome);
        }
        self.outcomes.push(outcome);

        if self.config.mode == RunMode::Practice {
            self.state = RunState::Feedback;
            self.schedule(self.config.timing.feedback_ms, TimerPurpose::Feedback);
        } else {
            self.enter_interval();
        }
    }

    fn enter_interval(&mut self) {
        self.state = RunState::InterTrialInterval;
        self.schedule(self.config.timing.fixation_ms, TimerPurpose::InterTrialInterval);
    }

    fn complete(&mut self) {
        self.state = RunState::Completed;
        let summary = self.aggregator.finalize();
        info!(
            trials = self.outcomes.len(),
            d_prime = summary.d_prime,
            "run completed"
        );
        self.summary = Some(summary);
    }

    fn schedule(&mut self, delay_ms: u64, purpose: TimerPurpose) {
        debug_assert!(self.timers.is_empty(), "one pending timer at a time");
        let token = TimerToken { trial: self.trial_index, purpose };
        let handle =
            self.timers
                .schedule(self.clock.now_ns(), Duration::from_millis(delay_ms), token);
        self.pending = Some(handle);
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    /// Earliest pending timer deadline, for the runner's sleep planning.
    pub fn next_deadline_ns(&self) -> Option<u64> {
        self.timers.next_deadline_ns()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Aborted)
    }

    /// The stimulus a presentation layer should be showing right now.
    pub fn current_stimulus(&self) -> Option<&TrialSpec> {
        match self.state {
            RunState::Presenting | RunState::AwaitingResponse | RunState::Feedback => {
                self.sequence.get(self.trial_index)
            }
            _ => None,
        }
    }

    /// `(current trial, total trials)`, 1-based, while a trial is active.
    pub fn progress(&self) -> Option<(usize, usize)> {
        if self.current_stimulus().is_some() {
            Some((self.trial_index + 1, self.sequence.len()))
        } else {
            None
        }
    }

    /// Whether the most recent outcome was correct, for the practice
    /// feedback display.
    pub fn last_trial_correct(&self) -> Option<bool> {
        use vigil_core::SdtCategory;
        self.outcomes.last().map(|o| {
            matches!(o.category, SdtCategory::Hit | SdtCategory::CorrectRejection)
        })
    }

    pub fn outcomes(&self) -> &[TrialOutcome] {
        &self.outcomes
    }

    /// Finalized metrics, available once the run has completed.
    pub fn summary(&self) -> Option<&AggregateMetrics> {
        self.summary.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Group, RunConfig, RunMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use vigil_core::SdtCategory;
    use vigil_timing::{ManualClock, TimerHandle};

    type TestMachine = TrialStateMachine<ManualClock, StdRng>;

    fn machine(mode: RunMode, seed: u64) -> (TestMachine, ManualClock) {
        let clock = ManualClock::new();
        let config = RunConfig::standard(Group::One, mode);
        let machine = TrialStateMachine::new(config, clock.clone(), StdRng::seed_from_u64(seed));
        (machine, clock)
    }

    /// Advance the clock just past the next deadline and deliver it.
    fn fire_next(machine: &mut TestMachine, clock: &ManualClock) {
        let deadline = machine.next_deadline_ns().expect("a timer should be pending");
        clock.set_ns(deadline + 1);
        machine.tick();
    }

    fn advance_to_first_trial(machine: &mut TestMachine, clock: &ManualClock) {
        machine.start();
        for _ in 0..COUNTDOWN_STEPS {
            assert!(matches!(machine.state(), RunState::Countdown { .. }));
            fire_next(machine, clock);
        }
        assert_eq!(machine.state(), RunState::AwaitingResponse);
    }

    fn press(machine: &mut TestMachine, clock: &ManualClock, kind: ResponseKind) -> bool {
        machine.handle_input(InputEvent { kind, at_ns: clock.now_ns() })
    }

    #[test]
    fn countdown_precedes_first_presentation() {
        let (mut machine, clock) = machine(RunMode::Main, 1);
        assert_eq!(machine.state(), RunState::Idle);
        assert!(machine.current_stimulus().is_none());

        advance_to_first_trial(&mut machine, &clock);
        assert!(machine.current_stimulus().is_some());
        assert_eq!(machine.progress(), Some((1, 500)));
    }

    #[test]
    fn start_is_idempotent() {
        let (mut machine, clock) = machine(RunMode::Main, 1);
        advance_to_first_trial(&mut machine, &clock);
        machine.start();
        assert_eq!(machine.state(), RunState::AwaitingResponse);
    }

    #[test]
    fn response_resolves_the_trial_and_cancels_the_timer() {
        let (mut machine, clock) = machine(RunMode::Main, 2);
        advance_to_first_trial(&mut machine, &clock);
        let window_deadline = machine.next_deadline_ns().unwrap();

        clock.advance(Duration::from_millis(300));
        assert!(press(&mut machine, &clock, ResponseKind::Primary));
        assert_eq!(machine.state(), RunState::InterTrialInterval);

        let outcome = &machine.outcomes()[0];
        assert_eq!(outcome.response, Some(ResponseKind::Primary));
        assert_eq!(outcome.reaction_time_ms, Some(300));
        assert!(outcome.is_well_formed());

        // the canceled stimulus timer must never fire
        clock.set_ns(window_deadline + 1);
        machine.tick();
        assert_eq!(machine.outcomes().len(), 1);
    }

    #[test]
    fn only_the_first_of_two_rapid_inputs_is_recorded() {
        let (mut machine, clock) = machine(RunMode::Main, 3);
        advance_to_first_trial(&mut machine, &clock);

        clock.advance(Duration::from_millis(250));
        assert!(press(&mut machine, &clock, ResponseKind::Primary));
        clock.advance(Duration::from_millis(10));
        assert!(!press(&mut machine, &clock, ResponseKind::Primary));

        assert_eq!(machine.outcomes().len(), 1);
        assert_eq!(machine.outcomes()[0].reaction_time_ms, Some(250));
    }

    #[test]
    fn timeout_resolves_with_no_response() {
        let (mut machine, clock) = machine(RunMode::Main, 4);
        advance_to_first_trial(&mut machine, &clock);

        fire_next(&mut machine, &clock);
        assert_eq!(machine.state(), RunState::InterTrialInterval);

        let outcome = &machine.outcomes()[0];
        assert_eq!(outcome.response, None);
        assert_eq!(outcome.reaction_time_ms, None);
        assert!(outcome.is_well_formed());
        assert!(outcome.stimulus_end_ns > outcome.stimulus_start_ns);

        // input after the window expired is ignored
        assert!(!press(&mut machine, &clock, ResponseKind::Primary));
        assert_eq!(machine.outcomes().len(), 1);
    }

    #[test]
    fn stimulus_window_stays_within_configured_bounds() {
        let (mut machine, clock) = machine(RunMode::Main, 5);
        advance_to_first_trial(&mut machine, &clock);

        let scheduled = machine.next_deadline_ns().unwrap() - clock.now_ns();
        let ms = scheduled / 1_000_000;
        assert!((500..=1000).contains(&ms), "window {ms}ms out of bounds");
    }

    #[test]
    fn practice_shows_feedback_and_skips_aggregation() {
        let (mut machine, clock) = machine(RunMode::Practice, 6);
        advance_to_first_trial(&mut machine, &clock);

        clock.advance(Duration::from_millis(200));
        assert!(press(&mut machine, &clock, ResponseKind::Primary));
        assert_eq!(machine.state(), RunState::Feedback);
        assert!(machine.last_trial_correct().is_some());

        // feedback accepts no input
        assert!(!press(&mut machine, &clock, ResponseKind::Primary));

        fire_next(&mut machine, &clock); // feedback -> inter-trial interval
        assert_eq!(machine.state(), RunState::InterTrialInterval);

        // drive the practice run to completion: nothing was aggregated
        while !machine.is_finished() {
            if machine.state() == RunState::AwaitingResponse {
                clock.advance(Duration::from_millis(100));
                press(&mut machine, &clock, ResponseKind::Primary);
            } else {
                fire_next(&mut machine, &clock);
            }
        }
        assert_eq!(machine.outcomes().len(), 50);
        let summary = machine.summary().unwrap();
        assert_eq!(summary.hits + summary.misses + summary.false_alarms
            + summary.correct_rejections, 0);
    }

    #[test]
    fn main_run_aggregates_every_trial() {
        let (mut machine, clock) = machine(RunMode::Main, 7);
        machine.start();

        while !machine.is_finished() {
            if machine.state() == RunState::AwaitingResponse {
                let is_target = !matches!(
                    machine.current_stimulus().unwrap().stimulus,
                    vigil_core::Stimulus::Digit(3)
                );
                clock.advance(Duration::from_millis(320));
                if is_target {
                    press(&mut machine, &clock, ResponseKind::Primary);
                } else {
                    fire_next(&mut machine, &clock); // withhold on 3
                }
            } else {
                fire_next(&mut machine, &clock);
            }
        }

        assert_eq!(machine.state(), RunState::Completed);
        assert_eq!(machine.outcomes().len(), 500);

        let summary = machine.summary().unwrap();
        assert_eq!(
            summary.hits + summary.misses + summary.false_alarms + summary.correct_rejections,
            500
        );
        // perfect play: every target hit, every 3 withheld
        assert_eq!(summary.misses, 0);
        assert_eq!(summary.false_alarms, 0);
        assert!(summary.correct_rejections > 0);
        assert_eq!(summary.average_reaction_time_ms, Some(320));
        assert!(summary.d_prime > 0.0);
    }

    #[test]
    fn wrong_key_is_a_false_alarm() {
        let (mut machine, clock) = machine(RunMode::Main, 8);
        advance_to_first_trial(&mut machine, &clock);

        clock.advance(Duration::from_millis(150));
        assert!(press(&mut machine, &clock, ResponseKind::SecondaryRight));
        // group 1 is visual-only, so SecondaryRight is never the expected key
        assert_eq!(machine.outcomes()[0].category, SdtCategory::FalseAlarm);
    }

    #[test]
    fn abort_cancels_pending_timer_and_blocks_stale_callbacks() {
        let (mut machine, clock) = machine(RunMode::Main, 9);
        advance_to_first_trial(&mut machine, &clock);
        let deadline = machine.next_deadline_ns().unwrap();

        machine.abort();
        assert_eq!(machine.state(), RunState::Aborted);
        assert!(machine.next_deadline_ns().is_none());

        // the canceled window deadline passes: no outcome appears
        clock.set_ns(deadline + 1);
        machine.tick();
        assert!(machine.outcomes().is_empty());

        // a forged stale delivery is dropped by the token guard
        machine.handle_timer(FiredTimer {
            handle: TimerHandle::from_raw(9999),
            token: TimerToken { trial: 0, purpose: TimerPurpose::StimulusWindow },
            deadline_ns: deadline,
        });
        assert!(machine.outcomes().is_empty());
        assert_eq!(machine.state(), RunState::Aborted);

        // input after abort is ignored too
        assert!(!press(&mut machine, &clock, ResponseKind::Primary));
        assert!(machine.summary().is_none());
    }

    #[test]
    fn abort_after_completion_is_a_no_op() {
        let (mut machine, clock) = machine(RunMode::Main, 10);
        machine.start();
        while !machine.is_finished() {
            fire_next(&mut machine, &clock);
        }
        assert_eq!(machine.state(), RunState::Completed);
        machine.abort();
        assert_eq!(machine.state(), RunState::Completed);
    }

    #[test]
    fn timed_out_run_classifies_every_trial() {
        // let every trial expire: targets become misses, 3s become correct
        // rejections
        let (mut machine, clock) = machine(RunMode::Main, 11);
        machine.start();
        while !machine.is_finished() {
            fire_next(&mut machine, &clock);
        }

        let summary = machine.summary().unwrap();
        assert_eq!(summary.hits, 0);
        assert_eq!(summary.false_alarms, 0);
        assert_eq!(summary.misses + summary.correct_rejections, 500);
        assert_eq!(summary.average_reaction_time_ms, None);
        // both corrected rates sit at their floors, so sensitivity is
        // negative and the bias is strongly conservative
        assert!(summary.d_prime < 0.0);
        assert!(summary.criterion > 0.0);
    }
}
