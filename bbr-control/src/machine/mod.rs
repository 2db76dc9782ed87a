// Copyright (C) 2025, Cloudflare, Inc.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above copyright
//       notice, this list of conditions and the following disclaimer in the
//       documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS
// IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO,
// THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR
// PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR
// CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The four-phase control state machine.
//!
//! One state owns the flow's pacing and congestion-window gains at any
//! instant. The machine resolves a pending forced min-RTT probe before the
//! tick's state logic runs, so a tick never executes against a gain policy
//! that is about to be replaced.

use std::time::Duration;
use std::time::Instant;

use crate::estimator::PathEstimator;
use crate::flow::Flow;
use crate::Error;
use crate::Result;

use self::drain::Drain;
use self::probe_bw::ProbeBw;
use self::probe_rtt::ProbeRtt;
use self::startup::Startup;

mod drain;
mod probe_bw;
mod probe_rtt;
mod startup;

#[cfg(test)]
mod test_estimator;

/// The gain applied to both rate and window while starting up, 2/ln(2).
/// Roughly doubles the delivery rate each round while the path keeps up.
pub(crate) const STARTUP_GAIN: f64 = 2.885;

/// How far above the recorded ceiling a bandwidth estimate must land for
/// the startup phase to still count as growing.
pub(crate) const STARTUP_THRESHOLD: f64 = 1.25;

/// Consecutive rounds without growth tolerated before startup gives up.
pub(crate) const STARTUP_STALL_ROUNDS: usize = 2;

/// Upper bound on rounds spent draining: 2.885 / (1 - 1/2.885) ~= 4.5,
/// rounded up.
pub(crate) const MAX_DRAIN_ROUNDS: usize = 5;

/// The cruising gain.
pub(crate) const STEADY_FACTOR: f64 = 1.0;

/// Extra gain applied in the probing phase of the bandwidth cycle.
pub(crate) const PROBE_FACTOR: f64 = 0.25;

/// Gain shed in the draining phase of the bandwidth cycle.
pub(crate) const DRAIN_FACTOR: f64 = 0.25;

/// The number of phases in the bandwidth-probing gain cycle.
pub(crate) const GAIN_CYCLE_LEN: usize = 8;

/// A constant specifying the minimum time spent in the minimum-RTT probe:
/// 200 msecs.
pub(crate) const PROBE_RTT_DURATION: Duration = Duration::from_millis(200);

/// The operating phase a flow is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// Growing the bandwidth estimate aggressively.
    Startup,

    /// Bleeding the queue built up during startup.
    Drain,

    /// Steady state, cyclically probing for more bandwidth.
    ProbeBw,

    /// Holding the window at its floor to refresh the minimum RTT.
    ProbeRtt,
}

/// The per-flow state machine driving the gain decisions.
///
/// All four phase payloads are created with the machine and reused across
/// re-entries; a transition never allocates. The machine holds no
/// reference to the flow or the estimator, both are passed into every
/// call.
pub struct StateMachine {
    active: Option<StateKind>,

    startup: Startup,
    drain: Drain,
    probe_bw: ProbeBw,
    probe_rtt: ProbeRtt,
}

impl StateMachine {
    /// Creates a machine with no active state.
    ///
    /// The owner activates it with
    /// [`change_state(StateKind::Startup, ..)`](StateMachine::change_state)
    /// once the flow is up.
    pub fn new() -> Self {
        StateMachine {
            active: None,

            startup: Startup::default(),
            drain: Drain::default(),
            probe_bw: ProbeBw::default(),
            probe_rtt: ProbeRtt::default(),
        }
    }

    /// The currently active phase.
    ///
    /// Fails with [`Error::InvalidState`] before the first transition.
    pub fn state_kind(&self) -> Result<StateKind> {
        self.active.ok_or(Error::InvalidState)
    }

    /// Transitions into `next`.
    ///
    /// The outgoing state's `exit` hook runs before the swap, then the
    /// incoming payload's `enter` runs exactly once. Hooks never call back
    /// into this method; `execute` requests transitions through its return
    /// value instead, which keeps transitions non-reentrant.
    pub fn change_state<E: PathEstimator>(
        &mut self, next: StateKind, flow: &mut Flow, est: &E, now: Instant,
        trace_id: &str,
    ) {
        match self.active {
            Some(old) => {
                debug!("{} state {:?} -> {:?}", trace_id, old, next);

                match old {
                    StateKind::Startup => self.startup.exit(flow, now),
                    StateKind::Drain => self.drain.exit(flow, now),
                    StateKind::ProbeBw => self.probe_bw.exit(flow, now),
                    StateKind::ProbeRtt => self.probe_rtt.exit(flow, now),
                }
            },

            None => debug!("{} initial state {:?}", trace_id, next),
        }

        self.active = Some(next);

        match next {
            StateKind::Startup => self.startup.enter(flow, est, now, trace_id),
            StateKind::Drain => self.drain.enter(flow, est, now, trace_id),
            StateKind::ProbeBw =>
                self.probe_bw.enter(flow, est, now, trace_id),
            StateKind::ProbeRtt =>
                self.probe_rtt.enter(flow, est, now, trace_id),
        }
    }

    /// Runs one round-trip tick.
    ///
    /// Returns the delay after which the caller must tick again, one
    /// smoothed RTT, or `None` when no RTT sample exists yet. In the
    /// latter case the ACK pipeline is expected to call [`update`] again
    /// once the first sample lands.
    ///
    /// A tick on a machine with no active state is a no-op, so a timer
    /// outliving its flow stays harmless.
    ///
    /// [`update`]: StateMachine::update
    pub fn update<E: PathEstimator>(
        &mut self, now: Instant, flow: &mut Flow, est: &mut E, trace_id: &str,
    ) -> Option<Duration> {
        let mut kind = match self.active {
            Some(kind) => kind,

            None => {
                trace!(
                    "{} tick without an active state, flow likely gone",
                    trace_id
                );
                return None;
            },
        };

        trace!("{} {:?} {:?}", trace_id, self, flow);

        // A due min-RTT probe preempts whatever phase is active, so this
        // tick already executes the probe's gain policy.
        if est.probe_rtt_due(now) {
            self.change_state(StateKind::ProbeRtt, flow, est, now, trace_id);
            kind = StateKind::ProbeRtt;
        }

        let next = match kind {
            StateKind::Startup =>
                self.startup.execute(flow, est, now, trace_id),
            StateKind::Drain => self.drain.execute(flow, est, now, trace_id),
            StateKind::ProbeBw =>
                self.probe_bw.execute(flow, est, now, trace_id),
            StateKind::ProbeRtt =>
                self.probe_rtt.execute(flow, est, now, trace_id),
        };

        if let Some(next) = next {
            self.change_state(next, flow, est, now, trace_id);
            kind = next;
        }

        est.cull_rtt_window(now);
        est.cull_bandwidth_window(now, kind);

        match est.smoothed_rtt() {
            Some(rtt) => Some(rtt),

            None => {
                trace!("{} no rtt sample yet, tick not rescheduled", trace_id);
                None
            },
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.active {
            Some(StateKind::Startup) => write!(
                f,
                "startup full_bw={:?} full_bw_cnt={}",
                self.startup.full_bw, self.startup.full_bw_cnt
            ),

            Some(StateKind::Drain) => write!(
                f,
                "drain round_count={} inflight_limit={}",
                self.drain.round_count, self.drain.inflight_limit
            ),

            Some(StateKind::ProbeBw) => {
                write!(f, "probe_bw cycle_phase={}", self.probe_bw.cycle_phase)
            },

            Some(StateKind::ProbeRtt) => {
                write!(f, "probe_rtt deadline={:?}", self.probe_rtt.deadline)
            },

            None => write!(f, "idle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::test_estimator::TestEstimator;
    use super::*;
    use crate::Config;

    fn setup() -> (StateMachine, Flow, TestEstimator) {
        (
            StateMachine::new(),
            Flow::new(&Config::new()),
            TestEstimator::new(),
        )
    }

    #[test]
    fn state_kind_tracks_transitions() {
        let (mut machine, mut flow, est) = setup();
        let now = Instant::now();

        assert_eq!(machine.state_kind(), Err(Error::InvalidState));

        for kind in [
            StateKind::Startup,
            StateKind::Drain,
            StateKind::ProbeBw,
            StateKind::ProbeRtt,
            StateKind::Startup,
        ] {
            machine.change_state(kind, &mut flow, &est, now, "test");
            assert_eq!(machine.state_kind(), Ok(kind));
        }
    }

    #[test]
    fn tick_without_state_is_noop() {
        let (mut machine, mut flow, mut est) = setup();
        est.srtt = Some(Duration::from_millis(50));

        let next = machine.update(Instant::now(), &mut flow, &mut est, "test");

        assert_eq!(next, None);
        assert_eq!(machine.state_kind(), Err(Error::InvalidState));

        // The whole tick is skipped, window maintenance included.
        assert_eq!(est.rtt_culls, 0);
        assert!(est.bandwidth_culls.is_empty());
    }

    #[test]
    fn initial_state_sets_startup_gains() {
        let (mut machine, mut flow, est) = setup();

        machine.change_state(
            StateKind::Startup,
            &mut flow,
            &est,
            Instant::now(),
            "test",
        );

        assert_eq!(flow.pacing_gain, STARTUP_GAIN);
        assert_eq!(flow.cwnd_gain, STARTUP_GAIN);
    }

    #[test]
    fn enter_applies_before_next_execute() {
        let (mut machine, mut flow, mut est) = setup();
        let now = Instant::now();

        machine.change_state(StateKind::Startup, &mut flow, &est, now, "test");
        machine.change_state(StateKind::Drain, &mut flow, &est, now, "test");

        // Drain's entry gains are in place before any tick runs it.
        assert_eq!(flow.pacing_gain, 1.0 / STARTUP_GAIN);
        assert_eq!(machine.drain.round_count, 0);

        flow.bytes_in_flight = usize::MAX;
        machine.update(now, &mut flow, &mut est, "test");

        assert_eq!(machine.drain.round_count, 1);
        assert_eq!(machine.state_kind(), Ok(StateKind::Drain));
    }

    #[rstest]
    fn forced_probe_fires_from_any_state(
        #[values(
            StateKind::Startup,
            StateKind::Drain,
            StateKind::ProbeBw,
            StateKind::ProbeRtt
        )]
        initial: StateKind,
    ) {
        let (mut machine, mut flow, mut est) = setup();
        let now = Instant::now();

        machine.change_state(initial, &mut flow, &est, now, "test");

        est.probe_due = true;
        machine.update(now, &mut flow, &mut est, "test");

        assert_eq!(machine.state_kind(), Ok(StateKind::ProbeRtt));
    }

    #[test]
    fn forced_probe_rtt_overrides_probe_bw() {
        let (mut machine, mut flow, mut est) = setup();
        let now = Instant::now();

        machine.change_state(StateKind::ProbeBw, &mut flow, &est, now, "test");
        machine.probe_bw.cycle_phase = 3;

        est.probe_due = true;
        machine.update(now, &mut flow, &mut est, "test");

        // The probe preempted the tick: the cycle did not advance and the
        // window is already clamped.
        assert_eq!(machine.state_kind(), Ok(StateKind::ProbeRtt));
        assert_eq!(machine.probe_bw.cycle_phase, 3);
        assert_eq!(flow.congestion_window, flow.min_window());
    }

    #[test]
    fn no_rtt_no_reschedule() {
        let (mut machine, mut flow, mut est) = setup();
        let now = Instant::now();

        machine.change_state(StateKind::Startup, &mut flow, &est, now, "test");

        let next = machine.update(now, &mut flow, &mut est, "test");

        // No reschedule request, but the tick still maintained the windows.
        assert_eq!(next, None);
        assert_eq!(est.rtt_culls, 1);
        assert_eq!(est.bandwidth_culls, vec![StateKind::Startup]);
    }

    #[test]
    fn reschedules_after_one_rtt() {
        let (mut machine, mut flow, mut est) = setup();
        let now = Instant::now();

        machine.change_state(StateKind::Startup, &mut flow, &est, now, "test");

        est.srtt = Some(Duration::from_millis(50));
        let next = machine.update(now, &mut flow, &mut est, "test");

        assert_eq!(next, Some(Duration::from_millis(50)));
    }

    #[test]
    fn cull_sees_post_transition_state() {
        let (mut machine, mut flow, mut est) = setup();
        let now = Instant::now();

        // No RTT estimate, so the probe deadline is the 200ms floor.
        machine.change_state(StateKind::ProbeRtt, &mut flow, &est, now, "test");

        let later = now + Duration::from_millis(300);
        machine.update(later, &mut flow, &mut est, "test");

        assert_eq!(machine.state_kind(), Ok(StateKind::ProbeBw));
        assert_eq!(est.bandwidth_culls, vec![StateKind::ProbeBw]);
    }
}
