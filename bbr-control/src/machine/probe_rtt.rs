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

use std::time::Duration;
use std::time::Instant;

use super::StateKind;
use super::PROBE_RTT_DURATION;
use super::STEADY_FACTOR;
use crate::estimator::PathEstimator;
use crate::flow::Flow;

#[derive(Default)]
pub(crate) struct ProbeRtt {
    /// When the hold ends. `None` until the state is first entered.
    pub(crate) deadline: Option<Instant>,
}

impl ProbeRtt {
    pub(crate) fn enter<E: PathEstimator>(
        &mut self, flow: &mut Flow, est: &E, now: Instant, trace_id: &str,
    ) {
        flow.pacing_gain = STEADY_FACTOR;
        flow.cwnd_gain = STEADY_FACTOR;

        // Hold for at least an RTT so the shrunken window is actually
        // observed by the path.
        let hold = est
            .smoothed_rtt()
            .unwrap_or(Duration::ZERO)
            .max(PROBE_RTT_DURATION);

        self.deadline = Some(now + hold);

        trace!("{} probing min rtt until {:?}", trace_id, self.deadline);
    }

    pub(crate) fn execute<E: PathEstimator>(
        &mut self, flow: &mut Flow, _: &E, now: Instant, _: &str,
    ) -> Option<StateKind> {
        // Re-clamp every round; the host may have grown the window from
        // its own enforcement path in between.
        flow.congestion_window = flow.min_window();

        match self.deadline {
            Some(deadline) if now > deadline => Some(StateKind::ProbeBw),

            _ => None,
        }
    }

    pub(crate) fn exit(&mut self, _: &mut Flow, _: Instant) {}
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::super::test_estimator::TestEstimator;
    use super::*;
    use crate::Config;

    #[rstest]
    #[case(None, Duration::from_millis(200))]
    #[case(Some(Duration::from_millis(50)), Duration::from_millis(200))]
    #[case(Some(Duration::from_millis(500)), Duration::from_millis(500))]
    fn deadline_floor(
        #[case] srtt: Option<Duration>, #[case] expected: Duration,
    ) {
        let mut probe_rtt = ProbeRtt::default();
        let mut flow = Flow::new(&Config::new());
        let mut est = TestEstimator::new();
        let now = Instant::now();

        est.srtt = srtt;
        probe_rtt.enter(&mut flow, &est, now, "test");

        assert_eq!(probe_rtt.deadline, Some(now + expected));
        assert_eq!(flow.pacing_gain, STEADY_FACTOR);
        assert_eq!(flow.cwnd_gain, STEADY_FACTOR);
    }

    #[test]
    fn holds_until_deadline() {
        let mut probe_rtt = ProbeRtt::default();
        let mut flow = Flow::new(&Config::new());
        let est = TestEstimator::new();
        let now = Instant::now();

        probe_rtt.enter(&mut flow, &est, now, "test");

        // Landing exactly on the deadline still holds.
        let at_deadline = now + PROBE_RTT_DURATION;
        let next = probe_rtt.execute(&mut flow, &est, at_deadline, "test");

        assert_eq!(next, None);
        assert_eq!(flow.congestion_window, flow.min_window());

        flow.congestion_window = 500_000;
        let past = at_deadline + Duration::from_millis(1);
        let next = probe_rtt.execute(&mut flow, &est, past, "test");

        assert_eq!(next, Some(StateKind::ProbeBw));
        assert_eq!(flow.congestion_window, flow.min_window());
    }

    #[test]
    fn reenter_resets_deadline() {
        let mut probe_rtt = ProbeRtt::default();
        let mut flow = Flow::new(&Config::new());
        let est = TestEstimator::new();
        let now = Instant::now();

        probe_rtt.enter(&mut flow, &est, now, "test");
        assert_eq!(probe_rtt.deadline, Some(now + PROBE_RTT_DURATION));

        let later = now + Duration::from_secs(5);
        probe_rtt.enter(&mut flow, &est, later, "test");

        assert_eq!(probe_rtt.deadline, Some(later + PROBE_RTT_DURATION));
    }
}
