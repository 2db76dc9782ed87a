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

use std::time::Instant;

use super::StateKind;
use super::DRAIN_FACTOR;
use super::GAIN_CYCLE_LEN;
use super::PROBE_FACTOR;
use super::STEADY_FACTOR;
use crate::estimator::PathEstimator;
use crate::flow::Flow;
use crate::rand;

/// The steady-state gain cycle: one probing phase, one draining phase,
/// six cruising phases.
#[derive(Default)]
pub(crate) struct ProbeBw {
    pub(crate) cycle_phase: usize,
}

impl ProbeBw {
    pub(crate) fn enter<E: PathEstimator>(
        &mut self, flow: &mut Flow, _: &E, _: Instant, trace_id: &str,
    ) {
        // Phase 1 dips below the steady rate, so it is excluded as a
        // starting phase. The draw itself desynchronizes flows that enter
        // together.
        self.cycle_phase = loop {
            let phase = rand::rand_u64_uniform(GAIN_CYCLE_LEN as u64) as usize;

            if phase != 1 {
                break phase;
            }
        };

        flow.pacing_gain = STEADY_FACTOR;

        if self.cycle_phase == 0 {
            flow.pacing_gain += PROBE_FACTOR;
        }

        flow.cwnd_gain = if flow.config.pacing {
            2.0 * STEADY_FACTOR
        } else {
            flow.pacing_gain
        };

        trace!(
            "{} bandwidth probing starts at phase {}",
            trace_id,
            self.cycle_phase
        );
    }

    pub(crate) fn execute<E: PathEstimator>(
        &mut self, flow: &mut Flow, _: &E, _: Instant, trace_id: &str,
    ) -> Option<StateKind> {
        flow.pacing_gain = match self.cycle_phase {
            0 => STEADY_FACTOR + PROBE_FACTOR,

            // The dip is gentler when the window, not the pacer, shapes
            // the send rate.
            1 =>
                if flow.config.pacing {
                    STEADY_FACTOR - DRAIN_FACTOR
                } else {
                    STEADY_FACTOR - DRAIN_FACTOR / 8.0
                },

            _ => STEADY_FACTOR,
        };

        flow.cwnd_gain = if flow.config.pacing {
            2.0 * STEADY_FACTOR
        } else {
            flow.pacing_gain
        };

        self.cycle_phase = (self.cycle_phase + 1) % GAIN_CYCLE_LEN;

        trace!("{} gain cycle advances to {}", trace_id, self.cycle_phase);

        None
    }

    pub(crate) fn exit(&mut self, _: &mut Flow, _: Instant) {}
}
