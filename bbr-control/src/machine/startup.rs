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
use super::STARTUP_GAIN;
use super::STARTUP_STALL_ROUNDS;
use super::STARTUP_THRESHOLD;
use crate::bandwidth::Bandwidth;
use crate::estimator::PathEstimator;
use crate::flow::Flow;

/// Growth tracking for the startup phase.
///
/// The history survives leaving and re-entering the state: a flow that
/// already found the path's ceiling keeps that ceiling.
pub(crate) struct Startup {
    /// The highest bandwidth estimate recorded so far.
    pub(crate) full_bw: Bandwidth,

    /// Rounds in a row the estimate failed to clear the growth threshold.
    pub(crate) full_bw_cnt: usize,
}

impl Default for Startup {
    fn default() -> Self {
        Startup {
            full_bw: Bandwidth::zero(),
            full_bw_cnt: 0,
        }
    }
}

impl Startup {
    pub(crate) fn enter<E: PathEstimator>(
        &mut self, flow: &mut Flow, _: &E, _: Instant, _: &str,
    ) {
        flow.pacing_gain = STARTUP_GAIN;
        flow.cwnd_gain = STARTUP_GAIN;
    }

    pub(crate) fn execute<E: PathEstimator>(
        &mut self, _flow: &mut Flow, est: &E, _: Instant, trace_id: &str,
    ) -> Option<StateKind> {
        let new_bw = match est.bandwidth_estimate() {
            Some(bw) => bw,

            None => {
                trace!("{} startup has no bandwidth samples yet", trace_id);
                return None;
            },
        };

        if new_bw > self.full_bw * STARTUP_THRESHOLD {
            trace!(
                "{} startup still growing, ceiling {:?} -> {:?}",
                trace_id,
                self.full_bw,
                new_bw
            );

            self.full_bw = new_bw;
            self.full_bw_cnt = 0;
        } else {
            self.full_bw_cnt += 1;

            trace!(
                "{} startup stalled below {:?} for {} rounds",
                trace_id,
                self.full_bw,
                self.full_bw_cnt
            );
        }

        if self.full_bw_cnt > STARTUP_STALL_ROUNDS {
            return Some(StateKind::Drain);
        }

        None
    }

    pub(crate) fn exit(&mut self, _: &mut Flow, _: Instant) {}
}
