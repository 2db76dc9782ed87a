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
use super::MAX_DRAIN_ROUNDS;
use super::STARTUP_GAIN;
use crate::estimator::PathEstimator;
use crate::flow::Flow;

#[derive(Default)]
pub(crate) struct Drain {
    /// Bytes the flow may keep in flight before the queue counts as
    /// drained.
    pub(crate) inflight_limit: usize,

    pub(crate) round_count: usize,
}

impl Drain {
    pub(crate) fn enter<E: PathEstimator>(
        &mut self, flow: &mut Flow, est: &E, _: Instant, trace_id: &str,
    ) {
        flow.pacing_gain = 1.0 / STARTUP_GAIN;

        // Without pacing the window is the only brake on delivery.
        flow.cwnd_gain = if flow.config.pacing {
            STARTUP_GAIN
        } else {
            1.0 / STARTUP_GAIN
        };

        self.inflight_limit =
            est.bandwidth_delay_product().unwrap_or(0) as usize;
        self.round_count = 0;

        trace!(
            "{} draining towards {} bytes in flight",
            trace_id,
            self.inflight_limit
        );
    }

    pub(crate) fn execute<E: PathEstimator>(
        &mut self, flow: &mut Flow, _: &E, _: Instant, _: &str,
    ) -> Option<StateKind> {
        self.round_count += 1;

        if flow.bytes_in_flight < self.inflight_limit ||
            self.round_count == MAX_DRAIN_ROUNDS
        {
            return Some(StateKind::ProbeBw);
        }

        None
    }

    pub(crate) fn exit(&mut self, _: &mut Flow, _: Instant) {}
}
