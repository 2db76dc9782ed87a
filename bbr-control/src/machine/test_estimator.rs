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

//! Canned path estimator for state machine tests.

use std::time::Duration;
use std::time::Instant;

use super::StateKind;
use crate::bandwidth::Bandwidth;
use crate::estimator::PathEstimator;

/// A [`PathEstimator`] that returns preset estimates and records window
/// maintenance calls.
#[derive(Default)]
pub(crate) struct TestEstimator {
    pub(crate) bandwidth: Option<Bandwidth>,
    pub(crate) srtt: Option<Duration>,
    pub(crate) min_rtt: Option<Duration>,

    /// Consumed by the next `probe_rtt_due` call.
    pub(crate) probe_due: bool,

    pub(crate) rtt_culls: usize,
    pub(crate) bandwidth_culls: Vec<StateKind>,
}

impl TestEstimator {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl PathEstimator for TestEstimator {
    fn bandwidth_estimate(&self) -> Option<Bandwidth> {
        self.bandwidth
    }

    fn smoothed_rtt(&self) -> Option<Duration> {
        self.srtt
    }

    fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt
    }

    fn probe_rtt_due(&mut self, _now: Instant) -> bool {
        std::mem::take(&mut self.probe_due)
    }

    fn cull_rtt_window(&mut self, _now: Instant) {
        self.rtt_culls += 1;
    }

    fn cull_bandwidth_window(&mut self, _now: Instant, state: StateKind) {
        self.bandwidth_culls.push(state);
    }
}
