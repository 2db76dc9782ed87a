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

use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use crate::bandwidth::Bandwidth;
use crate::machine::StateKind;

/// A constant specifying the minimum time interval between two forced
/// minimum-RTT probes: 10 secs.
const PROBE_RTT_INTERVAL: Duration = Duration::from_secs(10);

/// A constant specifying how long RTT samples stay relevant to the min
/// filter.
const RTT_WINDOW: Duration = PROBE_RTT_INTERVAL;

/// A constant specifying how long delivery-rate samples stay relevant to
/// the max filter.
const BW_WINDOW: Duration = Duration::from_secs(10);

/// Path estimates consumed by the control engine.
///
/// The engine only ever reads estimates and triggers window maintenance; it
/// never feeds samples. Implementations report "no data yet" as `None` and
/// the engine treats that as a normal quiescent condition, not an error.
pub trait PathEstimator {
    /// The current bottleneck-bandwidth estimate, or `None` while no
    /// delivery-rate sample has been collected.
    fn bandwidth_estimate(&self) -> Option<Bandwidth>;

    /// The current smoothed RTT, or `None` while no RTT sample has been
    /// collected.
    fn smoothed_rtt(&self) -> Option<Duration>;

    /// The minimum RTT observed over the estimator's window.
    fn min_rtt(&self) -> Option<Duration>;

    /// The bandwidth-delay product in bytes, `None` unless both a
    /// bandwidth and a minimum-RTT estimate exist.
    fn bandwidth_delay_product(&self) -> Option<u64> {
        let bw = self.bandwidth_estimate()?;
        let min_rtt = self.min_rtt()?;

        Some(bw * min_rtt)
    }

    /// Whether a mandatory minimum-RTT probe is due.
    ///
    /// One-shot: a `true` result re-arms the probe interval, so the caller
    /// acts on it exactly once per interval.
    fn probe_rtt_due(&mut self, now: Instant) -> bool;

    /// Expires RTT samples that fell out of the min filter's window.
    /// Called once per engine tick.
    fn cull_rtt_window(&mut self, now: Instant);

    /// Expires delivery-rate samples that fell out of the max filter's
    /// window. Called once per engine tick with the engine's current
    /// state; while the flow drains its queue the delivery rate undershoots
    /// the bottleneck, so implementations hold the window intact for
    /// [`StateKind::Drain`].
    fn cull_bandwidth_window(&mut self, now: Instant, state: StateKind);
}

/// Windowed max/min filters over delivery-rate and RTT samples.
///
/// The host ACK pipeline feeds samples through [`on_rtt_sample`] and
/// [`on_bandwidth_sample`]; the control engine reads the filter outputs
/// through the [`PathEstimator`] impl.
///
/// [`on_rtt_sample`]: WindowedEstimator::on_rtt_sample
/// [`on_bandwidth_sample`]: WindowedEstimator::on_bandwidth_sample
pub struct WindowedEstimator {
    rtt_samples: VecDeque<(Instant, Duration)>,
    bandwidth_samples: VecDeque<(Instant, Bandwidth)>,

    smoothed_rtt: Option<Duration>,

    next_probe_rtt: Option<Instant>,
}

impl WindowedEstimator {
    /// Creates an estimator with no samples.
    pub fn new() -> Self {
        WindowedEstimator {
            rtt_samples: VecDeque::new(),
            bandwidth_samples: VecDeque::new(),
            smoothed_rtt: None,
            next_probe_rtt: None,
        }
    }

    /// Records an RTT sample.
    ///
    /// The sample lands in the min filter's window and folds into the
    /// smoothed RTT with the usual 7/8 weighting. Culling later drops it
    /// from the window but never rewinds the smoothed value.
    pub fn on_rtt_sample(&mut self, now: Instant, rtt: Duration) {
        self.rtt_samples.push_back((now, rtt));

        self.smoothed_rtt = match self.smoothed_rtt {
            // First RTT sample.
            None => Some(rtt),

            Some(srtt) =>
                Some(srtt.mul_f64(7.0 / 8.0) + rtt.mul_f64(1.0 / 8.0)),
        };
    }

    /// Records a delivery-rate sample.
    pub fn on_bandwidth_sample(&mut self, now: Instant, sample: Bandwidth) {
        self.bandwidth_samples.push_back((now, sample));
    }
}

impl Default for WindowedEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PathEstimator for WindowedEstimator {
    fn bandwidth_estimate(&self) -> Option<Bandwidth> {
        self.bandwidth_samples.iter().map(|&(_, bw)| bw).max()
    }

    fn smoothed_rtt(&self) -> Option<Duration> {
        self.smoothed_rtt
    }

    fn min_rtt(&self) -> Option<Duration> {
        self.rtt_samples.iter().map(|&(_, rtt)| rtt).min()
    }

    fn probe_rtt_due(&mut self, now: Instant) -> bool {
        match self.next_probe_rtt {
            Some(at) if now >= at => {
                self.next_probe_rtt = Some(now + PROBE_RTT_INTERVAL);
                true
            },

            Some(_) => false,

            // First call arms the interval.
            None => {
                self.next_probe_rtt = Some(now + PROBE_RTT_INTERVAL);
                false
            },
        }
    }

    fn cull_rtt_window(&mut self, now: Instant) {
        self.rtt_samples
            .retain(|&(at, _)| now.duration_since(at) <= RTT_WINDOW);
    }

    fn cull_bandwidth_window(&mut self, now: Instant, state: StateKind) {
        // Rates sampled while draining undershoot the bottleneck, so the
        // window keeps its peak until the drain completes.
        if state == StateKind::Drain {
            return;
        }

        self.bandwidth_samples
            .retain(|&(at, _)| now.duration_since(at) <= BW_WINDOW);
    }
}
