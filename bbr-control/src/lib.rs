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

//! Model-based rate and window control for reliable transports.
//!
//! This crate implements the decision core of a BBR-style congestion
//! controller: a four-phase state machine that turns path estimates
//! (bottleneck bandwidth and round-trip time) into pacing and
//! congestion-window gains, once per round trip. It deliberately stops at
//! the gain decisions. The host transport owns packetization, loss
//! detection, timers and the ACK pipeline, and drives this crate through a
//! handful of calls.
//!
//! ## Setup
//!
//! A [`Config`] holds the tunables shared between flows, and a [`Flow`]
//! carries the per-flow values the engine steers:
//!
//! ```
//! let mut config = bbr_control::Config::new();
//! config.enable_pacing(true);
//! config.set_max_segment_size(1350)?;
//!
//! let flow = bbr_control::Flow::new(&config);
//! # Ok::<(), bbr_control::Error>(())
//! ```
//!
//! ## Feeding path samples
//!
//! The engine never measures the path itself. The host's ACK pipeline
//! feeds a [`WindowedEstimator`] (or any other [`PathEstimator`]
//! implementation) as samples arrive:
//!
//! ```
//! use std::time::Duration;
//! use std::time::Instant;
//!
//! let mut est = bbr_control::WindowedEstimator::new();
//!
//! est.on_rtt_sample(Instant::now(), Duration::from_millis(35));
//! est.on_bandwidth_sample(
//!     Instant::now(),
//!     bbr_control::Bandwidth::from_mbits_per_second(90),
//! );
//! ```
//!
//! ## Driving the machine
//!
//! A new [`StateMachine`] is idle. The host activates it once the flow is
//! up, then ticks it, re-arming a timer with each returned delay:
//!
//! ```
//! use std::time::Instant;
//!
//! # let config = bbr_control::Config::new();
//! # let mut flow = bbr_control::Flow::new(&config);
//! # let mut est = bbr_control::WindowedEstimator::new();
//! let mut machine = bbr_control::StateMachine::new();
//!
//! let now = Instant::now();
//!
//! machine.change_state(
//!     bbr_control::StateKind::Startup,
//!     &mut flow,
//!     &est,
//!     now,
//!     "flow-1",
//! );
//!
//! if let Some(delay) = machine.update(now, &mut flow, &mut est, "flow-1") {
//!     // Arm a timer and call `update` again when it fires. With no RTT
//!     // sample yet there is nothing to schedule, and the ACK pipeline
//!     // restarts the loop on the first sample instead.
//! }
//! ```
//!
//! ## Shaping traffic
//!
//! Each tick rewrites the flow's gains; the send path combines them with
//! the current estimates:
//!
//! ```
//! # use std::time::Duration;
//! # use std::time::Instant;
//! use bbr_control::PathEstimator;
//!
//! # let config = bbr_control::Config::new();
//! # let flow = bbr_control::Flow::new(&config);
//! # let mut est = bbr_control::WindowedEstimator::new();
//! # est.on_rtt_sample(Instant::now(), Duration::from_millis(35));
//! # est.on_bandwidth_sample(
//! #     Instant::now(),
//! #     bbr_control::Bandwidth::from_mbits_per_second(90),
//! # );
//! if let Some(bw) = est.bandwidth_estimate() {
//!     let rate = flow.pacing_rate(bw);
//! }
//!
//! if let Some(bdp) = est.bandwidth_delay_product() {
//!     let cwnd = flow.cwnd_target(bdp);
//! }
//! ```

#![warn(missing_docs)]

#[macro_use]
extern crate log;

/// The default maximum segment size, in bytes.
const DEFAULT_MAX_SEGMENT_SIZE: usize = 1500;

/// The default congestion-window floor, in packets.
const DEFAULT_MIN_CWND_PACKETS: usize = 4;

/// The default initial congestion window, in packets.
const DEFAULT_INITIAL_CWND_PACKETS: usize = 10;

/// A specialized [`Result`] type for control-engine operations.
///
/// This type is used throughout the public API for any operation that
/// can produce an error.
///
/// [`Result`]: https://doc.rust-lang.org/std/result/enum.Result.html
pub type Result<T> = std::result::Result<T, Error>;

/// A control-engine error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The state machine has not been activated yet.
    InvalidState,

    /// The provided configuration value is invalid.
    InvalidConfig,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Stores configuration shared between multiple flows.
pub struct Config {
    pacing: bool,
    max_segment_size: usize,
    min_cwnd_packets: usize,
    initial_cwnd_packets: usize,
}

impl Config {
    /// Creates a config object with default values.
    pub fn new() -> Config {
        Config {
            pacing: true,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            min_cwnd_packets: DEFAULT_MIN_CWND_PACKETS,
            initial_cwnd_packets: DEFAULT_INITIAL_CWND_PACKETS,
        }
    }

    /// Configures whether the flows are paced.
    ///
    /// When pacing is disabled the engine steers delivery through the
    /// congestion-window gain alone, with gentler gain dips.
    ///
    /// The default value is `true`.
    pub fn enable_pacing(&mut self, v: bool) {
        self.pacing = v;
    }

    /// Sets the maximum segment size used to scale packet-denominated
    /// windows, in bytes.
    ///
    /// The default value is `1500`.
    pub fn set_max_segment_size(&mut self, v: usize) -> Result<()> {
        if v == 0 {
            return Err(Error::InvalidConfig);
        }

        self.max_segment_size = v;

        Ok(())
    }

    /// Sets the congestion-window floor, in packets.
    ///
    /// The default value is `4`.
    pub fn set_min_cwnd_packets(&mut self, v: usize) -> Result<()> {
        if v == 0 {
            return Err(Error::InvalidConfig);
        }

        self.min_cwnd_packets = v;

        Ok(())
    }

    /// Sets the initial congestion window, in packets.
    ///
    /// The default value is `10`.
    pub fn set_initial_cwnd_packets(&mut self, v: usize) -> Result<()> {
        if v == 0 {
            return Err(Error::InvalidConfig);
        }

        self.initial_cwnd_packets = v;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

pub use crate::bandwidth::Bandwidth;
pub use crate::estimator::PathEstimator;
pub use crate::estimator::WindowedEstimator;
pub use crate::flow::Flow;
pub use crate::machine::StateKind;
pub use crate::machine::StateMachine;

mod bandwidth;
mod estimator;
mod flow;
mod machine;
mod rand;
