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

use crate::bandwidth::Bandwidth;
use crate::Config;

/// Per-flow configuration snapshot taken at flow creation.
#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) struct FlowConfig {
    pub(crate) pacing: bool,
    pub(crate) max_segment_size: usize,
    pub(crate) min_cwnd_packets: usize,
    pub(crate) initial_cwnd_packets: usize,
}

impl FlowConfig {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            pacing: config.pacing,
            max_segment_size: config.max_segment_size,
            min_cwnd_packets: config.min_cwnd_packets,
            initial_cwnd_packets: config.initial_cwnd_packets,
        }
    }
}

/// The per-flow values the control engine reads and writes.
///
/// The gains are the engine's output: the send path derives its pacing rate
/// from [`pacing_rate`] and its window cap from [`cwnd_target`]. Bytes in
/// flight are the send path's input to the engine, maintained through
/// [`on_packet_sent`] and [`on_packets_acked`].
///
/// [`pacing_rate`]: Flow::pacing_rate
/// [`cwnd_target`]: Flow::cwnd_target
/// [`on_packet_sent`]: Flow::on_packet_sent
/// [`on_packets_acked`]: Flow::on_packets_acked
pub struct Flow {
    pub(crate) pacing_gain: f64,

    pub(crate) cwnd_gain: f64,

    pub(crate) congestion_window: usize,

    pub(crate) bytes_in_flight: usize,

    pub(crate) config: FlowConfig,
}

impl Flow {
    /// Creates the flow state for a new connection.
    pub fn new(config: &Config) -> Self {
        let config = FlowConfig::from_config(config);

        Flow {
            pacing_gain: 1.0,

            cwnd_gain: 1.0,

            congestion_window: config.initial_cwnd_packets *
                config.max_segment_size,

            bytes_in_flight: 0,

            config,
        }
    }

    /// The multiplier currently applied to the bandwidth estimate when
    /// deriving the send rate.
    pub fn pacing_gain(&self) -> f64 {
        self.pacing_gain
    }

    /// The multiplier currently applied to the bandwidth-delay product
    /// when deriving the window cap.
    pub fn cwnd_gain(&self) -> f64 {
        self.cwnd_gain
    }

    /// The current congestion window in bytes.
    pub fn congestion_window(&self) -> usize {
        self.congestion_window
    }

    /// Bytes sent but not yet acknowledged.
    pub fn bytes_in_flight(&self) -> usize {
        self.bytes_in_flight
    }

    /// Accounts for a sent packet.
    pub fn on_packet_sent(&mut self, sent_bytes: usize) {
        self.bytes_in_flight += sent_bytes;
    }

    /// Accounts for newly acknowledged packets.
    pub fn on_packets_acked(&mut self, acked_bytes: usize) {
        self.bytes_in_flight =
            self.bytes_in_flight.saturating_sub(acked_bytes);
    }

    /// Overrides the congestion window, floored at the minimum window.
    pub fn set_congestion_window(&mut self, v: usize) {
        self.congestion_window = v.max(self.min_window());
    }

    /// The send rate the flow should currently pace at.
    pub fn pacing_rate(&self, bw: Bandwidth) -> Bandwidth {
        bw * self.pacing_gain
    }

    /// The congestion-window size the flow should currently target, given
    /// the estimated bandwidth-delay product in bytes.
    pub fn cwnd_target(&self, bdp_bytes: u64) -> usize {
        let target = (bdp_bytes as f64 * self.cwnd_gain).round() as usize;

        target.max(self.min_window())
    }

    /// The floor the congestion window never shrinks below.
    pub fn min_window(&self) -> usize {
        self.config.min_cwnd_packets * self.config.max_segment_size
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "pacing_gain={:.3} cwnd_gain={:.3} cwnd={} inflight={}",
            self.pacing_gain,
            self.cwnd_gain,
            self.congestion_window,
            self.bytes_in_flight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_values() {
        let flow = Flow::new(&Config::new());

        assert_eq!(flow.pacing_gain(), 1.0);
        assert_eq!(flow.cwnd_gain(), 1.0);

        // 10 initial packets of 1500 bytes.
        assert_eq!(flow.congestion_window(), 15_000);
        assert_eq!(flow.bytes_in_flight(), 0);
    }

    #[test]
    fn inflight_accounting() {
        let mut flow = Flow::new(&Config::new());

        flow.on_packet_sent(1200);
        flow.on_packet_sent(1200);
        assert_eq!(flow.bytes_in_flight(), 2400);

        flow.on_packets_acked(1200);
        assert_eq!(flow.bytes_in_flight(), 1200);

        // Acks for bytes we never counted do not underflow.
        flow.on_packets_acked(5000);
        assert_eq!(flow.bytes_in_flight(), 0);
    }

    #[test]
    fn pacing_rate_follows_gain() {
        let mut flow = Flow::new(&Config::new());
        let bw = Bandwidth::from_mbits_per_second(10);

        assert_eq!(flow.pacing_rate(bw), bw);

        flow.pacing_gain = 1.25;
        assert_eq!(
            flow.pacing_rate(bw),
            Bandwidth::from_kbits_per_second(12_500)
        );
    }

    #[test]
    fn cwnd_target_floors_at_min_window() {
        let mut flow = Flow::new(&Config::new());

        flow.cwnd_gain = 2.0;
        assert_eq!(flow.cwnd_target(100_000), 200_000);

        // 4 packets of 1500 bytes is the floor.
        assert_eq!(flow.min_window(), 6000);
        assert_eq!(flow.cwnd_target(100), 6000);
    }

    #[test]
    fn set_congestion_window_respects_floor() {
        let mut flow = Flow::new(&Config::new());

        flow.set_congestion_window(50_000);
        assert_eq!(flow.congestion_window(), 50_000);

        flow.set_congestion_window(0);
        assert_eq!(flow.congestion_window(), flow.min_window());
    }
}
