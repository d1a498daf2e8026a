//! Topology driver: timed triggers into the protocol engines.
//!
//! The driver carries no protocol logic. It schedules the coordinator's
//! discovery beacon and each ordinary node's application-data generation,
//! staggered so concurrent sends do not pile up at shared relays.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::scenario::COORDINATOR_INDEX;
use super::{SimTime, Simulator};

/// Timing of the driver's triggers, in seconds of simulated time
///
/// A zero interval disables the periodic repeat of that trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// When the coordinator broadcasts its first beacon
    pub beacon_start: f64,
    /// Cadence of subsequent coordinator beacons
    pub beacon_interval: f64,
    /// When the first ordinary node generates data
    pub data_start: f64,
    /// Per-node offset between data generation slots
    pub data_stagger: f64,
    /// Cadence of each node's subsequent data generation
    pub data_interval: f64,
    /// Length of the generated application payload in bytes
    pub data_payload_len: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            beacon_start: 0.0,
            beacon_interval: 10.0,
            data_start: 0.5,
            data_stagger: 0.5,
            data_interval: 10.0,
            data_payload_len: 10,
        }
    }
}

/// Installs the timed triggers of a run into the simulator
pub struct TopologyDriver {
    config: DriverConfig,
}

impl TopologyDriver {
    /// Creates a driver with the given timing
    pub fn new(config: DriverConfig) -> Self {
        TopologyDriver { config }
    }

    /// Schedules the initial beacon and every node's first data slot
    ///
    /// Periodic repeats are re-armed by the simulator from its scenario's
    /// driver config as each trigger fires.
    pub fn install(&self, sim: &mut Simulator) {
        sim.schedule_beacon(
            SimTime::from_secs_f64(self.config.beacon_start),
            COORDINATOR_INDEX,
        );
        for node in 1..sim.node_count() {
            let at = self.config.data_start + node as f64 * self.config.data_stagger;
            sim.schedule_data(SimTime::from_secs_f64(at), node);
        }
    }
}

/// Generates one application payload for a data slot
pub(crate) fn data_payload(len: usize) -> Bytes {
    use rand::Rng;
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill(&mut buf[..]);
    Bytes::from(buf)
}
