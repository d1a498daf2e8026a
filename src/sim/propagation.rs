//! Radio propagation model for the simulated channel.
//!
//! Log-distance path loss only: deterministic, so simulation runs are
//! reproducible. Power is in dBm, distance in meters.

use serde::{Deserialize, Serialize};

/// 2D node position in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Euclidean distance to another position
    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Log-distance path loss model
///
/// `PL(d) = PL(d0) + 10 * n * log10(d / d0)`, where `n` is the path loss
/// exponent and `PL(d0)` the loss at the reference distance. Distances below
/// the reference incur the reference loss only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDistanceModel {
    /// Path loss exponent (2.0 free space, higher with clutter)
    pub exponent: f64,
    /// Reference distance in meters
    pub reference_distance: f64,
    /// Path loss at the reference distance in dB
    pub reference_loss: f64,
}

impl Default for LogDistanceModel {
    fn default() -> Self {
        // Signal decays with exponent 2.5 and loses 46.6777 dB at 1 m
        LogDistanceModel {
            exponent: 2.5,
            reference_distance: 1.0,
            reference_loss: 46.6777,
        }
    }
}

impl LogDistanceModel {
    /// Path loss in dB at the given distance
    pub fn path_loss_db(&self, distance: f64) -> f64 {
        if distance <= self.reference_distance {
            return self.reference_loss;
        }
        self.reference_loss
            + 10.0 * self.exponent * (distance / self.reference_distance).log10()
    }

    /// Received power in dBm between two positions
    pub fn rx_power_dbm(&self, tx_power_dbm: f64, from: &Position, to: &Position) -> f64 {
        tx_power_dbm - self.path_loss_db(from.distance(to))
    }
}
