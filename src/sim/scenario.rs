//! Scene configuration for the simulated network.

use serde::{Deserialize, Serialize};

use super::driver::DriverConfig;
use super::propagation::{LogDistanceModel, Position};
use crate::core::{Error, Result, ShortAddress};

/// Node index of the coordinator in every scenario
pub const COORDINATOR_INDEX: usize = 0;

/// Largest node count the consecutive address assignment can cover
pub const MAX_NODE_COUNT: usize = 0xfffe;

/// A simulated scene: node placement, channel and driver parameters
///
/// Nodes are placed on a row-first grid and assigned consecutive short
/// addresses starting at `00:01`; node 0 is the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Total number of nodes including the coordinator
    pub node_count: usize,
    /// Nodes per grid row
    pub grid_width: usize,
    /// Distance between neighboring grid positions in meters
    pub grid_spacing: f64,
    /// Transmit power of every radio in dBm
    pub tx_power_dbm: f64,
    /// Receive power below which a frame is treated as not received, in dBm
    pub rx_floor_dbm: f64,
    /// Channel propagation model
    pub path_loss: LogDistanceModel,
    /// Topology driver timing
    pub driver: DriverConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            node_count: 20,
            grid_width: 2,
            grid_spacing: 15.0,
            tx_power_dbm: 0.0,
            rx_floor_dbm: -90.0,
            path_loss: LogDistanceModel::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl Scenario {
    /// Checks the scene for values the simulator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.node_count < 1 {
            return Err(Error::config("scenario needs at least the coordinator node"));
        }
        // Addresses are consecutive from 00:01; ff:ff is the broadcast
        // sentinel and must stay unassigned.
        if self.node_count > MAX_NODE_COUNT {
            return Err(Error::config(format!(
                "scenario exceeds the 16-bit address space ({} nodes max)",
                MAX_NODE_COUNT
            )));
        }
        if self.grid_width < 1 {
            return Err(Error::config("grid width must be at least 1"));
        }
        if !(self.grid_spacing.is_finite() && self.grid_spacing >= 0.0) {
            return Err(Error::config("grid spacing must be a non-negative number"));
        }
        Ok(())
    }

    /// Grid position of a node, row-first
    pub fn position_of(&self, index: usize) -> Position {
        Position {
            x: (index % self.grid_width) as f64 * self.grid_spacing,
            y: (index / self.grid_width) as f64 * self.grid_spacing,
        }
    }

    /// Short address of a node (consecutive, starting at `00:01`)
    pub fn address_of(index: usize) -> ShortAddress {
        ShortAddress(index as u16 + 1)
    }
}
