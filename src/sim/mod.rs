//! Discrete-event network simulator standing in for the external transport.
//!
//! One logical timeline of time-stamped events: frame deliveries and driver
//! triggers. Handlers run to completion in timestamp order (ties broken by
//! scheduling order), so no node ever observes another node's state except
//! through messages. Each radio serializes its own transmissions: a frame
//! departs only once the previous one has left the air, which keeps delivery
//! between any two nodes in send order.

pub mod driver;
pub mod propagation;
pub mod scenario;

pub use self::driver::{DriverConfig, TopologyDriver};
pub use self::propagation::{LogDistanceModel, Position};
pub use self::scenario::{Scenario, COORDINATOR_INDEX, MAX_NODE_COUNT};

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::core::{NodeRole, Result, ShortAddress};
use crate::network::{self, Transport, TxStatus};
use crate::protocol::{Engine, Output};

/// Link data rate used for frame airtime (802.15.4, 2.4 GHz band)
pub const DATA_RATE_BPS: u64 = 250_000;

fn airtime_micros(frame_len: usize) -> u64 {
    frame_len as u64 * 8 * 1_000_000 / DATA_RATE_BPS
}

/// A point on the simulated timeline, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the timeline
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a time from whole microseconds
    pub fn from_micros(micros: u64) -> Self {
        SimTime(micros)
    }

    /// Creates a time from seconds
    pub fn from_secs_f64(secs: f64) -> Self {
        SimTime((secs.max(0.0) * 1_000_000.0) as u64)
    }

    /// This time in microseconds
    pub fn as_micros(self) -> u64 {
        self.0
    }

    /// This time in seconds
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    fn plus_micros(self, micros: u64) -> Self {
        SimTime(self.0.saturating_add(micros))
    }

    fn plus_secs(self, secs: f64) -> Self {
        self.plus_micros((secs.max(0.0) * 1_000_000.0) as u64)
    }
}

#[derive(Debug)]
enum EventKind {
    /// A frame finishes its airtime and reaches the channel
    Frame {
        source: ShortAddress,
        dest: ShortAddress,
        frame: Bytes,
    },
    /// Driver trigger: broadcast a discovery beacon
    BeaconTick { node: usize },
    /// Driver trigger: generate one application payload
    DataTick { node: usize },
}

#[derive(Debug)]
struct Event {
    at: SimTime,
    seq: u64,
    kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

struct SimNode {
    engine: Engine,
    position: Position,
}

/// Buffers one handler's sends so they can be scheduled with their airtime
#[derive(Default)]
struct AirBuffer {
    sends: Vec<(ShortAddress, ShortAddress, Bytes)>,
}

impl Transport for AirBuffer {
    fn unicast(&mut self, source: ShortAddress, dest: ShortAddress, frame: Bytes) {
        self.sends.push((source, dest, frame));
    }

    fn broadcast(&mut self, source: ShortAddress, frame: Bytes) {
        self.sends.push((source, ShortAddress::BROADCAST, frame));
    }
}

/// The simulated network: nodes, channel, and the event timeline
pub struct Simulator {
    scenario: Scenario,
    nodes: Vec<SimNode>,
    queue: BinaryHeap<std::cmp::Reverse<Event>>,
    next_seq: u64,
    now: SimTime,
    /// Per-node time at which the radio finishes its current transmission
    busy_until: Vec<SimTime>,
    delivered: Vec<Bytes>,
}

impl Simulator {
    /// Builds a simulator from a scene description
    pub fn new(scenario: Scenario) -> Result<Self> {
        scenario.validate()?;
        let nodes = (0..scenario.node_count)
            .map(|index| {
                let role = if index == COORDINATOR_INDEX {
                    NodeRole::Coordinator
                } else {
                    NodeRole::Device
                };
                SimNode {
                    engine: Engine::new(Scenario::address_of(index), role),
                    position: scenario.position_of(index),
                }
            })
            .collect();
        let busy_until = vec![SimTime::ZERO; scenario.node_count];
        Ok(Simulator {
            scenario,
            nodes,
            queue: BinaryHeap::new(),
            next_seq: 0,
            now: SimTime::ZERO,
            busy_until,
            delivered: Vec::new(),
        })
    }

    /// Number of nodes in the scene
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Current simulated time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The protocol engine of a node, for inspection
    pub fn engine(&self, index: usize) -> &Engine {
        &self.nodes[index].engine
    }

    /// Payloads delivered to the coordinator's application layer, in order
    pub fn delivered(&self) -> &[Bytes] {
        &self.delivered
    }

    /// Schedules a beacon trigger for a node
    pub fn schedule_beacon(&mut self, at: SimTime, node: usize) {
        self.push(at, EventKind::BeaconTick { node });
    }

    /// Schedules a data-generation trigger for a node
    pub fn schedule_data(&mut self, at: SimTime, node: usize) {
        self.push(at, EventKind::DataTick { node });
    }

    /// Runs the timeline up to and including `deadline`
    pub fn run_until(&mut self, deadline: SimTime) {
        while let Some(std::cmp::Reverse(event)) = self.queue.peek() {
            if event.at > deadline {
                break;
            }
            let std::cmp::Reverse(event) = self.queue.pop().expect("peeked event");
            self.now = event.at;
            self.process(event);
        }
        self.now = self.now.max(deadline);
    }

    fn push(&mut self, at: SimTime, kind: EventKind) {
        let event = Event {
            at: at.max(self.now),
            seq: self.next_seq,
            kind,
        };
        self.next_seq += 1;
        self.queue.push(std::cmp::Reverse(event));
    }

    fn index_of(&self, addr: ShortAddress) -> Option<usize> {
        let index = addr.0 as usize;
        if (1..=self.nodes.len()).contains(&index) {
            Some(index - 1)
        } else {
            None
        }
    }

    fn process(&mut self, event: Event) {
        match event.kind {
            EventKind::Frame {
                source,
                dest,
                frame,
            } => {
                if dest.is_broadcast() {
                    for index in 0..self.nodes.len() {
                        if Scenario::address_of(index) != source {
                            self.deliver(index, source, dest, &frame);
                        }
                    }
                } else if let Some(index) = self.index_of(dest) {
                    self.deliver(index, source, dest, &frame);
                }
            }

            EventKind::BeaconTick { node } => {
                let outputs = self.nodes[node].engine.emit_beacon();
                self.emit(node, outputs);
                let interval = self.scenario.driver.beacon_interval;
                if interval > 0.0 {
                    let at = self.now.plus_secs(interval);
                    self.schedule_beacon(at, node);
                }
            }

            EventKind::DataTick { node } => {
                let payload = driver::data_payload(self.scenario.driver.data_payload_len);
                let outputs = self.nodes[node].engine.generate_data(payload);
                self.emit(node, outputs);
                let interval = self.scenario.driver.data_interval;
                if interval > 0.0 {
                    let at = self.now.plus_secs(interval);
                    self.schedule_data(at, node);
                }
            }
        }
    }

    /// Hands a frame on the channel to one receiver
    ///
    /// The receive power is computed from the propagation model; a frame
    /// below the configured floor is discarded without touching the engine.
    fn deliver(&mut self, index: usize, source: ShortAddress, dest: ShortAddress, frame: &Bytes) {
        let Some(source_index) = self.index_of(source) else {
            return;
        };
        let rx_dbm = self.scenario.path_loss.rx_power_dbm(
            self.scenario.tx_power_dbm,
            &self.nodes[source_index].position,
            &self.nodes[index].position,
        );
        let receiver = Scenario::address_of(index);
        if rx_dbm < self.scenario.rx_floor_dbm {
            trace!(
                "{} signal from {} at {:.1} dBm below floor, treated as not received",
                receiver,
                source,
                rx_dbm
            );
            return;
        }
        debug!(
            "{} received packet of size {} from {} at {:.1} dBm",
            receiver,
            frame.len(),
            source,
            rx_dbm
        );
        match self.nodes[index].engine.handle_frame(source, dest, frame) {
            Ok(outputs) => self.emit(index, outputs),
            Err(err) => warn!("{} dropping frame from {}: {}", receiver, source, err),
        }
    }

    /// Dispatches a handler's outputs: deliveries are recorded, sends are
    /// confirmed and put on the air for one frame airtime
    ///
    /// The radio transmits one frame at a time: a send issued while an
    /// earlier one is still on the air departs only after it, so frames
    /// between any two nodes arrive in send order.
    fn emit(&mut self, node: usize, outputs: Vec<Output>) {
        if outputs.is_empty() {
            return;
        }
        let source = Scenario::address_of(node);
        let mut air = AirBuffer::default();
        let delivered = network::dispatch(source, outputs, &mut air);
        for payload in delivered {
            info!(
                "coordinator application received {} bytes at t={:.3}s",
                payload.len(),
                self.now.as_secs_f64()
            );
            self.delivered.push(payload);
        }
        for (src, dest, frame) in air.sends {
            let status = if dest.is_null() {
                TxStatus::InvalidAddress
            } else if dest.is_broadcast() || self.index_of(dest).is_some() {
                TxStatus::Success
            } else {
                TxStatus::NoAck
            };
            network::log_confirm(src, status);
            if status == TxStatus::InvalidAddress {
                continue;
            }
            let departure = self.now.max(self.busy_until[node]);
            let at = departure.plus_micros(airtime_micros(frame.len()));
            self.busy_until[node] = at;
            self.push(
                at,
                EventKind::Frame {
                    source: src,
                    dest,
                    frame,
                },
            );
        }
    }
}
