//! Runs a cluster-tree formation scenario and reports the resulting tree.
//!
//! Usage: `cluster_sim [scenario.json] [duration-seconds]`
//!
//! Without arguments the reference scene is used: 20 nodes on a 2-wide grid
//! with 15 m spacing, simulated for 30 seconds.

use std::env;
use std::fs::File;

use tracing::info;
use tracing_subscriber::EnvFilter;

use wpan_cluster::core::Error;
use wpan_cluster::sim::{Scenario, SimTime, Simulator, TopologyDriver};
use wpan_cluster::Result;

fn load_scenario(path: Option<&str>) -> Result<Scenario> {
    match path {
        Some(path) => {
            let file = File::open(path)?;
            serde_json::from_reader(file)
                .map_err(|e| Error::config(format!("invalid scenario file {}: {}", path, e)))
        }
        None => Ok(Scenario::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let scenario = load_scenario(args.get(1).map(String::as_str))?;
    let duration: f64 = match args.get(2) {
        Some(arg) => arg
            .parse()
            .map_err(|e| Error::config(format!("invalid duration {}: {}", arg, e)))?,
        None => 30.0,
    };

    info!(
        "starting {}-node scenario for {}s of simulated time",
        scenario.node_count, duration
    );
    let driver = TopologyDriver::new(scenario.driver.clone());
    let mut sim = Simulator::new(scenario)?;
    driver.install(&mut sim);
    sim.run_until(SimTime::from_secs_f64(duration));

    info!("final cluster tree:");
    for index in 0..sim.node_count() {
        let engine = sim.engine(index);
        let record = engine.record();
        match (record.parent(), record.cluster_id()) {
            (Some(parent), Some(cluster)) => info!(
                "  {} cluster {} parent {} children {}",
                engine.address(),
                cluster,
                parent,
                record.child_count()
            ),
            (None, Some(cluster)) => info!(
                "  {} cluster {} (coordinator) children {}",
                engine.address(),
                cluster,
                record.child_count()
            ),
            _ => info!("  {} never attached", engine.address()),
        }
    }
    info!(
        "{} payloads delivered to the coordinator",
        sim.delivered().len()
    );

    Ok(())
}
