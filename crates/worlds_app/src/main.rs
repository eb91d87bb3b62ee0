//! # worlds_app: headless runner
//!
//! Drives a [`Registry`] over the in-process [`HeadlessEngine`] with a fixed
//! timestep.
//!
//! ## Startup Sequence
//!
//! 1. Read registry configuration from the environment.
//! 2. Build the engine and register the demo prefabs.
//! 3. Install the game module and spawn the demo scene.
//! 4. Enter the fixed-timestep tick loop, optionally hotloading part way.

mod scene;
mod tick;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tick::{TickConfig, TickLoop};
use worlds_ecs::{Registry, RegistryConfig};

#[derive(Parser, Debug)]
#[command(name = "worlds_app", about = "Headless Worlds runner")]
struct Args {
    /// Number of ticks to run (0 = unlimited)
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Target ticks per second
    #[arg(long, default_value_t = 60.0, value_parser = parse_tick_rate)]
    tick_rate: f64,

    /// Tick after which to serialize, reinstall and restore game code
    #[arg(long)]
    hotload_at: Option<u64>,

    /// Drones to spawn around the camera
    #[arg(long, default_value_t = 3)]
    drones: usize,
}

/// A finite, positive tick rate.
fn parse_tick_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|err| format!("{err}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("tick rate must be positive, got {rate}"))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("worlds_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = RegistryConfig::from_env();
    info!(
        pool_count = config.pool_count,
        codec = ?config.codec,
        "worlds runner starting"
    );

    let engine = scene::build_engine(config.codec)?;
    let mut registry = Registry::new(Box::new(engine), config);
    worlds_game::install(&mut registry);
    let drones = scene::spawn_drones(&mut registry, args.drones);
    info!(drones = drones.len(), "scene ready");

    let mut tick_loop = TickLoop::new(
        TickConfig {
            tick_rate: args.tick_rate,
            max_ticks: args.ticks,
            hotload_at: args.hotload_at,
        },
        registry,
    );
    tick_loop.run();

    for pool in tick_loop.registry().debug_pools() {
        info!(
            slot = pool.index,
            component = pool.name,
            len = pool.len,
            hotload = pool.hotload,
            thinking = pool.thinking,
            "pool"
        );
    }
    info!("worlds runner shut down");
    Ok(())
}
