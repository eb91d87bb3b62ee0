//! Fixed-timestep tick loop.
//!
//! Each tick:
//!
//! 1. Integrate physics on the headless engine.
//! 2. Tick the registry (systems, due tasks, thinking components, deferred
//!    destroys).
//! 3. If this is the configured hotload tick, serialize every tracked
//!    component, reinstall the game module and restore.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use worlds_ecs::Registry;
use worlds_native::HeadlessEngine;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second. Must be finite and positive.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Tick after which game code is hotloaded.
    pub hotload_at: Option<u64>,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            hotload_at: None,
        }
    }
}

#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    registry: Registry,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, registry: Registry) -> Self {
        Self {
            tick_id: 0,
            config,
            registry,
        }
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Run one tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.tick_id += 1;
        debug!(tick_id = self.tick_id, dt, "tick start");

        if let Some(engine) = self.registry.native_as_mut::<HeadlessEngine>() {
            engine.step_physics(dt);
        }
        self.registry.tick(dt);

        if self.config.hotload_at == Some(self.tick_id) {
            self.hotload();
        }
    }

    /// Serialize tracked components, reinstall the game module and restore.
    /// Start hooks don't run for restored components.
    pub fn hotload(&mut self) {
        let started = Instant::now();
        self.registry.serialize_for_hotload();
        worlds_game::install(&mut self.registry);
        let restored = self.registry.restore_persisted_components();
        info!(
            tick_id = self.tick_id,
            restored,
            elapsed_us = started.elapsed().as_micros() as u64,
            "hotload complete"
        );
    }

    /// Run for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            hotload_at = ?self.config.hotload_at,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f32());

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}
