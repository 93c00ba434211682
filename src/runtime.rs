use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Actuator, Emission, Engine};

/// External on/off switch for the emission loop (e.g. a held key)
#[derive(Clone, Debug, Default)]
pub struct Trigger {
    flag: Arc<AtomicBool>,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, on: bool) {
        self.flag.store(on, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// What one runner step did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    Emitted(Emission),
    /// trigger released; slept one idle tick
    Idle,
}

/// Drives an engine while the trigger is held.
///
/// Trigger edges become span hooks. Every emission is followed by a sleep on
/// the engine clock, so a release is only noticed after that sleep.
pub struct Runner<A: Actuator, T: Ticker> {
    engine: Engine,
    actuator: A,
    trigger: Trigger,
    shutdown: Arc<AtomicBool>,
    idle: T,
    was_active: bool,
}

impl<A: Actuator, T: Ticker> Runner<A, T> {
    pub fn new(engine: Engine, actuator: A, trigger: Trigger, idle: T) -> Self {
        Self {
            engine,
            actuator,
            trigger,
            shutdown: Arc::new(AtomicBool::new(false)),
            idle,
            was_active: false,
        }
    }

    /// Flag that makes [`Runner::run`] return after its current step
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Advance one emission or one idle tick
    pub fn step(&mut self) -> Step {
        let active = self.trigger.is_set();
        let handle = self.engine.handle();
        match (self.was_active, active) {
            (false, true) => handle.start_active_span(),
            (true, false) => handle.stop_active_span(),
            _ => {}
        }
        self.was_active = active;

        if active {
            let emission = self.engine.emit_once(&mut self.actuator);
            self.engine.clock().sleep(emission.interval());
            Step::Emitted(emission)
        } else {
            self.engine.clock().sleep(self.idle.interval());
            Step::Idle
        }
    }

    /// Loop until the shutdown flag is raised; the open span is closed on exit
    pub fn run(&mut self) {
        tracing::info!("runner started");
        while !self.shutdown.load(Ordering::SeqCst) {
            self.step();
        }
        if self.was_active {
            self.engine.handle().stop_active_span();
            self.was_active = false;
        }
        tracing::info!(emitted = self.engine.handle().len(), "runner stopped");
    }

    /// Hold the trigger for exactly `n` emissions, then release it
    pub fn run_for(&mut self, n: usize) -> Vec<Emission> {
        self.trigger.set(true);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if let Step::Emitted(e) = self.step() {
                out.push(e);
            }
        }
        self.trigger.set(false);
        self.step();
        out
    }
}
