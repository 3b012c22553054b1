//! Simulation glue: the environment adapter surface, the event-pump
//! driver, and a deterministic reference environment.
//!
//! The controller never polls for fitness events; the driver drains them
//! from the environment after each tick and delivers them as discrete
//! calls. [`Corridor`] is an analytic straight-corridor track used by the
//! CLI, the benchmark and the integration tests. It is not a vehicle
//! dynamics model.

use crate::config::{Config, TrackConfig};
use crate::persist;
use crate::population::{AgentId, CheckpointId, Population, PopulationState};
use crate::stats::StatsHistory;
use std::f32::consts::{FRAC_PI_2, PI};
use std::path::PathBuf;

/// The environment adapter the controller drives agents through.
///
/// Implementations own all physical simulation and never see network
/// internals.
pub trait Environment {
    /// Width of the sensor vector this environment produces.
    fn sensor_count(&self) -> usize;

    /// Fill `out` with the agent's current sensor readings.
    fn read_sensors(&mut self, agent: AgentId, out: &mut [f32]);

    /// Apply one actuation command: forward throttle and steering.
    fn apply_action(&mut self, agent: AgentId, forward: f32, steer: f32);

    /// Current 2D position, for display followers.
    fn position(&self, agent: AgentId) -> (f32, f32);

    /// Move the agent back to the spawn pose for a new trial.
    fn reset_agent(&mut self, agent: AgentId);

    /// Take every fitness event produced since the last drain.
    fn drain_events(&mut self) -> Vec<TrackEvent>;
}

/// Discrete fitness events emitted by an environment
#[derive(Clone, Debug, PartialEq)]
pub enum TrackEvent {
    CheckpointCaptured {
        agent: AgentId,
        checkpoint: CheckpointId,
        points: i32,
        lateral_distance: f32,
    },
    Collision {
        agent: AgentId,
    },
    /// The agent crossed the end of the track
    Finished {
        agent: AgentId,
    },
}

/// Connects a [`Population`] to an [`Environment`] and pumps events.
pub struct Driver<E: Environment> {
    pub population: Population,
    pub env: E,
    pub history: StatsHistory,
    tick_seconds: f32,
    save_dir: Option<PathBuf>,
}

impl<E: Environment> Driver<E> {
    pub fn new(population: Population, env: E) -> Self {
        let tick_seconds = population.config().track.tick_seconds;
        Self {
            population,
            env,
            history: StatsHistory::new(),
            tick_seconds,
            save_dir: None,
        }
    }

    /// Save finishers' networks into this directory.
    pub fn with_save_dir(mut self, dir: PathBuf) -> Self {
        self.save_dir = Some(dir);
        self
    }

    /// One simulation step: advance the population, then deliver every
    /// event the environment produced.
    pub fn tick(&mut self) -> PopulationState {
        let state = self.population.tick(self.tick_seconds, &mut self.env);

        for event in self.env.drain_events() {
            match event {
                TrackEvent::CheckpointCaptured {
                    agent,
                    checkpoint,
                    points,
                    lateral_distance,
                } => {
                    self.population
                        .capture_checkpoint(agent, checkpoint, points, lateral_distance);
                }
                TrackEvent::Collision { agent } => self.population.record_collision(agent),
                TrackEvent::Finished { agent } => self.save_finisher(agent),
            }
        }

        if state == PopulationState::GenerationEnd {
            self.history.record(self.population.stats().clone());
        }
        state
    }

    /// Run until `count` generations have finished.
    pub fn run_generations(&mut self, count: u32) {
        let mut finished = 0;
        while finished < count {
            if self.tick() == PopulationState::GenerationEnd {
                finished += 1;
            }
        }
    }

    /// Write a finisher's network into the run directory.
    fn save_finisher(&self, agent: AgentId) {
        let dir = match &self.save_dir {
            Some(dir) => dir,
            None => return,
        };
        let binding = match self.population.bindings().get(agent) {
            Some(binding) => binding,
            None => return,
        };
        let path = dir.join(format!(
            "finisher_gen{:04}_fitness_{}.nn",
            self.population.generation(),
            binding.network.fitness()
        ));
        match persist::save_network(&path, &binding.network) {
            Ok(()) => log::info!("agent {} finished the track, saved {:?}", agent, path),
            Err(e) => log::error!("could not save finisher: {}", e),
        }
    }
}

/// State of one car in the corridor
#[derive(Clone, Debug, Default)]
struct CarState {
    x: f32,
    y: f32,
    heading: f32,
    finished: bool,
}

/// Straight-corridor reference environment.
///
/// Cars drive along a corridor of fixed width with scoring gates every
/// `gate_spacing` meters. Sensors are a 180-degree fan of rays reporting
/// the distance to the nearest wall, clamped to `max_sight` (no reading
/// means full sight, the same convention as a raycast miss). Touching a
/// wall emits a collision and pins the car back inside.
pub struct Corridor {
    track: TrackConfig,
    sensor_count: usize,
    cars: Vec<CarState>,
    events: Vec<TrackEvent>,
}

/// Forward output of 1.0 translates to this speed in m/s.
const FORWARD_SPEED: f32 = 5.0;
/// Steering output of 1.0 turns this many radians per second.
const STEER_RATE: f32 = 2.5;

impl Corridor {
    pub fn new(config: &Config) -> Self {
        Self {
            track: config.track.clone(),
            sensor_count: config.network.sensor_count,
            cars: Vec::new(),
            events: Vec::new(),
        }
    }

    fn ensure_car(&mut self, agent: AgentId) {
        while self.cars.len() <= agent {
            self.cars.push(CarState::default());
        }
    }
}

impl Environment for Corridor {
    fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    fn read_sensors(&mut self, agent: AgentId, out: &mut [f32]) {
        self.ensure_car(agent);
        let car = &self.cars[agent];
        let half_width = self.track.width / 2.0;
        let count = out.len();

        for (i, slot) in out.iter_mut().enumerate() {
            // Rays fan across 180 degrees, relative to the heading.
            let fraction = if count > 1 {
                i as f32 / (count - 1) as f32
            } else {
                0.5
            };
            let angle = car.heading + fraction * PI - FRAC_PI_2;

            let dy = angle.sin();
            let distance = if dy > 1e-6 {
                (half_width - car.y) / dy
            } else if dy < -1e-6 {
                (-half_width - car.y) / dy
            } else {
                self.track.max_sight
            };
            *slot = distance.clamp(0.0, self.track.max_sight);
        }
    }

    fn apply_action(&mut self, agent: AgentId, forward: f32, steer: f32) {
        self.ensure_car(agent);
        let dt = self.track.tick_seconds;
        let half_width = self.track.width / 2.0;
        let spacing = self.track.gate_spacing;
        let last_gate = (self.track.length / spacing).floor() as i64;
        let gate_points = self.track.gate_points;
        let length = self.track.length;

        let car = &mut self.cars[agent];
        car.heading += steer * STEER_RATE * dt;

        // Cars cannot reverse.
        if forward <= 0.0 {
            return;
        }

        let old_x = car.x;
        let distance = forward * FORWARD_SPEED * dt;
        car.x += car.heading.cos() * distance;
        car.y += car.heading.sin() * distance;

        if car.y.abs() > half_width {
            car.y = half_width.copysign(car.y);
            self.events.push(TrackEvent::Collision { agent });
        }

        let previous = (old_x / spacing).floor() as i64;
        let current = (car.x / spacing).floor() as i64;
        for gate in (previous + 1)..=current {
            if gate < 1 || gate > last_gate {
                continue;
            }
            self.events.push(TrackEvent::CheckpointCaptured {
                agent,
                checkpoint: gate as CheckpointId,
                points: gate_points,
                lateral_distance: car.y.abs(),
            });
        }

        if !car.finished && car.x >= length {
            car.finished = true;
            self.events.push(TrackEvent::Finished { agent });
        }
    }

    fn position(&self, agent: AgentId) -> (f32, f32) {
        self.cars
            .get(agent)
            .map(|car| (car.x, car.y))
            .unwrap_or((0.0, 0.0))
    }

    fn reset_agent(&mut self, agent: AgentId) {
        self.ensure_car(agent);
        self.cars[agent] = CarState::default();
    }

    fn drain_events(&mut self) -> Vec<TrackEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn corridor() -> Corridor {
        Corridor::new(&Config::default())
    }

    #[test]
    fn test_sensors_on_centerline() {
        let mut env = corridor();
        env.reset_agent(0);

        let mut sensors = [0.0f32; 5];
        env.read_sensors(0, &mut sensors);

        // Side rays see the walls two meters away, the forward ray sees
        // nothing within max sight.
        assert!((sensors[0] - 2.0).abs() < 1e-3);
        assert!((sensors[4] - 2.0).abs() < 1e-3);
        assert_eq!(sensors[2], 20.0);
        // Symmetric corridor, symmetric readings.
        assert!((sensors[1] - sensors[3]).abs() < 1e-3);
    }

    #[test]
    fn test_forward_motion_and_position() {
        let mut env = corridor();
        env.reset_agent(0);

        for _ in 0..10 {
            env.apply_action(0, 1.0, 0.0);
        }

        let (x, y) = env.position(0);
        assert!((x - 1.0).abs() < 1e-4);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_negative_forward_does_not_move() {
        let mut env = corridor();
        env.reset_agent(0);
        env.apply_action(0, -1.0, 0.0);
        assert_eq!(env.position(0), (0.0, 0.0));
    }

    #[test]
    fn test_gate_capture_event() {
        let mut env = corridor();
        env.reset_agent(0);

        // Drive past the first gate at 2.0 m.
        for _ in 0..25 {
            env.apply_action(0, 1.0, 0.0);
        }

        let events = env.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            TrackEvent::CheckpointCaptured {
                checkpoint: 1,
                points: 10,
                ..
            }
        )));
    }

    #[test]
    fn test_wall_contact_emits_collision() {
        let mut env = corridor();
        env.reset_agent(0);

        // Steer hard into the wall.
        for _ in 0..200 {
            env.apply_action(0, 1.0, 1.0);
        }

        let events = env.drain_events();
        assert!(events.iter().any(|e| matches!(e, TrackEvent::Collision { .. })));

        // The car is pinned inside the corridor.
        let (_, y) = env.position(0);
        assert!(y.abs() <= 2.0 + 1e-4);
    }

    #[test]
    fn test_finish_event_fires_once() {
        let mut config = Config::default();
        config.track.length = 1.0;
        let mut env = Corridor::new(&config);
        env.reset_agent(0);

        for _ in 0..30 {
            env.apply_action(0, 1.0, 0.0);
        }

        let finishes = env
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, TrackEvent::Finished { .. }))
            .count();
        assert_eq!(finishes, 1);
    }

    #[test]
    fn test_reset_returns_to_spawn() {
        let mut env = corridor();
        env.reset_agent(0);
        for _ in 0..50 {
            env.apply_action(0, 1.0, 0.3);
        }
        env.reset_agent(0);
        assert_eq!(env.position(0), (0.0, 0.0));
    }

    /// Scripted environment: hands agent 0 one gate capture per tick.
    struct ScriptedEnv {
        emitted: Vec<TrackEvent>,
        next_gate: CheckpointId,
    }

    impl Environment for ScriptedEnv {
        fn sensor_count(&self) -> usize {
            5
        }

        fn read_sensors(&mut self, _agent: AgentId, out: &mut [f32]) {
            out.fill(1.0);
        }

        fn apply_action(&mut self, agent: AgentId, _forward: f32, _steer: f32) {
            if agent == 0 {
                self.emitted.push(TrackEvent::CheckpointCaptured {
                    agent,
                    checkpoint: self.next_gate,
                    points: 10,
                    lateral_distance: 0.0,
                });
                self.next_gate += 1;
            }
        }

        fn position(&self, _agent: AgentId) -> (f32, f32) {
            (0.0, 0.0)
        }

        fn reset_agent(&mut self, _agent: AgentId) {}

        fn drain_events(&mut self) -> Vec<TrackEvent> {
            std::mem::take(&mut self.emitted)
        }
    }

    #[test]
    fn test_driver_pumps_events_into_the_population() {
        let config = Config::default();
        let population = crate::Population::new_with_seed(config, 7).unwrap();
        let env = ScriptedEnv {
            emitted: Vec::new(),
            next_gate: 1,
        };
        let mut driver = Driver::new(population, env);

        driver.tick(); // bootstrap spawn
        driver.tick();
        driver.tick();

        // Two captures scored, the rest of the pool untouched.
        assert!(driver.population.bindings()[0].network.fitness() > 0);
        assert_eq!(driver.population.bindings()[1].network.fitness(), 0);
    }
}
