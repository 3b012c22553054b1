//! Generational evolution controller.
//!
//! Owns the current generation's agent-network bindings and the champion,
//! detects generation end (every binding inactive), performs selection and
//! clone-then-mutate reproduction, and accumulates fitness from checkpoint
//! and collision events delivered by the environment.

use crate::config::Config;
use crate::neural::{Network, NetworkError};
use crate::persist::{self, PersistError};
use crate::scoring;
use crate::sim::Environment;
use crate::stats::GenerationRecord;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::path::Path;

/// Index of an agent binding, stable for the life of the controller.
pub type AgentId = usize;

/// Identifier of a scoring checkpoint, unique per trial.
pub type CheckpointId = u32;

/// Controller state after a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopulationState {
    /// At least one binding is still active
    Running,
    /// This tick rolled the population over into a new generation
    GenerationEnd,
}

/// Called when the best-fitness agent changes, with its current fitness.
pub type FocusHook = Box<dyn FnMut(AgentId, i32)>;

/// One simulated agent paired with one network for the span of a trial
pub struct AgentBinding {
    pub id: AgentId,
    pub network: Network,
    pub active: bool,
    time_since_checkpoint: f32,
    hits_since_checkpoint: u32,
    captured: HashSet<CheckpointId>,
}

impl AgentBinding {
    fn new(id: AgentId, network: Network) -> Self {
        Self {
            id,
            network,
            active: true,
            time_since_checkpoint: 0.0,
            hits_since_checkpoint: 0,
            captured: HashSet::new(),
        }
    }

    /// Reset per-trial state for reuse in the next generation
    fn reset_trial(&mut self) {
        self.active = true;
        self.time_since_checkpoint = 0.0;
        self.hits_since_checkpoint = 0;
        self.captured.clear();
    }
}

/// The evolving population and its champion
pub struct Population {
    bindings: Vec<AgentBinding>,
    /// Best network ever observed; every new generation is cloned from it
    champion: Network,
    generation: u32,
    focused: Option<AgentId>,
    stats: GenerationRecord,
    config: Config,
    rng: ChaCha8Rng,
    seed: u64,
    sensors: Vec<f32>,
    focus_hook: Option<FocusHook>,
}

impl Population {
    /// Create a controller with a random seed
    pub fn new(config: Config) -> Result<Self, NetworkError> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create a controller with a specific seed for reproducibility.
    ///
    /// The population spawns lazily: the first call to [`Population::tick`]
    /// sees an empty (hence all-inactive) pool and spawns generation 1
    /// from a freshly randomized champion.
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self, NetworkError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let champion = Network::new(
            &config.network.layout(),
            config.network.weight_range,
            config.network.bias_range,
            &mut rng,
        )?;
        let sensor_count = config.network.sensor_count;

        Ok(Self {
            bindings: Vec::with_capacity(config.evolution.population_size),
            champion,
            generation: 0,
            focused: None,
            stats: GenerationRecord::default(),
            config,
            rng,
            seed,
            sensors: vec![0.0; sensor_count],
            focus_hook: None,
        })
    }

    /// Advance the simulation by one tick.
    ///
    /// While running, every active binding is evaluated once in stable
    /// index order and driven through the environment adapter. When every
    /// binding has deactivated, selection and reproduction run instead and
    /// the call reports [`PopulationState::GenerationEnd`].
    pub fn tick<E: Environment>(&mut self, dt: f32, env: &mut E) -> PopulationState {
        if self.bindings.iter().all(|b| !b.active) {
            let finished_generation = !self.bindings.is_empty();
            self.end_generation(env);
            if finished_generation {
                return PopulationState::GenerationEnd;
            }
            return PopulationState::Running;
        }

        self.advance(dt, env);
        self.update_focus();
        PopulationState::Running
    }

    fn advance<E: Environment>(&mut self, dt: f32, env: &mut E) {
        let timeout = self.config.evolution.checkpoint_timeout;

        if self.sensors.len() != env.sensor_count() {
            self.sensors.resize(env.sensor_count(), 0.0);
        }

        for binding in self.bindings.iter_mut() {
            if !binding.active {
                continue;
            }

            env.read_sensors(binding.id, &mut self.sensors);
            match binding.network.forward(&self.sensors) {
                Ok(output) => {
                    let (forward, steer) = (output[0], output[1]);
                    env.apply_action(binding.id, forward, steer);
                }
                Err(e) => {
                    // One broken binding is deactivated, never escalated.
                    log::warn!("agent {} deactivated: {}", binding.id, e);
                    binding.active = false;
                    continue;
                }
            }

            binding.time_since_checkpoint += dt;
            if binding.time_since_checkpoint > timeout {
                binding.active = false;
            }
        }
    }

    /// Mark the current best-fitness binding as focused. Pure display
    /// side channel; first maximum wins ties so the signal is stable.
    fn update_focus(&mut self) {
        let mut best_fitness = 0;
        let mut best_index = 0;
        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.network.fitness() > best_fitness {
                best_fitness = binding.network.fitness();
                best_index = index;
            }
        }

        if self.focused != Some(best_index) {
            self.focused = Some(best_index);
            if let Some(hook) = self.focus_hook.as_mut() {
                hook(best_index, best_fitness);
            }
        }
    }

    /// Compare every binding against the champion and replace it on a
    /// strictly greater fitness. Ties keep the incumbent.
    fn select_champion(&mut self) -> bool {
        let mut best_fitness = self.champion.fitness();
        let mut best_index = None;
        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.network.fitness() > best_fitness {
                best_fitness = binding.network.fitness();
                best_index = Some(index);
            }
        }

        match best_index {
            Some(index) => {
                log::info!(
                    "new record: fitness {} in generation {}",
                    best_fitness,
                    self.generation
                );
                self.champion = self.bindings[index].network.clone();
                true
            }
            None => false,
        }
    }

    fn end_generation<E: Environment>(&mut self, env: &mut E) {
        if !self.bindings.is_empty() {
            let best = self
                .bindings
                .iter()
                .map(|b| b.network.fitness())
                .max()
                .unwrap_or(0);
            let mean = self
                .bindings
                .iter()
                .map(|b| b.network.fitness() as f32)
                .sum::<f32>()
                / self.bindings.len() as f32;

            let new_record = self.select_champion();
            self.stats = GenerationRecord {
                generation: self.generation,
                best_fitness: best,
                champion_fitness: self.champion.fitness(),
                mean_fitness: mean,
                new_record,
            };
        }

        self.spawn_generation(env);
    }

    /// Fill (or recycle) the binding pool with mutated champion clones and
    /// hand every agent back to the environment's spawn point.
    fn spawn_generation<E: Environment>(&mut self, env: &mut E) {
        let topology = self.config.network.layout();
        let weight_range = self.config.network.weight_range;
        let bias_range = self.config.network.bias_range;

        while self.bindings.len() < self.config.evolution.population_size {
            let id = self.bindings.len();
            let network = Network::new(&topology, weight_range, bias_range, &mut self.rng)
                .expect("layout validated at construction");
            self.bindings.push(AgentBinding::new(id, network));
        }

        let probability = self.config.evolution.mutation_probability;
        let amount = self.config.evolution.mutation_amount;
        for binding in self.bindings.iter_mut() {
            self.champion
                .clone_into(&mut binding.network)
                .expect("population networks share the champion topology");
            binding.network.set_fitness(0);
            binding.network.mutate(probability, amount, &mut self.rng);
            binding.reset_trial();
            env.reset_agent(binding.id);
        }

        self.generation += 1;
        self.focused = None;
    }

    /// Credit a captured checkpoint to a binding.
    ///
    /// Silently ignored when the binding is inactive or has already
    /// captured this checkpoint during the current trial.
    pub fn capture_checkpoint(
        &mut self,
        agent: AgentId,
        checkpoint: CheckpointId,
        points: i32,
        lateral_distance: f32,
    ) {
        let binding = match self.bindings.get_mut(agent) {
            Some(binding) => binding,
            None => return,
        };
        if !binding.active || binding.captured.contains(&checkpoint) {
            return;
        }

        let delta = scoring::score(
            points,
            lateral_distance,
            binding.time_since_checkpoint,
            binding.hits_since_checkpoint,
            &self.config.scoring,
        );
        binding.network.add_fitness(delta);
        binding.captured.insert(checkpoint);
        binding.time_since_checkpoint = 0.0;
        binding.hits_since_checkpoint = 0;
    }

    /// Count a wall hit against a binding; consumed by the next capture.
    pub fn record_collision(&mut self, agent: AgentId) {
        if let Some(binding) = self.bindings.get_mut(agent) {
            binding.hits_since_checkpoint += 1;
        }
    }

    /// Write the champion's fitness and parameters to a file.
    pub fn save_champion<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistError> {
        persist::save_network(path, &self.champion)
    }

    /// Load a saved network into the champion slot.
    ///
    /// The current generation's results are absorbed first so an
    /// in-flight record is not lost. On any codec error the champion is
    /// left exactly as it was.
    pub fn load_champion<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PersistError> {
        self.select_champion();
        persist::load_network(path, &mut self.champion)
    }

    pub fn champion(&self) -> &Network {
        &self.champion
    }

    /// Current generation number; 0 until the first spawn.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn bindings(&self) -> &[AgentBinding] {
        &self.bindings
    }

    /// Bindings still driving this generation
    pub fn active_count(&self) -> usize {
        self.bindings.iter().filter(|b| b.active).count()
    }

    /// The display-focused agent, if any
    pub fn focused(&self) -> Option<AgentId> {
        self.focused
    }

    /// Stats of the most recently finished generation
    pub fn stats(&self) -> &GenerationRecord {
        &self.stats
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register the focus-changed notification hook.
    pub fn set_focus_hook(&mut self, hook: FocusHook) {
        self.focus_hook = Some(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::TrackEvent;

    /// Environment stub: constant sensors, remembers the last action.
    struct StubEnv {
        sensor_count: usize,
        resets: usize,
        last_action: Option<(AgentId, f32, f32)>,
    }

    impl StubEnv {
        fn new(sensor_count: usize) -> Self {
            Self {
                sensor_count,
                resets: 0,
                last_action: None,
            }
        }
    }

    impl Environment for StubEnv {
        fn sensor_count(&self) -> usize {
            self.sensor_count
        }

        fn read_sensors(&mut self, _agent: AgentId, out: &mut [f32]) {
            out.fill(0.5);
        }

        fn apply_action(&mut self, agent: AgentId, forward: f32, steer: f32) {
            self.last_action = Some((agent, forward, steer));
        }

        fn position(&self, _agent: AgentId) -> (f32, f32) {
            (0.0, 0.0)
        }

        fn reset_agent(&mut self, _agent: AgentId) {
            self.resets += 1;
        }

        fn drain_events(&mut self) -> Vec<TrackEvent> {
            Vec::new()
        }
    }

    fn population(seed: u64) -> (Population, StubEnv) {
        let config = Config::default();
        let env = StubEnv::new(config.network.sensor_count);
        let population = Population::new_with_seed(config, seed).unwrap();
        (population, env)
    }

    fn parameters(network: &Network) -> Vec<f32> {
        let mut values: Vec<f32> = network.biases.iter().flat_map(|b| b.iter().copied()).collect();
        values.extend(network.weights.iter().flat_map(|w| w.iter().copied()));
        values
    }

    #[test]
    fn test_first_tick_spawns_generation_one() {
        let (mut population, mut env) = population(1);
        assert_eq!(population.generation(), 0);

        let state = population.tick(0.02, &mut env);

        assert_eq!(state, PopulationState::Running);
        assert_eq!(population.generation(), 1);
        assert_eq!(population.bindings().len(), 10);
        assert_eq!(population.active_count(), 10);
        assert_eq!(env.resets, 10);
        assert!(population.bindings().iter().all(|b| b.network.fitness() == 0));
    }

    #[test]
    fn test_running_tick_drives_agents() {
        let (mut population, mut env) = population(2);
        population.tick(0.02, &mut env);
        population.tick(0.02, &mut env);

        let (agent, forward, steer) = env.last_action.unwrap();
        assert_eq!(agent, 9);
        assert!((-1.0..=1.0).contains(&forward));
        assert!((-1.0..=1.0).contains(&steer));
    }

    #[test]
    fn test_timeout_deactivates_agents() {
        let (mut population, mut env) = population(3);
        population.tick(0.02, &mut env);

        // One huge tick blows every binding past the checkpoint timeout.
        let state = population.tick(10.0, &mut env);
        assert_eq!(state, PopulationState::Running);
        assert_eq!(population.active_count(), 0);
    }

    #[test]
    fn test_generation_rollover_increments_once_and_resets_fitness() {
        let (mut population, mut env) = population(4);
        population.tick(0.02, &mut env);
        population.tick(10.0, &mut env);

        let champion_before = parameters(population.champion());
        let amount = population.config().evolution.mutation_amount;

        let state = population.tick(0.02, &mut env);
        assert_eq!(state, PopulationState::GenerationEnd);
        assert_eq!(population.generation(), 2);
        assert_eq!(population.active_count(), 10);

        for binding in population.bindings() {
            assert_eq!(binding.network.fitness(), 0);
            // Every parameter equals the champion's plus a bounded delta.
            for (theirs, ours) in parameters(&binding.network)
                .iter()
                .zip(champion_before.iter())
            {
                assert!((theirs - ours).abs() <= amount + f32::EPSILON);
            }
        }

        // The rollover reported exactly once.
        let state = population.tick(0.02, &mut env);
        assert_eq!(state, PopulationState::Running);
        assert_eq!(population.generation(), 2);
    }

    #[test]
    fn test_champion_replaced_on_strictly_greater_fitness() {
        let (mut population, mut env) = population(5);
        population.tick(0.02, &mut env);

        population.bindings[3].network.set_fitness(500);
        let winner = parameters(&population.bindings[3].network);

        population.tick(10.0, &mut env);
        population.tick(0.02, &mut env);

        assert_eq!(population.champion().fitness(), 500);
        assert_eq!(parameters(population.champion()), winner);
        assert!(population.stats().new_record);
        assert_eq!(population.stats().best_fitness, 500);
        assert_eq!(population.stats().generation, 1);
    }

    #[test]
    fn test_tie_keeps_incumbent_champion() {
        let (mut population, mut env) = population(6);
        population.tick(0.02, &mut env);

        let incumbent_fitness = population.champion().fitness();
        let incumbent = parameters(population.champion());
        population.bindings[0].network.set_fitness(incumbent_fitness);

        population.tick(10.0, &mut env);
        population.tick(0.02, &mut env);

        assert_eq!(parameters(population.champion()), incumbent);
        assert!(!population.stats().new_record);
    }

    #[test]
    fn test_capture_scores_once_per_checkpoint() {
        let (mut population, mut env) = population(7);
        population.tick(0.02, &mut env);

        population.bindings[0].time_since_checkpoint = 1.0;
        population.capture_checkpoint(0, 1, 10, 0.0);
        assert_eq!(population.bindings[0].network.fitness(), 33);
        assert_eq!(population.bindings[0].time_since_checkpoint, 0.0);

        // Second capture of the same checkpoint is a silent no-op.
        population.bindings[0].time_since_checkpoint = 1.0;
        population.capture_checkpoint(0, 1, 10, 0.0);
        assert_eq!(population.bindings[0].network.fitness(), 33);
    }

    #[test]
    fn test_collisions_penalize_next_capture() {
        let (mut population, mut env) = population(8);
        population.tick(0.02, &mut env);

        population.record_collision(0);
        population.record_collision(0);
        population.bindings[0].time_since_checkpoint = 1.0;
        population.capture_checkpoint(0, 1, 10, 0.0);

        assert_eq!(population.bindings[0].network.fitness(), 33 - 200);
        // Hits were consumed by the capture.
        assert_eq!(population.bindings[0].hits_since_checkpoint, 0);
    }

    #[test]
    fn test_inactive_binding_ignores_captures() {
        let (mut population, mut env) = population(9);
        population.tick(0.02, &mut env);

        population.bindings[2].active = false;
        population.capture_checkpoint(2, 1, 10, 0.0);
        assert_eq!(population.bindings[2].network.fitness(), 0);
    }

    #[test]
    fn test_focus_follows_best_fitness() {
        let (mut population, mut env) = population(10);
        population.tick(0.02, &mut env);

        population.bindings[4].network.set_fitness(50);
        population.tick(0.02, &mut env);
        assert_eq!(population.focused(), Some(4));

        population.bindings[7].network.set_fitness(80);
        population.tick(0.02, &mut env);
        assert_eq!(population.focused(), Some(7));
    }

    #[test]
    fn test_focus_hook_fires_on_change() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let (mut population, mut env) = population(11);
        let seen: Rc<RefCell<Vec<(AgentId, i32)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        population.set_focus_hook(Box::new(move |agent, fitness| {
            sink.borrow_mut().push((agent, fitness));
        }));

        population.tick(0.02, &mut env);
        population.tick(0.02, &mut env);
        population.bindings[6].network.set_fitness(10);
        population.tick(0.02, &mut env);

        let seen = seen.borrow();
        assert_eq!(seen.last(), Some(&(6, 10)));
    }

    #[test]
    fn test_failed_evaluation_deactivates_only_that_agent() {
        let config = Config::default();
        let mut population = Population::new_with_seed(config, 12).unwrap();
        // Environment with the wrong sensor width breaks every forward
        // pass; each binding is deactivated instead of panicking.
        let mut env = StubEnv::new(3);

        population.tick(0.02, &mut env);
        population.tick(0.02, &mut env);
        assert_eq!(population.active_count(), 0);
    }

    #[test]
    fn test_champion_save_load_roundtrip() {
        let path = "/tmp/autodrome_champion_test.nn";
        let (mut source, mut env) = population(13);
        source.tick(0.02, &mut env);

        source.bindings[1].network.set_fitness(99);
        source.tick(10.0, &mut env);
        source.tick(0.02, &mut env);
        source.save_champion(path).unwrap();

        let (mut other, _) = population(14);
        other.load_champion(path).unwrap();

        assert_eq!(other.champion().fitness(), 99);
        assert_eq!(parameters(other.champion()), parameters(source.champion()));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_seeded_populations_evolve_identically() {
        let (mut a, mut env_a) = population(42);
        let (mut b, mut env_b) = population(42);

        for _ in 0..50 {
            a.tick(0.1, &mut env_a);
            b.tick(0.1, &mut env_b);
        }

        assert_eq!(a.generation(), b.generation());
        assert_eq!(parameters(a.champion()), parameters(b.champion()));
        for (lhs, rhs) in a.bindings().iter().zip(b.bindings().iter()) {
            assert_eq!(parameters(&lhs.network), parameters(&rhs.network));
        }
    }
}
