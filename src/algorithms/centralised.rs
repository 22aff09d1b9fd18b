//! Centralised population manager
//!
//! Drives one population of joint policies through the generational state
//! machine:
//!
//! ```text
//! Initialized -> Evaluated -> Ranked -> Reproduced -> Evaluated -> ...
//! ```
//!
//! Each phase is a separate method so callers can interleave their own
//! bookkeeping; calling a phase out of order is an error. All randomness
//! comes from one `StdRng` seeded from the configuration.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::algorithms::strategy::{Reproduction, Selection};
use crate::config::EvolutionConfig;
use crate::credit::difference::DifferenceCredit;
use crate::diagnostics::{EvolutionResult, EvolutionStats, GenerationStats, TimingStats};
use crate::env::traits::Environment;
use crate::error::{EvoResult, EvolutionError};
use crate::operators::crossover::SbxCrossover;
use crate::operators::mutation::PerturbationMutation;
use crate::policy::traits::Policy;
use crate::population::individual::IdCounter;
use crate::population::population::Population;
use crate::record::{EvaluationRecord, RecordSink, TrajectoryLogPolicy};
use crate::termination::{EvolutionState, MaxGenerations, TerminationCriterion};

#[cfg(feature = "checkpoint")]
use crate::checkpoint::Checkpoint;

/// Phase of the current generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationState {
    /// Fresh random population, never evaluated
    Initialized,
    /// Every member carries this generation's fitness and trajectory
    Evaluated,
    /// The parent set has been selected
    Ranked,
    /// Parents plus offspring form the next generation
    Reproduced,
}

impl GenerationState {
    /// Name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Evaluated => "evaluated",
            Self::Ranked => "ranked",
            Self::Reproduced => "reproduced",
        }
    }
}

/// Generational driver for the centralised strategies
pub struct PopulationManager<P: Policy, E: Environment> {
    config: EvolutionConfig,
    env: E,
    policy_config: P::Config,
    population: Population<P>,
    state: GenerationState,
    selection: Option<Selection<P>>,
    ids: IdCounter,
    rng: StdRng,
    credit: DifferenceCredit,
    reproduction: Reproduction,
    evaluations: usize,
    stats: EvolutionStats,
    recorder: Option<Box<dyn RecordSink>>,
    log_policy: TrajectoryLogPolicy,
}

impl<P: Policy, E: Environment> PopulationManager<P, E> {
    /// Validate the configuration and build a random initial population
    pub fn new(config: EvolutionConfig, env: E, policy_config: P::Config) -> EvoResult<Self> {
        config.validate()?;
        P::validate_config(&policy_config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let ids = IdCounter::new(0);
        let population = Population::random(
            config.population_size,
            &policy_config,
            env.policy_shape(),
            env.team_size(),
            &ids,
            &mut rng,
        );

        debug!(
            domain = env.name(),
            strategy = config.strategy.name(),
            population = population.len(),
            team_size = env.team_size(),
            "population initialised"
        );
        Self::assemble(
            config,
            env,
            policy_config,
            population,
            GenerationState::Initialized,
            ids,
            rng,
        )
    }

    fn assemble(
        config: EvolutionConfig,
        env: E,
        policy_config: P::Config,
        population: Population<P>,
        state: GenerationState,
        ids: IdCounter,
        rng: StdRng,
    ) -> EvoResult<Self> {
        let credit = DifferenceCredit::new(env.num_objectives(), config.reference_offset);
        let reproduction = Reproduction::new(
            SbxCrossover::try_new(config.crossover_eta)?,
            PerturbationMutation::try_new(config.mutation_rate, config.mutation_scale)?,
        );
        let log_policy = config.trajectory_log_policy();
        Ok(Self {
            config,
            env,
            policy_config,
            population,
            state,
            selection: None,
            ids,
            rng,
            credit,
            reproduction,
            evaluations: 0,
            stats: EvolutionStats::new(),
            recorder: None,
            log_policy,
        })
    }

    /// Send evaluation records to `recorder`
    pub fn with_recorder(mut self, recorder: Box<dyn RecordSink>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// The environment
    pub fn environment(&self) -> &E {
        &self.env
    }

    /// Policy initialisation settings
    pub fn policy_config(&self) -> &P::Config {
        &self.policy_config
    }

    /// Current population
    pub fn population(&self) -> &Population<P> {
        &self.population
    }

    /// Current phase
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Current generation number
    pub fn generation(&self) -> usize {
        self.population.generation()
    }

    /// Total rollouts so far
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Statistics recorded so far
    pub fn stats(&self) -> &EvolutionStats {
        &self.stats
    }

    /// Id source shared by every individual of this run
    pub fn id_counter(&self) -> &IdCounter {
        &self.ids
    }

    /// Parent set of the last ranking, until reproduction consumes it
    pub fn selection(&self) -> Option<&Selection<P>> {
        self.selection.as_ref()
    }

    fn expect_state(&self, allowed: &[GenerationState], expected: &'static str) -> EvoResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EvolutionError::InvalidState {
                expected,
                found: self.state.name(),
            })
        }
    }

    /// Roll out every member and record the generation
    pub fn evaluate(&mut self) -> EvoResult<&GenerationStats> {
        self.expect_state(
            &[GenerationState::Initialized, GenerationState::Reproduced],
            "initialized or reproduced",
        )?;

        let start = Instant::now();
        if self.config.parallel_evaluation {
            self.population.evaluate_parallel(&self.env)?;
        } else {
            self.population.evaluate(&self.env)?;
        }
        let elapsed = start.elapsed();
        self.evaluations += self.population.len();
        self.state = GenerationState::Evaluated;
        debug!(
            generation = self.generation(),
            rollouts = self.population.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "population evaluated"
        );

        let non_finite = self
            .population
            .iter()
            .filter_map(|i| i.fitness())
            .filter(|f| f.objectives().iter().any(|v| !v.is_finite()))
            .count();
        if non_finite > 0 {
            warn!(
                generation = self.generation(),
                count = non_finite,
                "non-finite objective values"
            );
        }

        self.write_records()?;

        let stats = GenerationStats::from_population(
            &self.population,
            self.evaluations,
            self.credit.hypervolume(),
        )?
        .with_timing(TimingStats::new().with_evaluation(elapsed));
        info!(
            generation = stats.generation,
            front_size = stats.front_size,
            hypervolume = stats.hypervolume,
            "generation evaluated"
        );
        self.stats.record(stats);
        self.latest_stats()
    }

    fn latest_stats(&self) -> EvoResult<&GenerationStats> {
        self.stats.generations.last().ok_or(EvolutionError::InvalidState {
            expected: "recorded statistics",
            found: "no statistics",
        })
    }

    fn update_timing(&mut self, update: impl FnOnce(TimingStats) -> TimingStats) {
        if let Some(last) = self.stats.generations.last_mut() {
            last.timing = update(std::mem::take(&mut last.timing));
        }
    }

    fn write_records(&mut self) -> EvoResult<()> {
        let Some(recorder) = self.recorder.as_mut() else {
            return Ok(());
        };
        let generation = self.population.generation();
        let include_trajectory = self.log_policy.includes(generation);
        for individual in self.population.iter() {
            let record = EvaluationRecord::from_individual(individual, generation, include_trajectory)?;
            recorder.record(&record)?;
        }
        recorder.flush()
    }

    /// Sort the evaluated population and keep the better half as parents
    ///
    /// For the difference-credit strategy this also assigns difference values
    /// over the parent set. On failure the evaluated population is left intact.
    pub fn rank_and_select(&mut self) -> EvoResult<&Selection<P>> {
        self.expect_state(&[GenerationState::Evaluated], "evaluated")?;

        let start = Instant::now();
        let individuals = self.population.individuals().to_vec();
        let selection = self
            .config
            .strategy
            .rank_and_select(individuals, &self.env, &self.credit)?;
        self.population.individuals_mut().clear();
        let elapsed = start.elapsed();
        self.update_timing(|t| t.with_ranking(elapsed));

        self.state = GenerationState::Ranked;
        Ok(&*self.selection.insert(selection))
    }

    /// Refill to the configured size and advance to the next generation
    pub fn reproduce(&mut self) -> EvoResult<()> {
        self.expect_state(&[GenerationState::Ranked], "ranked")?;
        let selection = self.selection.take().ok_or(EvolutionError::InvalidState {
            expected: "ranked",
            found: "no parent set",
        })?;

        let start = Instant::now();
        let next_generation = self.generation() + 1;
        let offspring = self.reproduction.offspring(
            &selection,
            self.config.population_size,
            next_generation,
            &self.ids,
            &mut self.rng,
        )?;
        let num_offspring = offspring.len();

        let mut individuals = selection.parents;
        individuals.extend(offspring);
        let mut population = Population::from_individuals(individuals);
        population.set_generation(next_generation);
        population.shuffle(&mut self.rng);
        self.population = population;

        let elapsed = start.elapsed();
        self.update_timing(|t| t.with_reproduction(elapsed));
        debug!(
            generation = next_generation,
            offspring = num_offspring,
            population = self.population.len(),
            "offspring produced"
        );

        self.state = GenerationState::Reproduced;
        Ok(())
    }

    /// Run one full generation from wherever the state machine stands
    pub fn step(&mut self) -> EvoResult<()> {
        let start = Instant::now();
        if matches!(
            self.state,
            GenerationState::Initialized | GenerationState::Reproduced
        ) {
            self.evaluate()?;
        }
        if self.state == GenerationState::Evaluated {
            self.rank_and_select()?;
        }
        self.reproduce()?;
        let elapsed = start.elapsed();
        self.update_timing(|t| t.with_total(elapsed));
        Ok(())
    }

    /// Run for the configured number of generations
    ///
    /// The final population is evaluated before returning.
    pub fn run(&mut self) -> EvoResult<EvolutionResult<P>> {
        let criterion = MaxGenerations::new(self.config.num_generations);
        self.run_until(&criterion)
    }

    /// Run until `criterion` fires on an evaluated generation
    pub fn run_until(
        &mut self,
        criterion: &dyn TerminationCriterion,
    ) -> EvoResult<EvolutionResult<P>> {
        let start = Instant::now();

        loop {
            match self.state {
                GenerationState::Initialized | GenerationState::Reproduced => {
                    self.evaluate()?;
                }
                GenerationState::Ranked => {
                    self.reproduce()?;
                    continue;
                }
                GenerationState::Evaluated => {}
            }

            let history = self.stats.hypervolume_history();
            let state = EvolutionState {
                generation: self.generation(),
                evaluations: self.evaluations,
                hypervolume: history.last().copied().unwrap_or(0.0),
                hypervolume_history: &history,
            };
            if criterion.should_terminate(&state) {
                self.stats.set_termination_reason(criterion.reason());
                break;
            }

            self.step()?;
        }

        self.stats.set_runtime(start.elapsed());
        info!(
            generations = self.generation(),
            evaluations = self.evaluations,
            "run finished"
        );
        Ok(EvolutionResult::new(
            self.population.clone(),
            self.generation(),
            self.evaluations,
        )?
        .with_stats(self.stats.clone()))
    }
}

#[cfg(feature = "checkpoint")]
impl<P: Policy, E: Environment> PopulationManager<P, E> {
    /// Snapshot the state between generations
    ///
    /// Only available before evaluation; the stored population carries no
    /// fitness or trajectories.
    pub fn checkpoint(&self) -> EvoResult<Checkpoint<P>> {
        self.expect_state(
            &[GenerationState::Initialized, GenerationState::Reproduced],
            "initialized or reproduced",
        )?;
        let population = self
            .population
            .iter()
            .cloned()
            .map(|mut individual| {
                individual.reset_fitness();
                individual
            })
            .collect();
        Ok(Checkpoint::new(self.generation(), population)
            .with_id_counter(&self.ids)
            .with_evaluations(self.evaluations)
            .with_seed(self.config.seed)
            .with_statistics(self.stats.generations.clone())
            .with_metadata("strategy", self.config.strategy.name())
            .with_metadata("domain", self.env.name()))
    }

    /// Resume a run from a checkpoint
    ///
    /// The RNG is reseeded from the run seed and the checkpoint generation, so
    /// a resumed run is reproducible but does not replay the uninterrupted one.
    pub fn from_checkpoint(
        config: EvolutionConfig,
        env: E,
        policy_config: P::Config,
        checkpoint: Checkpoint<P>,
    ) -> EvoResult<Self> {
        config.validate()?;
        P::validate_config(&policy_config)?;
        if checkpoint.population.len() != config.population_size {
            return Err(EvolutionError::Configuration(format!(
                "checkpoint holds {} individuals, configuration expects {}",
                checkpoint.population.len(),
                config.population_size
            )));
        }
        if let Some(individual) = checkpoint
            .population
            .iter()
            .find(|i| i.team_size() != env.team_size())
        {
            return Err(EvolutionError::TeamSizeMismatch {
                expected: env.team_size(),
                actual: individual.team_size(),
            });
        }

        let rng = StdRng::seed_from_u64(checkpoint.seed.wrapping_add(checkpoint.generation as u64));
        let ids = checkpoint.id_counter();
        let state = if checkpoint.generation == 0 {
            GenerationState::Initialized
        } else {
            GenerationState::Reproduced
        };
        let mut population = Population::from_individuals(checkpoint.population);
        population.set_generation(checkpoint.generation);

        let mut manager = Self::assemble(config, env, policy_config, population, state, ids, rng)?;
        manager.evaluations = checkpoint.evaluations;
        for stats in checkpoint.statistics {
            manager.stats.record(stats);
        }
        debug!(
            generation = manager.generation(),
            next_id = manager.ids.peek(),
            "resumed from checkpoint"
        );
        Ok(manager)
    }
}
