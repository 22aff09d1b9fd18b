//! Cooperative coevolution with difference vectors
//!
//! Every team slot owns a subpopulation of policies. Each generation the
//! subpopulations are shuffled and zipped into teams (team `i` takes member
//! `i` of every subpopulation), the teams are rolled out, and each member is
//! scored by its difference vector: team fitness minus the fitness of the same
//! trajectory re-scored without that agent. Subpopulations are then ranked by
//! non-dominated sorting of those vectors, halved, and refilled.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::EvolutionConfig;
use crate::credit::difference::counterfactual_fitness;
use crate::diagnostics::{EvolutionResult, EvolutionStats, GenerationStats, TimingStats};
use crate::env::traits::Environment;
use crate::error::{EvoResult, EvolutionError};
use crate::operators::crossover::SbxCrossover;
use crate::operators::mutation::PerturbationMutation;
use crate::operators::selection::{positional_scores, TournamentSelection};
use crate::operators::traits::{CrossoverOperator, MutationOperator, SelectionOperator};
use crate::pareto::dominance::sort_population_mo;
use crate::pareto::hypervolume::{Hypervolume, ReferencePoint};
use crate::policy::traits::Policy;
use crate::population::individual::{IdCounter, Individual};
use crate::population::population::Population;
use crate::record::{EvaluationRecord, RecordSink, TrajectoryLogPolicy};
use crate::termination::{EvolutionState, MaxGenerations, TerminationCriterion};

/// Difference vector of every slot of an evaluated team
///
/// Entry `s` is `fitness - counterfactual_fitness(s)`, objective by objective,
/// in the lower-is-better convention.
pub fn team_differences<P: Policy, E: Environment>(
    team: &Individual<P>,
    env: &E,
) -> EvoResult<Vec<Vec<f64>>> {
    (0..team.team_size())
        .map(|slot| slot_difference(team, slot, env))
        .collect()
}

fn slot_difference<P: Policy, E: Environment>(
    team: &Individual<P>,
    slot: usize,
    env: &E,
) -> EvoResult<Vec<f64>> {
    let unevaluated = EvolutionError::InvalidState {
        expected: "evaluated",
        found: "unevaluated",
    };
    let fitness = team.fitness().ok_or(unevaluated)?;
    let trajectory = team.trajectory.as_ref().ok_or(EvolutionError::InvalidState {
        expected: "trajectory recorded",
        found: "no trajectory",
    })?;
    let counterfactual = counterfactual_fitness(trajectory, slot, env)?;
    Ok(fitness.difference(&counterfactual))
}

/// Per-slot coevolution driver
pub struct CoevolutionaryEvolution<P: Policy, E: Environment> {
    config: EvolutionConfig,
    env: E,
    subpopulations: Vec<Vec<P>>,
    teams: Option<Population<P>>,
    generation: usize,
    ids: IdCounter,
    rng: StdRng,
    crossover: SbxCrossover,
    mutation: PerturbationMutation,
    tournament: TournamentSelection,
    hypervolume: Hypervolume,
    evaluations: usize,
    stats: EvolutionStats,
    recorder: Option<Box<dyn RecordSink>>,
    log_policy: TrajectoryLogPolicy,
}

impl<P: Policy, E: Environment> CoevolutionaryEvolution<P, E> {
    /// Validate the configuration and build one random subpopulation per slot
    pub fn new(config: EvolutionConfig, env: E, policy_config: &P::Config) -> EvoResult<Self> {
        config.validate()?;
        P::validate_config(policy_config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let shape = env.policy_shape();
        let subpopulations: Vec<Vec<P>> = (0..env.team_size())
            .map(|_| {
                (0..config.population_size)
                    .map(|_| P::generate(policy_config, shape, &mut rng))
                    .collect()
            })
            .collect();

        debug!(
            domain = env.name(),
            subpopulations = subpopulations.len(),
            size = config.population_size,
            "subpopulations initialised"
        );

        Ok(Self {
            crossover: SbxCrossover::try_new(config.crossover_eta)?,
            mutation: PerturbationMutation::try_new(config.mutation_rate, config.mutation_scale)?,
            tournament: TournamentSelection::binary(),
            hypervolume: Hypervolume::new(ReferencePoint::with_offset(
                env.num_objectives(),
                config.reference_offset,
            )),
            log_policy: config.trajectory_log_policy(),
            config,
            env,
            subpopulations,
            teams: None,
            generation: 0,
            ids: IdCounter::new(0),
            rng,
            evaluations: 0,
            stats: EvolutionStats::new(),
            recorder: None,
        })
    }

    /// Send evaluation records to `recorder`
    pub fn with_recorder(mut self, recorder: Box<dyn RecordSink>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Policies currently held for a team slot
    pub fn subpopulation(&self, slot: usize) -> Option<&[P]> {
        self.subpopulations.get(slot).map(Vec::as_slice)
    }

    /// Number of subpopulations (the team size)
    pub fn num_subpopulations(&self) -> usize {
        self.subpopulations.len()
    }

    /// Teams of the current generation, once evaluated
    pub fn teams(&self) -> Option<&Population<P>> {
        self.teams.as_ref()
    }

    /// Current generation number
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Total rollouts so far
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Statistics recorded so far
    pub fn stats(&self) -> &EvolutionStats {
        &self.stats
    }

    /// Shuffle the subpopulations, form teams, and roll them out
    pub fn evaluate(&mut self) -> EvoResult<&GenerationStats> {
        if self.teams.is_some() {
            return Err(EvolutionError::InvalidState {
                expected: "reproduced",
                found: "evaluated",
            });
        }

        for subpopulation in &mut self.subpopulations {
            subpopulation.shuffle(&mut self.rng);
        }
        let teams: Vec<Individual<P>> = (0..self.config.population_size)
            .map(|i| {
                let joint_policy = self.subpopulations.iter().map(|s| s[i].clone()).collect();
                Individual::new(joint_policy, self.ids.next_id()).with_generation(self.generation)
            })
            .collect();
        let mut teams = Population::from_individuals(teams);
        teams.set_generation(self.generation);

        let start = Instant::now();
        if self.config.parallel_evaluation {
            teams.evaluate_parallel(&self.env)?;
        } else {
            teams.evaluate(&self.env)?;
        }
        let elapsed = start.elapsed();
        self.evaluations += teams.len();

        if let Some(recorder) = self.recorder.as_mut() {
            let include_trajectory = self.log_policy.includes(self.generation);
            for team in teams.iter() {
                let record = EvaluationRecord::from_individual(team, self.generation, include_trajectory)?;
                recorder.record(&record)?;
            }
            recorder.flush()?;
        }

        let stats = GenerationStats::from_population(&teams, self.evaluations, &self.hypervolume)?
            .with_timing(TimingStats::new().with_evaluation(elapsed));
        info!(
            generation = stats.generation,
            front_size = stats.front_size,
            hypervolume = stats.hypervolume,
            "teams evaluated"
        );
        self.stats.record(stats);
        self.teams = Some(teams);

        self.stats.generations.last().ok_or(EvolutionError::InvalidState {
            expected: "recorded statistics",
            found: "no statistics",
        })
    }

    /// Rank each subpopulation by difference vectors, halve it, and refill it
    pub fn reproduce(&mut self) -> EvoResult<()> {
        let teams = self.teams.take().ok_or(EvolutionError::InvalidState {
            expected: "evaluated",
            found: "reproduced",
        })?;

        let credit_start = Instant::now();
        let differences = self.score_teams(teams.individuals())?;
        let credit_elapsed = credit_start.elapsed();

        let reproduction_start = Instant::now();
        let size = self.config.population_size;
        let keep = size / 2;
        let scores = positional_scores(keep);

        for (slot, subpopulation) in self.subpopulations.iter_mut().enumerate() {
            let slot_differences: Vec<&[f64]> =
                differences.iter().map(|team| team[slot].as_slice()).collect();
            let order = sort_population_mo(&slot_differences);

            let mut next: Vec<P> = Vec::with_capacity(size);
            next.extend(order.iter().take(keep).map(|&i| subpopulation[i].clone()));

            while next.len() < size {
                let a = self.tournament.select(&scores, &mut self.rng)?;
                let b = self.tournament.select(&scores, &mut self.rng)?;
                let (mut child1, mut child2) = self
                    .crossover
                    .crossover(&next[a], &next[b], &mut self.rng)
                    .into_result()?;
                self.mutation.mutate(&mut child1, &mut self.rng)?;
                self.mutation.mutate(&mut child2, &mut self.rng)?;

                next.push(child1);
                if next.len() < size {
                    next.push(child2);
                }
            }
            *subpopulation = next;
        }

        let reproduction_elapsed = reproduction_start.elapsed();
        if let Some(last) = self.stats.generations.last_mut() {
            last.timing = std::mem::take(&mut last.timing)
                .with_credit(credit_elapsed)
                .with_reproduction(reproduction_elapsed);
        }

        self.generation += 1;
        debug!(
            generation = self.generation,
            kept = keep,
            "subpopulations reproduced"
        );
        Ok(())
    }

    /// Run one full generation
    pub fn step(&mut self) -> EvoResult<()> {
        if self.teams.is_none() {
            self.evaluate()?;
        }
        self.reproduce()
    }

    /// Run for the configured number of generations
    ///
    /// The final teams are evaluated before returning.
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
            if self.teams.is_none() {
                self.evaluate()?;
            }

            let history = self.stats.hypervolume_history();
            let state = EvolutionState {
                generation: self.generation,
                evaluations: self.evaluations,
                hypervolume: history.last().copied().unwrap_or(0.0),
                hypervolume_history: &history,
            };
            if criterion.should_terminate(&state) {
                self.stats.set_termination_reason(criterion.reason());
                break;
            }

            self.reproduce()?;
        }

        self.stats.set_runtime(start.elapsed());
        info!(
            generations = self.generation,
            evaluations = self.evaluations,
            "run finished"
        );
        let teams = self.teams.clone().ok_or(EvolutionError::EmptyPopulation)?;
        Ok(EvolutionResult::new(teams, self.generation, self.evaluations)?
            .with_stats(self.stats.clone()))
    }
}

#[cfg(feature = "parallel")]
impl<P: Policy, E: Environment> CoevolutionaryEvolution<P, E> {
    fn score_teams(&self, teams: &[Individual<P>]) -> EvoResult<Vec<Vec<Vec<f64>>>> {
        let env = &self.env;
        teams
            .par_iter()
            .map(|team| team_differences(team, env))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
impl<P: Policy, E: Environment> CoevolutionaryEvolution<P, E> {
    fn score_teams(&self, teams: &[Individual<P>]) -> EvoResult<Vec<Vec<Vec<f64>>>> {
        teams
            .iter()
            .map(|team| team_differences(team, &self.env))
            .collect()
    }
}
