//! Ranking and reproduction strategies
//!
//! Every centralised variant ranks the evaluated population the same way
//! (non-domination rank, then crowding distance) and keeps the better half.
//! They differ in how parents for each offspring are drawn from that half:
//!
//! - [`SelectionStrategy::Nsga2`]: whole-individual binary tournament on sorted position
//! - [`SelectionStrategy::KParent`]: per-slot binary tournament on sorted position
//! - [`SelectionStrategy::DifferenceCredit`]: per-slot binary tournament on difference values

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credit::difference::{DifferenceCredit, DifferenceMatrix};
use crate::env::traits::Environment;
use crate::error::{EvoResult, EvolutionError};
use crate::operators::crossover::SbxCrossover;
use crate::operators::mutation::PerturbationMutation;
use crate::operators::selection::{positional_scores, TournamentSelection};
use crate::operators::traits::SelectionOperator;
use crate::pareto::dominance::sort_population_mo;
use crate::policy::traits::Policy;
use crate::population::individual::{IdCounter, Individual};
use crate::population::population::fitnesses_of;

/// Which parent-selection rule a centralised run uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Plain NSGA-II
    Nsga2,
    /// NSGA-II with per-slot compound parents
    KParent,
    /// Per-slot compound parents steered by difference credit
    #[default]
    DifferenceCredit,
}

/// How offspring parents are drawn from the parent set
#[derive(Clone, Debug, PartialEq)]
pub enum ReproductionHints {
    /// Parents are stored best-first; lower position wins tournaments
    SortedOrder {
        /// Draw a separate parent for every team slot
        per_slot: bool,
    },
    /// Per-slot tournaments compare difference values
    Difference(DifferenceMatrix),
}

/// Output of ranking: the retained parent set plus how to breed from it
#[derive(Clone, Debug)]
pub struct Selection<P: Policy> {
    /// The better half of the population, best-first
    pub parents: Vec<Individual<P>>,
    /// Reproduction hints for the parent set
    pub hints: ReproductionHints,
}

impl SelectionStrategy {
    /// Config-facing name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nsga2 => "nsga2",
            Self::KParent => "k_parent",
            Self::DifferenceCredit => "difference_credit",
        }
    }

    /// Rank the evaluated population, keep the better half, and prepare hints
    ///
    /// Difference values are computed over the retained parent set, which is
    /// partitioned into its own fronts.
    pub fn rank_and_select<P: Policy, E: Environment>(
        &self,
        population: Vec<Individual<P>>,
        env: &E,
        credit: &DifferenceCredit,
    ) -> EvoResult<Selection<P>> {
        if population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }

        let order = {
            let fitnesses = fitnesses_of(&population)?;
            sort_population_mo(&fitnesses)
        };
        let keep = population.len() / 2;

        let mut slots: Vec<Option<Individual<P>>> = population.into_iter().map(Some).collect();
        let parents: Vec<Individual<P>> = order
            .into_iter()
            .take(keep)
            .filter_map(|i| slots[i].take())
            .collect();

        let hints = match self {
            Self::Nsga2 => ReproductionHints::SortedOrder { per_slot: false },
            Self::KParent => ReproductionHints::SortedOrder { per_slot: true },
            Self::DifferenceCredit => ReproductionHints::Difference(credit.compute(&parents, env)?),
        };

        debug!(strategy = self.name(), parents = parents.len(), "population ranked");
        Ok(Selection { parents, hints })
    }
}

/// Offspring construction shared by all strategies
#[derive(Clone, Debug)]
pub struct Reproduction {
    /// Crossover applied slot by slot to compound parents
    pub crossover: SbxCrossover,
    /// Mutation applied to every offspring
    pub mutation: PerturbationMutation,
    /// Parent tournament
    pub tournament: TournamentSelection,
}

impl Reproduction {
    /// Binary-tournament reproduction with the given operators
    pub fn new(crossover: SbxCrossover, mutation: PerturbationMutation) -> Self {
        Self {
            crossover,
            mutation,
            tournament: TournamentSelection::binary(),
        }
    }

    /// Breed offspring until parents plus offspring reach `target_size`
    ///
    /// Each iteration builds two compound parents, crosses them, and mutates
    /// both children; the second child is kept only if there is room.
    pub fn offspring<P: Policy, R: Rng + ?Sized>(
        &self,
        selection: &Selection<P>,
        target_size: usize,
        generation: usize,
        ids: &IdCounter,
        rng: &mut R,
    ) -> EvoResult<Vec<Individual<P>>> {
        let parents = &selection.parents;
        let needed = target_size.saturating_sub(parents.len());
        if needed > 0 && parents.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }

        let team_size = parents.first().map_or(0, Individual::team_size);
        let order_scores = positional_scores(parents.len());
        let slot_scores: Vec<Vec<f64>> = match &selection.hints {
            ReproductionHints::Difference(matrix) => {
                (0..team_size).map(|slot| matrix.column(slot)).collect()
            }
            ReproductionHints::SortedOrder { per_slot: true } => {
                vec![order_scores.clone(); team_size]
            }
            ReproductionHints::SortedOrder { per_slot: false } => Vec::new(),
        };

        let mut offspring = Vec::with_capacity(needed);
        while offspring.len() < needed {
            let (parent1, parent2) = match &selection.hints {
                ReproductionHints::SortedOrder { per_slot: false } => {
                    let a = self.tournament.select(&order_scores, rng)?;
                    let b = self.tournament.select(&order_scores, rng)?;
                    (parents[a].clone(), parents[b].clone())
                }
                _ => (
                    self.compound_parent(parents, &slot_scores, rng)?,
                    self.compound_parent(parents, &slot_scores, rng)?,
                ),
            };

            let (mut child1, mut child2) = self
                .crossover
                .crossover_individuals(&parent1, &parent2, ids, rng)?;
            self.mutation.mutate_individual(&mut child1, rng)?;
            self.mutation.mutate_individual(&mut child2, rng)?;

            offspring.push(child1.with_generation(generation));
            if offspring.len() < needed {
                offspring.push(child2.with_generation(generation));
            }
        }

        Ok(offspring)
    }

    /// Assemble a joint policy slot by slot, each slot from its own tournament
    fn compound_parent<P: Policy, R: Rng + ?Sized>(
        &self,
        parents: &[Individual<P>],
        slot_scores: &[Vec<f64>],
        rng: &mut R,
    ) -> EvoResult<Individual<P>> {
        let joint_policy = slot_scores
            .iter()
            .enumerate()
            .map(|(slot, scores)| {
                let winner = self.tournament.select(scores, rng)?;
                parents[winner]
                    .policy(slot)
                    .cloned()
                    .ok_or(EvolutionError::TeamSizeMismatch {
                        expected: slot + 1,
                        actual: parents[winner].team_size(),
                    })
            })
            .collect::<EvoResult<Vec<P>>>()?;
        Ok(Individual::unassigned(joint_policy))
    }
}
