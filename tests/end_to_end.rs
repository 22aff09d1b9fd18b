//! End-to-end scenarios
//!
//! Small worked examples plus full generational runs on a line environment
//! defined here and on the bundled beach domain.

use approx::assert_relative_eq;
use dmo_evo::prelude::*;
use tempfile::tempdir;

/// Each agent places itself on `[-1, 1]`; the two objectives pull in
/// opposite directions and every agent contributes positively to both.
#[derive(Clone, Debug)]
struct LineEnv {
    team_size: usize,
}

impl Environment for LineEnv {
    fn name(&self) -> &'static str {
        "line"
    }

    fn team_size(&self) -> usize {
        self.team_size
    }

    fn state_size(&self) -> usize {
        1
    }

    fn action_size(&self) -> usize {
        1
    }

    fn num_objectives(&self) -> usize {
        2
    }

    fn rollout<P: Policy>(&self, joint_policy: &[P]) -> EvoResult<Rollout> {
        if joint_policy.len() != self.team_size {
            return Err(EvolutionError::TeamSizeMismatch {
                expected: self.team_size,
                actual: joint_policy.len(),
            });
        }
        let mut trajectory = Trajectory::with_team_size(self.team_size);
        for (slot, policy) in joint_policy.iter().enumerate() {
            let action = policy.act(&[1.0]);
            trajectory.push(
                slot,
                Transition {
                    state: vec![1.0],
                    action: action.clone(),
                    position: action,
                    kind: None,
                },
            );
        }
        let rewards = self.evaluate_trajectory(&trajectory)?;
        Ok(Rollout {
            trajectory,
            rewards,
        })
    }

    fn evaluate_trajectory(&self, trajectory: &Trajectory) -> EvoResult<Vec<f64>> {
        let mut rewards = vec![0.0; 2];
        for step in trajectory.timesteps() {
            for transition in step {
                let x = transition.position[0];
                rewards[0] += (1.0 + x) / 2.0;
                rewards[1] += (1.0 - x) / 2.0;
            }
        }
        Ok(rewards)
    }
}

/// Line environment whose rollouts or re-scorings report a fixed number of
/// objectives regardless of what it advertises.
#[derive(Clone, Debug)]
struct MiscountingEnv {
    line: LineEnv,
    rollout_objectives: usize,
    rescore_objectives: usize,
}

fn resized(mut rewards: Vec<f64>, len: usize) -> Vec<f64> {
    rewards.resize(len, 0.5);
    rewards
}

impl Environment for MiscountingEnv {
    fn name(&self) -> &'static str {
        "miscounting"
    }

    fn team_size(&self) -> usize {
        self.line.team_size()
    }

    fn state_size(&self) -> usize {
        1
    }

    fn action_size(&self) -> usize {
        1
    }

    fn num_objectives(&self) -> usize {
        2
    }

    fn rollout<P: Policy>(&self, joint_policy: &[P]) -> EvoResult<Rollout> {
        let rollout = self.line.rollout(joint_policy)?;
        Ok(Rollout {
            trajectory: rollout.trajectory,
            rewards: resized(rollout.rewards, self.rollout_objectives),
        })
    }

    fn evaluate_trajectory(&self, trajectory: &Trajectory) -> EvoResult<Vec<f64>> {
        let rewards = self.line.evaluate_trajectory(trajectory)?;
        Ok(resized(rewards, self.rescore_objectives))
    }
}

fn evolution(strategy: SelectionStrategy) -> EvolutionConfig {
    EvolutionConfig::default()
        .with_population_size(6)
        .with_num_generations(2)
        .with_strategy(strategy)
        .with_seed(2024)
}

fn small_mlp() -> MlpConfig {
    MlpConfig::default().with_hidden_layers(vec![4])
}

const STRATEGIES: [SelectionStrategy; 3] = [
    SelectionStrategy::Nsga2,
    SelectionStrategy::KParent,
    SelectionStrategy::DifferenceCredit,
];

#[test]
fn test_mutually_non_dominated_points_share_a_front() {
    let points = vec![vec![1.0, 4.0], vec![2.0, 2.0], vec![4.0, 1.0]];
    let partition = fast_non_dominated_sort(&points);

    assert_eq!(partition.len(), 1);
    let mut front = partition.first().to_vec();
    front.sort_unstable();
    assert_eq!(front, vec![0, 1, 2]);
}

#[test]
fn test_dominated_point_adds_no_hypervolume() {
    let hv = Hypervolume::new(ReferencePoint::new(vec![3.0, 3.0]));

    let alone = hv.compute(&[vec![1.0, 1.0]]).unwrap();
    let both = hv.compute(&[vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();

    assert_relative_eq!(alone, 4.0);
    assert_relative_eq!(both, 4.0);
    assert_relative_eq!(hv.compute::<Vec<f64>>(&[]).unwrap(), 0.0);
}

#[test]
fn test_population_of_four_refills_to_four() {
    let mut manager = PopulationManager::<MlpPolicy, _>::new(
        evolution(SelectionStrategy::DifferenceCredit).with_population_size(4),
        LineEnv { team_size: 2 },
        small_mlp(),
    )
    .unwrap();

    manager.evaluate().unwrap();
    let parents = manager.rank_and_select().unwrap().parents.len();
    assert_eq!(parents, 2);
    manager.reproduce().unwrap();
    assert_eq!(manager.population().len(), 4);
}

#[test]
fn test_difference_values_non_negative_when_agents_only_help() {
    let env = LineEnv { team_size: 3 };
    let mut manager =
        PopulationManager::<MlpPolicy, _>::new(evolution(SelectionStrategy::Nsga2), env.clone(), small_mlp())
            .unwrap();
    manager.evaluate().unwrap();

    let credit = DifferenceCredit::new(2, 1e-6);
    let matrix = credit
        .compute(manager.population().individuals(), &env)
        .unwrap();
    assert_eq!(matrix.num_individuals(), 6);
    for i in 0..6 {
        assert!(matrix.row(i).iter().all(|&v| v >= -1e-12));
    }
}

#[test]
fn test_centralised_runs_on_line() {
    for strategy in STRATEGIES {
        let mut manager = PopulationManager::<MlpPolicy, _>::new(
            evolution(strategy),
            LineEnv { team_size: 3 },
            small_mlp(),
        )
        .unwrap();
        let result = manager.run().unwrap();

        assert_eq!(result.generations, 2);
        assert_eq!(result.population.len(), 6);
        assert_eq!(result.stats.hypervolume_history().len(), 3);
        assert!(!result.pareto_front.is_empty());
        assert!(result.pareto_front.iter().all(|i| i.is_evaluated()));
    }
}

#[test]
fn test_centralised_runs_on_beach() {
    let domain = BeachDomain::new(BeachConfig::default()).unwrap();
    for strategy in STRATEGIES {
        let mut manager = PopulationManager::<MlpPolicy, _>::new(
            evolution(strategy),
            domain.clone(),
            small_mlp().with_output_activation(OutputActivation::Softmax),
        )
        .unwrap();
        let result = manager.run().unwrap();

        assert_eq!(result.evaluations, 6 * 3);
        for individual in result.population.iter() {
            let fitness = individual.fitness().unwrap();
            assert_eq!(fitness.num_objectives(), 2);
            assert!(fitness.objectives().iter().all(|v| *v <= 0.0));
        }
        assert!(result.stats.summary().contains("Generations: 3"));
    }
}

#[test]
fn test_coevolution_runs_on_beach() {
    let domain = BeachDomain::new(BeachConfig::default()).unwrap();
    let team_size = domain.team_size();
    let mut coevolution =
        CoevolutionaryEvolution::<MlpPolicy, _>::new(evolution(SelectionStrategy::Nsga2), domain, &small_mlp())
            .unwrap();
    let result = coevolution.run().unwrap();

    assert_eq!(result.generations, 2);
    assert_eq!(coevolution.num_subpopulations(), team_size);
    assert!(result.population.iter().all(|team| team.team_size() == team_size));
}

#[test]
fn test_experiment_from_json() {
    let json = r#"{
        "evolution": { "population_size": 4, "num_generations": 1, "strategy": "k_parent" },
        "policy": { "hidden_layers": [3] },
        "domain": { "domain": "beach", "episode_length": 3 }
    }"#;
    let config = ExperimentConfig::from_json_str(json).unwrap();
    let env = config.domain.beach().unwrap();

    let mut manager =
        PopulationManager::<MlpPolicy, _>::new(config.evolution, env, config.policy).unwrap();
    let result = manager.run().unwrap();
    assert_eq!(result.generations, 1);
    assert_eq!(result.evaluations, 8);
}

#[test]
fn test_json_lines_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.jsonl");

    let recorder = JsonLinesRecorder::create(&path).unwrap();
    let mut manager = PopulationManager::<MlpPolicy, _>::new(
        evolution(SelectionStrategy::DifferenceCredit).with_trajectory_log_interval(5),
        LineEnv { team_size: 2 },
        small_mlp(),
    )
    .unwrap()
    .with_recorder(Box::new(recorder));
    let result = manager.run().unwrap();
    drop(manager);

    let records = read_json_lines(&path).unwrap();
    assert_eq!(records.len(), result.evaluations);
    for record in &records {
        let logged = record.generation == 0 || record.generation == 2;
        assert_eq!(record.trajectory.is_some(), logged);
        assert!(record.fitness().objectives().iter().all(|v| *v < 0.0));
    }
}

#[cfg(feature = "checkpoint")]
#[test]
fn test_checkpoint_round_trip_and_resume() {
    let dir = tempdir().unwrap();
    let mut checkpoints = CheckpointManager::new(dir.path(), "line").every(1);

    let config = evolution(SelectionStrategy::DifferenceCredit).with_num_generations(4);
    let mut manager =
        PopulationManager::<MlpPolicy, _>::new(config.clone(), LineEnv { team_size: 2 }, small_mlp())
            .unwrap();
    for _ in 0..2 {
        manager.step().unwrap();
        if checkpoints.should_save(manager.generation()) {
            checkpoints.save(&manager.checkpoint().unwrap()).unwrap();
        }
    }

    let checkpoint: Checkpoint<MlpPolicy> = checkpoints.load_latest().unwrap().unwrap();
    assert_eq!(checkpoint.generation, 2);
    assert_eq!(checkpoint.next_id, manager.id_counter().peek());
    assert_eq!(checkpoint.metadata.get("domain").map(String::as_str), Some("line"));

    let mut resumed =
        PopulationManager::from_checkpoint(config, LineEnv { team_size: 2 }, small_mlp(), checkpoint)
            .unwrap();
    let result = resumed.run().unwrap();
    assert_eq!(result.generations, 4);
    assert_eq!(result.stats.num_generations(), 5);
    assert_eq!(result.evaluations, 6 * 5);
}

#[test]
fn test_any_of_stops_run_early() {
    let mut manager = PopulationManager::<MlpPolicy, _>::new(
        evolution(SelectionStrategy::Nsga2).with_mutation(0.0, 0.0),
        LineEnv { team_size: 2 },
        small_mlp(),
    )
    .unwrap();
    let criteria: Vec<Box<dyn TerminationCriterion>> = vec![
        Box::new(MaxGenerations::new(50)),
        Box::new(MaxEvaluations::new(30)),
    ];
    let criterion = AnyOf::new(criteria);
    let result = manager.run_until(&criterion).unwrap();

    assert!(result.evaluations >= 30);
    assert!(result.generations < 50);
    assert_eq!(
        result.stats.termination_reason.as_deref(),
        Some("One of multiple criteria met")
    );
}

#[test]
fn test_wrong_objective_count_aborts_evaluation() {
    let env = MiscountingEnv {
        line: LineEnv { team_size: 2 },
        rollout_objectives: 3,
        rescore_objectives: 2,
    };
    let mut manager = PopulationManager::<MlpPolicy, _>::new(
        evolution(SelectionStrategy::Nsga2).with_parallel_evaluation(false),
        env,
        small_mlp(),
    )
    .unwrap();

    let err = manager.step().unwrap_err();
    assert!(matches!(
        err,
        EvolutionError::ObjectiveMismatch {
            expected: 2,
            actual: 3
        }
    ));
    assert_eq!(manager.state(), GenerationState::Initialized);
    assert_eq!(manager.generation(), 0);
    assert_eq!(manager.evaluations(), 0);
    assert_eq!(manager.stats().num_generations(), 0);
    assert_eq!(manager.population().len(), 6);
    assert!(manager.population().iter().all(|i| !i.is_evaluated()));
}

#[test]
fn test_failed_counterfactual_keeps_evaluated_population() {
    let env = MiscountingEnv {
        line: LineEnv { team_size: 2 },
        rollout_objectives: 2,
        rescore_objectives: 3,
    };
    let mut manager = PopulationManager::<MlpPolicy, _>::new(
        evolution(SelectionStrategy::DifferenceCredit),
        env,
        small_mlp(),
    )
    .unwrap();
    manager.evaluate().unwrap();

    for _ in 0..2 {
        let err = manager.rank_and_select().unwrap_err();
        assert!(matches!(err, EvolutionError::ObjectiveMismatch { .. }));
        assert_eq!(manager.state(), GenerationState::Evaluated);
        assert_eq!(manager.population().len(), 6);
        assert!(manager.population().iter().all(|i| i.is_evaluated()));
    }
    assert!(manager.selection().is_none());
}

#[test]
fn test_invalid_policy_config_rejected() {
    let config = small_mlp().with_init_limits(f64::NAN, 0.5);
    let result = PopulationManager::<MlpPolicy, _>::new(
        evolution(SelectionStrategy::Nsga2),
        LineEnv { team_size: 2 },
        config,
    );
    assert!(matches!(result, Err(EvolutionError::Configuration(_))));
}
