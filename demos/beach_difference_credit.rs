//! Difference-credit evolution on the beach domain
//!
//! Runs the centralised population manager with each selection strategy and
//! prints the first-front hypervolume per generation. An experiment file can
//! be passed as the first argument; otherwise the defaults are used.
//!
//! ```text
//! RUST_LOG=dmo_evo=info cargo run --example beach_difference_credit -- experiment.json
//! ```

use dmo_evo::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Difference-Credit Evolution: Beach Domain ===\n");

    let experiment = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::from_path(path)?,
        None => {
            let mut config = ExperimentConfig::default();
            config.evolution = config
                .evolution
                .with_population_size(20)
                .with_num_generations(15)
                .with_trajectory_log_interval(5);
            config.policy = config
                .policy
                .with_output_activation(OutputActivation::Softmax);
            config
        }
    };

    let output_dir = PathBuf::from("/tmp/dmo_evo_beach");
    std::fs::create_dir_all(&output_dir)?;

    for strategy in [
        SelectionStrategy::Nsga2,
        SelectionStrategy::KParent,
        SelectionStrategy::DifferenceCredit,
    ] {
        let env = experiment.domain.beach()?;
        println!(
            "--- {} ({} agents, {} sections) ---",
            strategy.name(),
            env.team_size(),
            env.num_sections()
        );

        let records = output_dir.join(format!("{}.jsonl", strategy.name()));
        let mut manager = PopulationManager::<MlpPolicy, _>::new(
            experiment.evolution.clone().with_strategy(strategy),
            env,
            experiment.policy.clone(),
        )?
        .with_recorder(Box::new(JsonLinesRecorder::create(&records)?));

        let result = manager.run()?;

        for stats in &result.stats.generations {
            println!(
                "Gen {:3}: hypervolume = {:.4}, front = {:2}, fronts = {:2}",
                stats.generation, stats.hypervolume, stats.front_size, stats.num_fronts
            );
        }

        println!("\n{}", result.stats.summary());
        println!("Pareto front (capacity, mixture):");
        for individual in &result.pareto_front {
            if let Some(fitness) = individual.fitness() {
                let rewards = fitness.to_rewards();
                println!("  #{:<5} {:8.4} {:8.4}", individual.id, rewards[0], rewards[1]);
            }
        }
        println!("Records written to {}\n", records.display());
    }

    Ok(())
}
