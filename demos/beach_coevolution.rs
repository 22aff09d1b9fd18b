//! Coevolution on the beach domain
//!
//! One subpopulation per tourist, each ranked by its members' difference
//! vectors. Checkpoints the centralised run halfway through and resumes it,
//! for comparison against the coevolutionary run.

use dmo_evo::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Coevolution: Beach Domain ===\n");

    let evolution = EvolutionConfig::default()
        .with_population_size(16)
        .with_num_generations(20);
    let policy = MlpConfig::default()
        .with_hidden_layers(vec![8])
        .with_output_activation(OutputActivation::Softmax);

    let env = BeachDomain::new(BeachConfig::default())?;
    let mut coevolution =
        CoevolutionaryEvolution::<MlpPolicy, _>::new(evolution.clone(), env.clone(), &policy)?;
    let coevolved = coevolution.run()?;
    println!("Coevolution:\n{}\n", coevolved.stats.summary());

    let checkpoint_dir = PathBuf::from("/tmp/dmo_evo_checkpoints");
    if checkpoint_dir.exists() {
        std::fs::remove_dir_all(&checkpoint_dir)?;
    }
    let mut checkpoints = CheckpointManager::new(&checkpoint_dir, "beach")
        .every(10)
        .keep(2);

    let mut manager =
        PopulationManager::<MlpPolicy, _>::new(evolution.clone(), env.clone(), policy.clone())?;
    while manager.generation() < 10 {
        manager.step()?;
        if checkpoints.should_save(manager.generation()) {
            checkpoints.save(&manager.checkpoint()?)?;
            println!("Checkpoint saved at generation {}", manager.generation());
        }
    }
    drop(manager);

    let checkpoint: Checkpoint<MlpPolicy> = checkpoints
        .load_latest()?
        .ok_or("no checkpoint written")?;
    println!("Resuming from generation {}", checkpoint.generation);

    let mut resumed = PopulationManager::from_checkpoint(evolution, env, policy, checkpoint)?;
    let centralised = resumed.run()?;
    println!("Difference credit (resumed):\n{}\n", centralised.stats.summary());

    println!(
        "Final hypervolume: coevolution {:.4}, difference credit {:.4}",
        coevolved.stats.final_hypervolume().unwrap_or(0.0),
        centralised.stats.final_hypervolume().unwrap_or(0.0)
    );

    std::fs::remove_dir_all(&checkpoint_dir)?;
    Ok(())
}
