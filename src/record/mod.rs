//! Evaluation records
//!
//! One record per evaluated individual per generation, written to an
//! append-only sink. Trajectories are large, so a [`TrajectoryLogPolicy`]
//! decides in which generations they are kept.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::env::traits::Trajectory;
use crate::error::{EvoResult, EvolutionError};
use crate::fitness::traits::Fitness;
use crate::policy::traits::Policy;
use crate::population::individual::Individual;

/// A single evaluation, as persisted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Generation the rollout belongs to
    pub generation: usize,
    /// Id of the evaluated individual
    pub individual_id: i64,
    /// Fitness (internal lower-is-better convention)
    pub fitness: Vec<f64>,
    /// Full per-agent trajectory, when logged
    pub trajectory: Option<Trajectory>,
}

impl EvaluationRecord {
    /// Build a record from an evaluated individual
    pub fn from_individual<P: Policy>(
        individual: &Individual<P>,
        generation: usize,
        include_trajectory: bool,
    ) -> EvoResult<Self> {
        let fitness = individual.fitness().ok_or(EvolutionError::InvalidState {
            expected: "evaluated",
            found: "unevaluated",
        })?;
        Ok(Self {
            generation,
            individual_id: individual.id,
            fitness: fitness.objectives().to_vec(),
            trajectory: if include_trajectory {
                individual.trajectory.clone()
            } else {
                None
            },
        })
    }

    /// The recorded fitness as a [`Fitness`]
    pub fn fitness(&self) -> Fitness {
        Fitness::new(self.fitness.clone())
    }
}

/// Destination for evaluation records
pub trait RecordSink: Send {
    /// Append one record
    fn record(&mut self, record: &EvaluationRecord) -> EvoResult<()>;

    /// Push buffered records to their destination
    fn flush(&mut self) -> EvoResult<()> {
        Ok(())
    }
}

/// When trajectories are kept in records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryLogPolicy {
    /// Keep trajectories every `interval` generations (generation 0 included)
    pub interval: Option<usize>,
    /// Always keep trajectories for this generation
    pub final_generation: Option<usize>,
}

impl TrajectoryLogPolicy {
    /// Never keep trajectories
    pub fn never() -> Self {
        Self::default()
    }

    /// Keep trajectories every `interval` generations
    pub fn every(interval: usize) -> Self {
        Self {
            interval: Some(interval),
            final_generation: None,
        }
    }

    /// Also keep trajectories for the given final generation
    pub fn with_final(mut self, generation: usize) -> Self {
        self.final_generation = Some(generation);
        self
    }

    /// Whether records of this generation carry trajectories
    pub fn includes(&self, generation: usize) -> bool {
        let periodic = self
            .interval
            .is_some_and(|n| n > 0 && generation % n == 0);
        periodic || self.final_generation == Some(generation)
    }
}

/// Append-only JSON-lines file
#[derive(Debug)]
pub struct JsonLinesRecorder {
    writer: BufWriter<File>,
}

impl JsonLinesRecorder {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> EvoResult<Self> {
        let file = File::create(path.as_ref()).map_err(|e| EvolutionError::Record(e.to_string()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append to the file at `path`, creating it if needed
    pub fn append(path: impl AsRef<Path>) -> EvoResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|e| EvolutionError::Record(e.to_string()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl RecordSink for JsonLinesRecorder {
    fn record(&mut self, record: &EvaluationRecord) -> EvoResult<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| EvolutionError::Record(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| EvolutionError::Record(e.to_string()))
    }

    fn flush(&mut self) -> EvoResult<()> {
        self.writer
            .flush()
            .map_err(|e| EvolutionError::Record(e.to_string()))
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Clone, Debug, Default)]
pub struct MemoryRecorder {
    records: Arc<Mutex<Vec<EvaluationRecord>>>,
}

impl MemoryRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<EvaluationRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of records so far
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemoryRecorder {
    fn record(&mut self, record: &EvaluationRecord) -> EvoResult<()> {
        self.records
            .lock()
            .map_err(|e| EvolutionError::Record(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Read every record from a JSON-lines file
pub fn read_json_lines(path: impl AsRef<Path>) -> EvoResult<Vec<EvaluationRecord>> {
    let contents =
        std::fs::read_to_string(path.as_ref()).map_err(|e| EvolutionError::Record(e.to_string()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| EvolutionError::Record(e.to_string())))
        .collect()
}

pub mod prelude {
    pub use super::{
        read_json_lines, EvaluationRecord, JsonLinesRecorder, MemoryRecorder, RecordSink,
        TrajectoryLogPolicy,
    };
}
