//! Pareto dominance and non-dominated sorting
//!
//! All comparisons follow the internal convention: every objective is minimised.
//!
//! Reference: Deb, K., Pratap, A., Agarwal, S., & Meyarivan, T. (2002).
//! A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II.
//! IEEE Transactions on Evolutionary Computation, 6(2).

use std::cmp::Ordering;

/// Check whether `a` dominates `b`
/// (all objectives <= and at least one <, since we minimize)
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let at_least_as_good = a.iter().zip(b.iter()).all(|(x, y)| x <= y);
    let strictly_better = a.iter().zip(b.iter()).any(|(x, y)| x < y);
    at_least_as_good && strictly_better
}

/// Ordered partition of a point set into non-dominated fronts
///
/// `fronts()[0]` holds the indices of the non-dominated points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontPartition {
    fronts: Vec<Vec<usize>>,
    ranks: Vec<usize>,
}

impl FrontPartition {
    /// The fronts, best first
    pub fn fronts(&self) -> &[Vec<usize>] {
        &self.fronts
    }

    /// Consume the partition, returning the fronts
    pub fn into_fronts(self) -> Vec<Vec<usize>> {
        self.fronts
    }

    /// Rank (front index) of each point, indexed like the input
    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Rank of a single point
    pub fn rank_of(&self, index: usize) -> Option<usize> {
        self.ranks.get(index).copied()
    }

    /// Number of fronts
    pub fn len(&self) -> usize {
        self.fronts.len()
    }

    /// True when the input was empty
    pub fn is_empty(&self) -> bool {
        self.fronts.is_empty()
    }

    /// Indices of the first (non-dominated) front
    pub fn first(&self) -> &[usize] {
        self.fronts.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Fast non-dominated sort
///
/// Identical points never dominate each other and land in the same front.
pub fn fast_non_dominated_sort<T: AsRef<[f64]>>(points: &[T]) -> FrontPartition {
    let n = points.len();
    if n == 0 {
        return FrontPartition::default();
    }

    // domination_count[i] = number of points that dominate i
    let mut domination_count = vec![0usize; n];
    // dominated_set[i] = points that i dominates
    let mut dominated_set: Vec<Vec<usize>> = vec![vec![]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (points[i].as_ref(), points[j].as_ref());
            if dominates(a, b) {
                dominated_set[i].push(j);
                domination_count[j] += 1;
            } else if dominates(b, a) {
                dominated_set[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut ranks = vec![usize::MAX; n];
    let mut fronts: Vec<Vec<usize>> = vec![];
    let mut current_front: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();

    let mut rank = 0;
    while !current_front.is_empty() {
        for &i in &current_front {
            ranks[i] = rank;
        }

        let mut next_front = vec![];
        for &i in &current_front {
            for &j in &dominated_set[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next_front.push(j);
                }
            }
        }
        next_front.sort_unstable();

        fronts.push(current_front);
        current_front = next_front;
        rank += 1;
    }

    FrontPartition { fronts, ranks }
}

/// Crowding distance of each member of `front`, returned in `front` order
pub fn crowding_distance<T: AsRef<[f64]>>(points: &[T], front: &[usize]) -> Vec<f64> {
    let n = front.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let mut distance = vec![0.0; n];
    let num_objectives = points[front[0]].as_ref().len();

    for obj in 0..num_objectives {
        // Positions into `front`, sorted by this objective
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            points[front[a]].as_ref()[obj]
                .partial_cmp(&points[front[b]].as_ref()[obj])
                .unwrap_or(Ordering::Equal)
        });

        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;

        let obj_min = points[front[order[0]]].as_ref()[obj];
        let obj_max = points[front[order[n - 1]]].as_ref()[obj];
        let obj_range = obj_max - obj_min;

        if obj_range > 0.0 {
            for k in 1..(n - 1) {
                let prev_val = points[front[order[k - 1]]].as_ref()[obj];
                let next_val = points[front[order[k + 1]]].as_ref()[obj];
                distance[order[k]] += (next_val - prev_val) / obj_range;
            }
        }
    }

    distance
}

/// Crowded comparison operator
///
/// Returns true if `(rank_a, crowd_a)` is better than `(rank_b, crowd_b)`
/// (lower rank, or same rank with higher crowding distance).
pub fn crowded_comparison(rank_a: usize, crowd_a: f64, rank_b: usize, crowd_b: f64) -> bool {
    rank_a < rank_b || (rank_a == rank_b && crowd_a > crowd_b)
}

/// Multi-objective population sort
///
/// Orders point indices by non-domination rank, breaking ties inside a front by
/// descending crowding distance. Equal keys keep their input order.
pub fn sort_population_mo<T: AsRef<[f64]>>(points: &[T]) -> Vec<usize> {
    let partition = fast_non_dominated_sort(points);
    let mut crowding = vec![0.0; points.len()];
    for front in partition.fronts() {
        for (&i, d) in front.iter().zip(crowding_distance(points, front)) {
            crowding[i] = d;
        }
    }

    let ranks = partition.ranks();
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        if crowded_comparison(ranks[a], crowding[a], ranks[b], crowding[b]) {
            Ordering::Less
        } else if crowded_comparison(ranks[b], crowding[b], ranks[a], crowding[a]) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    order
}
