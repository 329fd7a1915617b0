//! Parameter search
//!
//! The [`ParameterTuner`] looks for the (granularity, broadcast rate, worker
//! count) combination with the lowest elapsed time by re-running the pipeline
//! through an [`Evaluator`]. The search has two stages:
//!
//! 1. **Exploration**: evaluate `samples` points drawn uniformly from the
//!    configured bounds.
//! 2. **Refinement**: starting from the rounded mean of the samples, run a
//!    compass search on the integer lattice. Each sweep probes `+step` and
//!    `-step` along every axis and moves to the first improving probe; a sweep
//!    without improvement halves the steps. The search ends when every step is
//!    1 and no probe improves, or when the evaluation budget is spent.
//!
//! The result is the best point seen in either stage. Elapsed times are noisy
//! and the search is local, so it carries no optimality guarantee.
//!
//! # Example
//!
//! ```
//! use gramsync::config::{Bounds, RunParameters, TunerConfig};
//! use gramsync::tuner::{Evaluator, ParameterTuner};
//!
//! struct Bowl;
//!
//! impl Evaluator for Bowl {
//!     fn evaluate(&mut self, p: RunParameters) -> anyhow::Result<f64> {
//!         let g = p.granularity as f64 - 6.0;
//!         let w = p.workers as f64 - 3.0;
//!         Ok(1.0 + g * g + w * w + p.broadcast_rate as f64)
//!     }
//! }
//!
//! let config = TunerConfig {
//!     samples: 4,
//!     max_evaluations: 100,
//!     seed: Some(7),
//!     granularity: Bounds::new(1, 12),
//!     broadcast_rate: Bounds::new(1, 5),
//!     workers: Bounds::new(1, 6),
//! };
//!
//! let outcome = ParameterTuner::new(&config).tune(&mut Bowl)?;
//! assert_eq!(outcome.best.params.granularity, 6);
//! assert_eq!(outcome.best.params.broadcast_rate, 1);
//! assert_eq!(outcome.best.params.workers, 3);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod evaluator;
pub mod sampler;

pub use evaluator::PipelineEvaluator;
pub use sampler::UniformSampler;

use crate::config::{Bounds, RunParameters, TunerConfig};
use crate::Result;
use log::{debug, info, trace};
use std::collections::HashMap;

/// Runs the system under test for one parameter combination
pub trait Evaluator {
    /// Elapsed seconds of a run with `params`
    fn evaluate(&mut self, params: RunParameters) -> Result<f64>;
}

impl<F> Evaluator for F
where
    F: FnMut(RunParameters) -> Result<f64>,
{
    fn evaluate(&mut self, params: RunParameters) -> Result<f64> {
        self(params)
    }
}

/// One observation of the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterPoint {
    pub params: RunParameters,
    /// Elapsed seconds
    pub elapsed: f64,
}

/// Inclusive bounds of the three search axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSpace {
    pub granularity: Bounds,
    pub broadcast_rate: Bounds,
    pub workers: Bounds,
}

/// Lattice coordinates, in axis order granularity, broadcast rate, workers
type Coords = [i64; 3];

impl SearchSpace {
    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            granularity: config.granularity,
            broadcast_rate: config.broadcast_rate,
            workers: config.workers,
        }
    }

    fn axes(&self) -> [Bounds; 3] {
        [self.granularity, self.broadcast_rate, self.workers]
    }

    fn coords(params: &RunParameters) -> Coords {
        [
            params.granularity as i64,
            params.broadcast_rate as i64,
            params.workers as i64,
        ]
    }

    /// The lattice point at `coords`, clamped into the bounds
    fn point(&self, coords: Coords) -> RunParameters {
        RunParameters {
            granularity: self.granularity.clamp(coords[0]),
            broadcast_rate: self.broadcast_rate.clamp(coords[1]),
            workers: self.workers.clamp(coords[2]) as usize,
        }
    }

    /// Rounded coordinate-wise mean of `points`
    fn mean(&self, points: &[ParameterPoint]) -> RunParameters {
        let n = points.len().max(1) as f64;
        let mut sums = [0.0f64; 3];
        for p in points {
            for (sum, c) in sums.iter_mut().zip(Self::coords(&p.params)) {
                *sum += c as f64;
            }
        }
        self.point(sums.map(|s| (s / n).round() as i64))
    }

    /// Initial compass steps: a quarter of each axis, at least 1
    fn initial_steps(&self) -> Coords {
        self.axes().map(|b| ((b.width() / 4).max(1)) as i64)
    }
}

/// Result of a parameter search
#[derive(Debug, Clone)]
pub struct TuningOutcome {
    /// Lowest elapsed time seen
    pub best: ParameterPoint,

    /// Stage 1 observations, in draw order
    pub samples: Vec<ParameterPoint>,

    /// Every distinct point evaluated, in evaluation order
    pub history: Vec<ParameterPoint>,
}

impl TuningOutcome {
    /// Number of evaluator calls the search made
    pub fn evaluations(&self) -> usize {
        self.history.len()
    }
}

/// Two-stage search over the run parameters
pub struct ParameterTuner {
    space: SearchSpace,
    samples: usize,
    max_evaluations: usize,
    sampler: UniformSampler,
}

/// Evaluation bookkeeping of one search
struct Session<'e, E: Evaluator + ?Sized> {
    evaluator: &'e mut E,
    budget: usize,
    cache: HashMap<RunParameters, f64>,
    history: Vec<ParameterPoint>,
}

impl<'e, E: Evaluator + ?Sized> Session<'e, E> {
    fn exhausted(&self) -> bool {
        self.history.len() >= self.budget
    }

    /// Elapsed time of `params`; `None` once the budget is spent
    ///
    /// Points evaluated before are answered from the cache and cost nothing.
    fn evaluate(&mut self, params: RunParameters) -> Result<Option<f64>> {
        if let Some(&elapsed) = self.cache.get(&params) {
            return Ok(Some(elapsed));
        }
        if self.exhausted() {
            return Ok(None);
        }

        let elapsed = self.evaluator.evaluate(params)?;
        debug!("evaluated {}: {:.4}s", params, elapsed);
        self.cache.insert(params, elapsed);
        self.history.push(ParameterPoint { params, elapsed });
        Ok(Some(elapsed))
    }
}

impl ParameterTuner {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            space: SearchSpace::from_config(config),
            samples: config.samples,
            max_evaluations: config.max_evaluations,
            sampler: UniformSampler::from_seed(config.seed),
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Run both search stages against `evaluator`
    ///
    /// Evaluator errors abort the search.
    pub fn tune<E: Evaluator + ?Sized>(&mut self, evaluator: &mut E) -> Result<TuningOutcome> {
        if self.samples == 0 || self.max_evaluations == 0 {
            anyhow::bail!("tuning needs at least one sample and one evaluation");
        }
        for (name, bounds) in [
            ("granularity", self.space.granularity),
            ("broadcast_rate", self.space.broadcast_rate),
            ("workers", self.space.workers),
        ] {
            if bounds.min > bounds.max {
                anyhow::bail!("{} range is empty: min {} > max {}", name, bounds.min, bounds.max);
            }
        }

        let mut session = Session {
            evaluator,
            budget: self.max_evaluations,
            cache: HashMap::new(),
            history: Vec::new(),
        };

        // Stage 1
        let mut samples = Vec::with_capacity(self.samples);
        for _ in 0..self.samples {
            let params = self.sampler.next_point(&self.space);
            match session.evaluate(params)? {
                Some(elapsed) => samples.push(ParameterPoint { params, elapsed }),
                None => break,
            }
        }
        info!("Sampled {} points", samples.len());

        // Stage 2
        self.refine(&mut session, &samples)?;

        let best = session
            .history
            .iter()
            .copied()
            .min_by(|a, b| a.elapsed.total_cmp(&b.elapsed))
            .ok_or_else(|| anyhow::anyhow!("no point was evaluated"))?;
        info!(
            "Best after {} evaluations: {} ({:.4}s)",
            session.history.len(),
            best.params,
            best.elapsed
        );

        Ok(TuningOutcome {
            best,
            samples,
            history: session.history,
        })
    }

    /// Compass search from the rounded mean of the samples
    fn refine<E: Evaluator + ?Sized>(
        &self,
        session: &mut Session<'_, E>,
        samples: &[ParameterPoint],
    ) -> Result<()> {
        let start = self.space.mean(samples);
        let mut current = match session.evaluate(start)? {
            Some(elapsed) => ParameterPoint {
                params: start,
                elapsed,
            },
            None => return Ok(()),
        };
        log_residual(&current, samples);

        let mut steps = self.space.initial_steps();
        loop {
            let mut improved = false;

            'axes: for axis in 0..3 {
                for direction in [1, -1] {
                    let mut coords = SearchSpace::coords(&current.params);
                    coords[axis] += direction * steps[axis];
                    let probe = self.space.point(coords);
                    if probe == current.params {
                        continue;
                    }

                    let elapsed = match session.evaluate(probe)? {
                        Some(elapsed) => elapsed,
                        None => break 'axes,
                    };
                    let candidate = ParameterPoint {
                        params: probe,
                        elapsed,
                    };
                    log_residual(&candidate, samples);

                    if elapsed < current.elapsed {
                        current = candidate;
                        improved = true;
                        continue 'axes;
                    }
                }
            }

            if session.exhausted() && !improved {
                debug!("evaluation budget spent");
                break;
            }
            if !improved {
                if steps.iter().all(|&s| s == 1) {
                    debug!("compass search converged at {}", current.params);
                    break;
                }
                steps = steps.map(|s| (s / 2).max(1));
                trace_steps(&steps);
            }
        }
        Ok(())
    }
}

fn trace_steps(steps: &Coords) {
    trace!(
        "compass steps: granularity {}, broadcast_rate {}, workers {}",
        steps[0],
        steps[1],
        steps[2]
    );
}

/// Log how far a candidate lands from the closest stage 1 sample
fn log_residual(candidate: &ParameterPoint, samples: &[ParameterPoint]) {
    if let Some(nearest) = nearest_sample(&candidate.params, samples) {
        debug!(
            "{}: residual {:+.4}s against nearest sample {}",
            candidate.params,
            candidate.elapsed - nearest.elapsed,
            nearest.params
        );
    }
}

/// Stage 1 sample closest to `params` in squared lattice distance
fn nearest_sample<'a>(
    params: &RunParameters,
    samples: &'a [ParameterPoint],
) -> Option<&'a ParameterPoint> {
    let target = SearchSpace::coords(params);
    samples.iter().min_by_key(|s| {
        SearchSpace::coords(&s.params)
            .iter()
            .zip(target)
            .map(|(&a, b)| (a - b) * (a - b))
            .sum::<i64>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(samples: usize, max_evaluations: usize, seed: u64) -> TunerConfig {
        TunerConfig {
            samples,
            max_evaluations,
            seed: Some(seed),
            granularity: Bounds::new(1, 20),
            broadcast_rate: Bounds::new(1, 10),
            workers: Bounds::new(1, 8),
        }
    }

    /// Separable bowl with its minimum at granularity 7, rate 3, 4 workers
    fn bowl(p: RunParameters) -> Result<f64> {
        let g = p.granularity as f64 - 7.0;
        let b = p.broadcast_rate as f64 - 3.0;
        let w = p.workers as f64 - 4.0;
        Ok(1.0 + g * g + 2.0 * b * b + 0.5 * w * w)
    }

    #[test]
    fn test_converges_to_interior_minimum() {
        for seed in [1, 42, 2024] {
            let mut evaluator = bowl;
            let outcome = ParameterTuner::new(&config(6, 200, seed))
                .tune(&mut evaluator)
                .unwrap();

            assert_eq!(
                outcome.best.params,
                RunParameters {
                    workers: 4,
                    granularity: 7,
                    broadcast_rate: 3
                },
                "seed {}",
                seed
            );
            assert_eq!(outcome.best.elapsed, 1.0);
            assert_eq!(outcome.samples.len(), 6);
        }
    }

    #[test]
    fn test_budget_is_respected() {
        let mut calls = 0usize;
        let mut evaluator = |p: RunParameters| {
            calls += 1;
            bowl(p)
        };
        let outcome = ParameterTuner::new(&config(5, 8, 3))
            .tune(&mut evaluator)
            .unwrap();

        assert!(outcome.evaluations() <= 8);
        assert_eq!(calls, outcome.evaluations());
    }

    #[test]
    fn test_best_is_minimum_of_history() {
        let mut evaluator = bowl;
        let outcome = ParameterTuner::new(&config(4, 12, 9))
            .tune(&mut evaluator)
            .unwrap();

        let min = outcome
            .history
            .iter()
            .map(|p| p.elapsed)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best.elapsed, min);
        for sample in &outcome.samples {
            assert!(outcome.best.elapsed <= sample.elapsed);
        }
    }

    #[test]
    fn test_points_stay_in_bounds() {
        let cfg = config(8, 60, 5);
        let space = SearchSpace::from_config(&cfg);
        // Minimum outside the box pulls the search onto the boundary
        let mut evaluator = |p: RunParameters| -> Result<f64> {
            Ok(100.0 - p.granularity as f64 - p.workers as f64 + p.broadcast_rate as f64)
        };
        let outcome = ParameterTuner::new(&cfg).tune(&mut evaluator).unwrap();

        for p in &outcome.history {
            assert!(space.granularity.contains(p.params.granularity));
            assert!(space.broadcast_rate.contains(p.params.broadcast_rate));
            assert!(space.workers.contains(p.params.workers as u64));
        }
        assert_eq!(outcome.best.params.granularity, 20);
        assert_eq!(outcome.best.params.workers, 8);
        assert_eq!(outcome.best.params.broadcast_rate, 1);
    }

    #[test]
    fn test_same_seed_same_search() {
        let mut a = bowl;
        let mut b = bowl;
        let first = ParameterTuner::new(&config(5, 30, 77)).tune(&mut a).unwrap();
        let second = ParameterTuner::new(&config(5, 30, 77)).tune(&mut b).unwrap();
        assert_eq!(first.history, second.history);
    }

    #[test]
    fn test_evaluator_error_propagates() {
        let mut evaluator = |p: RunParameters| -> Result<f64> {
            if p.workers > 0 {
                anyhow::bail!("pipeline failed")
            }
            Ok(0.0)
        };
        let err = ParameterTuner::new(&config(3, 10, 1))
            .tune(&mut evaluator)
            .unwrap_err();
        assert!(err.to_string().contains("pipeline failed"));
    }

    #[test]
    fn test_mean_and_nearest_sample() {
        let space = SearchSpace::from_config(&config(1, 1, 1));
        let point = |g, b, w, elapsed| ParameterPoint {
            params: RunParameters {
                workers: w,
                granularity: g,
                broadcast_rate: b,
            },
            elapsed,
        };
        let samples = [point(2, 1, 1, 5.0), point(5, 4, 2, 3.0), point(9, 4, 6, 4.0)];

        let mean = space.mean(&samples);
        assert_eq!((mean.granularity, mean.broadcast_rate, mean.workers), (5, 3, 3));

        let nearest = nearest_sample(&mean, &samples).unwrap();
        assert_eq!(nearest.elapsed, 3.0);
    }
}
