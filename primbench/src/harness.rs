//! Timing and validation harness.
//!
//! Every variant runs a fixed number of iterations; each iteration's result is
//! compared with the oracle before its sample is kept, and the first mismatch
//! ends the run with [`Error::Mismatch`].

use std::fmt::Debug;
use std::time::Duration;

use quanta::Clock;
use tracing::{debug, info_span};

use crate::primitives::MaxPrefix;
use crate::Error;

/// One timing sample. Starts running on creation; [`Lap::restart`] moves the
/// start past an upload, [`Lap::stop`] freezes it before a readback.
pub struct Lap {
    clock: Clock,
    start: u64,
    stopped: Option<Duration>,
}

impl Lap {
    pub fn start(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            start: clock.raw(),
            stopped: None,
        }
    }

    pub fn restart(&mut self) {
        self.start = self.clock.raw();
        self.stopped = None;
    }

    /// Freeze the sample. Later calls keep the first value.
    pub fn stop(&mut self) {
        if self.stopped.is_none() {
            self.stopped = Some(self.clock.delta(self.start, self.clock.raw()));
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.stopped
            .unwrap_or_else(|| self.clock.delta(self.start, self.clock.raw()))
    }
}

/// How often the oracle is recomputed while a variant is measured.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OraclePolicy {
    /// Recompute the reference for every iteration.
    EveryIteration,
    /// Compute it once per problem size; the input is not mutated between
    /// iterations.
    Once,
}

/// Comparison of a variant's result with the oracle's.
pub trait Verify {
    /// `None` when `self` matches `expected`, otherwise what differs.
    fn difference(&self, expected: &Self) -> Option<String>;
}

impl Verify for i32 {
    fn difference(&self, expected: &Self) -> Option<String> {
        (self != expected).then(|| format!("got {}, expected {}", self, expected))
    }
}

impl Verify for Option<MaxPrefix> {
    fn difference(&self, expected: &Self) -> Option<String> {
        (self != expected).then(|| format!("got {:?}, expected {:?}", self, expected))
    }
}

impl<T: PartialEq + Debug> Verify for Vec<T> {
    fn difference(&self, expected: &Self) -> Option<String> {
        if self.len() != expected.len() {
            return Some(format!(
                "length {} differs from expected {}",
                self.len(),
                expected.len()
            ));
        }
        self.iter()
            .zip(expected)
            .position(|(a, b)| a != b)
            .map(|i| format!("index {}: got {:?}, expected {:?}", i, self[i], expected[i]))
    }
}

/// Summary of a set of samples, in seconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self {
                mean: 0.0,
                stddev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let secs: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
        let mean = secs.iter().sum::<f64>() / secs.len() as f64;
        let variance = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / secs.len() as f64;
        Self {
            mean,
            stddev: variance.sqrt(),
            min: secs.iter().cloned().fold(f64::INFINITY, f64::min),
            max: secs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Measurement {
    pub name: String,
    pub n: usize,
    pub samples: Vec<Duration>,
    pub stats: Stats,
}

impl Measurement {
    /// Millions of elements per second at the mean latency.
    pub fn throughput(&self) -> Option<f64> {
        (self.stats.mean > 0.0).then(|| self.n as f64 / self.stats.mean / 1e6)
    }
}

/// Run `run` for `iterations` iterations over a problem of `n` elements and
/// check each result against `oracle`.
pub fn measure<T, O, R>(
    name: &str,
    n: usize,
    iterations: usize,
    policy: OraclePolicy,
    mut oracle: O,
    mut run: R,
) -> Result<Measurement, Error>
where
    T: Verify,
    O: FnMut() -> T,
    R: FnMut(&mut Lap) -> Result<T, Error>,
{
    let _span = info_span!("measure", variant = name, n, iterations).entered();
    let clock = Clock::new();
    let mut cached: Option<T> = None;
    let mut samples = Vec::with_capacity(iterations);

    for iteration in 0..iterations {
        let mut lap = Lap::start(&clock);
        let actual = run(&mut lap)?;
        lap.stop();

        let fresh;
        let expected = match policy {
            OraclePolicy::EveryIteration => {
                fresh = oracle();
                &fresh
            }
            OraclePolicy::Once => cached.get_or_insert_with(&mut oracle),
        };
        if let Some(detail) = actual.difference(expected) {
            return Err(Error::Mismatch {
                variant: name.to_string(),
                n,
                iteration,
                detail,
            });
        }

        debug!(iteration, elapsed = ?lap.elapsed(), "sample");
        samples.push(lap.elapsed());
    }

    let stats = Stats::from_samples(&samples);
    Ok(Measurement {
        name: name.to_string(),
        n,
        samples,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn stats_use_population_deviation() {
        let samples: Vec<Duration> = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .iter()
            .map(|&s| Duration::from_secs_f64(s))
            .collect();
        let stats = Stats::from_samples(&samples);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.stddev - 2.0).abs() < 1e-9);
        assert!((stats.min - 2.0).abs() < 1e-9);
        assert!((stats.max - 9.0).abs() < 1e-9);
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        let stats = Stats::from_samples(&[]);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn throughput_is_millions_per_second() {
        let m = Measurement {
            name: "x".into(),
            n: 2_000_000,
            samples: vec![],
            stats: Stats {
                mean: 0.5,
                stddev: 0.0,
                min: 0.5,
                max: 0.5,
            },
        };
        assert!((m.throughput().unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn vec_difference_names_first_index() {
        assert_eq!(vec![1, 2, 3].difference(&vec![1, 2, 3]), None);
        let detail = vec![1, 5, 7].difference(&vec![1, 2, 3]).unwrap();
        assert!(detail.starts_with("index 1"), "{}", detail);
        assert!(vec![1].difference(&vec![1, 2]).unwrap().contains("length"));
    }

    #[test]
    fn stopped_lap_keeps_its_value() {
        let clock = Clock::new();
        let mut lap = Lap::start(&clock);
        lap.stop();
        let first = lap.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        lap.stop();
        assert_eq!(lap.elapsed(), first);
        lap.restart();
        std::thread::sleep(Duration::from_millis(2));
        assert!(lap.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn every_iteration_policy_reruns_the_oracle() {
        let calls = Cell::new(0);
        let m = measure("CPU", 4, 5, OraclePolicy::EveryIteration, || {
            calls.set(calls.get() + 1);
            10
        }, |_| Ok(10))
        .unwrap();
        assert_eq!(calls.get(), 5);
        assert_eq!(m.samples.len(), 5);
    }

    #[test]
    fn once_policy_reuses_the_oracle() {
        let calls = Cell::new(0);
        measure("CPU", 4, 5, OraclePolicy::Once, || {
            calls.set(calls.get() + 1);
            vec![1, 2]
        }, |_| Ok(vec![1, 2]))
        .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn mismatch_stops_at_the_failing_iteration() {
        let mut iteration = 0;
        let err = measure("GPU sum", 8, 10, OraclePolicy::EveryIteration, || 3, |_| {
            iteration += 1;
            Ok(if iteration == 3 { 4 } else { 3 })
        })
        .unwrap_err();
        match err {
            Error::Mismatch { variant, n, iteration, detail } => {
                assert_eq!(variant, "GPU sum");
                assert_eq!(n, 8);
                assert_eq!(iteration, 2);
                assert_eq!(detail, "got 4, expected 3");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
