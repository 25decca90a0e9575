//! Synthetic bot-like and human-like sessions for sanity-checking a model

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::core::Classifier;
use crate::types::{Feature, FeatureVector};

/// Which population a synthetic sample imitates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    BotLike,
    HumanLike,
}

impl SampleKind {
    /// Uniform ranges per feature, in column order
    fn ranges(&self) -> [(Feature, f64, f64); 10] {
        match self {
            SampleKind::BotLike => [
                (Feature::AvgMouseSpeed, 1.6, 3.5),
                (Feature::MousePathEntropy, 0.00, 0.12),
                (Feature::ClickDelay, 0.00, 0.08),
                (Feature::TaskCompletionTime, 0.15, 0.75),
                (Feature::IdleTime, 0.00, 0.02),
                (Feature::MicroJitterVariance, 0.00, 0.02),
                (Feature::AccelerationCurve, 0.00, 0.12),
                (Feature::CurvatureVariance, 0.00, 0.02),
                (Feature::OvershootCorrectionRatio, 0.00, 0.03),
                (Feature::TimingEntropy, 0.00, 0.10),
            ],
            SampleKind::HumanLike => [
                (Feature::AvgMouseSpeed, 0.3, 1.7),
                (Feature::MousePathEntropy, 0.25, 0.95),
                (Feature::ClickDelay, 0.15, 1.8),
                (Feature::TaskCompletionTime, 1.2, 6.5),
                (Feature::IdleTime, 0.05, 1.4),
                (Feature::MicroJitterVariance, 0.05, 2.2),
                (Feature::AccelerationCurve, 0.2, 8.0),
                (Feature::CurvatureVariance, 0.02, 1.8),
                (Feature::OvershootCorrectionRatio, 0.01, 0.45),
                (Feature::TimingEntropy, 0.2, 0.95),
            ],
        }
    }
}

/// Seeded generator of synthetic feature vectors
#[derive(Debug)]
pub struct SampleGenerator {
    rng: StdRng,
}

impl SampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn sample(&mut self, kind: SampleKind) -> FeatureVector {
        let values: Vec<(Feature, f64)> = kind
            .ranges()
            .iter()
            .map(|(feature, lo, hi)| (*feature, self.rng.gen_range(*lo..*hi)))
            .collect();
        // ranges are finite constants
        FeatureVector::from_pairs(values).unwrap_or_default()
    }
}

/// Distribution of P(human) over one population
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub kind: SampleKind,
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ScoreSummary {
    fn from_scores(kind: SampleKind, scores: &[f64]) -> Self {
        let n = scores.len();
        let mean = if n == 0 { 0.0 } else { scores.iter().sum::<f64>() / n as f64 };
        let std = if n > 1 {
            (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            kind,
            n,
            mean,
            std,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Simulation output: one summary per population
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationReport {
    pub bot_like: ScoreSummary,
    pub human_like: ScoreSummary,
}

/// Score `samples` synthetic sessions of each kind
pub fn simulate(classifier: &dyn Classifier, samples: usize, seed: u64) -> SimulationReport {
    let mut generator = SampleGenerator::new(seed);
    let mut bot_scores = Vec::with_capacity(samples);
    let mut human_scores = Vec::with_capacity(samples);
    for _ in 0..samples {
        let bot = generator.sample(SampleKind::BotLike);
        let human = generator.sample(SampleKind::HumanLike);
        bot_scores.push(classifier.predict_human_probability(&bot));
        human_scores.push(classifier.predict_human_probability(&human));
    }
    SimulationReport {
        bot_like: ScoreSummary::from_scores(SampleKind::BotLike, &bot_scores),
        human_like: ScoreSummary::from_scores(SampleKind::HumanLike, &human_scores),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EntropyModel;

    impl Classifier for EntropyModel {
        fn predict_human_probability(&self, features: &FeatureVector) -> f64 {
            features.get(Feature::MousePathEntropy).clamp(0.0, 1.0)
        }
    }

    #[test]
    fn test_samples_stay_in_range() {
        let mut generator = SampleGenerator::new(42);
        for _ in 0..50 {
            let bot = generator.sample(SampleKind::BotLike);
            assert!(bot.get(Feature::MousePathEntropy) < 0.12);
            let human = generator.sample(SampleKind::HumanLike);
            assert!(human.get(Feature::TaskCompletionTime) >= 1.2);
        }
    }

    #[test]
    fn test_same_seed_same_samples() {
        let a = SampleGenerator::new(7).sample(SampleKind::HumanLike);
        let b = SampleGenerator::new(7).sample(SampleKind::HumanLike);
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulation_separates_populations() {
        let report = simulate(&EntropyModel, 30, 42);
        assert_eq!(report.bot_like.n, 30);
        assert!(report.bot_like.max < report.human_like.min);
        assert!(report.bot_like.mean < report.human_like.mean);
        assert!(report.human_like.std > 0.0);
    }
}
