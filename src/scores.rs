//! SentimentScores: the per-class scores returned by the prediction backend.

use serde::{Deserialize, Serialize};

use crate::label::{SemanticClass, NUM_CLASSES};

/// Scores for each sentiment class, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

/// Normalized entropy above which a prediction is flagged as uncertain.
///
/// On three classes this is crossed roughly when the top class drops under 50%.
pub const ENTROPY_UNCERTAIN_THRESHOLD: f64 = 0.9;

impl SentimentScores {
    /// Scale arbitrary non-negative scores so they sum to 1.
    ///
    /// Falls back to a uniform distribution when the input cannot be
    /// normalized (all zero, negative, or non-finite).
    pub fn normalized(&self) -> Self {
        let raw = self.to_array();
        let total: f64 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() || raw.iter().any(|v| *v < 0.0) {
            let third = 1.0 / NUM_CLASSES as f64;
            return Self::from_array([third; NUM_CLASSES]);
        }
        Self::from_array(raw.map(|v| v / total))
    }

    pub fn from_array(values: [f64; NUM_CLASSES]) -> Self {
        Self {
            negative: values[0],
            neutral: values[1],
            positive: values[2],
        }
    }

    pub fn to_array(&self) -> [f64; NUM_CLASSES] {
        [self.negative, self.neutral, self.positive]
    }

    pub fn get(&self, class: SemanticClass) -> f64 {
        self.to_array()[class.index()]
    }

    /// Highest-scoring class. Ties resolve to the lower class index.
    pub fn top_class(&self) -> SemanticClass {
        let values = self.to_array();
        let mut best = 0;
        for (idx, v) in values.iter().enumerate().skip(1) {
            if *v > values[best] {
                best = idx;
            }
        }
        SemanticClass::from_index(best).unwrap_or(SemanticClass::Neutral)
    }

    /// Probability mass of the top class after normalization.
    pub fn confidence(&self) -> f64 {
        let n = self.normalized();
        n.get(n.top_class())
    }

    /// Shannon entropy of the normalized distribution, scaled to [0, 1].
    ///
    /// - 0.0 = all mass on one class
    /// - 1.0 = uniform across the three classes
    pub fn entropy(&self) -> f64 {
        let probs = self.normalized().to_array();
        let max_entropy = (NUM_CLASSES as f64).ln();
        let mut h = 0.0;
        for &p in &probs {
            if p > 1e-15 {
                h -= p * p.ln();
            }
        }
        h / max_entropy
    }

    pub fn is_uncertain(&self) -> bool {
        self.entropy() > ENTROPY_UNCERTAIN_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uniform_fallback() {
        let scores = SentimentScores::from_array([0.0, 0.0, 0.0]).normalized();
        for v in scores.to_array() {
            assert!((v - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_normalize_rescales() {
        let scores = SentimentScores::from_array([2.0, 1.0, 1.0]).normalized();
        assert!((scores.negative - 0.5).abs() < 1e-9);
        let total: f64 = scores.to_array().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_class_and_confidence() {
        let scores = SentimentScores::from_array([0.1, 0.2, 0.7]);
        assert_eq!(scores.top_class(), SemanticClass::Positive);
        assert!((scores.confidence() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_top_class_tie_prefers_lower_index() {
        let scores = SentimentScores::from_array([0.4, 0.4, 0.2]);
        assert_eq!(scores.top_class(), SemanticClass::Negative);
    }

    #[test]
    fn test_entropy_bounds() {
        let uniform = SentimentScores::from_array([1.0, 1.0, 1.0]);
        assert!((uniform.entropy() - 1.0).abs() < 1e-9);
        assert!(uniform.is_uncertain());

        let certain = SentimentScores::from_array([0.0, 0.0, 1.0]);
        assert!(certain.entropy() < 1e-9);
        assert!(!certain.is_uncertain());
    }

    #[test]
    fn test_deserialize_backend_shape() {
        let json = r#"{"negative": 0.05, "neutral": 0.15, "positive": 0.8}"#;
        let scores: SentimentScores = serde_json::from_str(json).unwrap();
        assert_eq!(scores.top_class(), SemanticClass::Positive);
    }
}
