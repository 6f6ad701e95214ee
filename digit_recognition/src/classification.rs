use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.60;

#[derive(Error, Debug, PartialEq)]
pub enum ClassificationError {
    #[error("model returned an empty output")]
    EmptyOutput,
    #[error("model returned a non-finite value at index {0}")]
    NonFinite(usize),
    #[error("confidence threshold {0} must lie within [0, 1]")]
    InvalidThreshold(f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    /// The model already ends in a softmax layer.
    #[default]
    Softmax,
    Logits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Digit,
    NotConfident,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Digit => "digit",
            Outcome::NotConfident => "not_confident",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub outcome: Outcome,
    /// Only set when the prediction clears the threshold.
    pub digit: Option<usize>,
    pub label: Option<String>,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    confidence_threshold: f32,
    activation: OutputActivation,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            activation: OutputActivation::Softmax,
        }
    }
}

impl Classifier {
    pub fn new(
        confidence_threshold: f32,
        activation: OutputActivation,
    ) -> Result<Self, ClassificationError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ClassificationError::InvalidThreshold(confidence_threshold));
        }
        Ok(Self {
            confidence_threshold,
            activation,
        })
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn classify(
        &self,
        output: &[f32],
        label_for: impl Fn(usize) -> String,
    ) -> Result<Classification, ClassificationError> {
        if output.is_empty() {
            return Err(ClassificationError::EmptyOutput);
        }
        if let Some(index) = output.iter().position(|v| !v.is_finite()) {
            return Err(ClassificationError::NonFinite(index));
        }

        let probabilities = match self.activation {
            OutputActivation::Softmax => output.to_vec(),
            OutputActivation::Logits => softmax(output),
        };

        let (predicted, confidence) = argmax(&probabilities);

        let (outcome, digit, label, message) = if confidence < self.confidence_threshold {
            (
                Outcome::NotConfident,
                None,
                None,
                format!(
                    "Prediction: Not confident (Confidence: {:.2}%)",
                    confidence * 100.
                ),
            )
        } else {
            (
                Outcome::Digit,
                Some(predicted),
                Some(label_for(predicted)),
                format!(
                    "Prediction: Digit {} with {:.2}% confidence",
                    predicted,
                    confidence * 100.
                ),
            )
        };

        Ok(Classification {
            outcome,
            digit,
            label,
            confidence,
            probabilities,
            message,
        })
    }
}

/// First maximum wins on ties.
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (index, value)| {
            if value > best.1 {
                (index, value)
            } else {
                best
            }
        })
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit_name(digit: usize) -> String {
        format!("digit-{}", digit)
    }

    fn one_hot(index: usize, value: f32) -> Vec<f32> {
        let rest = (1.0 - value) / 9.0;
        (0..10).map(|i| if i == index { value } else { rest }).collect()
    }

    #[test]
    fn test_confident_prediction() {
        let classification = Classifier::default()
            .classify(&one_hot(7, 0.982), digit_name)
            .unwrap();

        assert_eq!(classification.outcome, Outcome::Digit);
        assert_eq!(classification.digit, Some(7));
        assert_eq!(classification.label.as_deref(), Some("digit-7"));
        assert_eq!(
            classification.message,
            "Prediction: Digit 7 with 98.20% confidence"
        );
    }

    #[test]
    fn test_low_confidence_is_not_confident() {
        let classification = Classifier::default()
            .classify(&one_hot(3, 0.4512), digit_name)
            .unwrap();

        assert_eq!(classification.outcome, Outcome::NotConfident);
        assert_eq!(classification.digit, None);
        assert_eq!(classification.label, None);
        assert_eq!(
            classification.message,
            "Prediction: Not confident (Confidence: 45.12%)"
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let classifier = Classifier::new(0.5, OutputActivation::Softmax).unwrap();
        let classification = classifier
            .classify(&[0.5, 0.25, 0.25], digit_name)
            .unwrap();

        assert_eq!(classification.outcome, Outcome::Digit);
        assert_eq!(classification.digit, Some(0));
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let classifier = Classifier::new(0.0, OutputActivation::Softmax).unwrap();
        let classification = classifier
            .classify(&[0.1, 0.45, 0.45], digit_name)
            .unwrap();

        assert_eq!(classification.digit, Some(1));
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let classifier = Classifier::new(0.6, OutputActivation::Logits).unwrap();
        let classification = classifier
            .classify(&[0.0, 10.0, 0.0, 0.0], digit_name)
            .unwrap();

        let total: f32 = classification.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(classification.digit, Some(1));
        assert!(classification.confidence > 0.99);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probabilities = softmax(&[1000.0, 1000.0]);
        assert_eq!(probabilities, vec![0.5, 0.5]);
    }

    #[test]
    fn test_invalid_outputs() {
        let classifier = Classifier::default();

        assert_eq!(
            classifier.classify(&[], digit_name),
            Err(ClassificationError::EmptyOutput)
        );
        assert_eq!(
            classifier.classify(&[0.2, f32::NAN], digit_name),
            Err(ClassificationError::NonFinite(1))
        );
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            Classifier::new(1.5, OutputActivation::Softmax),
            Err(ClassificationError::InvalidThreshold(_))
        ));
        assert!(Classifier::new(-0.1, OutputActivation::Softmax).is_err());
    }
}
