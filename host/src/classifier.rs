//! ==============================================================================
//! classifier.rs - odor classifier trained once at startup
//! ==============================================================================
//!
//! purpose:
//!     binary odor / no-odor classification from three raw features
//!     (mq gas value, temperature, humidity).
//!
//! model:
//!     l2-regularised logistic regression (alpha = 1, intercept not penalised)
//!     fitted by linfa-logistic on the compiled-in training set. the fitted
//!     model is immutable and shared between request handlers behind an Arc.
//!
//! relationships:
//!     - used by: decision.rs (classify), main.rs (build_model at startup)
//!
//! ==============================================================================

use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{arr2, Array1, Array2};
use std::sync::Arc;
use thiserror::Error;

use crate::config::ClassifierConfig;

/// l2 penalty; matches an inverse regularisation strength of 1
const ALPHA: f64 = 1.0;
const MAX_ITERATIONS: u64 = 500;
const MIN_SAMPLES: usize = 5;

pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("need at least {min} training samples, got {got}")]
    InsufficientSamples { min: usize, got: usize },

    #[error("training set contains only one label")]
    SingleClass,

    #[error("training sample {0} has a non-finite feature")]
    NonFiniteSample(usize),

    #[error("logistic regression fit failed: {0}")]
    Fit(String),

    #[error("fit diverged to non-finite parameters")]
    Diverged,

    #[error("prediction produced a non-finite probability")]
    NonFinitePrediction,
}

/// class label: 0 = safe, 1 = odor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OdorLabel {
    Safe,
    Odor,
}

impl OdorLabel {
    pub fn as_u8(self) -> u8 {
        match self {
            OdorLabel::Safe => 0,
            OdorLabel::Odor => 1,
        }
    }

    fn is_odor(self) -> bool {
        self == OdorLabel::Odor
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingSample {
    pub gas_level: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub label: OdorLabel,
}

const fn sample(gas_level: f64, temperature: f64, humidity: f64, label: OdorLabel) -> TrainingSample {
    TrainingSample { gas_level, temperature, humidity, label }
}

use OdorLabel::{Odor, Safe};

/// reference training set
pub const TRAINING_SET: [TrainingSample; 20] = [
    // safe: low mq, normal room climate
    sample(150.0, 25.0, 60.0, Safe),
    sample(200.0, 26.0, 65.0, Safe),
    sample(300.0, 27.0, 70.0, Safe),
    sample(250.0, 28.0, 55.0, Safe),
    sample(180.0, 24.0, 58.0, Safe),
    sample(220.0, 25.0, 62.0, Safe),
    sample(280.0, 26.0, 68.0, Safe),
    sample(190.0, 27.0, 63.0, Safe),
    // borderline: approaching odor but still labelled safe
    sample(500.0, 28.0, 72.0, Safe),
    sample(450.0, 29.0, 75.0, Safe),
    sample(600.0, 30.0, 78.0, Safe),
    sample(550.0, 31.0, 80.0, Safe),
    // odor: high mq
    sample(800.0, 30.0, 80.0, Odor),
    sample(900.0, 31.0, 85.0, Odor),
    sample(1000.0, 32.0, 90.0, Odor),
    sample(1200.0, 33.0, 95.0, Odor),
    sample(750.0, 29.0, 82.0, Odor),
    sample(850.0, 30.0, 88.0, Odor),
    sample(950.0, 31.0, 92.0, Odor),
    sample(1100.0, 32.0, 94.0, Odor),
];

/// output of the fitted model
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub label: OdorLabel,
    /// probability of `label`, rounded to two decimals
    pub confidence: f64,
}

/// fitted logistic regression, immutable after training
/// targets are `true` for odor
pub struct OdorModel {
    fitted: FittedLogisticRegression<f64, bool>,
}

impl OdorModel {
    /// fit the model to `samples`
    pub fn train(samples: &[TrainingSample]) -> ClassifierResult<Self> {
        if samples.len() < MIN_SAMPLES {
            return Err(ClassifierError::InsufficientSamples { min: MIN_SAMPLES, got: samples.len() });
        }
        if let Some(i) = samples.iter().position(|s| !features(s).iter().all(|f| f.is_finite())) {
            return Err(ClassifierError::NonFiniteSample(i));
        }
        let has_odor = samples.iter().any(|s| s.label == Odor);
        let has_safe = samples.iter().any(|s| s.label == Safe);
        if !(has_odor && has_safe) {
            return Err(ClassifierError::SingleClass);
        }

        let records = Array2::from_shape_fn((samples.len(), 3), |(i, j)| features(&samples[i])[j]);
        let targets: Array1<bool> = samples.iter().map(|s| s.label.is_odor()).collect();
        let dataset = Dataset::new(records, targets);

        let fitted = LogisticRegression::default()
            .alpha(ALPHA)
            .with_intercept(true)
            .max_iterations(MAX_ITERATIONS)
            .fit(&dataset)
            .map_err(|e| ClassifierError::Fit(e.to_string()))?;

        if !fitted.params().iter().all(|w| w.is_finite()) || !fitted.intercept().is_finite() {
            return Err(ClassifierError::Diverged);
        }

        Ok(Self { fitted })
    }

    /// fit the model to the compiled-in reference set
    pub fn train_default() -> ClassifierResult<Self> {
        Self::train(&TRAINING_SET)
    }

    pub fn predict(&self, gas_level: f64, temperature: f64, humidity: f64) -> ClassifierResult<Prediction> {
        let x = arr2(&[[gas_level, temperature, humidity]]);
        let p = self.fitted.predict_probabilities(&x)[0];
        if !p.is_finite() {
            return Err(ClassifierError::NonFinitePrediction);
        }

        // the predicted class is always the one at or above one half
        let label = if self.fitted.predict(&x)[0] { Odor } else { Safe };
        let confidence = p.max(1.0 - p);
        Ok(Prediction { label, confidence: (confidence * 100.0).round() / 100.0 })
    }

    /// weights for gas, temperature, humidity
    pub fn weights(&self) -> [f64; 3] {
        let w = self.fitted.params();
        [w[0], w[1], w[2]]
    }

    pub fn intercept(&self) -> f64 {
        self.fitted.intercept()
    }
}

/// train on the reference set unless disabled; None means thresholds only
pub fn build_model(config: &ClassifierConfig) -> Option<Arc<OdorModel>> {
    build_model_from(config, &TRAINING_SET)
}

fn build_model_from(config: &ClassifierConfig, samples: &[TrainingSample]) -> Option<Arc<OdorModel>> {
    if !config.enabled {
        tracing::warn!("[STARTUP] Classifier disabled in config, using gas thresholds only");
        return None;
    }

    match OdorModel::train(samples) {
        Ok(m) => {
            tracing::info!("[STARTUP] ✓ Odor model trained on {} samples", samples.len());
            tracing::debug!("[MODEL] weights {:?}, intercept {}", m.weights(), m.intercept());
            Some(Arc::new(m))
        }
        Err(e) => {
            tracing::error!("[STARTUP] ✗ Odor model training failed, using gas thresholds only: {}", e);
            None
        }
    }
}

fn features(s: &TrainingSample) -> [f64; 3] {
    [s.gas_level, s.temperature, s.humidity]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OdorModel {
        OdorModel::train_default().expect("reference set must train")
    }

    #[test]
    fn more_gas_means_more_odor() {
        assert!(model().weights()[0] > 0.0);
    }

    #[test]
    fn reference_set_is_fitted_exactly() {
        let m = model();
        for s in TRAINING_SET.iter() {
            let p = m.predict(s.gas_level, s.temperature, s.humidity).unwrap();
            assert_eq!(p.label, s.label, "sample {:?}", s);
        }
    }

    #[test]
    fn clear_cases_are_confident() {
        let m = model();
        let clean = m.predict(150.0, 25.0, 60.0).unwrap();
        assert_eq!(clean.label, OdorLabel::Safe);
        assert!(clean.confidence >= 0.9);

        let odor = m.predict(1200.0, 33.0, 95.0).unwrap();
        assert_eq!(odor.label, OdorLabel::Odor);
        assert!(odor.confidence >= 0.9);
    }

    #[test]
    fn confidence_is_in_unit_interval_and_rounded() {
        let m = model();
        for gas in (0..1500).step_by(25) {
            let p = m.predict(gas as f64, 28.0, 70.0).unwrap();
            assert!((0.5..=1.0).contains(&p.confidence), "gas {} -> {}", gas, p.confidence);
            assert_eq!((p.confidence * 100.0).round() / 100.0, p.confidence);
        }
    }

    #[test]
    fn prediction_is_deterministic() {
        let a = model();
        let b = model();
        assert_eq!(a.predict(640.0, 30.0, 79.0), b.predict(640.0, 30.0, 79.0));
    }

    #[test]
    fn odor_probability_is_monotonic_in_gas() {
        let m = model();
        let mut last = 0.0;
        for gas in (0..1500).step_by(50) {
            let p = m.predict(gas as f64, 28.0, 70.0).unwrap();
            let p_odor = match p.label {
                OdorLabel::Odor => p.confidence,
                OdorLabel::Safe => 1.0 - p.confidence,
            };
            assert!(p_odor >= last - 1e-9, "gas {}", gas);
            last = p_odor;
        }
    }

    #[test]
    fn too_few_samples_fail() {
        let err = OdorModel::train(&TRAINING_SET[..3]).err();
        assert_eq!(err, Some(ClassifierError::InsufficientSamples { min: 5, got: 3 }));
    }

    #[test]
    fn single_label_fails() {
        assert_eq!(OdorModel::train(&TRAINING_SET[..8]).err(), Some(ClassifierError::SingleClass));
    }

    #[test]
    fn non_finite_sample_fails() {
        let mut samples = TRAINING_SET.to_vec();
        samples[4].humidity = f64::NAN;
        assert_eq!(OdorModel::train(&samples).err(), Some(ClassifierError::NonFiniteSample(4)));
    }

    #[test]
    fn non_finite_input_is_an_error() {
        let m = model();
        assert_eq!(m.predict(f64::NAN, 25.0, 60.0), Err(ClassifierError::NonFinitePrediction));
    }

    #[test]
    fn enabled_config_loads_the_model() {
        let model = build_model(&ClassifierConfig { enabled: true });
        assert!(model.is_some());
    }

    #[test]
    fn disabled_config_skips_training() {
        assert!(build_model(&ClassifierConfig { enabled: false }).is_none());
    }

    #[test]
    fn failed_training_leaves_no_model() {
        let config = ClassifierConfig { enabled: true };
        assert!(build_model_from(&config, &TRAINING_SET[..8]).is_none());
    }
}
