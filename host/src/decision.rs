//! ==============================================================================
//! decision.rs - from a reading to a spray decision
//! ==============================================================================
//!
//! two paths produce a decision:
//!     - the fitted model, when it is loaded and returns a finite prediction
//!     - the gas threshold table, when it is not
//!
//! both paths read their gas bands from the same ThresholdTable, which is
//! built from `[thresholds]` in host.toml.
//!
//! ==============================================================================

use crate::classifier::{ClassifierError, OdorLabel, OdorModel, Prediction};
use crate::config::ThresholdConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OdorLevel {
    Clean,
    Mild,
    Odor,
}

impl OdorLevel {
    pub fn status(self) -> &'static str {
        match self {
            OdorLevel::Clean => "clean",
            OdorLevel::Mild => "mild odor",
            OdorLevel::Odor => "odor detected — spray active",
        }
    }

    pub fn spray_active(self) -> bool {
        matches!(self, OdorLevel::Odor)
    }

    fn label(self) -> OdorLabel {
        match self {
            OdorLevel::Odor => OdorLabel::Odor,
            OdorLevel::Clean | OdorLevel::Mild => OdorLabel::Safe,
        }
    }
}

/// a row of the threshold table: applies when gas > `above`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band {
    pub above: f64,
    pub level: OdorLevel,
    /// confidence reported when this band decides on the fallback path
    pub confidence: f64,
}

/// gas bands ordered from highest to lowest; the last band catches everything
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdTable {
    bands: [Band; 3],
}

impl ThresholdTable {
    pub fn from_config(t: &ThresholdConfig) -> Self {
        Self {
            bands: [
                Band { above: t.odor_gas, level: OdorLevel::Odor, confidence: t.odor_confidence },
                Band { above: t.mild_gas, level: OdorLevel::Mild, confidence: t.mild_confidence },
                Band { above: f64::NEG_INFINITY, level: OdorLevel::Clean, confidence: t.clean_confidence },
            ],
        }
    }

    /// first band the gas level falls into
    pub fn band_for(&self, gas_level: f64) -> &Band {
        self.bands
            .iter()
            .find(|b| gas_level > b.above)
            .unwrap_or(&self.bands[self.bands.len() - 1])
    }

    /// level for a reading the model called safe: never above Mild
    fn safe_level(&self, gas_level: f64) -> OdorLevel {
        match self.band_for(gas_level).level {
            OdorLevel::Clean => OdorLevel::Clean,
            OdorLevel::Mild | OdorLevel::Odor => OdorLevel::Mild,
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::from_config(&ThresholdConfig::default())
    }
}

/// why the model did not decide
#[derive(Clone, Debug, PartialEq)]
pub enum FallbackReason {
    ModelUnavailable,
    ModelFailed(ClassifierError),
}

/// which path produced the decision
#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    Model(Prediction),
    RuleFallback { band: Band, reason: FallbackReason },
}

/// final decision for one reading
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub level: OdorLevel,
    pub prediction: OdorLabel,
    pub confidence: f64,
}

impl Decision {
    /// short message the sensor node acts on
    pub fn device_message(&self) -> &'static str {
        if self.level.spray_active() { "BAU TERDETEKSI" } else { "AMAN" }
    }
}

/// run the model if there is one, otherwise the threshold table
pub fn classify(
    model: Option<&OdorModel>,
    table: &ThresholdTable,
    gas_level: f64,
    temperature: f64,
    humidity: f64,
) -> Classification {
    let Some(model) = model else {
        return Classification::RuleFallback {
            band: *table.band_for(gas_level),
            reason: FallbackReason::ModelUnavailable,
        };
    };

    match model.predict(gas_level, temperature, humidity) {
        Ok(prediction) => Classification::Model(prediction),
        Err(e) => Classification::RuleFallback {
            band: *table.band_for(gas_level),
            reason: FallbackReason::ModelFailed(e),
        },
    }
}

impl Classification {
    pub fn decide(&self, table: &ThresholdTable, gas_level: f64) -> Decision {
        match self {
            Classification::Model(p) => {
                let level = match p.label {
                    OdorLabel::Odor => OdorLevel::Odor,
                    OdorLabel::Safe => table.safe_level(gas_level),
                };
                Decision { level, prediction: p.label, confidence: p.confidence }
            }
            Classification::RuleFallback { band, .. } => Decision {
                level: band.level,
                prediction: band.level.label(),
                confidence: band.confidence,
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::RuleFallback { .. })
    }
}
