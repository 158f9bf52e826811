//! ==============================================================================
//! ingest.rs - the POST /data pipeline
//! ==============================================================================
//!
//! one call per device post:
//!     1. parse    body -> SensorReading (validation errors leave state alone)
//!     2. classify model prediction, or the threshold table as fallback
//!     3. commit   swap LatestState in a single write
//!     4. respond  IngestReply for the sensor node
//!
//! relationships:
//!     - used by: server.rs (data_post_handler)
//!     - uses: domain.rs, decision.rs, state.rs
//!
//! ==============================================================================

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;

use crate::classifier::OdorModel;
use crate::decision::{classify, Classification, Decision, FallbackReason, ThresholdTable};
use crate::domain::{LatestState, SensorReading};
use crate::error::IngestResult;
use crate::state::StateCell;

/// reply sent back to the sensor node
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestReply {
    pub status: &'static str,
    /// "BAU TERDETEKSI" or "AMAN"; the firmware matches on these
    pub message: &'static str,
    pub prediction: u8,
    pub spray_active: bool,
    pub timestamp: String,
}

impl IngestReply {
    fn success(decision: &Decision, timestamp: String) -> Self {
        Self {
            status: "success",
            message: decision.device_message(),
            prediction: decision.prediction.as_u8(),
            spray_active: decision.level.spray_active(),
            timestamp,
        }
    }
}

/// immutable decision machinery shared by every request
pub struct IngestEngine {
    model: Option<Arc<OdorModel>>,
    table: ThresholdTable,
    show_sensor_data: bool,
}

impl IngestEngine {
    pub fn new(model: Option<Arc<OdorModel>>, table: ThresholdTable) -> Self {
        Self { model, table, show_sensor_data: true }
    }

    pub fn with_sensor_logging(mut self, enabled: bool) -> Self {
        self.show_sensor_data = enabled;
        self
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// classify a reading without touching any state
    pub fn decide(&self, reading: &SensorReading) -> (Classification, Decision) {
        let classification = classify(
            self.model.as_deref(),
            &self.table,
            reading.gas_level,
            reading.temperature,
            reading.humidity,
        );
        if let Classification::RuleFallback { reason: FallbackReason::ModelFailed(e), .. } = &classification {
            tracing::error!("[MODEL] prediction failed, using gas thresholds: {}", e);
        }
        let decision = classification.decide(&self.table, reading.gas_level);
        (classification, decision)
    }

    /// run the full pipeline for one request body
    pub async fn ingest(
        &self,
        state: &StateCell,
        body: &[u8],
        received_at: DateTime<Local>,
    ) -> IngestResult<IngestReply> {
        let reading = SensorReading::from_json(body, received_at).map_err(|e| {
            tracing::warn!("[DATA] rejected reading: {}", e);
            e
        })?;

        if self.show_sensor_data {
            tracing::info!(
                "[DATA] MQ: {} | Temp: {:.1}°C | Humidity: {:.1}%",
                reading.gas_level,
                reading.temperature,
                reading.humidity
            );
        }

        let (classification, decision) = self.decide(&reading);
        let next = LatestState::from_reading(&reading, &decision);
        let timestamp = next.time.clone();
        state.replace(next).await;

        tracing::info!(
            "[{}] MQ: {} -> {} (prediction {}, confidence {:.2}{})",
            timestamp,
            reading.gas_level,
            decision.level.status(),
            decision.prediction.as_u8(),
            decision.confidence,
            if classification.is_fallback() { ", fallback" } else { "" }
        );

        Ok(IngestReply::success(&decision, timestamp))
    }
}
