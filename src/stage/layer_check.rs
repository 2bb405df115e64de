//! Stage wrapping an externally produced Layer1/Layer2 result.

use super::{ExecutionStage, StageContext, StageRecorder, StageResult};
use crate::errors::GateResult;
use crate::gate::LayerResult;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Ingests a layer result from the `layerResult` context field.
///
/// One `check-result` artifact is recorded per sub-check; failing sub-checks
/// are logged at error level. The stage succeeds iff the layer passed.
#[derive(Debug, Clone)]
pub struct LayerCheckStage {
    stage_id: &'static str,
    label: &'static str,
    timeout: Option<Duration>,
}

impl LayerCheckStage {
    pub const LAYER1_ID: &'static str = "layer1-checks";
    pub const LAYER2_ID: &'static str = "layer2-review";
    pub const RESULT_FIELD: &'static str = "layerResult";

    pub fn layer1() -> Self {
        Self {
            stage_id: Self::LAYER1_ID,
            label: "Layer 1",
            timeout: None,
        }
    }

    pub fn layer2() -> Self {
        Self {
            stage_id: Self::LAYER2_ID,
            label: "Layer 2",
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ExecutionStage for LayerCheckStage {
    fn stage_id(&self) -> &str {
        self.stage_id
    }

    fn required_fields(&self) -> &[&'static str] {
        &[Self::RESULT_FIELD]
    }

    async fn execute(&self, context: &StageContext) -> GateResult<StageResult> {
        let mut recorder = StageRecorder::new(self.stage_id);
        if let Some(timeout) = self.timeout {
            recorder = recorder.with_timeout(timeout);
        }

        if !recorder.require_fields(context, self.required_fields()) {
            return Ok(recorder.finish(false));
        }

        let raw = context.get(Self::RESULT_FIELD).cloned().unwrap_or_default();
        let layer: LayerResult = match serde_json::from_value(raw) {
            Ok(layer) => layer,
            Err(e) => {
                recorder.fail(format!("{} result is malformed: {}", self.label, e));
                return Ok(recorder.finish(false));
            }
        };

        recorder.info(format!(
            "{}: {} check(s) reported",
            self.label,
            layer.results.len()
        ));
        for check in &layer.results {
            recorder.artifact(
                "check-result",
                format!("checks/{}", check.check),
                json!({ "pass": check.pass, "message": check.message }),
            );
            if !check.pass {
                recorder.error(format!("{} failed: {}", check.check, check.message));
            }
        }

        if !layer.pass {
            recorder.fail(format!("{} did not pass", self.label));
        }
        Ok(recorder.finish(layer.pass))
    }
}
