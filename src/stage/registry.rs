//! Id -> constructor registry for pipeline stages.

use super::{ExecutionStage, LayerCheckStage, OrchestratorContext};
use crate::errors::{GateError, GateResult};
use crate::recovery::RecoveryStage;
use std::collections::BTreeMap;
use std::fmt;

/// Builds a stage instance for one orchestrator context.
pub type StageConstructor =
    Box<dyn Fn(&OrchestratorContext) -> Box<dyn ExecutionStage> + Send + Sync>;

/// Registry of stage constructors keyed by stage id.
///
/// Construct one explicitly and inject it; adding a stage never touches the
/// dispatch code.
#[derive(Default)]
pub struct StageRegistry {
    constructors: BTreeMap<String, StageConstructor>,
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.available_stages())
            .finish()
    }
}

impl StageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the layer check stages and the recovery stage.
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();
        registry.register(LayerCheckStage::LAYER1_ID, |ctx| {
            Box::new(LayerCheckStage::layer1().with_timeout(ctx.stage_timeout))
        });
        registry.register(LayerCheckStage::LAYER2_ID, |ctx| {
            Box::new(LayerCheckStage::layer2().with_timeout(ctx.stage_timeout))
        });
        registry.register(RecoveryStage::STAGE_ID, |ctx| {
            Box::new(RecoveryStage::new(ctx.escalation_dir()).with_max_retries(ctx.max_retries))
        });
        registry
    }

    /// Register (or replace) the constructor for `stage_id`.
    pub fn register<F>(&mut self, stage_id: impl Into<String>, constructor: F)
    where
        F: Fn(&OrchestratorContext) -> Box<dyn ExecutionStage> + Send + Sync + 'static,
    {
        self.constructors
            .insert(stage_id.into(), Box::new(constructor));
    }

    pub fn create_executor(
        &self,
        stage_id: &str,
        context: &OrchestratorContext,
    ) -> GateResult<Box<dyn ExecutionStage>> {
        let constructor = self
            .constructors
            .get(stage_id)
            .ok_or_else(|| GateError::NoExecutor {
                stage_id: stage_id.to_string(),
            })?;
        Ok(constructor(context))
    }

    pub fn has_executor(&self, stage_id: &str) -> bool {
        self.constructors.contains_key(stage_id)
    }

    /// Registered stage ids in sorted order.
    pub fn available_stages(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageContext, StageRecorder, StageResult};
    use async_trait::async_trait;

    struct EchoStage;

    #[async_trait]
    impl ExecutionStage for EchoStage {
        fn stage_id(&self) -> &str {
            "echo"
        }

        async fn execute(&self, _context: &StageContext) -> GateResult<StageResult> {
            let mut recorder = StageRecorder::new("echo");
            recorder.info("echo");
            Ok(recorder.finish(true))
        }
    }

    fn ctx() -> OrchestratorContext {
        OrchestratorContext::new("/tmp/gate")
    }

    #[test]
    fn builtin_stages_are_listed_sorted() {
        let registry = StageRegistry::with_builtin_stages();
        assert_eq!(
            registry.available_stages(),
            vec!["layer1-checks", "layer2-review", "recovery"]
        );
        assert!(registry.has_executor("recovery"));
        assert!(!registry.has_executor("deploy"));
    }

    #[test]
    fn unknown_stage_fails_with_no_executor() {
        let registry = StageRegistry::new();
        let err = registry.create_executor("deploy", &ctx()).err().unwrap();
        assert!(err.to_string().contains("No executor found"));
    }

    #[tokio::test]
    async fn custom_stage_is_dispatched_by_id() {
        let mut registry = StageRegistry::new();
        registry.register("echo", |_| Box::new(EchoStage));
        let stage = registry.create_executor("echo", &ctx()).unwrap();
        assert_eq!(stage.stage_id(), "echo");
        let result = stage.execute(&StageContext::new()).await.unwrap();
        assert!(result.success);
    }

    #[test]
    fn fresh_registries_are_isolated() {
        let mut a = StageRegistry::new();
        a.register("echo", |_| Box::new(EchoStage));
        let b = StageRegistry::new();
        assert!(a.has_executor("echo"));
        assert!(!b.has_executor("echo"));
    }
}
