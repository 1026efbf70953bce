//! Driver contract — the polymorphic strategy advancing a task one
//! think/act iteration at a time.
//!
//! Drivers are constructed per task and capture it; `Task::driver` supplies a
//! task-specific driver, otherwise the manager's configured `DriverFactory`
//! builds the default. The manager handed to `think` gives the driver access
//! to the context-side operations (`get`/`set`/`run`/`parallel_run`) so a
//! task can read shared state or spawn sub-tasks mid-execution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::Conversation;
use crate::error::Result;
use crate::frame::ExecStep;
use crate::manager::TaskManager;
use crate::task::{Task, TaskValue};

/// Outcome of one think/act iteration.
#[derive(Debug)]
pub struct ThinkOutcome {
    /// Updated conversation state, carried into the next iteration.
    pub state: Conversation,
    /// Result produced this iteration, if any. The last one wins.
    pub result: Option<Arc<dyn TaskValue>>,
    /// Whether the task is complete.
    pub finished: bool,
}

/// Advances a task one think/act iteration at a time.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Produce the initial conversation state.
    fn initialize(&self) -> Conversation;

    /// Execute exactly one think/act iteration.
    async fn think(
        &self,
        ctx: &TaskManager,
        state: Conversation,
        step: &ExecStep,
    ) -> Result<ThinkOutcome>;
}

/// Builds the default driver for tasks that declare none.
pub trait DriverFactory: Send + Sync {
    fn driver_for(&self, task: Arc<dyn Task>) -> Arc<dyn Driver>;
}

/// Factory for the stock [`ChatDriver`].
pub struct ChatDriverFactory;

impl DriverFactory for ChatDriverFactory {
    fn driver_for(&self, task: Arc<dyn Task>) -> Arc<dyn Driver> {
        Arc::new(ChatDriver::new(task))
    }
}

/// Default driver: one model-API call per iteration.
///
/// Seeds the conversation with the task instructions; each `think` appends
/// the model's message, decodes an optional structured payload through the
/// task definition, and passes the model's finished flag through.
pub struct ChatDriver {
    task: Arc<dyn Task>,
}

impl ChatDriver {
    /// Create a driver for the given task.
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self { task }
    }
}

#[async_trait]
impl Driver for ChatDriver {
    fn initialize(&self) -> Conversation {
        Conversation::new().with_system(self.task.instructions())
    }

    async fn think(
        &self,
        ctx: &TaskManager,
        mut state: Conversation,
        step: &ExecStep,
    ) -> Result<ThinkOutcome> {
        let api = ctx.model_api().await?;
        tracing::debug!(
            frame = %step.frame.id,
            seq = step.seq,
            api = api.name(),
            "advancing conversation"
        );

        let turn = api.advance(&state).await?;
        state.push(turn.message);

        let result = match turn.payload {
            Some(payload) => Some(self.task.decode_result(payload)?),
            None => None,
        };

        Ok(ThinkOutcome {
            state,
            result,
            finished: turn.finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use serde::Deserialize;

    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ModelError;
    use crate::model::{ModelApi, ModelRegistry, ModelTurn};
    use crate::scope::ServiceScope;
    use crate::task::{decode_result_as, downcast_value};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: i64,
    }

    struct AnswerTask;

    impl Task for AnswerTask {
        fn name(&self) -> &str {
            "answer"
        }

        fn instructions(&self) -> String {
            "compute the answer".to_string()
        }

        fn result_type(&self) -> TypeId {
            TypeId::of::<Answer>()
        }

        fn result_type_name(&self) -> &'static str {
            "Answer"
        }

        fn decode_result(&self, payload: serde_json::Value) -> Result<Arc<dyn TaskValue>> {
            decode_result_as::<Answer>(self.name(), payload)
        }
    }

    /// Backend that finishes on the first turn with a payload.
    struct OneShotApi;

    #[async_trait]
    impl ModelApi for OneShotApi {
        fn name(&self) -> &str {
            "oneshot"
        }

        async fn advance(
            &self,
            _conversation: &Conversation,
        ) -> std::result::Result<ModelTurn, ModelError> {
            Ok(ModelTurn::message("the answer is 42")
                .with_payload(serde_json::json!({"value": 42}))
                .finish())
        }
    }

    async fn manager_with(api: Arc<dyn ModelApi>) -> TaskManager {
        let registry = Arc::new(ModelRegistry::new());
        registry.register(api).await;
        TaskManager::new(
            Arc::new(ServiceScope::new()),
            registry,
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_chat_driver_decodes_payload_and_finishes() {
        let manager = manager_with(Arc::new(OneShotApi)).await;
        let task: Arc<dyn Task> = Arc::new(AnswerTask);
        let driver = ChatDriver::new(Arc::clone(&task));

        let frame = Arc::new(crate::frame::ExecFrame::root(task.name()));
        let step = ExecStep::next(&frame);

        let state = driver.initialize();
        assert_eq!(state.len(), 1);

        let outcome = driver.think(&manager, state, &step).await.unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.state.len(), 2);

        let value = outcome.result.unwrap();
        assert_eq!(downcast_value::<Answer>(&value).unwrap().value, 42);
    }

    #[tokio::test]
    async fn test_chat_driver_surfaces_unknown_api() {
        let registry = Arc::new(ModelRegistry::new());
        let manager = TaskManager::new(
            Arc::new(ServiceScope::new()),
            registry,
            EngineConfig {
                model_api: "missing".to_string(),
                ..EngineConfig::default()
            },
        );

        let task: Arc<dyn Task> = Arc::new(AnswerTask);
        let driver = ChatDriver::new(Arc::clone(&task));
        let frame = Arc::new(crate::frame::ExecFrame::root(task.name()));
        let step = ExecStep::next(&frame);

        let err = driver
            .think(&manager, driver.initialize(), &step)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
