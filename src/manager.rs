//! Manager — the orchestrator for one frame of task execution.
//!
//! Owns a resource scope, the bounded think-loop, and the keyed result store.
//! Exposes both the driver side (`execute`) and the context side
//! (`get`/`set`/`run`/`parallel_run`) that a running task sees through the
//! manager handed to `Driver::think`.
//!
//! Nested invocations get a child manager bound to a frame one level deeper
//! and to a scope *derived* from this one, and the child is destroyed
//! unconditionally before `run`/`parallel_run` returns — on the success and
//! the failure path alike.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::driver::{ChatDriverFactory, Driver, DriverFactory};
use crate::error::{Error, ExecError, Result};
use crate::frame::{ExecFrame, ExecStep};
use crate::model::{ModelApi, ModelRegistry};
use crate::scope::ResourceScope;
use crate::task::{Task, TaskValue};

type ValueStore = Arc<RwLock<HashMap<String, Arc<dyn TaskValue>>>>;

/// Orchestrates task execution for one frame.
pub struct TaskManager {
    scope: Arc<dyn ResourceScope>,
    /// Owning frame; absent only for the process-level root manager.
    frame: Option<Arc<ExecFrame>>,
    models: Arc<ModelRegistry>,
    model_api_name: String,
    default_driver: Arc<dyn DriverFactory>,
    max_depth: u32,
    max_steps: u32,
    values: ValueStore,
    destroyed: Arc<AtomicBool>,
}

impl TaskManager {
    /// Create a root manager.
    pub fn new(
        scope: Arc<dyn ResourceScope>,
        models: Arc<ModelRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            scope,
            frame: None,
            models,
            model_api_name: config.model_api,
            default_driver: Arc::new(ChatDriverFactory),
            max_depth: config.max_depth,
            max_steps: config.max_steps,
            values: Arc::new(RwLock::new(HashMap::new())),
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the default driver factory.
    pub fn with_default_driver(mut self, factory: Arc<dyn DriverFactory>) -> Self {
        self.default_driver = factory;
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The manager's resource scope.
    pub fn scope(&self) -> &Arc<dyn ResourceScope> {
        &self.scope
    }

    /// The frame this manager executes, if any.
    pub fn frame(&self) -> Option<&Arc<ExecFrame>> {
        self.frame.as_ref()
    }

    /// Resolve the configured model API. Unknown names fail here, at first
    /// use, not at manager construction.
    pub async fn model_api(&self) -> Result<Arc<dyn ModelApi>> {
        Ok(self.models.get(&self.model_api_name).await?)
    }

    // ── Frame/step accounting ───────────────────────────────────────

    /// Create a frame one level deeper than this manager's own frame
    /// (depth 0 if it has none).
    pub fn new_frame(&self, task: &dyn Task) -> Result<Arc<ExecFrame>> {
        let depth = match &self.frame {
            Some(frame) => frame.depth + 1,
            None => 0,
        };
        if depth > self.max_depth {
            return Err(ExecError::RecursionLimitExceeded {
                task: task.name().to_string(),
                depth,
                max: self.max_depth,
            }
            .into());
        }
        Ok(Arc::new(ExecFrame::at_depth(task.name(), depth)))
    }

    /// Create a child manager bound to the given frame.
    ///
    /// Shares the model selector, default driver, and bounds, but gets a
    /// scope derived from (never aliasing) this manager's scope and a fresh
    /// result store.
    pub fn sub_manager(&self, frame: Arc<ExecFrame>) -> TaskManager {
        TaskManager {
            scope: self.scope.derive_child(),
            frame: Some(frame),
            models: Arc::clone(&self.models),
            model_api_name: self.model_api_name.clone(),
            default_driver: Arc::clone(&self.default_driver),
            max_depth: self.max_depth,
            max_steps: self.max_steps,
            values: Arc::new(RwLock::new(HashMap::new())),
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// View of this manager bound to the frame it is executing.
    ///
    /// Shares the scope, store, and lifecycle flag; only the frame differs.
    /// Nested launches made through the view derive their depth from that
    /// frame rather than from the manager's own (possibly absent) one.
    fn bound_to(&self, frame: Arc<ExecFrame>) -> TaskManager {
        TaskManager {
            scope: Arc::clone(&self.scope),
            frame: Some(frame),
            models: Arc::clone(&self.models),
            model_api_name: self.model_api_name.clone(),
            default_driver: Arc::clone(&self.default_driver),
            max_depth: self.max_depth,
            max_steps: self.max_steps,
            values: Arc::clone(&self.values),
            destroyed: Arc::clone(&self.destroyed),
        }
    }

    // ── Driver side ─────────────────────────────────────────────────

    /// Execute a task to completion in a fresh root frame.
    ///
    /// The loop runs on a view of this manager bound to that frame, so a
    /// nested launch from inside the task lands one level deeper.
    pub async fn execute(&self, task: Arc<dyn Task>) -> Result<Option<Arc<dyn TaskValue>>> {
        let frame = Arc::new(ExecFrame::root(task.name()));
        self.bound_to(Arc::clone(&frame)).execute_in(task, frame).await
    }

    /// Execute a task to completion in the given frame.
    ///
    /// Runs the bounded think-loop: at most `max_steps` iterations, each one
    /// `Driver::think` call. A produced result must match the task's declared
    /// result type.
    pub async fn execute_in(
        &self,
        task: Arc<dyn Task>,
        frame: Arc<ExecFrame>,
    ) -> Result<Option<Arc<dyn TaskValue>>> {
        self.ensure_active()?;

        let driver = self.resolve_driver(&task);
        let mut state = driver.initialize();
        let mut steps = 0u32;
        let mut result;

        loop {
            steps += 1;
            if self.max_steps != 0 && steps > self.max_steps {
                return Err(ExecError::StepLimitExceeded {
                    task: task.name().to_string(),
                    max: self.max_steps,
                }
                .into());
            }

            let step = ExecStep::next(&frame);
            tracing::debug!(
                task = task.name(),
                frame = %frame.id,
                depth = frame.depth,
                seq = step.seq,
                "executing step"
            );

            let outcome = driver.think(self, state, &step).await?;
            state = outcome.state;
            result = outcome.result;
            if outcome.finished {
                break;
            }
        }

        // Check the inner value's identity; the handle satisfies TaskValue too.
        if let Some(value) = &result
            && value.as_ref().as_any().type_id() != task.result_type()
        {
            return Err(ExecError::ResultTypeMismatch {
                task: task.name().to_string(),
                expected: task.result_type_name().to_string(),
                actual: value.as_ref().type_name().to_string(),
            }
            .into());
        }

        tracing::info!(
            task = task.name(),
            frame = %frame.id,
            steps,
            has_result = result.is_some(),
            "task finished"
        );
        Ok(result)
    }

    fn resolve_driver(&self, task: &Arc<dyn Task>) -> Arc<dyn Driver> {
        task.driver()
            .unwrap_or_else(|| self.default_driver.driver_for(Arc::clone(task)))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(ExecError::ManagerDestroyed.into());
        }
        Ok(())
    }

    // ── Context side ────────────────────────────────────────────────

    /// Read a shared value. Returns `None` after the manager is destroyed.
    pub async fn get(&self, key: &str) -> Option<Arc<dyn TaskValue>> {
        if self.destroyed.load(Ordering::SeqCst) {
            return None;
        }
        self.values.read().await.get(key).cloned()
    }

    /// Write a shared value. Last writer for a key wins. No-op after destroy.
    pub async fn set(&self, key: impl Into<String>, value: Arc<dyn TaskValue>) {
        if self.destroyed.load(Ordering::SeqCst) {
            tracing::warn!("set() on a destroyed manager is a no-op");
            return;
        }
        self.values.write().await.insert(key.into(), value);
    }

    /// Snapshot of the shared store.
    pub async fn values(&self) -> HashMap<String, Arc<dyn TaskValue>> {
        self.values.read().await.clone()
    }

    /// Run a nested task synchronously to completion.
    ///
    /// The result is stored under `key` in **this** manager's store. The
    /// child manager is destroyed before returning, whether the task
    /// succeeded or failed.
    pub async fn run(&self, key: &str, task: Arc<dyn Task>) -> Result<Option<Arc<dyn TaskValue>>> {
        self.ensure_active()?;

        let frame = self.new_frame(task.as_ref())?;
        let sub = self.sub_manager(Arc::clone(&frame));

        let result = sub.execute_in(task, frame).await;
        sub.destroy();

        let value = result?;
        if let Some(v) = &value {
            self.values
                .write()
                .await
                .insert(key.to_string(), Arc::clone(v));
        }
        Ok(value)
    }

    /// Run every entry concurrently, one worker per entry.
    ///
    /// Each worker follows the same discipline as [`run`](Self::run): its own
    /// child frame, its own child manager, unconditional teardown. Siblings
    /// are never cancelled when one fails; all workers are awaited, every
    /// successful result is written into the returned map and this manager's
    /// store, and the first captured failure is then surfaced as
    /// `WorkerFailure`.
    pub async fn parallel_run(
        &self,
        tasks: HashMap<String, Arc<dyn Task>>,
    ) -> Result<HashMap<String, Arc<dyn TaskValue>>> {
        self.ensure_active()?;

        let mut handles = Vec::with_capacity(tasks.len());
        for (key, task) in tasks {
            let worker_key = key.clone();
            let frame = self.new_frame(task.as_ref())?;
            let sub = self.sub_manager(Arc::clone(&frame));
            let values = Arc::clone(&self.values);

            let handle = tokio::spawn(async move {
                let result = sub.execute_in(task, frame).await;
                sub.destroy();

                match result {
                    Ok(value) => {
                        if let Some(v) = &value {
                            values.write().await.insert(key.clone(), Arc::clone(v));
                        }
                        (key, Ok(value))
                    }
                    Err(e) => (key, Err(e)),
                }
            });
            handles.push((worker_key, handle));
        }

        let joined = futures::future::join_all(
            handles
                .into_iter()
                .map(|(key, handle)| async move { (key, handle.await) }),
        )
        .await;

        let mut results = HashMap::new();
        let mut first_failure: Option<Error> = None;

        for (worker_key, joined_result) in joined {
            match joined_result {
                Ok((key, Ok(Some(value)))) => {
                    results.insert(key, value);
                }
                Ok((_, Ok(None))) => {}
                Ok((key, Err(e))) => {
                    tracing::warn!(key = %key, error = %e, "parallel worker failed");
                    if first_failure.is_none() {
                        first_failure = Some(
                            ExecError::WorkerFailure {
                                key,
                                source: Box::new(e),
                            }
                            .into(),
                        );
                    }
                }
                Err(join_err) => {
                    tracing::warn!(key = %worker_key, error = %join_err, "parallel worker panicked");
                    if first_failure.is_none() {
                        first_failure = Some(
                            ExecError::WorkerPanicked {
                                key: worker_key,
                                reason: join_err.to_string(),
                            }
                            .into(),
                        );
                    }
                }
            }
        }

        if let Some(err) = first_failure {
            return Err(err);
        }
        Ok(results)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Release this manager's own resource scope. Idempotent.
    ///
    /// Child managers hold independently derived scopes, so destroying this
    /// manager never invalidates a scope a child is still using, and vice
    /// versa.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scope.destroy();
        match &self.frame {
            Some(frame) => tracing::debug!(frame = %frame.id, "manager destroyed"),
            None => tracing::debug!("root manager destroyed"),
        }
    }

    /// Whether the manager has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
