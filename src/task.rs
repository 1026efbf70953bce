//! Task-definition collaborator.
//!
//! The manager never inspects a task beyond three hooks: the initial-state
//! material, the declared result type, and an optional task-specific driver.
//! Result values are opaque to the engine beyond their runtime type identity.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::driver::Driver;
use crate::error::{Error, Result, TaskError};

/// A unit of declarative work submitted for execution to completion.
pub trait Task: Send + Sync + 'static {
    /// Task name, used for frames and error messages.
    fn name(&self) -> &str;

    /// Instruction text seeding the initial conversation state.
    fn instructions(&self) -> String {
        String::new()
    }

    /// Runtime type the task's result must have.
    fn result_type(&self) -> TypeId;

    /// Human-readable name of the declared result type.
    fn result_type_name(&self) -> &'static str;

    /// Decode a structured model payload into the task's result value.
    ///
    /// Only consulted by drivers that receive payloads from the model API;
    /// tasks with custom drivers may leave the default in place.
    fn decode_result(&self, payload: serde_json::Value) -> Result<Arc<dyn TaskValue>> {
        let _ = payload;
        Err(TaskError::DecodeFailed {
            task: self.name().to_string(),
            reason: "task declares no result decoder".to_string(),
        }
        .into())
    }

    /// Task-specific driver, if any. `None` selects the manager's default.
    fn driver(&self) -> Option<Arc<dyn Driver>> {
        None
    }
}

/// An opaque task result value.
///
/// Blanket-implemented for any sendable `Debug` type, so task authors only
/// define plain structs. The engine uses `as_any` for the runtime type check
/// and `type_name` for error messages.
pub trait TaskValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + fmt::Debug> TaskValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Downcast a stored value to a concrete result type.
pub fn downcast_value<T: 'static>(value: &Arc<dyn TaskValue>) -> Option<&T> {
    // The blanket impl covers `Arc<dyn TaskValue>` itself, so dispatch must
    // go through the inner trait object, not the handle.
    value.as_ref().as_any().downcast_ref::<T>()
}

/// Decode a JSON payload into a typed result value.
///
/// Helper for `Task::decode_result` implementations backed by serde.
pub fn decode_result_as<R>(task: &str, payload: serde_json::Value) -> Result<Arc<dyn TaskValue>>
where
    R: DeserializeOwned + Send + Sync + fmt::Debug + 'static,
{
    let value: R = serde_json::from_value(payload).map_err(|e| {
        Error::from(TaskError::DecodeFailed {
            task: task.to_string(),
            reason: e.to_string(),
        })
    })?;
    Ok(Arc::new(value))
}
