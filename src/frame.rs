//! Frame/step accounting for nested task invocations.
//!
//! Recursion depth is carried explicitly in `ExecFrame` rather than relying
//! on the host call stack, so the depth bound is enforced deterministically.
//! Step sequence numbers are 1-based and strictly increasing within a frame;
//! the manager loop checks the step bound before minting a step.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One logical invocation (root or nested) of a task.
///
/// Identity fields are immutable after creation; the frame only accounts
/// for the steps minted against it.
#[derive(Debug)]
pub struct ExecFrame {
    /// Unique frame ID.
    pub id: Uuid,
    /// Nesting depth relative to the root invocation (root = 0).
    pub depth: u32,
    /// Name of the task this frame executes.
    pub task_name: String,
    /// When the frame was created.
    pub created_at: DateTime<Utc>,
    /// Steps minted so far.
    steps: AtomicU32,
}

impl ExecFrame {
    /// Create a root frame (depth 0) for a task.
    pub fn root(task_name: impl Into<String>) -> Self {
        Self::at_depth(task_name, 0)
    }

    /// Create a frame at an explicit depth.
    ///
    /// The depth bound is the caller's responsibility (`TaskManager::new_frame`
    /// checks it before constructing the frame).
    pub fn at_depth(task_name: impl Into<String>, depth: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            depth,
            task_name: task_name.into(),
            created_at: Utc::now(),
            steps: AtomicU32::new(0),
        }
    }

    /// Number of steps minted so far.
    pub fn step_count(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }
}

/// One think/act iteration within a frame. Read-only after creation.
#[derive(Debug, Clone)]
pub struct ExecStep {
    /// The frame this step belongs to.
    pub frame: Arc<ExecFrame>,
    /// 1-based sequence number within the frame.
    pub seq: u32,
}

impl ExecStep {
    /// Mint the next sequentially numbered step for a frame.
    pub fn next(frame: &Arc<ExecFrame>) -> ExecStep {
        let seq = frame.steps.fetch_add(1, Ordering::SeqCst) + 1;
        ExecStep {
            frame: Arc::clone(frame),
            seq,
        }
    }

    /// Depth of the owning frame.
    pub fn depth(&self) -> u32 {
        self.frame.depth
    }
}
