//! taskrun — recursive task-execution engine.
//!
//! Drives a declarative task to completion through repeated think/act steps,
//! spawning nested sub-invocations and running independent invocations
//! concurrently, under explicit depth/step bounds and strict resource-scope
//! ownership.

pub mod config;
pub mod conversation;
pub mod driver;
pub mod error;
pub mod frame;
pub mod manager;
pub mod model;
pub mod scope;
pub mod task;
