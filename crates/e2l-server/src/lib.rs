//! # e2l-server
//!
//! Command layer of the Engine2Learn bridge.
//!
//! This crate provides:
//! - Engine collaborator traits (`Engine` and its parts) for host adapters
//! - The property path resolver behind `set`
//! - Observation and space compilers
//! - The simulation stepper
//! - `CommandDispatcher`, which answers every request with a response
//! - `BridgeSettings`
//! - `SandboxEngine`, an in-memory engine for running without a simulation

pub mod dispatch;
pub mod engine;
pub mod observer;
pub mod resolver;
pub mod sandbox;
pub mod settings;
pub mod space;
pub mod stepper;

pub use dispatch::CommandDispatcher;
pub use engine::{
    ActionBinding, AxisBinding, CaptureSystem, Engine, InputSystem, ObjectClass, ObjectGraph,
    ObjectId, ObservedProperty, ObserverDecl, ObserverRegistry, RenderTarget, WorldId, WorldProvider,
};
pub use resolver::PropertyPath;
pub use sandbox::SandboxEngine;
pub use settings::{BridgeSettings, SettingsError};
