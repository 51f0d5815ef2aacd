//! # e2l-core
//!
//! Core types for the Engine2Learn bridge protocol.
//!
//! This crate provides the foundational types shared by server and client:
//! - Dynamic wire values and pixel buffers
//! - Typed property values
//! - The reusable observation map
//! - Action/observation space descriptors
//! - Request/response messages
//! - MessagePack codec and length-prefixed framing

pub mod error;
pub mod message;
pub mod observation;
pub mod pixels;
pub mod property;
pub mod protocol;
pub mod space;
pub mod value;

pub use error::{BridgeError, Result};
pub use message::{Command, Response, Setter, StepRequest};
pub use observation::{ObservationMap, observation_key};
pub use pixels::PixelBuffer;
pub use property::PropertyValue;
pub use protocol::{FrameDecoder, decode, encode, encode_frame};
pub use space::{ActionDesc, ActionSpaceDesc, ObservationSpaceDesc, SpaceDesc};
pub use value::{Value, ValueMap};
