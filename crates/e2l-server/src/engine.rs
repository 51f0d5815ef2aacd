//! Engine collaborator traits
//!
//! The bridge never owns a simulation. It talks to one through these narrow
//! interfaces, which a host engine (or [`crate::sandbox::SandboxEngine`])
//! implements. All calls are synchronous: a command runs to completion
//! against the engine without yielding.

use e2l_core::{PropertyValue, Result};

/// Handle to an entity or component inside the engine
pub type ObjectId = u64;

/// Handle to a world
pub type WorldId = u64;

/// Engine class of an object, as far as the bridge cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// Top-level entity
    Actor,
    /// Camera-like component a scene capture can be attached to
    Camera,
    /// Component that renders into a render target
    SceneCapture,
    /// Observer probe
    Observer,
    Other,
}

/// One observed property of an observer
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedProperty {
    pub name: String,
    pub enabled: bool,
}

impl ObservedProperty {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }
}

/// Observer declaration as registered with the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverDecl {
    /// The observer's own object handle
    pub id: ObjectId,
    pub name: String,
    pub enabled: bool,
    /// Emit `<name>:camera` with the parent's view
    pub screen_capture: bool,
    /// Read properties from the owning entity instead of the attach parent
    pub use_actor_properties: bool,
    pub observed_properties: Vec<ObservedProperty>,
}

impl ObserverDecl {
    /// Enabled observer with no capture and no observed properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            enabled: true,
            screen_capture: false,
            use_actor_properties: false,
            observed_properties: Vec::new(),
        }
    }

    pub fn with_screen_capture(mut self) -> Self {
        self.screen_capture = true;
        self
    }

    pub fn with_actor_properties(mut self) -> Self {
        self.use_actor_properties = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Add an enabled observed property
    pub fn observe(mut self, property: impl Into<String>) -> Self {
        self.observed_properties.push(ObservedProperty::new(property));
        self
    }

    /// Add an observed property that is declared but switched off
    pub fn observe_disabled(mut self, property: impl Into<String>) -> Self {
        self.observed_properties.push(ObservedProperty {
            name: property.into(),
            enabled: false,
        });
        self
    }
}

/// Press/release input binding
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub action: String,
    pub key: String,
}

/// Continuous input binding
#[derive(Debug, Clone, PartialEq)]
pub struct AxisBinding {
    pub axis: String,
    pub key: String,
    pub scale: f64,
}

/// Size of a capture's render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
}

/// World enumeration
pub trait WorldProvider {
    /// The single currently-playing world, if any
    fn playing_world(&self) -> Option<WorldId>;
}

/// Entity/component storage with typed property access
pub trait ObjectGraph {
    /// All entities in `world`
    fn entities(&self, world: WorldId) -> Vec<ObjectId>;

    /// Direct sub-components of an entity or component
    fn children(&self, object: ObjectId) -> Vec<ObjectId>;

    /// Object a component is attached to
    fn parent(&self, object: ObjectId) -> Option<ObjectId>;

    /// Entity owning a component (an entity owns itself)
    fn owner(&self, object: ObjectId) -> Option<ObjectId>;

    fn name(&self, object: ObjectId) -> Option<String>;

    fn class(&self, object: ObjectId) -> ObjectClass;

    /// Whether the object still exists
    fn is_valid(&self, object: ObjectId) -> bool;

    /// World the object lives in
    fn world_of(&self, object: ObjectId) -> Option<WorldId>;

    /// Current value of a property, `None` when the object has no such property
    fn property(&self, object: ObjectId, name: &str) -> Option<PropertyValue>;

    fn has_property(&self, object: ObjectId, name: &str) -> bool {
        self.property(object, name).is_some()
    }

    /// Names of every property on the object
    fn property_names(&self, object: ObjectId) -> Vec<String>;

    fn set_property(&mut self, object: ObjectId, name: &str, value: PropertyValue) -> Result<()>;

    /// Attach a new component of `class` named `name` under `parent`
    fn add_component(&mut self, parent: ObjectId, class: ObjectClass, name: &str) -> Result<ObjectId>;
}

/// Input bindings, input injection and world time control
pub trait InputSystem {
    fn action_bindings(&self) -> Vec<ActionBinding>;

    fn axis_bindings(&self) -> Vec<AxisBinding>;

    /// Press or release `key` on the world's player controller
    fn input_key(&mut self, world: WorldId, key: &str, pressed: bool) -> Result<()>;

    /// Feed an axis value for `key` on the world's player controller
    fn input_axis(&mut self, world: WorldId, key: &str, value: f64, delta_time: f64) -> Result<()>;

    /// Advance the world by exactly `delta_time`
    fn tick(&mut self, world: WorldId, delta_time: f64) -> Result<()>;

    fn is_paused(&self, world: WorldId) -> bool;

    /// Returns whether the engine honored the request
    fn set_paused(&mut self, world: WorldId, paused: bool) -> bool;

    fn restart_level(&mut self, world: WorldId) -> Result<()>;

    fn set_random_seed(&mut self, seed: i64);
}

/// Render-target provisioning and frame capture
pub trait CaptureSystem {
    /// Render target currently assigned to a scene capture
    fn render_target(&self, capture: ObjectId) -> Option<RenderTarget>;

    fn create_render_target(&mut self, capture: ObjectId, width: u32, height: u32) -> Result<RenderTarget>;

    /// Trigger a capture and return the target's contents as RGBA bytes
    fn capture_scene(&mut self, capture: ObjectId) -> Result<Vec<u8>>;
}

/// Registered observer declarations
pub trait ObserverRegistry {
    fn observers(&self) -> Vec<ObserverDecl>;
}

/// Everything the command layer needs from a host engine
pub trait Engine:
    WorldProvider + ObjectGraph + InputSystem + CaptureSystem + ObserverRegistry + Send + 'static
{
}

impl<T> Engine for T where
    T: WorldProvider + ObjectGraph + InputSystem + CaptureSystem + ObserverRegistry + Send + 'static
{
}
