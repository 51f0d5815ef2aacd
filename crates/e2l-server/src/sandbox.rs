//! In-memory engine
//!
//! A small deterministic world that implements every collaborator trait, so
//! the bridge can run and be tested without a real simulation attached.
//!
//! Ticking integrates `Velocity` into `Location` for every entity carrying
//! both vector properties. Captures render a gradient whose blue channel is
//! the world's tick count, so consecutive frames differ.

use crate::engine::{
    ActionBinding, AxisBinding, CaptureSystem, InputSystem, ObjectClass, ObjectGraph, ObjectId,
    ObserverDecl, ObserverRegistry, RenderTarget, WorldId, WorldProvider,
};
use e2l_core::{BridgeError, PropertyValue, Result};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct SandboxObject {
    name: String,
    class: ObjectClass,
    world: WorldId,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    properties: BTreeMap<String, PropertyValue>,
    /// Values restored on level restart
    defaults: BTreeMap<String, PropertyValue>,
    render_target: Option<RenderTarget>,
    alive: bool,
}

#[derive(Debug, Clone, Default)]
struct WorldState {
    paused: bool,
    /// The engine ignores pause requests while set
    pause_locked: bool,
    elapsed: f64,
    ticks: u64,
    restarts: u32,
    pressed: BTreeMap<String, bool>,
    axes: BTreeMap<String, f64>,
}

/// Deterministic in-memory engine
#[derive(Debug, Default)]
pub struct SandboxEngine {
    objects: BTreeMap<ObjectId, SandboxObject>,
    worlds: BTreeMap<WorldId, WorldState>,
    playing: Option<WorldId>,
    observers: Vec<ObserverDecl>,
    action_bindings: Vec<ActionBinding>,
    axis_bindings: Vec<AxisBinding>,
    seed: Option<i64>,
    next_id: u64,
}

impl SandboxEngine {
    /// Empty engine without any world
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Engine with one world that is already playing
    pub fn with_playing_world() -> (Self, WorldId) {
        let mut engine = Self::new();
        let world = engine.add_world();
        engine.set_playing(Some(world));
        (engine, world)
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_world(&mut self) -> WorldId {
        let id = self.allocate();
        self.worlds.insert(id, WorldState::default());
        id
    }

    pub fn set_playing(&mut self, world: Option<WorldId>) {
        self.playing = world;
    }

    /// Spawn a top-level entity
    pub fn spawn_entity(&mut self, world: WorldId, name: &str) -> ObjectId {
        self.insert_object(world, None, ObjectClass::Actor, name)
    }

    /// Attach a component under an entity or another component
    pub fn attach(&mut self, parent: ObjectId, class: ObjectClass, name: &str) -> ObjectId {
        let world = self.objects.get(&parent).map(|o| o.world).unwrap_or_default();
        self.insert_object(world, Some(parent), class, name)
    }

    fn insert_object(
        &mut self,
        world: WorldId,
        parent: Option<ObjectId>,
        class: ObjectClass,
        name: &str,
    ) -> ObjectId {
        let id = self.allocate();
        self.objects.insert(
            id,
            SandboxObject {
                name: name.to_string(),
                class,
                world,
                parent,
                children: Vec::new(),
                properties: BTreeMap::new(),
                defaults: BTreeMap::new(),
                render_target: None,
                alive: true,
            },
        );
        if let Some(parent) = parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.push(id);
        }
        id
    }

    /// Define a property and its level-start value
    pub fn define(&mut self, object: ObjectId, name: &str, value: PropertyValue) {
        if let Some(obj) = self.objects.get_mut(&object) {
            obj.defaults.insert(name.to_string(), value.clone());
            obj.properties.insert(name.to_string(), value);
        }
    }

    /// Attach an observer component under `parent` and register it
    pub fn add_observer(&mut self, parent: ObjectId, mut decl: ObserverDecl) -> ObjectId {
        let id = self.attach(parent, ObjectClass::Observer, &decl.name.clone());
        decl.id = id;
        self.observers.push(decl);
        id
    }

    /// Assign a render target up front, as a level designer would
    pub fn assign_render_target(&mut self, capture: ObjectId, width: u32, height: u32) {
        if let Some(obj) = self.objects.get_mut(&capture) {
            obj.render_target = Some(RenderTarget { width, height });
        }
    }

    /// Mark an object (and its subtree) as destroyed
    pub fn destroy(&mut self, object: ObjectId) {
        let mut pending = vec![object];
        while let Some(id) = pending.pop() {
            if let Some(obj) = self.objects.get_mut(&id) {
                obj.alive = false;
                pending.extend(obj.children.iter().copied());
            }
        }
    }

    pub fn bind_action(&mut self, action: &str, key: &str) {
        self.action_bindings.push(ActionBinding {
            action: action.to_string(),
            key: key.to_string(),
        });
    }

    pub fn bind_axis(&mut self, axis: &str, key: &str, scale: f64) {
        self.axis_bindings.push(AxisBinding {
            axis: axis.to_string(),
            key: key.to_string(),
            scale,
        });
    }

    /// Make the world ignore pause requests
    pub fn lock_pause(&mut self, world: WorldId, locked: bool) {
        if let Some(state) = self.worlds.get_mut(&world) {
            state.pause_locked = locked;
        }
    }

    pub fn ticks(&self, world: WorldId) -> u64 {
        self.worlds.get(&world).map(|w| w.ticks).unwrap_or_default()
    }

    pub fn elapsed(&self, world: WorldId) -> f64 {
        self.worlds.get(&world).map(|w| w.elapsed).unwrap_or_default()
    }

    pub fn restarts(&self, world: WorldId) -> u32 {
        self.worlds.get(&world).map(|w| w.restarts).unwrap_or_default()
    }

    pub fn seed(&self) -> Option<i64> {
        self.seed
    }

    /// Last injected state of an action key
    pub fn key_state(&self, world: WorldId, key: &str) -> Option<bool> {
        self.worlds.get(&world)?.pressed.get(key).copied()
    }

    /// Last injected value of an axis key
    pub fn axis_value(&self, world: WorldId, key: &str) -> Option<f64> {
        self.worlds.get(&world)?.axes.get(key).copied()
    }

    /// Find a live object by exact name
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, o)| o.alive && o.name == name)
            .map(|(id, _)| *id)
    }

    fn live(&self, object: ObjectId) -> Result<&SandboxObject> {
        self.objects
            .get(&object)
            .filter(|o| o.alive)
            .ok_or_else(|| BridgeError::Engine(format!("object {} does not exist", object)))
    }

    fn world_state(&mut self, world: WorldId) -> Result<&mut WorldState> {
        self.worlds
            .get_mut(&world)
            .ok_or_else(|| BridgeError::Engine(format!("world {} does not exist", world)))
    }
}

impl WorldProvider for SandboxEngine {
    fn playing_world(&self) -> Option<WorldId> {
        self.playing.filter(|w| self.worlds.contains_key(w))
    }
}

impl ObjectGraph for SandboxEngine {
    fn entities(&self, world: WorldId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.alive && o.world == world && o.parent.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    fn children(&self, object: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(&object)
            .map(|o| {
                o.children
                    .iter()
                    .copied()
                    .filter(|c| self.is_valid(*c))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parent(&self, object: ObjectId) -> Option<ObjectId> {
        self.objects.get(&object)?.parent
    }

    fn owner(&self, object: ObjectId) -> Option<ObjectId> {
        let mut current = object;
        loop {
            match self.objects.get(&current)?.parent {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
    }

    fn name(&self, object: ObjectId) -> Option<String> {
        self.objects.get(&object).map(|o| o.name.clone())
    }

    fn class(&self, object: ObjectId) -> ObjectClass {
        self.objects
            .get(&object)
            .map(|o| o.class)
            .unwrap_or(ObjectClass::Other)
    }

    fn is_valid(&self, object: ObjectId) -> bool {
        self.objects.get(&object).is_some_and(|o| o.alive)
    }

    fn world_of(&self, object: ObjectId) -> Option<WorldId> {
        self.objects
            .get(&object)
            .map(|o| o.world)
            .filter(|w| self.worlds.contains_key(w))
    }

    fn property(&self, object: ObjectId, name: &str) -> Option<PropertyValue> {
        self.objects.get(&object)?.properties.get(name).cloned()
    }

    fn property_names(&self, object: ObjectId) -> Vec<String> {
        self.objects
            .get(&object)
            .map(|o| o.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn set_property(&mut self, object: ObjectId, name: &str, value: PropertyValue) -> Result<()> {
        self.live(object)?;
        if let Some(obj) = self.objects.get_mut(&object) {
            obj.properties.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn add_component(&mut self, parent: ObjectId, class: ObjectClass, name: &str) -> Result<ObjectId> {
        self.live(parent)?;
        let id = self.attach(parent, class, name);
        debug!(parent, id, name, "sandbox component added");
        Ok(id)
    }
}

impl InputSystem for SandboxEngine {
    fn action_bindings(&self) -> Vec<ActionBinding> {
        self.action_bindings.clone()
    }

    fn axis_bindings(&self) -> Vec<AxisBinding> {
        self.axis_bindings.clone()
    }

    fn input_key(&mut self, world: WorldId, key: &str, pressed: bool) -> Result<()> {
        self.world_state(world)?.pressed.insert(key.to_string(), pressed);
        Ok(())
    }

    fn input_axis(&mut self, world: WorldId, key: &str, value: f64, _delta_time: f64) -> Result<()> {
        self.world_state(world)?.axes.insert(key.to_string(), value);
        Ok(())
    }

    fn tick(&mut self, world: WorldId, delta_time: f64) -> Result<()> {
        let state = self.world_state(world)?;
        state.elapsed += delta_time;
        state.ticks += 1;

        for obj in self
            .objects
            .values_mut()
            .filter(|o| o.alive && o.world == world && o.parent.is_none())
        {
            let velocity = match obj.properties.get("Velocity") {
                Some(PropertyValue::Vector(v)) => *v,
                _ => continue,
            };
            if let Some(PropertyValue::Vector(location)) = obj.properties.get_mut("Location") {
                for (l, v) in location.iter_mut().zip(velocity) {
                    *l += v * delta_time;
                }
            }
        }
        Ok(())
    }

    fn is_paused(&self, world: WorldId) -> bool {
        self.worlds.get(&world).is_some_and(|w| w.paused)
    }

    fn set_paused(&mut self, world: WorldId, paused: bool) -> bool {
        match self.worlds.get_mut(&world) {
            Some(state) if !state.pause_locked => {
                state.paused = paused;
                true
            }
            _ => false,
        }
    }

    fn restart_level(&mut self, world: WorldId) -> Result<()> {
        let state = self.world_state(world)?;
        state.elapsed = 0.0;
        state.ticks = 0;
        state.restarts += 1;
        state.paused = false;
        state.pressed.clear();
        state.axes.clear();

        for obj in self.objects.values_mut().filter(|o| o.world == world) {
            obj.properties = obj.defaults.clone();
        }
        Ok(())
    }

    fn set_random_seed(&mut self, seed: i64) {
        self.seed = Some(seed);
    }
}

impl CaptureSystem for SandboxEngine {
    fn render_target(&self, capture: ObjectId) -> Option<RenderTarget> {
        self.objects.get(&capture)?.render_target
    }

    fn create_render_target(&mut self, capture: ObjectId, width: u32, height: u32) -> Result<RenderTarget> {
        self.live(capture)?;
        let target = RenderTarget { width, height };
        if let Some(obj) = self.objects.get_mut(&capture) {
            obj.render_target = Some(target);
        }
        Ok(target)
    }

    fn capture_scene(&mut self, capture: ObjectId) -> Result<Vec<u8>> {
        let obj = self.live(capture)?;
        let target = obj
            .render_target
            .ok_or_else(|| BridgeError::Engine(format!("capture {} has no render target", obj.name)))?;
        let shade = (self.ticks(obj.world) % 256) as u8;

        let mut rgba = Vec::with_capacity(target.width as usize * target.height as usize * 4);
        for x in 0..target.width {
            for y in 0..target.height {
                rgba.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, shade, 255]);
            }
        }
        Ok(rgba)
    }
}

impl ObserverRegistry for SandboxEngine {
    fn observers(&self) -> Vec<ObserverDecl> {
        self.observers.clone()
    }
}
