//! Observation compiler
//!
//! Walks the registered observers and writes their camera frames and
//! observed properties into the long-lived [`ObservationMap`].

use crate::engine::{Engine, ObjectClass, ObjectGraph, ObjectId, ObserverDecl, RenderTarget, WorldId};
use crate::settings::BridgeSettings;
use e2l_core::observation::CAMERA_FIELD;
use e2l_core::{BridgeError, ObservationMap, PixelBuffer, PropertyValue, Result, Value, observation_key};
use tracing::{debug, trace};

/// Name given to scene captures the bridge attaches to cameras
pub const SCREEN_CAPTURE_COMPONENT: &str = "Engine2LearnScreenCapture";

/// Attach parent of a usable observer
///
/// An observer is usable when it is enabled, still valid, and lives in the
/// playing world. Unusable observers are skipped, never reported.
pub fn observer_parent<G: ObjectGraph + ?Sized>(
    graph: &G,
    observer: &ObserverDecl,
    playing_world: Option<WorldId>,
) -> Option<ObjectId> {
    if !observer.enabled {
        trace!(observer = %observer.name, "observer disabled");
        return None;
    }
    if !graph.is_valid(observer.id) {
        debug!(observer = %observer.name, "observer not valid");
        return None;
    }
    let Some(world) = graph.world_of(observer.id) else {
        debug!(observer = %observer.name, "observer has no world");
        return None;
    };
    if playing_world != Some(world) {
        debug!(observer = %observer.name, world, "observer lives in a non-playing world");
        return None;
    }
    graph.parent(observer.id)
}

/// Object the observer reads its properties from
pub fn property_source<G: ObjectGraph + ?Sized>(
    graph: &G,
    observer: &ObserverDecl,
    parent: ObjectId,
) -> Option<ObjectId> {
    if observer.use_actor_properties {
        graph.owner(parent)
    } else {
        Some(parent)
    }
}

/// Find or set up the scene capture feeding a screen-capture observer
///
/// A scene-capture parent is used directly. A camera parent reuses an
/// attached scene capture, or gets a new one that only renders on demand.
/// A render target at the configured resolution is created when the
/// capture has none.
pub fn provision_capture<E: Engine + ?Sized>(
    engine: &mut E,
    observer: &ObserverDecl,
    parent: ObjectId,
    settings: &BridgeSettings,
) -> Result<(ObjectId, RenderTarget)> {
    let capture = match engine.class(parent) {
        ObjectClass::SceneCapture => parent,
        ObjectClass::Camera => {
            let existing = engine
                .children(parent)
                .into_iter()
                .find(|child| engine.class(*child) == ObjectClass::SceneCapture);
            match existing {
                Some(capture) => capture,
                None => {
                    let capture =
                        engine.add_component(parent, ObjectClass::SceneCapture, SCREEN_CAPTURE_COMPONENT)?;
                    engine.set_property(capture, "bCaptureEveryFrame", PropertyValue::Bool(false))?;
                    engine.set_property(capture, "bCaptureOnMovement", PropertyValue::Bool(false))?;
                    debug!(observer = %observer.name, capture, "attached scene capture to camera");
                    capture
                }
            }
        }
        _ => return Err(BridgeError::UnsupportedObserverAttachment(observer.name.clone())),
    };

    let target = match engine.render_target(capture) {
        Some(target) => target,
        None => {
            let target =
                engine.create_render_target(capture, settings.capture_width, settings.capture_height)?;
            debug!(
                observer = %observer.name,
                width = target.width,
                height = target.height,
                "created render target"
            );
            target
        }
    };
    Ok((capture, target))
}

/// Capture one RGB frame through `capture`
fn capture_frame<E: Engine + ?Sized>(
    engine: &mut E,
    capture: ObjectId,
    target: RenderTarget,
) -> Result<PixelBuffer> {
    let rgba = engine.capture_scene(capture)?;
    PixelBuffer::from_rgba(target.width, target.height, &rgba)
}

/// Recompile `observations` from the current world state
///
/// Every key written by this pass is overwritten in place; keys of observers
/// that are no longer usable are pruned once the pass succeeds. Returns the
/// compiled map as a wire value.
pub fn compile_observations<E: Engine + ?Sized>(
    engine: &mut E,
    observations: &mut ObservationMap,
    settings: &BridgeSettings,
) -> Result<Value> {
    let playing_world = engine.playing_world();
    observations.begin_compile();

    for observer in engine.observers() {
        let Some(parent) = observer_parent(&*engine, &observer, playing_world) else {
            continue;
        };

        if observer.screen_capture {
            let (capture, target) = provision_capture(engine, &observer, parent, settings)?;
            let frame = capture_frame(engine, capture, target)?;
            observations.insert(&observation_key(&observer.name, CAMERA_FIELD), Value::Pixels(frame));
        }

        let Some(source) = property_source(&*engine, &observer, parent) else {
            continue;
        };
        for observed in observer.observed_properties.iter().filter(|p| p.enabled) {
            let Some(value) = engine.property(source, &observed.name) else {
                continue;
            };
            observations.insert(
                &observation_key(&observer.name, &observed.name),
                value.to_wire(&observed.name)?,
            );
        }
    }

    observations.finish_compile();
    debug!(entries = observations.len(), "compiled observations");
    Ok(observations.to_value())
}
