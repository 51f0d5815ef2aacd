//! Action and observation space compilers

use crate::engine::{Engine, InputSystem};
use crate::observer::{observer_parent, property_source, provision_capture};
use crate::settings::BridgeSettings;
use e2l_core::observation::CAMERA_FIELD;
use e2l_core::{
    ActionDesc, ActionSpaceDesc, BridgeError, ObservationSpaceDesc, PropertyValue, Result, SpaceDesc,
    observation_key,
};
use tracing::{debug, warn};

/// Group the engine's input bindings by action/axis name
///
/// Action keys are collected without duplicates; axis bindings accumulate
/// one `(key, scale)` pair per binding, repeats included. A name bound both as action and as axis
/// keeps whichever kind was seen first.
pub fn action_space<E: InputSystem + ?Sized>(engine: &E) -> ActionSpaceDesc {
    let mut desc = ActionSpaceDesc::new();

    for binding in engine.action_bindings() {
        let entry = desc
            .entry(binding.action)
            .or_insert_with(|| ActionDesc::Action { keys: Vec::new() });
        if let ActionDesc::Action { keys } = entry {
            if !keys.contains(&binding.key) {
                keys.push(binding.key);
            }
        }
    }

    for binding in engine.axis_bindings() {
        let entry = desc
            .entry(binding.axis.clone())
            .or_insert_with(|| ActionDesc::Axis { keys: Vec::new() });
        match entry {
            ActionDesc::Axis { keys } => keys.push((binding.key, binding.scale)),
            ActionDesc::Action { .. } => {
                warn!(name = %binding.axis, key = %binding.key, "axis binding shadowed by an action of the same name");
            }
        }
    }

    debug!(entries = desc.len(), "compiled action space");
    desc
}

/// Descriptor for a property's runtime type
pub fn describe_property(property: &str, value: &PropertyValue) -> Result<SpaceDesc> {
    match value {
        PropertyValue::Vector(_) => Ok(SpaceDesc::Continuous { shape: vec![3] }),
        PropertyValue::Object(_) => Ok(SpaceDesc::Str),
        PropertyValue::Bool(_) => Ok(SpaceDesc::Bool),
        PropertyValue::Float(_) => Ok(SpaceDesc::Continuous { shape: vec![1] }),
        PropertyValue::Int(_) => Ok(SpaceDesc::IntBox {
            shape: vec![1],
            min: None,
            max: None,
        }),
        PropertyValue::Unsupported(type_name) => Err(BridgeError::UnsupportedPropertyType {
            property: property.to_string(),
            type_name: type_name.clone(),
        }),
    }
}

/// Describe every observation the current observers would produce
///
/// Uses the same observer filtering as the observation compiler. Screen
/// captures are provisioned here too, so the reported image shape is the
/// size of the render target actually in use.
pub fn observation_space<E: Engine + ?Sized>(
    engine: &mut E,
    settings: &BridgeSettings,
) -> Result<ObservationSpaceDesc> {
    let playing_world = engine.playing_world();
    let mut desc = ObservationSpaceDesc::new();

    for observer in engine.observers() {
        let Some(parent) = observer_parent(&*engine, &observer, playing_world) else {
            continue;
        };

        if observer.screen_capture {
            let (_, target) = provision_capture(engine, &observer, parent, settings)?;
            desc.insert(
                observation_key(&observer.name, CAMERA_FIELD),
                SpaceDesc::camera(target.width, target.height),
            );
        }

        let Some(source) = property_source(&*engine, &observer, parent) else {
            continue;
        };
        for observed in observer.observed_properties.iter().filter(|p| p.enabled) {
            let Some(value) = engine.property(source, &observed.name) else {
                continue;
            };
            desc.insert(
                observation_key(&observer.name, &observed.name),
                describe_property(&observed.name, &value)?,
            );
        }
    }

    debug!(entries = desc.len(), "compiled observation space");
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ObjectClass, ObserverDecl};
    use crate::sandbox::SandboxEngine;

    #[test]
    fn test_axis_grouping() {
        let mut engine = SandboxEngine::new();
        engine.bind_axis("Forward", "W", 1.0);
        engine.bind_axis("Forward", "S", -1.0);

        let desc = action_space(&engine);
        assert_eq!(
            desc["Forward"],
            ActionDesc::Axis {
                keys: vec![("W".into(), 1.0), ("S".into(), -1.0)],
            }
        );
    }

    #[test]
    fn test_repeated_axis_bindings_accumulate() {
        let mut engine = SandboxEngine::new();
        engine.bind_axis("Turn", "MouseX", 1.0);
        engine.bind_axis("Turn", "MouseX", 1.0);

        let desc = action_space(&engine);
        assert_eq!(
            desc["Turn"],
            ActionDesc::Axis {
                keys: vec![("MouseX".into(), 1.0), ("MouseX".into(), 1.0)],
            }
        );
    }

    #[test]
    fn test_action_keys_deduplicated() {
        let mut engine = SandboxEngine::new();
        engine.bind_action("Fire", "SpaceBar");
        engine.bind_action("Fire", "LeftMouseButton");
        engine.bind_action("Fire", "SpaceBar");
        engine.bind_action("Jump", "J");

        let desc = action_space(&engine);
        assert_eq!(
            desc["Fire"],
            ActionDesc::Action {
                keys: vec!["SpaceBar".into(), "LeftMouseButton".into()],
            }
        );
        assert_eq!(desc.len(), 2);
    }

    #[test]
    fn test_property_descriptors() {
        let (mut engine, world) = SandboxEngine::with_playing_world();
        let pawn = engine.spawn_entity(world, "Pawn");
        engine.define(pawn, "Location", PropertyValue::Vector([0.0; 3]));
        engine.define(pawn, "Target", PropertyValue::Object("None".into()));
        engine.define(pawn, "Alive", PropertyValue::Bool(true));
        engine.define(pawn, "Speed", PropertyValue::Float(1.0));
        engine.define(pawn, "Ammo", PropertyValue::Int(3));
        engine.add_observer(
            pawn,
            ObserverDecl::new("Hero")
                .observe("Location")
                .observe("Target")
                .observe("Alive")
                .observe("Speed")
                .observe("Ammo"),
        );

        let desc = observation_space(&mut engine, &BridgeSettings::default()).unwrap();
        assert_eq!(desc["Hero:Location"], SpaceDesc::Continuous { shape: vec![3] });
        assert_eq!(desc["Hero:Target"], SpaceDesc::Str);
        assert_eq!(desc["Hero:Alive"], SpaceDesc::Bool);
        assert_eq!(desc["Hero:Speed"], SpaceDesc::Continuous { shape: vec![1] });
        assert_eq!(
            desc["Hero:Ammo"],
            SpaceDesc::IntBox {
                shape: vec![1],
                min: None,
                max: None,
            }
        );
    }

    #[test]
    fn test_camera_descriptor_uses_target_size() {
        let (mut engine, world) = SandboxEngine::with_playing_world();
        let pawn = engine.spawn_entity(world, "Pawn");
        let camera = engine.attach(pawn, ObjectClass::Camera, "Camera");
        engine.add_observer(camera, ObserverDecl::new("Eye").with_screen_capture());

        let settings = BridgeSettings {
            capture_width: 84,
            capture_height: 64,
            ..Default::default()
        };
        let desc = observation_space(&mut engine, &settings).unwrap();
        assert_eq!(desc["Eye:camera"], SpaceDesc::camera(84, 64));
    }

    #[test]
    fn test_unsupported_type_is_error() {
        let (mut engine, world) = SandboxEngine::with_playing_world();
        let pawn = engine.spawn_entity(world, "Pawn");
        engine.define(pawn, "Mesh", PropertyValue::Unsupported("StaticMesh".into()));
        engine.add_observer(pawn, ObserverDecl::new("Hero").observe("Mesh"));

        assert!(matches!(
            observation_space(&mut engine, &BridgeSettings::default()),
            Err(BridgeError::UnsupportedPropertyType { .. })
        ));
    }

    #[test]
    fn test_no_playing_world_reports_no_observers() {
        let mut engine = SandboxEngine::new();
        let world = engine.add_world();
        let pawn = engine.spawn_entity(world, "Pawn");
        engine.define(pawn, "Ammo", PropertyValue::Int(3));
        engine.add_observer(pawn, ObserverDecl::new("Hero").observe("Ammo"));

        let desc = observation_space(&mut engine, &BridgeSettings::default()).unwrap();
        assert!(desc.is_empty());
    }
}
