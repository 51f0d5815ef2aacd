//! Engine2Learn bridge server
//!
//! Serves the command protocol over TCP on top of the in-memory sandbox
//! engine. Settings are layered: defaults, then an optional TOML file, then
//! `E2L_ADDRESS` / `E2L_PORT`, then command-line flags.

use anyhow::Result;
use clap::Parser;
use e2l_bridge::BridgeServer;
use e2l_core::PropertyValue;
use e2l_server::{BridgeSettings, CommandDispatcher, ObjectClass, ObserverDecl, SandboxEngine};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "e2l-server", version, about = "Engine2Learn RL bridge server")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

fn load_settings(args: &Args) -> Result<BridgeSettings> {
    let mut settings = match &args.config {
        Some(path) => BridgeSettings::from_file(path)?,
        None => BridgeSettings::default(),
    };
    settings.apply_env()?;
    if let Some(address) = &args.address {
        settings.address = address.clone();
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    settings.validate()?;
    Ok(settings)
}

/// A small scene: a movable player with a camera, and two walls
fn demo_engine() -> SandboxEngine {
    let (mut engine, world) = SandboxEngine::with_playing_world();

    let player = engine.spawn_entity(world, "Player");
    engine.define(player, "Location", PropertyValue::Vector([0.0, 0.0, 0.0]));
    engine.define(player, "Velocity", PropertyValue::Vector([0.0, 0.0, 0.0]));
    engine.define(player, "Health", PropertyValue::Int(100));
    engine.add_observer(
        player,
        ObserverDecl::new("PlayerObserver")
            .observe("Location")
            .observe("Health"),
    );

    let camera = engine.attach(player, ObjectClass::Camera, "Camera");
    engine.add_observer(camera, ObserverDecl::new("CameraObserver").with_screen_capture());

    for (name, x) in [("Wall_1", 200.0), ("Wall_2", -200.0)] {
        let wall = engine.spawn_entity(world, name);
        engine.define(wall, "Location", PropertyValue::Vector([x, 0.0, 0.0]));
        engine.define(wall, "bHidden", PropertyValue::Bool(false));
    }

    engine.bind_action("Jump", "SpaceBar");
    engine.bind_axis("MoveForward", "W", 1.0);
    engine.bind_axis("MoveForward", "S", -1.0);
    engine.bind_axis("MoveRight", "D", 1.0);
    engine.bind_axis("MoveRight", "A", -1.0);
    engine
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let settings = load_settings(&args)?;
    info!(
        address = %settings.bind_address(),
        capture = %format!("{}x{}", settings.capture_width, settings.capture_height),
        "Engine2Learn bridge starting..."
    );

    let dispatcher = CommandDispatcher::new(demo_engine(), settings);
    let server = BridgeServer::bind(dispatcher).await?;
    let handle = server.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    handle.stop().await;
    Ok(())
}
