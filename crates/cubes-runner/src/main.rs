//! Entry point for the cube world runtime.
//!
//! Loads configuration and the world roster, restores saved state, then
//! runs the simulation loop until Ctrl-C. Lines typed on stdin in the form
//! `cube-1: hello` are delivered to that cube as user messages.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cubes_agents::{IdentityHints, KeywordClassifier, MemoryStore};
use cubes_db::StateStore;
use cubes_runner::archetype::ModelTable;
use cubes_runner::config::RunnerConfig;
use cubes_runner::persistence::load_state;
use cubes_runner::prompt::PromptEngine;
use cubes_runner::simulation::{Simulation, parse_console_line, seed_memories};
use cubes_runner::world::WorldFile;
use cubes_runner::{Planner, create_backend};
use cubes_world::WorldRegistry;

/// Pending user messages before the console reader waits.
const INBOX_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("cubes-runner starting");

    let config = RunnerConfig::from_env().context("loading configuration")?;
    info!(
        backend = ?config.backend.backend_type,
        api_url = %config.backend.api_url,
        world_file = %config.world_file.display(),
        state_backend = ?config.state_backend,
        "configuration loaded"
    );

    let world = WorldFile::from_file(&config.world_file)
        .with_context(|| format!("loading world roster {}", config.world_file.display()))?;
    let registry = Arc::new(WorldRegistry::new());
    for state in world.initial_states() {
        registry.register(state);
    }
    info!(
        cubes = registry.len(),
        points_of_interest = world.points_of_interest.len(),
        lore = world.lore.len(),
        "world loaded"
    );

    let store = StateStore::open(
        config.state_backend,
        &config.state_dir,
        &config.dragonfly_url,
    )
    .await
    .context("opening state store")?;
    let memory = Arc::new(MemoryStore::default());
    let hints = Arc::new(IdentityHints::new(config.identity_hint_limit));
    match load_state(&store, &registry, &memory, &hints).await {
        Ok(report) => debug!(?report, backend = store.backend_name(), "saved state loaded"),
        Err(e) => warn!(error = %e, "saved state unavailable, starting fresh"),
    }
    seed_memories(&registry, &memory);

    let backend = create_backend(&config.backend).context("creating inference backend")?;
    info!(backend = backend.name(), "inference backend configured");
    let prompts =
        PromptEngine::new(config.templates_dir.as_deref()).context("loading prompt templates")?;

    let _changes = registry.subscribe(|snapshot| {
        debug!(cubes = snapshot.len(), "world state changed");
    });

    let planner = Arc::new(Planner::new(
        backend,
        prompts,
        ModelTable::with_overrides(&config.model_overrides),
        world.lore_book(),
        Arc::clone(&registry),
        memory,
        hints,
    ));
    let simulation = Simulation::new(
        planner,
        Arc::new(KeywordClassifier),
        store,
        world,
        config.timing,
        config.social_radius,
    );

    let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_console_line(&line) {
                Some(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!(line = %line, "expected `cube-id: message`"),
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    simulation.run(rx, shutdown).await?;

    info!("cubes-runner stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
