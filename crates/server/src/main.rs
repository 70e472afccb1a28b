mod config;
mod events;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use stormreach::ability::{AbilityBook, AbilityDef};
use stormreach::physics::FlatWorld;
use stormreach::zone::{Zone, ZoneDefinition};

use config::ServerConfig;
use server::{HostCommand, ZoneHost};

#[derive(Parser)]
#[command(name = "stormreach-server")]
#[command(about = "Stormreach zone server")]
struct Args {
    /// Zone definition files (JSON); one zone task is spawned per file.
    #[arg(short, long, required = true)]
    zone: Vec<PathBuf>,

    /// Ability book (JSON array of ability definitions).
    #[arg(short, long)]
    abilities: Option<PathBuf>,

    #[arg(long, default_value_t = 64)]
    max_players: usize,

    /// Disconnect grace period in seconds.
    #[arg(long, default_value_t = 120)]
    grace_secs: u64,

    /// Walkable half-extent of the flat world used when no navmesh asset is
    /// configured.
    #[arg(long, default_value_t = 256.0)]
    world_half_size: f32,
}

fn load_ability_book(path: Option<&PathBuf>) -> Result<AbilityBook> {
    let Some(path) = path else {
        log::warn!("no ability book configured; zones start with no abilities");
        return Ok(AbilityBook::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading ability book {}", path.display()))?;
    let defs: Vec<AbilityDef> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing ability book {}", path.display()))?;
    Ok(AbilityBook::from_defs(defs))
}

fn load_zone_definition(path: &PathBuf) -> Result<ZoneDefinition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading zone definition {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing zone definition {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ServerConfig {
        max_players: args.max_players,
        grace_period_ms: args.grace_secs * 1000,
    };

    // A zone without world data must not start at all.
    let world = Arc::new(FlatWorld::new(args.world_half_size));

    let mut handles = Vec::new();
    let mut senders = Vec::new();
    for path in &args.zone {
        let definition = load_zone_definition(path)?;
        let book = load_ability_book(args.abilities.as_ref())?;
        let zone_id = definition.zone_id;

        let zone = Zone::new(definition, book, world.clone(), world.clone());
        let (host, sender) = ZoneHost::new(zone, config.clone());

        log::info!("starting zone {zone_id} from {}", path.display());
        handles.push(tokio::spawn(host.run()));
        senders.push(sender);
    }

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down {} zones", senders.len());
    for sender in senders {
        let _ = sender.send(HostCommand::Shutdown);
    }
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
