use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec2;
use simspace_kernel::{World, WorldGeometry};
use simspace_sim::{FrameInput, FrameTimer, GameState, SimConfig};
use tracing_subscriber::EnvFilter;

/// Tiles per screen of the demo level.
const SCREEN_TILES_X: i32 = 17;
const SCREEN_TILES_Y: i32 = 9;

#[derive(Parser)]
#[command(name = "simspace-cli", about = "CLI tool for simspace operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file with simulation config overrides
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, world geometry and effective config
    Info,
    /// Simulate the demo level with scripted input
    Run {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "600")]
        frames: u64,
        /// Seconds per frame
        #[arg(long, default_value = "0.0166667")]
        dt: f32,
        /// Print stats every N frames
        #[arg(long, default_value = "60")]
        report_every: u64,
        /// Demo level size in screens per side
        #[arg(long, default_value = "2")]
        screens: i32,
    },
    /// Run the demo twice and compare final state hashes
    Replay {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "300")]
        frames: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            let geometry = WorldGeometry::default();
            println!("simspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("sim: {}", simspace_sim::crate_info());
            println!(
                "geometry: tile={}m, chunk={} tiles ({}m)",
                geometry.tile_side_in_meters,
                geometry.tiles_per_chunk,
                geometry.chunk_side_in_meters()
            );
            println!("config: {}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            frames,
            dt,
            report_every,
            screens,
        } => {
            let mut game = demo_game(config, screens)?;
            tracing::info!(
                records = game.world().low_entity_count(),
                chunks = game.world().chunk_count(),
                "demo level built"
            );

            let mut timer = FrameTimer::new(120);
            let mut collisions = 0;
            let mut relocations = 0;
            for frame in 0..frames {
                let stats = game.update_and_simulate(&scripted_input(frame), dt);
                timer.record(stats.frame_time);
                collisions += stats.collisions;
                relocations += stats.relocations;
                if report_every > 0 && frame % report_every == 0 {
                    println!("{stats}");
                }
            }

            println!(
                "Done: frames={}, collisions={}, relocations={}, avg={:?}, max={:?}, hash={:#018x}",
                game.frame_index(),
                collisions,
                relocations,
                timer.average(),
                timer.max(),
                game.world().state_hash()
            );
        }
        Commands::Replay { frames } => {
            println!("Deterministic replay: frames={frames}");

            let mut hashes = Vec::with_capacity(2);
            for run in 1..=2 {
                let mut game = demo_game(config, 2)?;
                for frame in 0..frames {
                    game.update_and_simulate(&scripted_input(frame), 1.0 / 60.0);
                }
                let hash = game.world().state_hash();
                let records = game.world().low_entity_count();
                println!("Run {run}: records={records}, hash={hash:#018x}");
                hashes.push(hash);
            }
            println!(
                "Match: {}",
                if hashes[0] == hashes[1] { "OK" } else { "MISMATCH" }
            );
        }
    }

    Ok(())
}

/// A grid of walled screens with doors in the middle of each side, one
/// monster and one familiar per screen, and the hero in the first screen.
fn demo_game(config: SimConfig, screens: i32) -> anyhow::Result<GameState> {
    let mut world = World::new(WorldGeometry::default());

    for screen_y in 0..screens {
        for screen_x in 0..screens {
            let base_x = screen_x * SCREEN_TILES_X;
            let base_y = screen_y * SCREEN_TILES_Y;
            for tile_y in 0..SCREEN_TILES_Y {
                for tile_x in 0..SCREEN_TILES_X {
                    let edge_x = tile_x == 0 || tile_x == SCREEN_TILES_X - 1;
                    let edge_y = tile_y == 0 || tile_y == SCREEN_TILES_Y - 1;
                    let door = (edge_x && tile_y == SCREEN_TILES_Y / 2)
                        || (edge_y && tile_x == SCREEN_TILES_X / 2);
                    if (edge_x || edge_y) && !door {
                        world.add_wall(base_x + tile_x, base_y + tile_y, 0);
                    }
                }
            }

            let geometry = *world.geometry();
            world.add_monster(geometry.chunk_position_from_tile(base_x + 12, base_y + 4, 0));
            world.add_familiar(geometry.chunk_position_from_tile(base_x + 5, base_y + 6, 0));
        }
    }

    let geometry = *world.geometry();
    let mut game = GameState::new(world, config).context("invalid sim config")?;
    game.spawn_hero(geometry.chunk_position_from_tile(SCREEN_TILES_X / 2, SCREEN_TILES_Y / 2, 0));
    Ok(game)
}

/// Walk in a slow circle, throw the sword every 90 frames, jump every 120.
fn scripted_input(frame: u64) -> FrameInput {
    let angle = frame as f32 * 0.02;
    let direction = Vec2::new(angle.cos(), angle.sin());
    FrameInput {
        acceleration: direction,
        jump: frame % 120 == 60,
        sword: (frame % 90 == 0).then_some(direction),
    }
}
