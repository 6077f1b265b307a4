use std::hint::black_box;
use std::time::Instant;

use glam::Vec2;
use simspace_common::{EntityFlags, EntityType, Rect2, StorageIndex};
use simspace_kernel::{ChunkPosition, World, WorldGeometry};
use simspace_sim::{
    Camera, FrameInput, GameState, MoveSpec, SimArena, SimConfig, SimRegion, begin_simulation,
    end_simulation, move_entity,
};

/// A square field of monsters around the origin, `spacing` meters apart.
fn make_world(entity_count: usize, spacing: f32) -> World {
    let mut world = World::new(WorldGeometry::default());
    let side = (entity_count as f32).sqrt().ceil() as usize;
    let half = side as f32 * spacing * 0.5;
    for i in 0..entity_count {
        let x = (i % side) as f32 * spacing - half;
        let y = (i / side) as f32 * spacing - half;
        let p = world
            .geometry()
            .map_into_chunk_space(ChunkPosition::default(), Vec2::new(x, y));
        world.add_monster(p);
    }
    world
}

fn bounds() -> Rect2 {
    Rect2::from_center_dim(Vec2::ZERO, Vec2::new(71.4, 37.8))
}

fn bench_begin_end(entity_count: usize, iterations: usize) {
    let mut world = make_world(entity_count, 1.5);
    let config = SimConfig::default();
    let mut arena = SimArena::new(&config);
    let mut camera = Camera::default();

    let start = Instant::now();
    let mut loaded = 0;
    for _ in 0..iterations {
        let region = begin_simulation(
            &mut arena,
            &mut world,
            &config,
            ChunkPosition::default(),
            bounds(),
        );
        loaded = end_simulation(black_box(region), &mut world, &mut camera);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  begin/end ({entity_count} entities, {loaded} loaded, {iterations} iters): \
         {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_hash_lookup(entity_count: usize, iterations: usize) {
    let mut world = make_world(entity_count, 1.5);
    let config = SimConfig::default();
    let mut arena = SimArena::new(&config);
    let region = begin_simulation(
        &mut arena,
        &mut world,
        &config,
        ChunkPosition::default(),
        bounds(),
    );
    let indices: Vec<_> = region.entities().iter().map(|e| e.storage_index).collect();

    let start = Instant::now();
    for _ in 0..iterations {
        for &index in &indices {
            let _ = black_box(region.get_entity_by_storage_index(black_box(index)));
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  hash lookup ({} resident, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        indices.len()
    );
}

fn bench_move_entity(obstacles: usize, iterations: usize) {
    let config = SimConfig::default();
    let mut arena = SimArena::new(&config);
    let mut region = SimRegion::new(&mut arena, &config, ChunkPosition::default(), bounds());

    for i in 0..obstacles {
        let index = StorageIndex::new(i as u32 + 1).unwrap();
        let p = Vec2::new(4.0 + (i % 16) as f32 * 1.5, (i / 16) as f32 * 1.5 - 12.0);
        let h = region.add(None, index, Some(p));
        let e = region.entity_mut(h);
        e.entity_type = EntityType::Wall;
        e.width = 1.4;
        e.height = 1.4;
        e.flags = EntityFlags::COLLIDES;
    }
    let mover_index = StorageIndex::new(obstacles as u32 + 1).unwrap();
    let mover = region.add(None, mover_index, Some(Vec2::ZERO));
    region.entity_mut(mover).flags = EntityFlags::COLLIDES;

    let spec = MoveSpec {
        speed: 50.0,
        drag: 8.0,
        unit_max_accel_vector: true,
    };
    let start = Instant::now();
    for i in 0..iterations {
        let entity = region.entity_mut(mover);
        entity.position = Vec2::ZERO;
        entity.velocity = Vec2::ZERO;
        entity.width = 1.0;
        entity.height = 0.5;
        let direction = if i % 2 == 0 { Vec2::X } else { Vec2::Y };
        let _ = black_box(move_entity(&mut region, mover, 1.0 / 60.0, &spec, black_box(direction)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  move_entity ({obstacles} obstacles, {iterations} iters): \
         {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_frame(entity_count: usize, iterations: usize) {
    let world = make_world(entity_count, 1.5);
    let mut game = GameState::new(world, SimConfig::default()).expect("default config is valid");
    game.spawn_hero(ChunkPosition::default());

    let input = FrameInput {
        acceleration: Vec2::new(0.3, 1.0),
        ..FrameInput::default()
    };
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(game.update_and_simulate(black_box(&input), 1.0 / 60.0));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  full frame ({entity_count} entities, {iterations} iters): \
         {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Sim Region Benchmarks ===\n");

    println!("Begin/end simulation:");
    bench_begin_end(100, 1000);
    bench_begin_end(1000, 100);

    println!("\nStorage-index hash lookup:");
    bench_hash_lookup(100, 10000);
    bench_hash_lookup(1000, 1000);

    println!("\nMove entity (collision sweep):");
    bench_move_entity(16, 10000);
    bench_move_entity(256, 1000);

    println!("\nFull frame:");
    bench_frame(100, 1000);
    bench_frame(1000, 100);

    println!("\n=== Done ===");
}
