//! The generation benchmark main() implementation

use std::time::Instant;

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::time::TimePlugin;
use clap::{Parser, ValueEnum};
use vx_schemas::coordinates::AbsChunkPos;
use vx_schemas::voxel::gen_level::ChunkGenLevel;

use crate::config::GeneratorConfig;
use crate::prelude::*;
use crate::voxel::generator::flat::FlatGenerator;
use crate::voxel::generator::height_noise::HeightNoiseGenerator;
use crate::voxel::generator::ProceduralGenerator;
use crate::voxel::plugin::{ChunkGenerationPlugin, ChunkGeneratorResource};
use crate::voxel::query::ChunkQuery;
use crate::voxel::scheduler::{ChunkGenFinished, ChunkGenerator};
use crate::voxel::worker_pool::ComputeTaskPoolWorkers;
use crate::TICK;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum GeneratorKind {
    /// Stacked flat layers at the base height.
    Flat,
    /// Fractal noise heightfield.
    Noise,
}

#[derive(Parser)]
#[command(name = "vx_gen_bench", about = "Voxgen chunk generation benchmark")]
struct CliOptions {
    /// Horizontal radius of the generated area, in chunks.
    #[arg(long, default_value_t = 4)]
    radius: i32,
    /// Number of chunk layers to generate, upwards from y=-1.
    #[arg(long, default_value_t = 3)]
    height: i32,
    /// Generation level requested for every chunk.
    #[arg(long, default_value = "done", value_parser = parse_level)]
    level: ChunkGenLevel,
    /// World seed, overrides the default planet seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Terrain generator to use.
    #[arg(long, value_enum, default_value_t = GeneratorKind::Noise)]
    generator: GeneratorKind,
    /// Maximum number of finished tasks processed per tick.
    #[arg(long)]
    batch: Option<usize>,
}

fn parse_level(name: &str) -> Result<ChunkGenLevel, String> {
    ChunkGenLevel::from_name(name).ok_or_else(|| {
        let names: Vec<_> = ChunkGenLevel::ALL.iter().map(|l| l.name()).collect();
        format!("unknown level {name}, expected one of: {}", names.join(", "))
    })
}

#[derive(Resource)]
struct BenchRequest {
    positions: Vec<AbsChunkPos>,
    level: ChunkGenLevel,
}

#[derive(Resource, Default)]
struct BenchProgress {
    queries: Vec<ChunkQuery>,
    started: Option<Instant>,
    reported: bool,
    finished_per_level: HashMap<ChunkGenLevel, usize>,
}

/// Starts the generation benchmark CLI
pub fn run_gen_bench() -> Result<()> {
    let cli = CliOptions::parse();
    ensure!(cli.radius >= 0, "Radius must not be negative");
    ensure!(cli.height > 0, "Height must be positive");

    let mut config = GeneratorConfig::default();
    if let Some(seed) = cli.seed {
        config.planet.seed = seed;
    }
    if let Some(batch) = cli.batch {
        config.max_finished_per_update = batch;
    }
    config.validate().context("Invalid generator configuration")?;

    let generator: Arc<dyn ProceduralGenerator> = match cli.generator {
        GeneratorKind::Flat => Arc::new(FlatGenerator::grassland(config.planet.base_height)),
        GeneratorKind::Noise => Arc::new(HeightNoiseGenerator::new(&config.planet)),
    };
    let chunk_generator = ChunkGenerator::new(Arc::new(ComputeTaskPoolWorkers::new()), generator, &config)?;

    let r = cli.radius;
    let mut positions = Vec::new();
    for y in -1..cli.height - 1 {
        for z in -r..=r {
            for x in -r..=r {
                positions.push(AbsChunkPos::new(x, y, z));
            }
        }
    }

    let mut app = App::new();
    app.add_plugins(LogPlugin::default())
        .add_plugins(TaskPoolPlugin {
            task_pool_options: TaskPoolOptions {
                async_compute: bevy::core::TaskPoolThreadAssignmentPolicy {
                    min_threads: 1,
                    max_threads: usize::MAX,
                    percent: 0.75,
                },
                ..default()
            },
        })
        .add_plugins(TimePlugin)
        .add_plugins(ScheduleRunnerPlugin::run_loop(TICK))
        .add_plugins(ChunkGenerationPlugin::new(config.new_handle()));
    app.insert_resource(Time::<Fixed>::from_duration(TICK))
        .insert_resource(ChunkGeneratorResource(chunk_generator))
        .insert_resource(BenchRequest {
            positions,
            level: cli.level,
        })
        .init_resource::<BenchProgress>();
    app.add_systems(Startup, submit_bench_queries)
        .add_systems(FixedPostUpdate, track_bench_progress);

    info!("Generation benchmark starting");
    match app.run() {
        AppExit::Success => Ok(()),
        AppExit::Error(code) => bail!("Generation benchmark exited with code {code}"),
    }
}

fn submit_bench_queries(
    request: Res<BenchRequest>,
    mut generator: ResMut<ChunkGeneratorResource>,
    mut progress: ResMut<BenchProgress>,
    mut exit: EventWriter<AppExit>,
) {
    info!(
        "Requesting {} chunks at level {}",
        request.positions.len(),
        request.level
    );
    progress.started = Some(Instant::now());
    for &pos in &request.positions {
        match generator.0.request(pos, request.level) {
            Ok(query) => progress.queries.push(query),
            Err(e) => {
                error!("Could not request chunk {pos}: {e}");
                progress.reported = true;
                exit.send(AppExit::from_code(1));
                return;
            }
        }
    }
}

fn track_bench_progress(
    mut finished: EventReader<ChunkGenFinished>,
    generator: Res<ChunkGeneratorResource>,
    mut progress: ResMut<BenchProgress>,
    mut exit: EventWriter<AppExit>,
) {
    for event in finished.read() {
        *progress.finished_per_level.entry(event.level).or_default() += 1;
    }
    if progress.reported || !progress.queries.iter().all(ChunkQuery::is_finished) {
        return;
    }
    let elapsed = progress.started.map(|s| s.elapsed()).unwrap_or_default();
    let stats = generator.0.stats();
    for level in ChunkGenLevel::ALL {
        if let Some(count) = progress.finished_per_level.get(&level) {
            info!("{count} queries finished at level {level}");
        }
    }
    info!(
        "Generated {} chunks in {elapsed:.2?}: {} heightmap tasks, {} chunk tasks, {} refused by the pool",
        progress.queries.len(),
        stats.heightmap_tasks_dispatched,
        stats.chunk_tasks_dispatched,
        stats.dispatch_failures
    );
    progress.reported = true;
    exit.send(AppExit::Success);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cli_defaults_and_levels() {
        let cli = CliOptions::try_parse_from(["vx_gen_bench"]).unwrap();
        assert_eq!(cli.radius, 4);
        assert_eq!(cli.level, ChunkGenLevel::Done);
        assert!(matches!(cli.generator, GeneratorKind::Noise));

        let cli = CliOptions::try_parse_from(["vx_gen_bench", "--level", "flora", "--generator", "flat", "--batch", "5"])
            .unwrap();
        assert_eq!(cli.level, ChunkGenLevel::Flora);
        assert!(matches!(cli.generator, GeneratorKind::Flat));
        assert_eq!(cli.batch, Some(5));

        assert!(CliOptions::try_parse_from(["vx_gen_bench", "--level", "trees"]).is_err());
    }
}
