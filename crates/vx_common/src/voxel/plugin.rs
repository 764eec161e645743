//! The Bevy plugin driving chunk generation from the fixed tick.

use bevy::prelude::*;

use crate::config::{GeneratorConfig, GeneratorConfigHandle};
use crate::prelude::*;
use crate::voxel::scheduler::{ChunkGenFinished, ChunkGenerator};

/// The scheduler, stored as a world resource.
#[derive(Resource)]
pub struct ChunkGeneratorResource(pub ChunkGenerator);

#[derive(Resource)]
struct GeneratorConfigWatcher(AsyncWatchReceiver<GeneratorConfig>);

/// Updates the [`ChunkGeneratorResource`] every fixed tick and re-broadcasts its notifications as
/// [`ChunkGenFinished`] events. Changes published to the config handle apply on the next tick.
pub struct ChunkGenerationPlugin {
    config: GeneratorConfigHandle,
}

impl ChunkGenerationPlugin {
    /// Constructs the plugin watching the given configuration.
    pub fn new(config: GeneratorConfigHandle) -> Self {
        Self { config }
    }
}

impl Plugin for ChunkGenerationPlugin {
    fn build(&self, app: &mut App) {
        let mut watcher = self.config.1.clone();
        watcher.mark_changed();
        app.add_event::<ChunkGenFinished>()
            .insert_resource(GeneratorConfigWatcher(watcher))
            .add_systems(
                FixedPreUpdate,
                (system_apply_config_changes, system_update_chunk_generator)
                    .chain()
                    .run_if(resource_exists::<ChunkGeneratorResource>),
            );
    }

    fn name(&self) -> &str {
        "common::ChunkGenerationPlugin"
    }

    fn is_unique(&self) -> bool {
        true
    }
}

fn system_apply_config_changes(
    mut watcher: ResMut<GeneratorConfigWatcher>,
    mut generator: ResMut<ChunkGeneratorResource>,
) {
    if !watcher.0.has_changed().unwrap_or(false) {
        return;
    }
    let max_finished = {
        let config = watcher.0.borrow_and_update();
        if let Err(e) = config.validate() {
            warn!("Ignoring invalid generator configuration: {e}");
            return;
        }
        config.max_finished_per_update
    };
    if generator.0.max_finished_per_update() != max_finished {
        info!("Chunk generator batch size set to {max_finished}");
        generator.0.set_max_finished_per_update(max_finished);
    }
}

fn system_update_chunk_generator(
    mut generator: ResMut<ChunkGeneratorResource>,
    mut finished_events: EventWriter<ChunkGenFinished>,
) {
    let finished = generator.0.update();
    if !finished.is_empty() {
        finished_events.send_batch(finished);
    }
}

#[cfg(test)]
mod test {
    use vx_schemas::coordinates::AbsChunkPos;
    use vx_schemas::voxel::gen_level::ChunkGenLevel;

    use super::*;
    use crate::voxel::generator::flat::FlatGenerator;
    use crate::voxel::worker_pool::ManualWorkerPool;

    fn test_app(config: &GeneratorConfigHandle) -> (App, Arc<ManualWorkerPool>) {
        let pool = Arc::new(ManualWorkerPool::new());
        let generator = ChunkGenerator::new(
            pool.clone(),
            Arc::new(FlatGenerator::grassland(0)),
            &config.1.borrow(),
        )
        .unwrap();
        let mut app = App::new();
        app.add_plugins(ChunkGenerationPlugin::new(Arc::clone(config)))
            .insert_resource(ChunkGeneratorResource(generator));
        (app, pool)
    }

    fn tick(app: &mut App) -> Vec<ChunkGenFinished> {
        app.world_mut().run_schedule(FixedPreUpdate);
        let events = app.world().resource::<Events<ChunkGenFinished>>();
        events.iter_current_update_events().copied().collect()
    }

    #[test]
    fn ticks_send_finished_events() {
        let config = GeneratorConfig::default().new_handle();
        let (mut app, pool) = test_app(&config);
        let pos = AbsChunkPos::new(0, -1, 0);
        let query = app
            .world_mut()
            .resource_mut::<ChunkGeneratorResource>()
            .0
            .request(pos, ChunkGenLevel::Flora)
            .unwrap();

        pool.run_all();
        assert!(tick(&mut app).is_empty());
        pool.run_all();
        assert_eq!(
            tick(&mut app),
            vec![ChunkGenFinished {
                pos,
                level: ChunkGenLevel::Flora
            }]
        );
        assert!(query.is_finished());
    }

    #[test]
    fn config_changes_apply_next_tick() {
        let config = GeneratorConfig::default().new_handle();
        let (mut app, _pool) = test_app(&config);
        let batch = |app: &App| app.world().resource::<ChunkGeneratorResource>().0.max_finished_per_update();
        tick(&mut app);
        assert_eq!(batch(&app), 100);

        config.0.send_modify(|c| c.max_finished_per_update = 7);
        tick(&mut app);
        assert_eq!(batch(&app), 7);

        config.0.send_modify(|c| c.max_finished_per_update = 0);
        tick(&mut app);
        assert_eq!(batch(&app), 7);
    }
}
