//! The chunk generation scheduler: deduplicates queries per chunk, gates chunk generation on the column heightmap,
//! dispatches tasks to a worker pool and resolves finished work back to every waiting query.

use bevy::prelude::Event;
use bevy::utils::synccell::SyncCell;
use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::{debug, error, info_span, trace, warn};
use vx_schemas::coordinates::{AbsChunkPos, ColumnPos};
use vx_schemas::voxel::chunk::{ChunkHandle, QueryId};
use vx_schemas::voxel::chunk_grid::ChunkGrid;
use vx_schemas::voxel::gen_level::ChunkGenLevel;

use crate::config::{GeneratorConfig, GeneratorConfigError};
use crate::prelude::*;
use crate::voxel::generator::ProceduralGenerator;
use crate::voxel::query::{ChunkQuery, QueryTicket};
use crate::voxel::worker_pool::{
    FinishedQuery, GenJob, GenTask, GenTaskKind, QueryFinisher, TaskOutput, WorkerPool, WorkerPoolError,
};

/// Notification that a query finished generating its chunk up to the query's level.
#[derive(Event, Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChunkGenFinished {
    /// The generated chunk.
    pub pos: AbsChunkPos,
    /// The level the finished query requested.
    pub level: ChunkGenLevel,
}

/// Statistics about the scheduler's queues.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChunkGeneratorStats {
    /// Submitted queries that are not resolved yet.
    pub queries_outstanding: usize,
    /// Queries waiting for a column heightmap.
    pub queries_waiting_on_grid_data: usize,
    /// Tasks dispatched whose result was not yet drained by [`ChunkGenerator::update`].
    pub tasks_in_flight: usize,
    /// Heightmap tasks dispatched since creation.
    pub heightmap_tasks_dispatched: u64,
    /// Chunk generation tasks dispatched since creation.
    pub chunk_tasks_dispatched: u64,
    /// Queries resolved since creation.
    pub queries_resolved: u64,
    /// Queries whose task the worker pool refused during an update, retried by the next update.
    pub queries_stalled: usize,
    /// Tasks the worker pool refused since creation.
    pub dispatch_failures: u64,
}

/// A callback invoked for every resolved query that had a task dispatched for it.
pub type GenFinishListener = Box<dyn FnMut(&ChunkGenFinished) + Send + Sync>;

struct TaskDispatcher {
    pool: Arc<dyn WorkerPool>,
    generator: Arc<dyn ProceduralGenerator>,
    finisher: QueryFinisher,
    tasks_in_flight: usize,
    heightmap_tasks_dispatched: u64,
    chunk_tasks_dispatched: u64,
    dispatch_failures: u64,
}

impl TaskDispatcher {
    /// Hands a task to the pool. Nothing is counted as dispatched if the pool refuses it.
    fn dispatch(&mut self, query: QueryId, job: GenJob) -> Result<(), WorkerPoolError> {
        match &job {
            GenJob::Heightmap { column } => debug!(?query, %column, "Dispatching heightmap task"),
            GenJob::Chunk { pos, from, to, .. } => debug!(?query, %pos, %from, %to, "Dispatching chunk task"),
        }
        let task = GenTask::new(query, job, Arc::clone(&self.generator), self.finisher.clone());
        let kind = task.kind();
        if let Err(e) = self.pool.add_task(task) {
            self.dispatch_failures += 1;
            return Err(e);
        }
        match kind {
            GenTaskKind::Heightmap => self.heightmap_tasks_dispatched += 1,
            GenTaskKind::Chunk => self.chunk_tasks_dispatched += 1,
        }
        self.tasks_in_flight += 1;
        Ok(())
    }
}

/// Removes a query from the arena and resolves it, releasing its chunk reference.
fn resolve_query(queries: &mut SlotMap<QueryId, QueryTicket>, resolved_counter: &mut u64, id: QueryId) {
    let ticket = queries
        .remove(id)
        .unwrap_or_else(|| panic!("Resolving unknown query {id:?}"));
    ticket.resolve();
    *resolved_counter += 1;
}

/// Schedules chunk generation work. Owned by the single orchestrating thread, which calls
/// [`submit_query`](Self::submit_query) and [`update`](Self::update); worker threads only talk to it through
/// [`QueryFinisher`]s.
pub struct ChunkGenerator {
    grid: ChunkGrid,
    queries: SlotMap<QueryId, QueryTicket>,
    /// Queries waiting for the heightmap of a column, keyed by column.
    pending_queries: HashMap<ColumnPos, SmallVec<[QueryId; 4]>>,
    /// Queries whose task the pool refused during an update. They hold no place in the grid until re-submitted.
    stalled: Vec<QueryId>,
    dispatcher: TaskDispatcher,
    finished_rx: SyncCell<StdUnboundedReceiver<FinishedQuery>>,
    max_finished_per_update: usize,
    listeners: Vec<GenFinishListener>,
    queries_resolved: u64,
}

impl ChunkGenerator {
    /// Creates a scheduler with an empty grid, running tasks on `pool` with `generator`.
    pub fn new(
        pool: Arc<dyn WorkerPool>,
        generator: Arc<dyn ProceduralGenerator>,
        config: &GeneratorConfig,
    ) -> Result<Self, GeneratorConfigError> {
        config.validate()?;
        let (tx, rx) = std_unbounded_channel();
        Ok(Self {
            grid: ChunkGrid::new(),
            queries: SlotMap::with_capacity_and_key(256),
            pending_queries: HashMap::new(),
            stalled: Vec::new(),
            dispatcher: TaskDispatcher {
                pool,
                generator,
                finisher: QueryFinisher::new(tx),
                tasks_in_flight: 0,
                heightmap_tasks_dispatched: 0,
                chunk_tasks_dispatched: 0,
                dispatch_failures: 0,
            },
            finished_rx: SyncCell::new(rx),
            max_finished_per_update: config.max_finished_per_update,
            listeners: Vec::new(),
            queries_resolved: 0,
        })
    }

    /// The chunks and column grid data being generated.
    #[inline]
    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// Mutable access to the grid, to create chunks for new queries or evict unused ones.
    #[inline]
    pub fn grid_mut(&mut self) -> &mut ChunkGrid {
        &mut self.grid
    }

    /// Maximum number of finished tasks processed by one [`update`](Self::update).
    #[inline]
    pub fn max_finished_per_update(&self) -> usize {
        self.max_finished_per_update
    }

    /// Changes the per-update drain limit. Panics if `max` is zero.
    pub fn set_max_finished_per_update(&mut self, max: usize) {
        assert!(max > 0, "{}", GeneratorConfigError::ZeroBatchSize);
        self.max_finished_per_update = max;
    }

    /// Registers a callback invoked on the scheduler thread for every resolved query that had a task dispatched for it.
    pub fn add_gen_finish_listener(&mut self, listener: impl FnMut(&ChunkGenFinished) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// A handle worker tasks use to report completion.
    pub fn finisher(&self) -> QueryFinisher {
        self.dispatcher.finisher.clone()
    }

    /// Queues a finished task for the next [`update`](Self::update). Safe to call from any thread through
    /// [`finisher`](Self::finisher); this is the same path.
    pub fn finish_query(&self, finished: FinishedQuery) {
        self.dispatcher.finisher.finish_query(finished);
    }

    /// Number of queries waiting for the heightmap of the given column.
    pub fn pending_on_grid_data(&self, column: ColumnPos) -> usize {
        self.pending_queries.get(&column).map_or(0, |p| p.len())
    }

    /// Number of submitted queries that are not resolved yet.
    #[inline]
    pub fn queries_outstanding(&self) -> usize {
        self.queries.len()
    }

    /// Collects statistics about the scheduler's queues.
    pub fn stats(&self) -> ChunkGeneratorStats {
        ChunkGeneratorStats {
            queries_outstanding: self.queries.len(),
            queries_waiting_on_grid_data: self.pending_queries.values().map(|p| p.len()).sum(),
            tasks_in_flight: self.dispatcher.tasks_in_flight,
            heightmap_tasks_dispatched: self.dispatcher.heightmap_tasks_dispatched,
            chunk_tasks_dispatched: self.dispatcher.chunk_tasks_dispatched,
            queries_resolved: self.queries_resolved,
            queries_stalled: self.stalled.len(),
            dispatch_failures: self.dispatcher.dispatch_failures,
        }
    }

    /// Creates the chunk if needed and submits a query for it, returning the query handle to wait on.
    pub fn request(&mut self, pos: AbsChunkPos, level: ChunkGenLevel) -> Result<ChunkQuery, WorkerPoolError> {
        let chunk = self.grid.get_or_create_chunk(pos);
        let query = ChunkQuery::new(pos, level);
        self.submit_query(chunk, query.clone())?;
        Ok(query)
    }

    /// Submits a query to bring a chunk to the query's level. `chunk` is the reference the query keeps on the chunk
    /// until it is resolved.
    ///
    /// Resolves immediately if the chunk is already generated far enough, otherwise at most one task is dispatched.
    /// If the worker pool refuses that task, the column loading flag or chunk task slot it took is released, the query
    /// stays unfinished and its chunk reference is dropped.
    /// Panics if the handle is for another position or the chunk is not in the grid.
    pub fn submit_query(&mut self, chunk: ChunkHandle, query: ChunkQuery) -> Result<(), WorkerPoolError> {
        let pos = query.pos();
        assert!(
            self.grid.chunk(pos).is_some_and(|c| c.handle().same_chunk(&chunk)),
            "Query submitted for chunk {pos} which is not in the grid"
        );
        trace!(%pos, level = %query.gen_level(), "Query submitted");
        let id = self.queries.insert(QueryTicket::new(query, chunk));
        if let Err(e) = self.submit(id) {
            warn!(%pos, "Query rejected: {e}");
            self.queries.remove(id);
            return Err(e);
        }
        Ok(())
    }

    /// Places the query where it waits, dispatching a task if it needs one. On error the query holds no place in the
    /// grid and the loading or current task slot it tried to take is free again.
    fn submit(&mut self, id: QueryId) -> Result<(), WorkerPoolError> {
        let query = self.queries[id].query();
        let (pos, level) = (query.pos(), query.gen_level());
        let (chunk, grid_data) = self
            .grid
            .chunk_and_grid_data_mut(pos)
            .unwrap_or_else(|| panic!("Query for chunk {pos} outlived the chunk"));

        if chunk.gen_level() >= level {
            chunk.mark_accessible();
            resolve_query(&mut self.queries, &mut self.queries_resolved, id);
            return Ok(());
        }
        chunk.raise_pending_gen_level(level);

        if !grid_data.is_loaded() {
            let column = grid_data.column();
            if grid_data.begin_loading() {
                if let Err(e) = self.dispatcher.dispatch(id, GenJob::Heightmap { column }) {
                    grid_data.cancel_loading();
                    return Err(e);
                }
            }
            self.pending_queries.entry(column).or_default().push(id);
            trace!(%pos, %level, "Query waiting for column heightmap");
            return Ok(());
        }

        let gen_query_data = chunk.gen_query_data_mut();
        if gen_query_data.current.is_some() {
            gen_query_data.pending.push(id);
            trace!(%pos, %level, "Query queued behind the current task");
            return Ok(());
        }
        gen_query_data.current = Some(id);
        let heightmap = Arc::clone(grid_data.heightmap().expect("Loaded grid data without a heightmap"));
        let job = GenJob::Chunk {
            pos,
            heightmap,
            voxels: Arc::clone(chunk.voxels()),
            from: chunk.gen_level(),
            to: level,
        };
        if let Err(e) = self.dispatcher.dispatch(id, job) {
            chunk.gen_query_data_mut().current = None;
            return Err(e);
        }
        Ok(())
    }

    /// Submits a query from inside an update, parking it for the next update if the pool refuses its task.
    fn submit_or_stall(&mut self, id: QueryId) {
        if let Err(e) = self.submit(id) {
            error!(query = ?id, "Could not dispatch generation task, retrying next update: {e}");
            self.stalled.push(id);
        }
    }

    /// Applies up to [`max_finished_per_update`](Self::max_finished_per_update) finished tasks to the grid, resolving
    /// the queries they satisfy and dispatching follow-up work. The remaining tasks are kept for the next call.
    /// Follow-up work the pool refuses is retried by the next call.
    /// Returns the notifications for resolved queries that had a task dispatched for them.
    pub fn update(&mut self) -> Vec<ChunkGenFinished> {
        let _span = info_span!("chunk_generator_update").entered();
        if !self.stalled.is_empty() {
            let stalled = std::mem::take(&mut self.stalled);
            debug!(count = stalled.len(), "Retrying stalled queries");
            for id in stalled {
                if self.submit(id).is_err() {
                    self.stalled.push(id);
                }
            }
        }
        let mut notifications = Vec::new();
        let mut drained = 0;
        while drained < self.max_finished_per_update {
            // The dispatcher keeps a sender, so the channel never disconnects.
            let Ok(finished) = self.finished_rx.get().try_recv() else {
                break;
            };
            drained += 1;
            self.dispatcher.tasks_in_flight -= 1;
            self.apply_finished(finished, &mut notifications);
        }
        if drained > 0 {
            debug!(drained, notified = notifications.len(), "Processed finished generation tasks");
        }
        for notification in &notifications {
            for listener in &mut self.listeners {
                listener(notification);
            }
        }
        notifications
    }

    fn apply_finished(&mut self, finished: FinishedQuery, notifications: &mut Vec<ChunkGenFinished>) {
        let FinishedQuery { query: id, output } = finished;
        match output {
            TaskOutput::Heightmap { column, heightmap } => {
                self.grid
                    .grid_data_mut(column)
                    .unwrap_or_else(|| panic!("Heightmap finished for column {column} without grid data"))
                    .finish_loading(heightmap);
                let waiting = self
                    .pending_queries
                    .remove(&column)
                    .unwrap_or_else(|| panic!("No queries waiting on the heightmap of column {column}"));
                debug_assert!(waiting.contains(&id));
                trace!(%column, waiting = waiting.len(), "Column heightmap loaded");
                for waiting_id in waiting {
                    self.submit_or_stall(waiting_id);
                }
            }
            TaskOutput::Chunk { level, voxels } => {
                let query = self.queries.get(id).expect("Chunk task finished for an unknown query").query();
                let (pos, query_level) = (query.pos(), query.gen_level());
                let (chunk, grid_data) = self
                    .grid
                    .chunk_and_grid_data_mut(pos)
                    .unwrap_or_else(|| panic!("Chunk task finished for chunk {pos} which is not in the grid"));

                let current = chunk.gen_query_data_mut().current.take();
                assert_eq!(current, Some(id), "Finished query is not the current query of chunk {pos}");
                chunk.set_voxels(voxels);
                chunk.advance_gen_level(level);
                chunk.mark_accessible();
                let gen_level = chunk.gen_level();

                let queries = &mut self.queries;
                let pending = &mut chunk.gen_query_data_mut().pending;
                if gen_level.is_done() {
                    for pending_id in pending.drain(..) {
                        resolve_query(queries, &mut self.queries_resolved, pending_id);
                    }
                } else {
                    let mut i = 0;
                    while i < pending.len() {
                        if queries[pending[i]].query().gen_level() <= gen_level {
                            let pending_id = pending.swap_remove(i);
                            resolve_query(queries, &mut self.queries_resolved, pending_id);
                        } else {
                            i += 1;
                        }
                    }
                    // Levels are cumulative: generating up to the highest request satisfies every waiting query.
                    let promoted = pending
                        .iter()
                        .enumerate()
                        .max_by_key(|&(_, &pid)| queries[pid].query().gen_level())
                        .map(|(i, _)| i);
                    if let Some(index) = promoted {
                        let promoted_id = pending.swap_remove(index);
                        let to = queries[promoted_id].query().gen_level();
                        chunk.gen_query_data_mut().current = Some(promoted_id);
                        let heightmap =
                            Arc::clone(grid_data.heightmap().expect("Generated chunk without a column heightmap"));
                        let job = GenJob::Chunk {
                            pos,
                            heightmap,
                            voxels: Arc::clone(chunk.voxels()),
                            from: gen_level,
                            to,
                        };
                        if let Err(e) = self.dispatcher.dispatch(promoted_id, job) {
                            error!(%pos, "Could not dispatch generation task, retrying next update: {e}");
                            let gen_query_data = chunk.gen_query_data_mut();
                            gen_query_data.current = None;
                            self.stalled.push(promoted_id);
                            self.stalled.extend(gen_query_data.pending.drain(..));
                        }
                    }
                }

                resolve_query(&mut self.queries, &mut self.queries_resolved, id);
                trace!(%pos, level = %gen_level, "Chunk generation step finished");
                notifications.push(ChunkGenFinished {
                    pos,
                    level: query_level,
                });
            }
        }
    }
}
