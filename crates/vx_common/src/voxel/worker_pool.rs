//! Generation tasks and the worker pools that execute them.

use std::fmt::{Debug, Formatter};

use bevy::tasks::AsyncComputeTaskPool;
use thiserror::Error;
use tracing::{trace, warn};
use vx_schemas::coordinates::{AbsChunkPos, ColumnPos};
use vx_schemas::voxel::chunk::QueryId;
use vx_schemas::voxel::chunk_storage::ChunkVoxels;
use vx_schemas::voxel::gen_level::ChunkGenLevel;
use vx_schemas::voxel::grid_data::Heightmap;

use crate::prelude::*;
use crate::voxel::generator::{generate_chunk_levels, ProceduralGenerator};

/// The result of a generation task, applied to the grid by the scheduler.
#[derive(Debug)]
pub enum TaskOutput {
    /// A column heightmap was computed.
    Heightmap {
        /// The column the heightmap belongs to.
        column: ColumnPos,
        /// The generated heights.
        heightmap: Arc<Heightmap>,
    },
    /// Chunk generation passes were run.
    Chunk {
        /// The level the chunk's new block data has reached.
        level: ChunkGenLevel,
        /// The new block data snapshot.
        voxels: Arc<ChunkVoxels>,
    },
}

/// A completed task's report, queued for the scheduler's next update.
#[derive(Debug)]
pub struct FinishedQuery {
    /// The query the task was dispatched for.
    pub query: QueryId,
    /// What the task produced.
    pub output: TaskOutput,
}

/// The producer side of the scheduler's finished queue, cloneable and usable from any thread.
#[derive(Clone)]
pub struct QueryFinisher {
    sender: StdUnboundedSender<FinishedQuery>,
}

impl QueryFinisher {
    pub(crate) fn new(sender: StdUnboundedSender<FinishedQuery>) -> Self {
        Self { sender }
    }

    /// Reports a finished task to the scheduler. Reports arriving after the scheduler is dropped are discarded.
    pub fn finish_query(&self, finished: FinishedQuery) {
        if let Err(e) = self.sender.send(finished) {
            warn!(query = ?e.0.query, "Generation task finished after its scheduler was dropped");
        }
    }
}

impl Debug for QueryFinisher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueryFinisher")
    }
}

/// The kinds of generation task.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GenTaskKind {
    /// Computes a column's heightmap.
    Heightmap,
    /// Runs generation passes on one chunk.
    Chunk,
}

/// The owned inputs of a generation task.
#[derive(Debug)]
pub enum GenJob {
    /// Compute the heightmap of a column.
    Heightmap {
        /// Target column.
        column: ColumnPos,
    },
    /// Run the passes after `from` up to `to` on a copy of `voxels`.
    Chunk {
        /// Target chunk.
        pos: AbsChunkPos,
        /// The column heightmap, loaded before any chunk task of the column is dispatched.
        heightmap: Arc<Heightmap>,
        /// Snapshot of the chunk's block data at dispatch time.
        voxels: Arc<ChunkVoxels>,
        /// The chunk's level at dispatch time.
        from: ChunkGenLevel,
        /// The level to generate up to.
        to: ChunkGenLevel,
    },
}

/// A unit of work bound to a query: runs the job on a worker thread and reports the output through its finisher.
pub struct GenTask {
    query: QueryId,
    job: GenJob,
    generator: Arc<dyn ProceduralGenerator>,
    finisher: QueryFinisher,
}

impl GenTask {
    pub(crate) fn new(
        query: QueryId,
        job: GenJob,
        generator: Arc<dyn ProceduralGenerator>,
        finisher: QueryFinisher,
    ) -> Self {
        Self {
            query,
            job,
            generator,
            finisher,
        }
    }

    /// The query this task was dispatched for.
    #[inline]
    pub fn query(&self) -> QueryId {
        self.query
    }

    /// What kind of work this task does.
    pub fn kind(&self) -> GenTaskKind {
        match &self.job {
            GenJob::Heightmap { .. } => GenTaskKind::Heightmap,
            GenJob::Chunk { .. } => GenTaskKind::Chunk,
        }
    }

    /// The inputs of the task.
    #[inline]
    pub fn job(&self) -> &GenJob {
        &self.job
    }

    /// Runs the job and reports the output to the scheduler.
    pub fn run(self) {
        let output = match self.job {
            GenJob::Heightmap { column } => {
                let heightmap = Arc::new(self.generator.generate_heightmap(column));
                TaskOutput::Heightmap { column, heightmap }
            }
            GenJob::Chunk {
                pos,
                heightmap,
                voxels,
                from,
                to,
            } => {
                // Copy-on-write: readers of the chunk keep the snapshot they hold.
                let mut voxels = Arc::unwrap_or_clone(voxels);
                let level = generate_chunk_levels(&*self.generator, pos, &heightmap, &mut voxels, from, to);
                TaskOutput::Chunk {
                    level,
                    voxels: Arc::new(voxels),
                }
            }
        };
        trace!(query = ?self.query, "Generation task done");
        self.finisher.finish_query(FinishedQuery {
            query: self.query,
            output,
        });
    }
}

impl Debug for GenTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenTask")
            .field("query", &self.query)
            .field("job", &self.job)
            .finish_non_exhaustive()
    }
}

/// Why a worker pool refused a task.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum WorkerPoolError {
    /// The pool has no threads to run tasks on.
    #[error("worker pool is not running")]
    Unavailable,
}

/// Executes generation tasks off the scheduler thread.
pub trait WorkerPool: Send + Sync + 'static {
    /// Schedules the task to run exactly once on some worker. On error the task is dropped without running.
    fn add_task(&self, task: GenTask) -> Result<(), WorkerPoolError>;
}

struct CounterDecrOnDrop(Arc<AtomicUsize>);
impl Drop for CounterDecrOnDrop {
    fn drop(&mut self) {
        self.0.fetch_sub(1, AtomicOrdering::Relaxed);
    }
}

/// Runs tasks on bevy's [`AsyncComputeTaskPool`], which must be initialized (e.g. by `TaskPoolPlugin`).
#[derive(Default)]
pub struct ComputeTaskPoolWorkers {
    // counts unfinished tasks
    wip_task_counter: Arc<AtomicUsize>,
}

impl ComputeTaskPoolWorkers {
    /// Constructs a pool handle, tasks are spawned on the global compute task pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks spawned and not yet finished.
    pub fn tasks_running(&self) -> usize {
        self.wip_task_counter.load(AtomicOrdering::Relaxed)
    }
}

impl WorkerPool for ComputeTaskPoolWorkers {
    fn add_task(&self, task: GenTask) -> Result<(), WorkerPoolError> {
        let pool = AsyncComputeTaskPool::try_get().ok_or(WorkerPoolError::Unavailable)?;
        self.wip_task_counter.fetch_add(1, AtomicOrdering::Relaxed);
        let counter = CounterDecrOnDrop(Arc::clone(&self.wip_task_counter));
        pool.spawn(async move {
            let _counter = counter; // decrement on drop()
            task.run();
        })
        .detach();
        Ok(())
    }
}

/// Collects tasks and runs them only when asked, giving tests and benchmarks full control over completion order.
#[derive(Default)]
pub struct ManualWorkerPool {
    tasks: Mutex<Vec<GenTask>>,
    closed: AtomicBool,
}

impl ManualWorkerPool {
    /// Constructs an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<GenTask>> {
        self.tasks.lock().expect("Manual worker pool mutex poisoned")
    }

    /// While closed, new tasks are refused with [`WorkerPoolError::Unavailable`]. Waiting tasks are kept.
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, AtomicOrdering::Relaxed);
    }

    /// Number of tasks waiting to be run.
    pub fn pending_count(&self) -> usize {
        self.lock_tasks().len()
    }

    /// Kinds of the waiting tasks, in submission order.
    pub fn pending_kinds(&self) -> Vec<GenTaskKind> {
        self.lock_tasks().iter().map(GenTask::kind).collect()
    }

    /// Runs the oldest waiting task, returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        let task = {
            let mut tasks = self.lock_tasks();
            if tasks.is_empty() {
                return false;
            }
            tasks.remove(0)
        };
        task.run();
        true
    }

    /// Runs the waiting task at the given index of the submission order.
    /// Panics if out of bounds.
    pub fn run_at(&self, index: usize) {
        let task = self.lock_tasks().remove(index);
        task.run();
    }

    /// Runs waiting tasks until none are left, returns how many were run.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next() {
            count += 1;
        }
        count
    }

    /// Runs every waiting task matching the predicate, returns how many were run.
    pub fn run_where(&self, mut predicate: impl FnMut(&GenTask) -> bool) -> usize {
        let selected: Vec<GenTask> = {
            let mut tasks = self.lock_tasks();
            let (selected, kept) = std::mem::take(&mut *tasks).into_iter().partition(|t| predicate(t));
            *tasks = kept;
            selected
        };
        let count = selected.len();
        selected.into_iter().for_each(GenTask::run);
        count
    }
}

impl WorkerPool for ManualWorkerPool {
    fn add_task(&self, task: GenTask) -> Result<(), WorkerPoolError> {
        if self.closed.load(AtomicOrdering::Relaxed) {
            return Err(WorkerPoolError::Unavailable);
        }
        self.lock_tasks().push(task);
        Ok(())
    }
}
