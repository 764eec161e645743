//! Chunk generation queries: the caller-visible completion handle and the scheduler-side ownership ticket.

use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

use tracing::trace;
use vx_schemas::coordinates::AbsChunkPos;
use vx_schemas::voxel::chunk::ChunkHandle;
use vx_schemas::voxel::gen_level::ChunkGenLevel;

use crate::prelude::*;

struct ChunkQueryInner {
    pos: AbsChunkPos,
    gen_level: ChunkGenLevel,
    should_release: bool,
    finished: Mutex<bool>,
    finished_cond: Condvar,
    finished_watch: AsyncWatchSender<bool>,
}

/// A request to bring a chunk to at least a given generation level, with a completion signal any number of threads
/// can wait on. Cloning creates another handle to the same query.
#[derive(Clone)]
pub struct ChunkQuery(Arc<ChunkQueryInner>);

/// A non-owning reference to a [`ChunkQuery`], used to observe when the query object is freed.
#[derive(Clone)]
pub struct WeakChunkQuery(Weak<ChunkQueryInner>);

impl ChunkQuery {
    fn with_release(pos: AbsChunkPos, gen_level: ChunkGenLevel, should_release: bool) -> Self {
        let (finished_watch, _) = async_watch_channel(false);
        Self(Arc::new(ChunkQueryInner {
            pos,
            gen_level,
            should_release,
            finished: Mutex::new(false),
            finished_cond: Condvar::new(),
            finished_watch,
        }))
    }

    /// A query the caller keeps a handle to, to wait for completion.
    pub fn new(pos: AbsChunkPos, gen_level: ChunkGenLevel) -> Self {
        Self::with_release(pos, gen_level, false)
    }

    /// A fire-and-forget query: the scheduler holds the last handle and frees the query once it resolves.
    /// Callers should not keep clones of it.
    pub fn detached(pos: AbsChunkPos, gen_level: ChunkGenLevel) -> Self {
        Self::with_release(pos, gen_level, true)
    }

    /// Position of the target chunk.
    #[inline]
    pub fn pos(&self) -> AbsChunkPos {
        self.0.pos
    }

    /// The requested generation level.
    #[inline]
    pub fn gen_level(&self) -> ChunkGenLevel {
        self.0.gen_level
    }

    /// Whether the scheduler owns and frees this query on completion.
    #[inline]
    pub fn should_release(&self) -> bool {
        self.0.should_release
    }

    /// Checks if the query has been resolved.
    pub fn is_finished(&self) -> bool {
        *self.lock_finished()
    }

    /// Blocks the current thread until the query is resolved. Do not call from the thread running the scheduler.
    pub fn blocking_wait(&self) {
        let finished = self.lock_finished();
        let _finished = self
            .0
            .finished_cond
            .wait_while(finished, |f| !*f)
            .expect("Query state mutex poisoned");
    }

    /// Blocks the current thread until the query is resolved or the timeout elapses, returns if it was resolved.
    /// A timeout too large to represent as a deadline waits without limit.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.blocking_wait();
            return true;
        };
        let mut finished = self.lock_finished();
        while !*finished {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            finished = self
                .0
                .finished_cond
                .wait_timeout(finished, deadline - now)
                .expect("Query state mutex poisoned")
                .0;
        }
        true
    }

    /// Waits for the query to be resolved without blocking the thread.
    pub async fn async_wait(&self) {
        let mut rx = self.0.finished_watch.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set.
        let _ = rx.wait_for(|&finished| finished).await;
    }

    /// Creates a weak reference to this query.
    pub fn downgrade(&self) -> WeakChunkQuery {
        WeakChunkQuery(Arc::downgrade(&self.0))
    }

    fn lock_finished(&self) -> MutexGuard<'_, bool> {
        self.0.finished.lock().expect("Query state mutex poisoned")
    }

    /// Sets the finished flag and wakes every waiter. Panics if the query was already finished.
    fn finish(&self) {
        let mut finished = self.lock_finished();
        assert!(!*finished, "{self:?} resolved twice");
        *finished = true;
        self.0.finished_cond.notify_all();
        drop(finished);
        self.0.finished_watch.send_replace(true);
    }
}

impl Debug for ChunkQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkQuery")
            .field("pos", &self.0.pos)
            .field("gen_level", &self.0.gen_level)
            .field("should_release", &self.0.should_release)
            .finish_non_exhaustive()
    }
}

impl WeakChunkQuery {
    /// Checks if the query object still exists.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Attempts to get a strong handle back.
    pub fn upgrade(&self) -> Option<ChunkQuery> {
        self.0.upgrade().map(ChunkQuery)
    }
}

/// The scheduler's ownership record of an outstanding query: its query handle and the chunk reference it keeps alive.
/// Resolving consumes the ticket, so each outstanding query releases both exactly once.
pub struct QueryTicket {
    query: ChunkQuery,
    chunk: ChunkHandle,
}

impl QueryTicket {
    /// Bundles a query with the chunk reference acquired for it. Panics if the handle is for another chunk.
    pub fn new(query: ChunkQuery, chunk: ChunkHandle) -> Self {
        assert_eq!(
            query.pos(),
            chunk.pos(),
            "Query submitted with a handle to a different chunk"
        );
        Self { query, chunk }
    }

    /// The held query.
    #[inline]
    pub fn query(&self) -> &ChunkQuery {
        &self.query
    }

    /// The held chunk reference.
    #[inline]
    pub fn chunk(&self) -> &ChunkHandle {
        &self.chunk
    }

    /// Marks the query finished, wakes its waiters, then releases the chunk reference and the scheduler's query handle.
    pub fn resolve(self) {
        self.query.finish();
        trace!(
            pos = %self.query.pos(),
            level = %self.query.gen_level(),
            detached = self.query.should_release(),
            "Query resolved"
        );
    }
}

impl Debug for QueryTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryTicket")
            .field("query", &self.query)
            .field("chunk", &self.chunk)
            .finish()
    }
}
