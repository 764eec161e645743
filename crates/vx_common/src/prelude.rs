//! Common type aliases

// some of the imports here are not used yet, but are pre-defined for symmetry
#![allow(unused)]

// Anyhow error handling
pub use anyhow::{anyhow, bail, ensure, Context, Result};

// Std MPSC channels
pub use std::sync::mpsc::{
    channel as std_unbounded_channel, sync_channel as std_bounded_channel, Receiver as StdUnboundedReceiver,
    Sender as StdUnboundedSender, SyncSender as StdBoundedSender,
};
// Tokio watch channels
pub use tokio::sync::watch::{
    channel as async_watch_channel, Receiver as AsyncWatchReceiver, Sender as AsyncWatchSender,
};

// Common synchronization/cell types
pub use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
pub use std::sync::atomic::{Ordering as AtomicOrdering, *};

// hashbrown Hash* types
pub use hashbrown::{HashMap, HashSet};
