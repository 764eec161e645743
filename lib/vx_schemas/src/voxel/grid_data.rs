//! Per-column heightmap data shared by every chunk stacked in that column.

use std::sync::Arc;

use crate::coordinates::{ColumnPos, CHUNK_DIM, CHUNK_DIM2Z};

/// Surface heights (absolute block `y`) for every block column of a chunk column.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Heightmap {
    heights: Box<[i32]>,
}

impl Heightmap {
    /// Constructs a heightmap with the same height everywhere.
    pub fn flat(height: i32) -> Self {
        Self {
            heights: vec![height; CHUNK_DIM2Z].into_boxed_slice(),
        }
    }

    /// Constructs a heightmap by evaluating `height(x, z)` for every in-column block coordinate.
    pub fn from_fn(mut height: impl FnMut(i32, i32) -> i32) -> Self {
        let mut heights = Vec::with_capacity(CHUNK_DIM2Z);
        for z in 0..CHUNK_DIM {
            for x in 0..CHUNK_DIM {
                heights.push(height(x, z));
            }
        }
        Self {
            heights: heights.into_boxed_slice(),
        }
    }

    #[inline]
    fn index(x: i32, z: i32) -> usize {
        assert!(
            (0..CHUNK_DIM).contains(&x) && (0..CHUNK_DIM).contains(&z),
            "Heightmap coordinates ({x}, {z}) out of bounds"
        );
        (x + z * CHUNK_DIM) as usize
    }

    /// The surface height at the given in-column block coordinates.
    #[inline]
    pub fn get(&self, x: i32, z: i32) -> i32 {
        self.heights[Self::index(x, z)]
    }

    /// Overwrites the surface height at the given in-column block coordinates.
    #[inline]
    pub fn set(&mut self, x: i32, z: i32, height: i32) {
        self.heights[Self::index(x, z)] = height;
    }

    /// The lowest surface height in the column.
    pub fn min_height(&self) -> i32 {
        self.heights.iter().copied().min().unwrap_or_default()
    }

    /// The highest surface height in the column.
    pub fn max_height(&self) -> i32 {
        self.heights.iter().copied().max().unwrap_or_default()
    }
}

/// Generation state of a column's heightmap.
/// At most one heightmap task may be in flight for a column, `is_loading` guards that.
#[derive(Clone, Debug)]
pub struct GridData {
    column: ColumnPos,
    is_loaded: bool,
    is_loading: bool,
    heightmap: Option<Arc<Heightmap>>,
}

impl GridData {
    /// Fresh, unloaded grid data for the given column.
    pub fn new(column: ColumnPos) -> Self {
        Self {
            column,
            is_loaded: false,
            is_loading: false,
            heightmap: None,
        }
    }

    /// The column this data belongs to.
    #[inline]
    pub fn column(&self) -> ColumnPos {
        self.column
    }

    /// Whether the heightmap has been generated.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    /// Whether a heightmap task is currently in flight.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// The generated heightmap, if loaded.
    #[inline]
    pub fn heightmap(&self) -> Option<&Arc<Heightmap>> {
        self.heightmap.as_ref()
    }

    /// Marks the heightmap as being generated. Returns `false` if it was already loading or loaded, in which case no
    /// new task should be dispatched.
    pub fn begin_loading(&mut self) -> bool {
        if self.is_loaded || self.is_loading {
            return false;
        }
        self.is_loading = true;
        true
    }

    /// Clears the loading flag of a load whose task never started, so the next query can dispatch it again.
    /// Panics if no load was in progress.
    pub fn cancel_loading(&mut self) {
        assert!(self.is_loading, "Cancelled heightmap load for {} was not in progress", self.column);
        self.is_loading = false;
    }

    /// Stores the generated heightmap and clears the loading flag.
    /// Panics if no load was in progress.
    pub fn finish_loading(&mut self, heightmap: Arc<Heightmap>) {
        assert!(
            self.is_loading,
            "Heightmap for {} finished without a load in progress",
            self.column
        );
        self.is_loading = false;
        self.is_loaded = true;
        self.heightmap = Some(heightmap);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn heightmap_indexing() {
        let hm = Heightmap::from_fn(|x, z| x * 100 + z);
        assert_eq!(hm.get(0, 0), 0);
        assert_eq!(hm.get(5, 7), 507);
        assert_eq!(hm.get(31, 31), 3131);
        assert_eq!(hm.min_height(), 0);
        assert_eq!(hm.max_height(), 3131);
    }

    #[test]
    #[should_panic]
    fn heightmap_out_of_bounds() {
        Heightmap::flat(0).get(32, 0);
    }

    #[test]
    fn single_load_in_flight() {
        let mut gd = GridData::new(ColumnPos::new(1, 2));
        assert!(gd.begin_loading());
        assert!(!gd.begin_loading());
        assert!(gd.is_loading() && !gd.is_loaded());
        gd.finish_loading(Arc::new(Heightmap::flat(4)));
        assert!(!gd.is_loading() && gd.is_loaded());
        assert!(!gd.begin_loading());
        assert_eq!(gd.heightmap().map(|h| h.get(1, 1)), Some(4));
    }

    #[test]
    fn cancelled_load_can_restart() {
        let mut gd = GridData::new(ColumnPos::ZERO);
        assert!(gd.begin_loading());
        gd.cancel_loading();
        assert!(!gd.is_loading() && !gd.is_loaded());
        assert!(gd.begin_loading());
    }

    #[test]
    #[should_panic]
    fn finish_without_load_panics() {
        GridData::new(ColumnPos::ZERO).finish_loading(Arc::new(Heightmap::flat(0)));
    }
}
