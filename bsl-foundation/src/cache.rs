use std::fmt;

use once_cell::sync::OnceCell;

/// A lazily computed value that can be cleared and computed again.
///
/// The producer passed to [`CacheCell::get_or_compute`] runs at most once between two calls to
/// [`CacheCell::clear`]. Readers that find the cell empty block until the first of them finishes
/// computing; once a value is present, reads do not lock.
pub struct CacheCell<T> {
    cell: OnceCell<T>,
}

impl<T> CacheCell<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_compute(&self, producer: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(producer)
    }

    /// Starts a new generation, returning the previous value.
    pub fn clear(&mut self) -> Option<T> {
        self.cell.take()
    }
}

impl<T> Default for CacheCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CacheCell<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> fmt::Debug for CacheCell<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("CacheCell").field(value).finish(),
            None => f.write_str("CacheCell(<not computed>)"),
        }
    }
}
