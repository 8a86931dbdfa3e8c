//! Per-frame fan-out helper.
//!
//! Frames (and frame pairs) are independent during model construction, so their
//! work items run on the rayon pool when the `rayon` feature is enabled and the
//! caller asks for it. Results always come back in index order, so the single
//! writer that merges them produces the same model either way.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Run `work(i)` for `i in 0..count`, collecting results in index order.
///
/// Stops at the first error (in the sequential path: the lowest failing index).
pub fn map_indexed<T, E, F>(count: usize, parallel: bool, work: F) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Sync + Send,
{
    #[cfg(feature = "rayon")]
    if parallel && count > 1 {
        return (0..count).into_par_iter().map(&work).collect();
    }
    #[cfg(not(feature = "rayon"))]
    let _ = parallel;

    (0..count).map(work).collect()
}
