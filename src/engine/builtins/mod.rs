pub mod arraybuffer;
pub mod iteration;
pub mod typedarray;

use crate::types::number_ops;

/// Clamp a relative index into `0..=len`; negative values count from the end.
pub(crate) fn relative_index(relative: f64, len: usize) -> usize {
    let rel = number_ops::to_integer_or_infinity(relative);
    let len_f = len as f64;
    if rel < 0.0 {
        (len_f + rel).max(0.0) as usize
    } else {
        rel.min(len_f) as usize
    }
}
