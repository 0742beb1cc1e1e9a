use rand::Rng;

use crate::errors::{EngineError, EngineResult};
use crate::matrix::Matrix;

/// Random `size` x `size` matrix with entries drawn uniformly from `[min, max]`.
pub fn generate_random<R: Rng + ?Sized>(
    rng: &mut R,
    size: usize,
    min: i64,
    max: i64,
) -> EngineResult<Matrix> {
    if min > max {
        return Err(EngineError::InvalidRange { min, max });
    }
    let rows = (0..size)
        .map(|_| (0..size).map(|_| rng.gen_range(min..=max)).collect())
        .collect();
    Matrix::from_rows(rows)
}
