//! Reproducible train/validation partitioning

use crate::error::{MotionError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed used when the caller does not supply one
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Shuffle `items` with `seed` and hold out `ceil(fraction * n)` of them
///
/// Returns `(train, validation)`. Both partitions must be non-empty.
pub fn train_validation_split<T: Clone>(
    items: &[T],
    validation_fraction: f64,
    seed: u64,
) -> Result<(Vec<T>, Vec<T>)> {
    if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
        return Err(MotionError::Configuration(format!(
            "validation fraction must be in (0, 1), got {}",
            validation_fraction
        )));
    }

    let n = items.len();
    let held_out = (validation_fraction * n as f64).ceil() as usize;
    if held_out == 0 || held_out >= n {
        return Err(MotionError::InsufficientData(format!(
            "{} examples cannot be split into non-empty train and validation partitions at fraction {}",
            n, validation_fraction
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let validation = order[..held_out].iter().map(|&i| items[i].clone()).collect();
    let train = order[held_out..].iter().map(|&i| items[i].clone()).collect();
    Ok((train, validation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let items: Vec<usize> = (0..10).collect();
        let (train, validation) = train_validation_split(&items, 0.25, 42).unwrap();
        assert_eq!(validation.len(), 3);
        assert_eq!(train.len(), 7);
    }

    #[test]
    fn test_split_is_a_partition() {
        let items: Vec<usize> = (0..50).collect();
        let (train, validation) = train_validation_split(&items, 0.2, 7).unwrap();
        let mut all: Vec<usize> = train.into_iter().chain(validation).collect();
        all.sort_unstable();
        assert_eq!(all, items);
    }

    #[test]
    fn test_split_is_reproducible() {
        let items: Vec<usize> = (0..30).collect();
        let a = train_validation_split(&items, 0.3, DEFAULT_SPLIT_SEED).unwrap();
        let b = train_validation_split(&items, 0.3, DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_degenerate_inputs() {
        let items: Vec<usize> = (0..10).collect();
        assert!(matches!(
            train_validation_split(&items, 0.0, 1),
            Err(MotionError::Configuration(_))
        ));
        assert!(matches!(
            train_validation_split(&items, 1.0, 1),
            Err(MotionError::Configuration(_))
        ));
        assert!(matches!(
            train_validation_split(&[1usize], 0.5, 1),
            Err(MotionError::InsufficientData(_))
        ));
        assert!(matches!(
            train_validation_split::<usize>(&[], 0.5, 1),
            Err(MotionError::InsufficientData(_))
        ));
    }
}
