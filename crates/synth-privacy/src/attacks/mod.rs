//! Simulated re-identification games.
//!
//! Each game returns a success rate in `[0, 1]`, or `None` when it cannot
//! be played on the shared attributes.

mod inference;
mod linkability;
mod singling_out;

pub use inference::attribute_inference;
pub use linkability::linkability;
pub use singling_out::{singling_out, subset_masks};

use rand::seq::index::sample;
use synth_common::{Stream, substream_rng};

/// Records attacked per nearest-neighbour batch.
pub(crate) const BATCH: usize = 256;

/// Indices of the records to attack: all of them up to `max_targets`,
/// else a seeded sample in ascending order.
pub fn select_targets(count: usize, max_targets: usize, seed: u64, game: u64) -> Vec<usize> {
    if count <= max_targets {
        return (0..count).collect();
    }
    let mut rng = substream_rng(seed, Stream::Attacks, game);
    let mut targets = sample(&mut rng, count, max_targets).into_vec();
    targets.sort_unstable();
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sets_are_attacked_in_full() {
        assert_eq!(select_targets(4, 10, 1, 0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn large_sets_are_sampled_deterministically() {
        let first = select_targets(10_000, 50, 9, 1);
        assert_eq!(first.len(), 50);
        assert!(first.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(first, select_targets(10_000, 50, 9, 1));
    }
}
