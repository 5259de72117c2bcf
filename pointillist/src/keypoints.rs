//! Dense confidence grid to ranked sparse keypoints.
//!
//! The network output has already been through non-maximum suppression, so
//! selection is plain thresholding: every cell scoring strictly above zero is
//! a candidate. Candidates are ranked by score (highest first) and the list is
//! bounded by `keep_k_points`. Equal scores keep row-major grid order.

use ndarray::{Array2, ArrayViewD, Axis, Ix2};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::KeypointError;

/// A grid cell that passed the threshold, with its raw score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointCandidate {
    pub row: u32,
    pub col: u32,
    pub score: f32,
}

/// A finalized detection. `y` is the grid row, `x` the column, and
/// `confidence` the score truncated to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypoint {
    pub y: u32,
    pub x: u32,
    pub confidence: i64,
}

impl From<KeypointCandidate> for Keypoint {
    fn from(candidate: KeypointCandidate) -> Self {
        Self {
            y: candidate.row,
            x: candidate.col,
            confidence: candidate.score as i64,
        }
    }
}

/// Keypoints for one image, confidence descending, bounded in length.
pub type RankedKeypointSet = Vec<Keypoint>;

/// Heap entry: higher score ranks first, then earlier grid position.
struct Ranked {
    candidate: KeypointCandidate,
    order: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.candidate
            .score
            .total_cmp(&other.candidate.score)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Select the `keep_k_points` best-scoring positive cells, best first.
///
/// Keeps a min-heap of at most `keep_k_points` entries, so the cost is
/// `O(cells * log k)` rather than a sort over every candidate.
pub fn select_candidates(grid: &Array2<f32>, keep_k_points: usize) -> Vec<KeypointCandidate> {
    if keep_k_points == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(keep_k_points + 1);

    for (order, ((row, col), &score)) in grid.indexed_iter().enumerate() {
        if score.is_nan() || score <= 0.0 {
            continue;
        }

        let entry = Ranked {
            candidate: KeypointCandidate {
                row: row as u32,
                col: col as u32,
                score,
            },
            order,
        };

        if heap.len() < keep_k_points {
            heap.push(Reverse(entry));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if entry > *worst {
                heap.pop();
                heap.push(Reverse(entry));
            }
        }
    }

    let mut kept: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
    kept.sort_by(|a, b| b.cmp(a));
    kept.into_iter().map(|r| r.candidate).collect()
}

/// Extract the ranked keypoint set for one confidence grid.
pub fn extract_keypoints(grid: &Array2<f32>, keep_k_points: usize) -> RankedKeypointSet {
    select_candidates(grid, keep_k_points)
        .into_iter()
        .map(Keypoint::from)
        .collect()
}

/// Drop unit axes from a raw model output until a 2-D grid remains.
pub fn squeeze_to_grid(output: ArrayViewD<'_, f32>) -> Result<Array2<f32>, KeypointError> {
    let original_shape = output.shape().to_vec();
    let mut view = output;

    while view.ndim() > 2 {
        match view.shape().iter().position(|&d| d == 1) {
            Some(axis) => view = view.index_axis_move(Axis(axis), 0),
            None => {
                return Err(KeypointError::Inference(format!(
                    "model output of shape {original_shape:?} cannot be squeezed to 2-D"
                )))
            }
        }
    }

    view.into_dimensionality::<Ix2>()
        .map(|grid| grid.to_owned())
        .map_err(|_| {
            KeypointError::Inference(format!(
                "model output of shape {original_shape:?} has fewer than 2 dimensions"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayD, IxDyn};

    fn kp(y: u32, x: u32, confidence: i64) -> Keypoint {
        Keypoint { y, x, confidence }
    }

    /// Deterministic pseudo-random scores in [-50, 150).
    fn scrambled_grid(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
        let mut state = seed;
        Array2::from_shape_fn((rows, cols), |_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) % 200) as f32 - 50.0
        })
    }

    #[test]
    fn test_small_grid_scenario() {
        let grid = array![[0.0, 5.0], [3.0, 0.0]];
        let keypoints = extract_keypoints(&grid, 2);
        assert_eq!(keypoints, vec![kp(0, 1, 5), kp(1, 0, 3)]);
    }

    #[test]
    fn test_keep_zero_points_is_empty() {
        let grid = array![[0.0, 5.0], [3.0, 0.0]];
        assert!(extract_keypoints(&grid, 0).is_empty());
    }

    #[test]
    fn test_non_positive_grid_is_empty() {
        let zeros = Array2::<f32>::zeros((4, 4));
        assert!(extract_keypoints(&zeros, 10).is_empty());

        let negative = Array2::<f32>::from_elem((4, 4), -1.0);
        assert!(extract_keypoints(&negative, 10).is_empty());
    }

    #[test]
    fn test_nan_is_never_a_candidate() {
        let grid = array![[f32::NAN, 2.0], [f32::NAN, f32::NAN]];
        assert_eq!(extract_keypoints(&grid, 5), vec![kp(0, 1, 2)]);
    }

    #[test]
    fn test_keep_more_than_available_returns_all() {
        let grid = array![[1.0, 0.0, 7.0], [0.0, 4.0, 0.0]];
        let keypoints = extract_keypoints(&grid, 100);
        assert_eq!(keypoints, vec![kp(0, 2, 7), kp(1, 1, 4), kp(0, 0, 1)]);
    }

    #[test]
    fn test_truncates_to_highest_scores() {
        // 1500 positive cells with distinct scores 1..=1500
        let grid = Array2::from_shape_fn((30, 50), |(r, c)| (r * 50 + c + 1) as f32);
        let keypoints = extract_keypoints(&grid, 1000);

        assert_eq!(keypoints.len(), 1000);
        assert_eq!(keypoints[0].confidence, 1500);
        assert_eq!(keypoints[999].confidence, 501);
        assert!(keypoints.iter().all(|k| k.confidence > 500));
    }

    #[test]
    fn test_confidence_is_truncated() {
        let grid = array![[0.2, 2.9], [1.5, 0.0]];
        let keypoints = extract_keypoints(&grid, 3);
        assert_eq!(keypoints, vec![kp(0, 1, 2), kp(1, 0, 1), kp(0, 0, 0)]);

        // Raw scores survive on the candidate list
        let candidates = select_candidates(&grid, 3);
        assert_eq!(candidates[2].score, 0.2);
    }

    #[test]
    fn test_ties_keep_row_major_order() {
        let grid = array![[3.0, 1.0, 3.0], [3.0, 0.0, 1.0]];
        let keypoints = extract_keypoints(&grid, 4);
        assert_eq!(
            keypoints,
            vec![kp(0, 0, 3), kp(0, 2, 3), kp(1, 0, 3), kp(0, 1, 1)]
        );

        // Truncation inside a tie drops the later cells
        let keypoints = extract_keypoints(&grid, 2);
        assert_eq!(keypoints, vec![kp(0, 0, 3), kp(0, 2, 3)]);
    }

    #[test]
    fn test_bound_and_order_hold_on_scrambled_grids() {
        for seed in 1..20u64 {
            let grid = scrambled_grid(23, 17, seed);
            let positive = grid.iter().filter(|&&v| v > 0.0).count();

            for keep in [0usize, 1, 5, 50, 1000] {
                let candidates = select_candidates(&grid, keep);
                assert!(candidates.len() <= keep.min(positive));
                assert_eq!(candidates.len(), keep.min(positive));
                assert!(candidates.windows(2).all(|w| w[0].score >= w[1].score));

                // Nothing left out scores higher than the weakest kept entry
                if let Some(weakest) = candidates.last() {
                    let above = grid.iter().filter(|&&v| v > weakest.score).count();
                    assert!(above < candidates.len());
                }
            }
        }
    }

    #[test]
    fn test_squeeze_batch_and_channel_axes() {
        let output = ArrayD::from_shape_vec(IxDyn(&[1, 2, 3, 1]), (0..6).map(|v| v as f32).collect())
            .unwrap();
        let grid = squeeze_to_grid(output.view()).unwrap();
        assert_eq!(grid.shape(), &[2, 3]);
        assert_eq!(grid[[1, 2]], 5.0);
    }

    #[test]
    fn test_squeeze_keeps_single_row_grid() {
        let output = ArrayD::from_shape_vec(IxDyn(&[1, 1, 4]), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let grid = squeeze_to_grid(output.view()).unwrap();
        assert_eq!(grid.shape(), &[1, 4]);
    }

    #[test]
    fn test_squeeze_rejects_volumes() {
        let output = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 4]));
        assert!(matches!(
            squeeze_to_grid(output.view()),
            Err(KeypointError::Inference(_))
        ));

        let flat = ArrayD::<f32>::zeros(IxDyn(&[5]));
        assert!(squeeze_to_grid(flat.view()).is_err());
    }
}
