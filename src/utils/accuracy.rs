use ndarray::{ArrayView1, ArrayView2};

use crate::{Result, TrainErr};

/// Computes the accuracy over the `k` top predictions for each of the given values of `k`.
/// Scores tied with the target's don't push it down the ranking.
///
/// # Arguments
/// * `output` - The logits, one row per sample.
/// * `target` - The label of each sample.
/// * `topk` - The values of `k`, clamped to the amount of classes.
///
/// # Returns
/// One percentage in `[0, 100]` per `k`, in the same order.
pub fn accuracy(
    output: ArrayView2<f32>,
    target: ArrayView1<usize>,
    topk: &[usize],
) -> Result<Vec<f32>> {
    if topk.is_empty() || topk.contains(&0) {
        return Err(TrainErr::InvalidTopK);
    }

    if output.nrows() != target.len() {
        return Err(TrainErr::Ml(machine_learning::MlErr::SizeMismatch {
            what: "accuracy targets",
            got: target.len(),
            expected: output.nrows(),
        }));
    }

    let n = output.nrows();
    if n == 0 {
        return Ok(vec![0.; topk.len()]);
    }

    let classes = output.ncols();

    // The rank of the target within its row: how many scores beat it.
    let ranks: Vec<usize> = output
        .rows()
        .into_iter()
        .zip(target)
        .map(|(row, &label)| match row.get(label) {
            Some(&score) => row.iter().filter(|&&s| s > score).count(),
            None => usize::MAX,
        })
        .collect();

    let accs = topk
        .iter()
        .map(|&k| {
            let k = k.min(classes);
            let correct = ranks.iter().filter(|&&rank| rank < k).count();
            correct as f32 * 100. / n as f32
        })
        .collect();

    Ok(accs)
}
