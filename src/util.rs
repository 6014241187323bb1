pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Mean of squared differences between paired values; None when there is nothing to compare
pub fn mean_squared_error(predictions: &[f64], targets: &[f64]) -> Option<f64> {
    let squared = predictions
        .iter()
        .zip(targets)
        .map(|(pred, actual)| {
            let diff = pred - actual;

            diff * diff
        })
        .collect::<Vec<f64>>();

    mean(&squared)
}
