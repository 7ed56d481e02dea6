/// Centered moving average whose window shrinks at the edges. Missing and
/// non-finite values are left out of each mean; a window with nothing left
/// keeps the original value.
pub fn smooth(series: &[Option<f64>], window_size: usize) -> Vec<Option<f64>> {
    if window_size <= 1 {
        return series.to_vec();
    }

    let half = window_size / 2;
    let last = series.len().saturating_sub(1);

    (0..series.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(last);

            let mut sum = 0.0;
            let mut count = 0usize;
            for value in series[start..=end].iter().flatten() {
                if value.is_finite() {
                    sum += value;
                    count += 1;
                }
            }

            if count > 0 {
                Some(sum / count as f64)
            } else {
                series[i]
            }
        })
        .collect()
}
