pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let avg = mean(data)?;
    let variance = data
        .iter()
        .map(|value| (avg - value).powi(2))
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Signed difference rendered with an explicit sign, e.g. `+4` or `-2`
pub fn signed(delta: i64) -> String {
    if delta >= 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}
