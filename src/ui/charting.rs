/// X (seconds) and Y (WPM) upper bounds for the live WPM chart.
///
/// Without samples the X axis spans the session length. The Y bound gets a
/// little headroom so the peak does not sit on the frame.
pub fn chart_bounds(coords: &[(f64, f64)], total_secs: u64) -> (f64, f64) {
    let peak = coords.iter().map(|&(_, wpm)| wpm).fold(0.0_f64, f64::max);
    let last_t = coords.last().map_or(total_secs as f64, |&(t, _)| t);

    (last_t.max(1.0), (peak + peak / 10.0).ceil().max(10.0))
}

/// Format an axis label, dropping the fraction for whole numbers
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.1}")
    }
}
