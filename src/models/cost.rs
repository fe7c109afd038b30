/// Coalesces a stored cost into a usable amount.
///
/// Cost columns are nullable and may hold garbage from older rows, so
/// missing, `NaN` and infinite values all count as `0.0`. Negative amounts
/// are passed through untouched.
pub fn cost_or_zero(value: Option<f64>) -> f64 {
    value.filter(|amount| amount.is_finite()).unwrap_or(0.0)
}

/// Renders an amount with two decimals, dropping them for whole numbers.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
