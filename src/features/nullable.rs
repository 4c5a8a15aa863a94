//! Null-aware numeric helpers shared by every engine
//!
//! Missing box-score fields and empty denominators resolve to `None`
//! rather than to zero or to an error.

/// Running weighted sum over the non-null entries of a series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedTotal {
    sum: f64,
    weight: f64,
    count: usize,
}

impl WeightedTotal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` with `weight`. Nulls are skipped from both sums.
    pub fn push(&mut self, value: Option<f64>, weight: f64) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v * weight;
            self.weight += weight;
            self.count += 1;
        }
    }

    /// Σ(value·weight)
    pub fn total(&self) -> f64 {
        self.sum
    }

    /// Σ(weight)
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of non-null entries seen
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        safe_div(self.sum, self.weight)
    }

    /// Weighted mean, or `None` with fewer than `min_count` entries
    pub fn mean_with_min(&self, min_count: usize) -> Option<f64> {
        if self.count < min_count {
            return None;
        }
        self.mean()
    }
}

impl FromIterator<(Option<f64>, f64)> for WeightedTotal {
    fn from_iter<I: IntoIterator<Item = (Option<f64>, f64)>>(iter: I) -> Self {
        let mut total = WeightedTotal::new();
        for (value, weight) in iter {
            total.push(value, weight);
        }
        total
    }
}

/// Weighted made/attempted totals. The ratio is taken from the totals,
/// never by averaging per-game percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedRatio {
    numerator: f64,
    denominator: f64,
    count: usize,
}

impl WeightedRatio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one game. Skipped when either side is missing.
    pub fn push(&mut self, numerator: Option<f64>, denominator: Option<f64>, weight: f64) {
        if let (Some(n), Some(d)) = (numerator, denominator) {
            if n.is_finite() && d.is_finite() {
                self.numerator += n * weight;
                self.denominator += d * weight;
                self.count += 1;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn numerator(&self) -> f64 {
        self.numerator
    }

    pub fn denominator(&self) -> f64 {
        self.denominator
    }

    pub fn ratio(&self) -> Option<f64> {
        safe_div(self.numerator, self.denominator)
    }

    pub fn ratio_with_min(&self, min_count: usize) -> Option<f64> {
        if self.count < min_count {
            return None;
        }
        self.ratio()
    }
}

/// `num / den`, or `None` for a zero or non-finite result
pub fn safe_div(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let q = num / den;
    q.is_finite().then_some(q)
}

/// Arithmetic on `Option<f64>` where any missing operand yields `None`
pub trait NullableExt {
    fn plus(self, other: Option<f64>) -> Option<f64>;
    fn minus(self, other: Option<f64>) -> Option<f64>;
    fn div_by(self, den: Option<f64>) -> Option<f64>;
    fn scaled(self, k: f64) -> Option<f64>;
    fn clamped(self, lo: f64, hi: f64) -> Option<f64>;
}

impl NullableExt for Option<f64> {
    fn plus(self, other: Option<f64>) -> Option<f64> {
        Some(self? + other?)
    }

    fn minus(self, other: Option<f64>) -> Option<f64> {
        Some(self? - other?)
    }

    fn div_by(self, den: Option<f64>) -> Option<f64> {
        safe_div(self?, den?)
    }

    fn scaled(self, k: f64) -> Option<f64> {
        self.map(|v| v * k)
    }

    fn clamped(self, lo: f64, hi: f64) -> Option<f64> {
        self.map(|v| v.clamp(lo, hi))
    }
}

/// Flag as 0/1
pub fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weighted_total_skips_nulls() {
        let total: WeightedTotal = vec![(Some(10.0), 1.0), (None, 0.5), (Some(20.0), 1.0)]
            .into_iter()
            .collect();
        assert_eq!(total.count(), 2);
        assert_relative_eq!(total.mean().unwrap(), 15.0);
        assert!(total.mean_with_min(3).is_none());
    }

    #[test]
    fn test_empty_total_is_null() {
        assert!(WeightedTotal::new().mean().is_none());
        assert!(WeightedRatio::new().ratio().is_none());
    }

    #[test]
    fn test_ratio_from_totals() {
        let mut r = WeightedRatio::new();
        r.push(Some(1.0), Some(2.0), 1.0);
        r.push(Some(9.0), Some(10.0), 1.0);
        // 10/12, not mean(0.5, 0.9)
        assert_relative_eq!(r.ratio().unwrap(), 10.0 / 12.0);
        r.push(None, Some(4.0), 1.0);
        assert_eq!(r.count(), 2);
    }

    #[test]
    fn test_nullable_arithmetic() {
        assert_eq!(Some(3.0).minus(Some(1.0)), Some(2.0));
        assert_eq!(Some(3.0).minus(None), None);
        assert_eq!(Some(3.0).div_by(Some(0.0)), None);
        assert_eq!(Option::<f64>::None.scaled(2.0), None);
        assert_eq!(Some(1.7).clamped(0.0, 1.0), Some(1.0));
        assert_eq!(safe_div(1.0, 0.0), None);
    }
}
