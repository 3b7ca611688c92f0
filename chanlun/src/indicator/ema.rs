/// Exponential moving average with `alpha = 2 / (period + 1)`, seeded by the
/// first value it sees.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    alpha: f64,
    value: Option<f64>,
}

impl EmaIndicator {
    /// `period` is clamped to at least 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    pub fn next(&mut self, price: f64) -> f64 {
        let value = match self.value {
            None => price,
            Some(prev) => prev + self.alpha * (price - prev),
        };
        self.value = Some(value);
        value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
