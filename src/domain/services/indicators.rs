/// Incremental exponential moving average.
///
/// Seeded with the first sample, then `ema = alpha * sample + (1 - alpha) * ema`
/// with `alpha = 2 / (period + 1)`. Updated on every tick; the 20-period
/// instance is the structural filter for entry confirmation.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Z-score of a sample against a population. None when the population is
/// empty or has no variance.
pub fn zscore(sample: f64, population: &[f64]) -> Option<f64> {
    let m = mean(population)?;
    let sd = std_dev(population)?;
    if sd <= f64::EPSILON {
        return None;
    }
    Some((sample - m) / sd)
}
