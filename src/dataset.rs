use crate::{
    error::{PredictorErr, Result},
    observation::Observation,
};

/// Sliding window training examples over a history, newest first. Every row holds `window`
/// normalized samples followed by the sample right after them.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSet {
    window: usize,
    data: Vec<f32>,
}

impl TrainingSet {
    /// Builds the examples out of the first `limit` observations, or all of them.
    ///
    /// # Errors
    /// `InsufficientHistory` if not even one example fits.
    pub fn build(history: &[Observation], window: usize, limit: Option<usize>) -> Result<Self> {
        let n = limit.map_or(history.len(), |limit| limit.min(history.len()));

        if window == 0 || n <= window {
            return Err(PredictorErr::InsufficientHistory {
                needed: window + 1,
                got: n,
            });
        }

        let samples: Vec<f32> = history[..n].iter().map(|o| o.normalized()).collect();
        let data = samples
            .windows(window + 1)
            .flatten()
            .copied()
            .collect();

        Ok(Self { window, data })
    }

    /// The amount of examples.
    pub fn len(&self) -> usize {
        self.data.len() / (self.window + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Returns the predictors and the target of example `i`.
    pub fn example(&self, i: usize) -> Option<(&[f32], f32)> {
        let row = self
            .data
            .get(i * (self.window + 1)..(i + 1) * (self.window + 1))?;
        let (x, y) = row.split_at(self.window);
        Some((x, y[0]))
    }

    /// The flat row-major examples.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// The `window` most recent observations, normalized, newest first.
pub fn prediction_input(history: &[Observation], window: usize) -> Result<Vec<f32>> {
    if history.len() < window {
        return Err(PredictorErr::InsufficientHistory {
            needed: window,
            got: history.len(),
        });
    }

    Ok(history[..window].iter().map(|o| o.normalized()).collect())
}
