use std::fmt;

/// The kinds of trained models, in prediction priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Stacked LSTM over the most recent window of observations.
    Sequence,
    /// Small dense network over the latest observation.
    Feedforward,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Sequence, ModelKind::Feedforward];

    /// The well-known key the kind is persisted under.
    pub fn storage_key(self) -> &'static str {
        match self {
            ModelKind::Sequence => "sequence-prediction-model",
            ModelKind::Feedforward => "feedforward-prediction-model",
        }
    }

    /// The name shown in notifications.
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Sequence => "LSTM",
            ModelKind::Feedforward => "Feedforward",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ModelKind::Sequence => 0,
            ModelKind::Feedforward => 1,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
