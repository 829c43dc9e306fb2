use crate::{Result, arch::Sequential, spec::ModelSpec};

/// Everything needed to rebuild a trained model.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub spec: ModelSpec,
    pub params: Vec<f32>,
}

impl Artifact {
    /// Snapshots a model.
    pub fn from_model(model: &Sequential) -> Self {
        Self {
            spec: model.spec(),
            params: model.params().to_vec(),
        }
    }

    /// Rebuilds the model this artifact was taken from.
    pub fn into_model(self) -> Result<Sequential> {
        crate::arch::ModelBuilder::new().restore(&self.spec, self.params)
    }
}
