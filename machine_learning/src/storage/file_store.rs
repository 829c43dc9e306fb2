use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Artifact, ModelStore, validate_key};
use crate::{MlErr, Result, spec::ModelSpec};

const FORMAT_VERSION: u32 = 1;
const HEADER_EXT: &str = "json";
const WEIGHTS_EXT: &str = "bin";

/// What goes in the `.json` file next to the raw weights.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    version: u32,
    spec: ModelSpec,
    params: usize,
}

/// Stores every artifact as two files in a directory: `<key>.json` with the model spec and
/// `<key>.bin` with the weights as raw `f32`s in the platform byte order.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a new `FileStore`, creating `dir` if it does not exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ext}"))
    }

    /// Writes through a temporary file so readers never see half written data.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn corrupt(key: &str, reason: impl Into<String>) -> MlErr {
        MlErr::CorruptArtifact {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl ModelStore for FileStore {
    fn save(&self, key: &str, artifact: &Artifact) -> Result<()> {
        validate_key(key)?;

        let header = Header {
            version: FORMAT_VERSION,
            spec: artifact.spec.clone(),
            params: artifact.params.len(),
        };

        // Weights first, a header only exists once its weights do
        let weights: &[u8] = bytemuck::cast_slice(&artifact.params);
        self.write_atomic(&self.path(key, WEIGHTS_EXT), weights)?;
        self.write_atomic(
            &self.path(key, HEADER_EXT),
            &serde_json::to_vec_pretty(&header)?,
        )?;

        debug!(key = key, params = artifact.params.len(); "saved model");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Artifact>> {
        validate_key(key)?;

        let header = match fs::read(self.path(key, HEADER_EXT)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let header: Header = serde_json::from_slice(&header)?;

        if header.version != FORMAT_VERSION {
            return Err(Self::corrupt(
                key,
                format!("unknown format version {}", header.version),
            ));
        }

        let weights = match fs::read(self.path(key, WEIGHTS_EXT)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Self::corrupt(key, "the weights file is missing"));
            }
            Err(e) => return Err(e.into()),
        };

        let expected = header.params * size_of::<f32>();
        if weights.len() != expected {
            return Err(Self::corrupt(
                key,
                format!("expected {expected} weight bytes, found {}", weights.len()),
            ));
        }

        let mut params = vec![0f32; header.params];
        bytemuck::cast_slice_mut::<f32, u8>(&mut params).copy_from_slice(&weights);

        Ok(Some(Artifact {
            spec: header.spec,
            params,
        }))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) != Some(HEADER_EXT) {
                continue;
            }

            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            if validate_key(key).is_ok() && self.path(key, WEIGHTS_EXT).is_file() {
                keys.push(key.to_string());
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let mut removed = false;
        for ext in [HEADER_EXT, WEIGHTS_EXT] {
            match fs::remove_file(self.path(key, ext)) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        arch::ModelBuilder,
        spec::{ActFnSpec, LayerSpec},
    };

    fn sequence_spec() -> ModelSpec {
        ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Lstm {
                    input: 1,
                    units: 4,
                    steps: 10,
                    return_sequences: true,
                },
                LayerSpec::Lstm {
                    input: 4,
                    units: 4,
                    steps: 10,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    dim: (4, 1),
                    act_fn: Some(ActFnSpec::Relu),
                },
            ],
        }
    }

    #[test]
    fn a_saved_model_comes_back_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let model = ModelBuilder::new().build(&sequence_spec(), &mut rng).unwrap();

        store
            .save("sequence-prediction-model", &Artifact::from_model(&model))
            .unwrap();

        let artifact = store.load("sequence-prediction-model").unwrap().unwrap();
        assert_eq!(artifact.spec, sequence_spec());
        assert_eq!(artifact.params, model.params());

        let restored = artifact.into_model().unwrap();
        assert_eq!(restored.params(), model.params());
        assert_eq!(store.list().unwrap(), vec!["sequence-prediction-model"]);
    }

    #[test]
    fn missing_keys_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        assert!(store.load("nothing-here").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
        assert!(!store.remove("nothing-here").unwrap());
    }

    #[test]
    fn truncated_weights_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let artifact = Artifact {
            spec: sequence_spec(),
            params: vec![1.0; 8],
        };

        store.save("model", &artifact).unwrap();
        fs::write(dir.path().join("model.bin"), [0u8; 6]).unwrap();

        let err = store.load("model").unwrap_err();
        assert!(matches!(err, MlErr::CorruptArtifact { .. }));
    }

    #[test]
    fn removed_models_are_no_longer_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let artifact = Artifact {
            spec: sequence_spec(),
            params: vec![0.0; 3],
        };

        store.save("a", &artifact).unwrap();
        store.save("b", &artifact).unwrap();
        assert!(store.remove("a").unwrap());

        assert_eq!(store.list().unwrap(), vec!["b"]);
        assert!(store.save("../a", &artifact).is_err());
    }
}
