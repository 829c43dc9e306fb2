use super::Artifact;
use crate::{MlErr, Result};

/// A durable key-value namespace for trained models.
pub trait ModelStore: Send + Sync {
    /// Persists `artifact` under `key`, replacing whatever was there.
    fn save(&self, key: &str, artifact: &Artifact) -> Result<()>;

    /// Fetches the artifact under `key`, `None` if nothing was saved there.
    fn load(&self, key: &str) -> Result<Option<Artifact>>;

    /// Lists the keys holding an artifact, sorted.
    fn list(&self) -> Result<Vec<String>>;

    /// Removes the artifact under `key`.
    ///
    /// # Returns
    /// Whether there was something to remove.
    fn remove(&self, key: &str) -> Result<bool>;
}

/// Keys are made of lowercase ascii letters, digits and dashes.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');

    if !valid {
        return Err(MlErr::InvalidKey(key.to_string()));
    }

    Ok(())
}
