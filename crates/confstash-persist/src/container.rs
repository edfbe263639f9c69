//! Serialization of types that own [`PersistedWork`](crate::PersistedWork)
//! cells.
//!
//! Cells serialize their configuration and (unless transient) their value,
//! but never their worker or global registry. An owner implements
//! [`PersistableContainer`] and re-links those handles in
//! [`relink`](PersistableContainer::relink), which [`thaw`](PersistableContainer::thaw)
//! runs right after deserialization.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::PersistResult;

/// An owner of memoized cells that can be frozen to bytes and thawed back.
pub trait PersistableContainer: Serialize + DeserializeOwned {
    /// Re-attach workers and registries after deserialization.
    fn relink(&mut self) {}

    /// Serialize the owner; transient cells are written without a value.
    fn freeze(&self) -> PersistResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize an owner and run [`PersistableContainer::relink`].
    fn thaw(bytes: &[u8]) -> PersistResult<Self> {
        let mut container: Self = serde_json::from_slice(bytes)?;
        container.relink();
        tracing::debug!(
            container = std::any::type_name::<Self>(),
            "container thawed"
        );
        Ok(container)
    }
}
