//! Backend port implemented by both task trackers.

use crate::error::RemoteError;
use crate::types::{CounterpartFields, Item, ItemId, Side};

/// A remote task tracker seen through the operations the sync engine needs.
///
/// Calls are blocking; a pass runs them one at a time, in item order.
/// Implementations own their auth, paging and vocabulary quirks and return
/// items already normalised into [`Item`].
pub trait Backend {
    /// Which side of the sync this backend serves.
    fn side(&self) -> Side;

    /// Every item in the configured container, closed ones included.
    fn fetch_all(&self) -> Result<Vec<Item>, RemoteError>;

    /// A single item by id.
    fn get(&self, id: &ItemId) -> Result<Item, RemoteError>;

    /// Create an item and return its backend-assigned id.
    fn create(&self, fields: &CounterpartFields) -> Result<ItemId, RemoteError>;

    /// Move an item to `status` (a token in this backend's vocabulary).
    ///
    /// Returns [`RemoteError::TransitionRejected`] when the backend's workflow
    /// forbids the move.
    fn set_status(&self, id: &ItemId, status: &str) -> Result<(), RemoteError>;
}
