//! Domain model - the in-memory object graph
//!
//! Every persisted entity lives behind a [`Shared`] handle so that the
//! identity maps can hand the same instance to every caller:
//! - `City`, `RestaurantType`, `EvaluationCriteria`: reference data
//! - `Restaurant` with its embedded `Localisation`
//! - `Evaluation`: either a `BasicEvaluation` (like/dislike) or a
//!   `CompleteEvaluation` (comment + grades)

pub mod city;
pub mod criteria;
pub mod evaluation;
pub mod restaurant;
pub mod restaurant_type;

use std::sync::Arc;
use parking_lot::RwLock;

pub use city::City;
pub use criteria::EvaluationCriteria;
pub use evaluation::{BasicEvaluation, CompleteEvaluation, Evaluation, Grade};
pub use restaurant::{Localisation, Restaurant};
pub use restaurant_type::RestaurantType;

/// Shared, mutable handle to a live entity.
///
/// Two handles denote the same entity instance iff `Arc::ptr_eq` holds.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value into a fresh [`Shared`] handle
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Common behaviour of every persisted entity
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable entity name, used in logs and errors
    const NAME: &'static str;

    /// Surrogate key, `None` until the entity has been created
    fn id(&self) -> Option<i64>;

    /// Copy the persisted fields of `other` into `self`.
    ///
    /// Keys and owned collections are left alone.
    fn assign(&mut self, other: &Self);
}

/// Read the key of a shared entity
pub fn id_of<T: Entity>(entity: &Shared<T>) -> Option<i64> {
    entity.read().id()
}

/// Read the key of a shared entity, failing if it was never persisted
pub fn persisted_id<T: Entity>(entity: &Shared<T>) -> crate::Result<i64> {
    id_of(entity).ok_or(crate::Error::NotPersisted(T::NAME))
}
