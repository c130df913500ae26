//! Mappers - translation between relational rows and shared entities
//!
//! Every entity type has one mapper owning its SQL and its identity map.
//! Reads go through the identity map before touching storage; writes run in
//! one transaction and only touch the identity map once it has committed.
//!
//! Hydration that crosses mappers reuses the caller's connection through the
//! `*_with(conn, ..)` methods, so one operation never holds more than one
//! pooled connection.

pub mod basic_evaluation;
pub mod cascade;
pub mod city;
pub mod complete_evaluation;
pub mod criteria;
pub mod grade;
pub mod identity_map;
pub mod registry;
pub mod restaurant;
pub mod restaurant_type;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, OnceLock, Weak};
use crate::domain::{id_of, Entity, Shared};
use crate::{Error, Result};

pub use basic_evaluation::BasicEvaluationMapper;
pub use cascade::CascadeReport;
pub use city::CityMapper;
pub use complete_evaluation::CompleteEvaluationMapper;
pub use criteria::CriteriaMapper;
pub use grade::GradeMapper;
pub use identity_map::IdentityMap;
pub use registry::{CacheSizes, MapperRegistry};
pub use restaurant::RestaurantMapper;
pub use restaurant_type::RestaurantTypeMapper;

/// Contract shared by every entity mapper.
///
/// Expected outcomes are values: a missing row is `Ok(None)`, an update or
/// delete that touched nothing is `Ok(false)`. `Err` means the operation
/// failed and was rolled back; nothing in the identity map changed.
pub trait Mapper: Send + Sync {
    type Entity: Entity;

    /// Look an entity up by key, from the identity map when possible
    fn find_by_id(&self, id: i64) -> Result<Option<Shared<Self::Entity>>>;

    fn find_all(&self) -> Result<Vec<Shared<Self::Entity>>>;

    /// Persist a new entity and assign its key.
    ///
    /// Returns the canonical instance, which is `entity` itself unless a
    /// duplicate unique value resolved to an existing row.
    fn create(&self, entity: &Shared<Self::Entity>) -> Result<Shared<Self::Entity>>;

    /// Write the entity's fields back; `Ok(false)` if no row matched
    fn update(&self, entity: &Shared<Self::Entity>) -> Result<bool>;

    fn delete(&self, entity: &Shared<Self::Entity>) -> Result<bool> {
        match id_of(entity) {
            Some(id) => self.delete_by_id(id),
            None => Ok(false),
        }
    }

    fn delete_by_id(&self, id: i64) -> Result<bool>;

    /// The identity map backing this mapper
    fn identity_map(&self) -> &IdentityMap<Self::Entity>;
}

/// Late-bound reference to another mapper.
///
/// Set once by the registry after every mapper exists. Only a weak handle is
/// kept, so mappers referring to each other do not keep each other alive.
pub struct Late<T> {
    name: &'static str,
    slot: OnceLock<Weak<T>>,
}

impl<T> Late<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: OnceLock::new(),
        }
    }

    pub fn bind(&self, target: &Arc<T>) {
        if self.slot.set(Arc::downgrade(target)).is_err() {
            tracing::warn!("{} mapper already bound, keeping the first binding", self.name);
        }
    }

    pub fn get(&self) -> Result<Arc<T>> {
        self.slot
            .get()
            .and_then(Weak::upgrade)
            .ok_or(Error::NotWired(self.name))
    }
}

/// Log a failed mapper operation with enough context to find it again
pub(crate) fn trace_failure<T>(
    operation: &'static str,
    entity: &'static str,
    key: Option<i64>,
    result: Result<T>,
) -> Result<T> {
    if let Err(err) = &result {
        match key {
            Some(id) => tracing::error!("{} {} #{} failed: {}", operation, entity, id, err),
            None => tracing::error!("{} {} failed: {}", operation, entity, err),
        }
    }
    result
}

/// Run a `DELETE ... RETURNING numero` statement keyed by `id`
pub(crate) fn delete_returning_keys(conn: &rusqlite::Connection, sql: &str, id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let keys = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(keys)
}

/// Convert a column value that failed domain validation into a row error
pub(crate) fn column_error(index: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

/// 'Y'/'N' encoding of booleans
pub(crate) fn to_flag(value: bool) -> &'static str {
    if value { "Y" } else { "N" }
}

pub(crate) fn from_flag(column: &'static str, value: &str) -> Result<bool> {
    match value {
        "Y" => Ok(true),
        "N" => Ok(false),
        other => Err(Error::InvalidColumn {
            column,
            value: other.to_string(),
        }),
    }
}
