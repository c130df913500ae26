//! Basic evaluation mapper (table LIKES)
//!
//! Keys come from the database (generated on insert), not from a sequence.

use std::sync::Arc;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use crate::domain::{persisted_id, BasicEvaluation, Evaluation, Restaurant, Shared};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::{Error, Result};
use super::{
    column_error, delete_returning_keys, from_flag, to_flag, trace_failure, IdentityMap, Late,
    Mapper, RestaurantMapper,
};

const SELECT_LIKE: &str = "SELECT numero, date_eval, appreciation, adresse_ip, fk_rest FROM LIKES";
const KEYS: KeyStrategy = KeyStrategy::Generated;

struct LikeRow {
    id: i64,
    visit_date: NaiveDate,
    like: bool,
    ip_address: String,
    restaurant_id: i64,
}

impl LikeRow {
    fn into_entity(self, restaurant: &Shared<Restaurant>) -> BasicEvaluation {
        let mut evaluation = BasicEvaluation::new(self.visit_date, restaurant, self.like, self.ip_address);
        evaluation.id = Some(self.id);
        evaluation
    }
}

pub struct BasicEvaluationMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<BasicEvaluation>,
    restaurants: Late<RestaurantMapper>,
}

impl BasicEvaluationMapper {
    pub fn new(db: Arc<ConnectionProvider>) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
            restaurants: Late::new("Restaurant"),
        }
    }

    pub(crate) fn bind_restaurants(&self, restaurants: &Arc<RestaurantMapper>) {
        self.restaurants.bind(restaurants);
    }

    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<BasicEvaluation>>> {
        if let Some(evaluation) = self.cache.get(id) {
            return Ok(Some(evaluation));
        }
        let row = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_LIKE), [id], row_to_like)
            .optional()?;
        match row {
            Some(row) => self.resolve(conn, row).map(Some),
            None => Ok(None),
        }
    }

    /// All votes on a restaurant, oldest first
    pub fn find_by_restaurant(&self, restaurant: &Shared<Restaurant>) -> Result<Vec<Shared<BasicEvaluation>>> {
        let restaurant_id = persisted_id(restaurant)?;
        let conn = self.db.connection()?;
        let canonical = self
            .restaurants
            .get()?
            .find_by_id_with(&conn, restaurant_id)?
            .ok_or(Error::NotPersisted("Restaurant"))?;
        self.find_by_restaurant_with(&conn, &canonical, restaurant_id)
    }

    /// Number of likes (`like == true`) or dislikes on a restaurant
    pub fn count_by_appreciation(&self, restaurant: &Shared<Restaurant>, like: bool) -> Result<usize> {
        let restaurant_id = persisted_id(restaurant)?;
        let conn = self.db.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM LIKES WHERE fk_rest = ?1 AND appreciation = ?2",
            params![restaurant_id, to_flag(like)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Load the votes of a restaurant that is being hydrated.
    ///
    /// `restaurant` becomes the owner of every vote not yet cached.
    pub(crate) fn find_by_restaurant_with(
        &self,
        conn: &Connection,
        restaurant: &Shared<Restaurant>,
        restaurant_id: i64,
    ) -> Result<Vec<Shared<BasicEvaluation>>> {
        let mut stmt = conn.prepare(&format!("{} WHERE fk_rest = ?1 ORDER BY numero", SELECT_LIKE))?;
        let rows = stmt
            .query_map([restaurant_id], row_to_like)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                match self.cache.get(id) {
                    Some(cached) => cached,
                    None => self.cache.load(id, row.into_entity(restaurant)),
                }
            })
            .collect())
    }

    /// Resolve the owning restaurant of a row loaded on its own
    fn resolve(&self, conn: &Connection, row: LikeRow) -> Result<Shared<BasicEvaluation>> {
        let restaurant = self
            .restaurants
            .get()?
            .find_by_id_with(conn, row.restaurant_id)?
            .ok_or(Error::DanglingReference {
                entity: "BasicEvaluation",
                id: row.id,
                target: "Restaurant",
                target_id: row.restaurant_id,
            })?;
        // Hydrating the restaurant usually loaded this vote already
        if let Some(cached) = self.cache.get(row.id) {
            return Ok(cached);
        }
        let id = row.id;
        let evaluation = self.cache.load(id, row.into_entity(&restaurant));
        restaurant.write().attach_evaluation(Evaluation::Basic(evaluation.clone()));
        Ok(evaluation)
    }

    pub(crate) fn delete_by_restaurant_with(&self, conn: &Connection, restaurant_id: i64) -> Result<Vec<i64>> {
        delete_returning_keys(conn, "DELETE FROM LIKES WHERE fk_rest = ?1 RETURNING numero", restaurant_id)
    }

    /// Evict a deleted vote and detach it from its restaurant
    pub(crate) fn forget(&self, id: i64) {
        if let Some(evaluation) = self.cache.remove(id) {
            let owner = evaluation.read().restaurant();
            if let Some(restaurant) = owner {
                restaurant.write().remove_evaluation(&Evaluation::Basic(evaluation));
            }
        }
    }

    /// Evict votes whose restaurant is no longer alive
    pub(crate) fn evict_orphans(&self) -> Vec<i64> {
        self.cache.evict_where(|e| e.restaurant().is_none())
    }

    pub(crate) fn forget_all(&self, ids: &[i64]) {
        for id in ids {
            self.forget(*id);
        }
    }
}

impl Mapper for BasicEvaluationMapper {
    type Entity = BasicEvaluation;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<BasicEvaluation>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<BasicEvaluation>>> {
        let conn = self.db.connection()?;
        let rows = {
            let mut stmt = conn.prepare(&format!("{} ORDER BY numero", SELECT_LIKE))?;
            stmt.query_map([], row_to_like)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(|row| self.resolve(&conn, row)).collect()
    }

    fn create(&self, entity: &Shared<BasicEvaluation>) -> Result<Shared<BasicEvaluation>> {
        let snapshot = entity.read().clone();
        if snapshot.id.is_some() {
            return Ok(entity.clone());
        }
        let owner = snapshot.restaurant().ok_or(Error::NotPersisted("Restaurant"));
        let restaurant = trace_failure("create", "BasicEvaluation", None, owner)?;
        let restaurant_id = trace_failure("create", "BasicEvaluation", None, persisted_id(&restaurant))?;

        let result = self.db.in_transaction(|tx| {
            let allocated = KEYS.allocate(tx)?;
            tx.execute(
                r#"
                INSERT INTO LIKES (numero, date_eval, appreciation, adresse_ip, fk_rest)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    allocated,
                    snapshot.visit_date,
                    to_flag(snapshot.like),
                    snapshot.ip_address,
                    restaurant_id,
                ],
            )?;
            Ok(KEYS.resolve(tx, allocated))
        });

        let id = trace_failure("create", "BasicEvaluation", None, result)?;
        entity.write().id = Some(id);
        let cached = self.cache.put(id, entity);
        restaurant.write().attach_evaluation(Evaluation::Basic(cached.clone()));
        tracing::info!(
            "Created {} #{} on restaurant #{}",
            if snapshot.like { "like" } else { "dislike" },
            id,
            restaurant_id
        );
        Ok(cached)
    }

    fn update(&self, entity: &Shared<BasicEvaluation>) -> Result<bool> {
        let snapshot = entity.read().clone();
        let Some(id) = snapshot.id else {
            return Ok(false);
        };
        let owner = snapshot.restaurant().ok_or(Error::NotPersisted("Restaurant"));
        let restaurant = trace_failure("update", "BasicEvaluation", Some(id), owner)?;
        let restaurant_id = trace_failure("update", "BasicEvaluation", Some(id), persisted_id(&restaurant))?;
        let previous_owner = self.cache.get(id).and_then(|e| e.read().restaurant());

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                r#"
                UPDATE LIKES SET date_eval = ?1, appreciation = ?2, adresse_ip = ?3, fk_rest = ?4
                WHERE numero = ?5
                "#,
                params![
                    snapshot.visit_date,
                    to_flag(snapshot.like),
                    snapshot.ip_address,
                    restaurant_id,
                    id,
                ],
            )?)
        });

        if trace_failure("update", "BasicEvaluation", Some(id), result)? == 0 {
            return Ok(false);
        }
        let cached = Evaluation::Basic(self.cache.put(id, entity));
        if let Some(previous) = previous_owner {
            if !Arc::ptr_eq(&previous, &restaurant) {
                previous.write().remove_evaluation(&cached);
            }
        }
        restaurant.write().attach_evaluation(cached);
        Ok(true)
    }

    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = self
            .db
            .in_transaction(|tx| Ok(tx.execute("DELETE FROM LIKES WHERE numero = ?1", [id])?));

        let deleted = trace_failure("delete", "BasicEvaluation", Some(id), result)?;
        self.forget(id);
        Ok(deleted > 0)
    }

    fn identity_map(&self) -> &IdentityMap<BasicEvaluation> {
        &self.cache
    }
}

fn row_to_like(row: &rusqlite::Row) -> rusqlite::Result<LikeRow> {
    let flag: String = row.get(2)?;
    let like = from_flag("appreciation", &flag).map_err(|e| column_error(2, e))?;

    Ok(LikeRow {
        id: row.get(0)?,
        visit_date: row.get(1)?,
        like,
        ip_address: row.get(3)?,
        restaurant_id: row.get(4)?,
    })
}
