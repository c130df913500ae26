//! Restaurant type mapper (table TYPES_GASTRONOMIQUES)

use std::sync::Arc;
use rusqlite::{params, Connection, OptionalExtension, Params};
use crate::domain::{RestaurantType, Shared};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::Result;
use super::{trace_failure, IdentityMap, Mapper};

const SELECT_TYPE: &str = "SELECT numero, libelle, description FROM TYPES_GASTRONOMIQUES";
const KEYS: KeyStrategy = KeyStrategy::Sequence("SEQ_TYPES_GASTRONOMIQUES");

pub struct RestaurantTypeMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<RestaurantType>,
}

impl RestaurantTypeMapper {
    pub fn new(db: Arc<ConnectionProvider>) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
        }
    }

    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<RestaurantType>>> {
        if let Some(kind) = self.cache.get(id) {
            return Ok(Some(kind));
        }
        let kind = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_TYPE), [id], row_to_type)
            .optional()?;
        Ok(kind.map(|k| self.cache.load(id, k)))
    }

    /// The type with this exact label (labels are unique)
    pub fn find_by_label(&self, label: &str) -> Result<Option<Shared<RestaurantType>>> {
        let conn = self.db.connection()?;
        let found = self.query(&conn, &format!("{} WHERE libelle = ?1", SELECT_TYPE), [label])?;
        Ok(found.into_iter().next())
    }

    /// Types whose description contains `fragment`
    pub fn find_by_description(&self, fragment: &str) -> Result<Vec<Shared<RestaurantType>>> {
        let conn = self.db.connection()?;
        let pattern = format!("%{}%", fragment);
        self.query(
            &conn,
            &format!("{} WHERE description LIKE ?1 ORDER BY libelle", SELECT_TYPE),
            [pattern],
        )
    }

    fn query<P: Params>(&self, conn: &Connection, sql: &str, params: P) -> Result<Vec<Shared<RestaurantType>>> {
        let mut stmt = conn.prepare(sql)?;
        let kinds = stmt
            .query_map(params, row_to_type)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(kinds
            .into_iter()
            .filter_map(|k| k.id.map(|id| self.cache.load(id, k)))
            .collect())
    }
}

impl Mapper for RestaurantTypeMapper {
    type Entity = RestaurantType;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<RestaurantType>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<RestaurantType>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} ORDER BY libelle", SELECT_TYPE), [])
    }

    /// A label that already exists resolves to the existing type
    fn create(&self, entity: &Shared<RestaurantType>) -> Result<Shared<RestaurantType>> {
        let kind = entity.read().clone();
        if kind.id.is_some() {
            return Ok(entity.clone());
        }

        let result = self.db.in_transaction(|tx| {
            let allocated = KEYS.allocate(tx)?;
            tx.execute(
                "INSERT INTO TYPES_GASTRONOMIQUES (numero, libelle, description) VALUES (?1, ?2, ?3)",
                params![allocated, kind.label, kind.description],
            )?;
            Ok(KEYS.resolve(tx, allocated))
        });

        match result {
            Ok(id) => {
                entity.write().id = Some(id);
                tracing::info!("Created restaurant type #{} ({})", id, kind.label);
                Ok(self.cache.put(id, entity))
            }
            Err(err) if err.is_unique_violation() => {
                tracing::warn!("Restaurant type '{}' already exists, reusing it", kind.label);
                match self.find_by_label(&kind.label)? {
                    Some(existing) => Ok(existing),
                    None => Err(err),
                }
            }
            Err(err) => trace_failure("create", "RestaurantType", None, Err(err)),
        }
    }

    fn update(&self, entity: &Shared<RestaurantType>) -> Result<bool> {
        let kind = entity.read().clone();
        let Some(id) = kind.id else {
            return Ok(false);
        };

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                "UPDATE TYPES_GASTRONOMIQUES SET libelle = ?1, description = ?2 WHERE numero = ?3",
                params![kind.label, kind.description, id],
            )?)
        });

        if trace_failure("update", "RestaurantType", Some(id), result)? == 0 {
            return Ok(false);
        }
        self.cache.put(id, entity);
        Ok(true)
    }

    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute("DELETE FROM TYPES_GASTRONOMIQUES WHERE numero = ?1", [id])?)
        });

        let deleted = trace_failure("delete", "RestaurantType", Some(id), result)?;
        self.cache.remove(id);
        Ok(deleted > 0)
    }

    fn identity_map(&self) -> &IdentityMap<RestaurantType> {
        &self.cache
    }
}

fn row_to_type(row: &rusqlite::Row) -> rusqlite::Result<RestaurantType> {
    Ok(RestaurantType {
        id: Some(row.get(0)?),
        label: row.get(1)?,
        description: row.get(2)?,
        ..RestaurantType::default()
    })
}
