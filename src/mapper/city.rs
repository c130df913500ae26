//! City mapper (table VILLES)

use std::sync::Arc;
use rusqlite::{params, Connection, OptionalExtension, Params};
use crate::domain::{City, Shared};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::Result;
use super::{trace_failure, IdentityMap, Mapper};

const SELECT_CITY: &str = "SELECT numero, code_postal, nom_ville FROM VILLES";
const KEYS: KeyStrategy = KeyStrategy::Sequence("SEQ_VILLES");

pub struct CityMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<City>,
}

impl CityMapper {
    pub fn new(db: Arc<ConnectionProvider>) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
        }
    }

    /// Look a city up on an already checked-out connection
    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<City>>> {
        if let Some(city) = self.cache.get(id) {
            return Ok(Some(city));
        }
        let city = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_CITY), [id], row_to_city)
            .optional()?;
        Ok(city.map(|c| self.cache.load(id, c)))
    }

    /// Cities with exactly this name
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Shared<City>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} WHERE nom_ville = ?1 ORDER BY numero", SELECT_CITY), [name])
    }

    /// Cities sharing a zip code
    pub fn find_by_zip_code(&self, zip_code: &str) -> Result<Vec<Shared<City>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} WHERE code_postal = ?1 ORDER BY numero", SELECT_CITY), [zip_code])
    }

    fn query<P: Params>(&self, conn: &Connection, sql: &str, params: P) -> Result<Vec<Shared<City>>> {
        let mut stmt = conn.prepare(sql)?;
        let cities = stmt
            .query_map(params, row_to_city)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(cities
            .into_iter()
            .filter_map(|c| c.id.map(|id| self.cache.load(id, c)))
            .collect())
    }
}

impl Mapper for CityMapper {
    type Entity = City;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<City>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<City>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} ORDER BY numero", SELECT_CITY), [])
    }

    fn create(&self, entity: &Shared<City>) -> Result<Shared<City>> {
        let city = entity.read().clone();
        if city.id.is_some() {
            tracing::debug!("City {} already persisted", city);
            return Ok(entity.clone());
        }

        let result = self.db.in_transaction(|tx| {
            let allocated = KEYS.allocate(tx)?;
            tx.execute(
                "INSERT INTO VILLES (numero, code_postal, nom_ville) VALUES (?1, ?2, ?3)",
                params![allocated, city.zip_code, city.name],
            )?;
            Ok(KEYS.resolve(tx, allocated))
        });

        let id = trace_failure("create", "City", None, result)?;
        entity.write().id = Some(id);
        tracing::info!("Created city #{} ({})", id, city);
        Ok(self.cache.put(id, entity))
    }

    fn update(&self, entity: &Shared<City>) -> Result<bool> {
        let city = entity.read().clone();
        let Some(id) = city.id else {
            return Ok(false);
        };

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                "UPDATE VILLES SET code_postal = ?1, nom_ville = ?2 WHERE numero = ?3",
                params![city.zip_code, city.name, id],
            )?)
        });

        if trace_failure("update", "City", Some(id), result)? == 0 {
            return Ok(false);
        }
        self.cache.put(id, entity);
        Ok(true)
    }

    /// Fails with a storage error while restaurants are located in the city
    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = self
            .db
            .in_transaction(|tx| Ok(tx.execute("DELETE FROM VILLES WHERE numero = ?1", [id])?));

        let deleted = trace_failure("delete", "City", Some(id), result)?;
        self.cache.remove(id);
        Ok(deleted > 0)
    }

    fn identity_map(&self) -> &IdentityMap<City> {
        &self.cache
    }
}

fn row_to_city(row: &rusqlite::Row) -> rusqlite::Result<City> {
    Ok(City {
        id: Some(row.get(0)?),
        zip_code: row.get(1)?,
        name: row.get(2)?,
        ..City::default()
    })
}
