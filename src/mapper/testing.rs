//! Shared fixtures for mapper tests

use std::sync::Arc;
use chrono::NaiveDate;
use crate::domain::{shared, City, Localisation, Restaurant, RestaurantType, Shared};
use crate::storage::ConnectionProvider;
use super::{Mapper, MapperRegistry};

/// Fresh registry over a private in-memory database
pub fn registry() -> MapperRegistry {
    let db = ConnectionProvider::open_in_memory().expect("in-memory database");
    MapperRegistry::new(Arc::new(db))
}

/// New session over the same database, with empty identity maps
pub fn registry_reload(registry: &MapperRegistry) -> MapperRegistry {
    MapperRegistry::new(registry.db().clone())
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
}

/// Row count of a table
pub fn count(registry: &MapperRegistry, table: &str) -> usize {
    registry.db().stats().expect("stats").count(table)
}

/// Make every restaurant delete fail inside SQLite
pub fn block_restaurant_deletes(registry: &MapperRegistry) {
    let conn = registry.db().connection().expect("connection");
    conn.execute_batch(
        "CREATE TRIGGER block_restaurant_deletes BEFORE DELETE ON RESTAURANTS \
         BEGIN SELECT RAISE(ABORT, 'restaurant deletes are blocked'); END;",
    )
    .expect("trigger");
}

/// One persisted restaurant with its city and type
pub struct Fixture {
    pub registry: MapperRegistry,
    pub city: Shared<City>,
    pub kind: Shared<RestaurantType>,
    pub restaurant: Shared<Restaurant>,
}

impl Fixture {
    pub fn new() -> Self {
        let registry = registry();
        let city = registry
            .cities
            .create(&shared(City::new("2000", "Neuchâtel")))
            .expect("city");
        let kind = registry
            .types
            .create(&shared(RestaurantType::new("Pizzeria", "Pizzas au feu de bois")))
            .expect("type");
        let restaurant = registry
            .restaurants
            .create(&shared(Restaurant::new(
                "Da Mario",
                Some("Pizzas au feu de bois".to_string()),
                None,
                Localisation::new("Rue du Lac 1", city.clone()),
                kind.clone(),
            )))
            .expect("restaurant");

        Self {
            registry,
            city,
            kind,
            restaurant,
        }
    }
}
