//! Restaurant mapper (table RESTAURANTS)
//!
//! Hydrating a restaurant resolves its city and type through their mappers
//! and loads all of its evaluations. Deleting one goes through the cascade.

use std::sync::Arc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Params};
use crate::domain::{
    persisted_id, shared, City, Evaluation, Localisation, Restaurant, RestaurantType, Shared,
};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::{Error, Result};
use super::cascade::{self, RestaurantDependents};
use super::{
    trace_failure, BasicEvaluationMapper, CityMapper, CompleteEvaluationMapper, GradeMapper,
    IdentityMap, Late, Mapper, RestaurantTypeMapper,
};

const SELECT_RESTAURANT: &str =
    "SELECT numero, nom, description, site_web, adresse, fk_type, fk_vill FROM RESTAURANTS";
const KEYS: KeyStrategy = KeyStrategy::Sequence("SEQ_RESTAURANTS");

/// Raw RESTAURANTS row, before its references are resolved
struct RestaurantRow {
    id: i64,
    name: String,
    description: Option<String>,
    website: Option<String>,
    street: String,
    type_id: i64,
    city_id: i64,
}

/// Column values of a restaurant about to be written
struct RestaurantFields {
    id: Option<i64>,
    name: String,
    description: Option<String>,
    website: Option<String>,
    street: String,
    city: Shared<City>,
    kind: Shared<RestaurantType>,
    city_id: i64,
    type_id: i64,
}

impl RestaurantFields {
    fn read(entity: &Shared<Restaurant>) -> Result<Self> {
        let (id, name, description, website, street, city, kind) = {
            let r = entity.read();
            (
                r.id,
                r.name.clone(),
                r.description.clone(),
                r.website.clone(),
                r.localisation.street.clone(),
                r.city().clone(),
                r.restaurant_type.clone(),
            )
        };
        let city_id = persisted_id(&city)?;
        let type_id = persisted_id(&kind)?;
        Ok(Self {
            id,
            name,
            description,
            website,
            street,
            city,
            kind,
            city_id,
            type_id,
        })
    }
}

pub struct RestaurantMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<Restaurant>,
    /// Serializes hydration so a restaurant and its evaluations are built once
    hydration: Mutex<()>,
    cities: Arc<CityMapper>,
    types: Arc<RestaurantTypeMapper>,
    basic_evaluations: Late<BasicEvaluationMapper>,
    complete_evaluations: Late<CompleteEvaluationMapper>,
    grades: Late<GradeMapper>,
}

impl RestaurantMapper {
    pub fn new(
        db: Arc<ConnectionProvider>,
        cities: Arc<CityMapper>,
        types: Arc<RestaurantTypeMapper>,
    ) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
            hydration: Mutex::new(()),
            cities,
            types,
            basic_evaluations: Late::new("BasicEvaluation"),
            complete_evaluations: Late::new("CompleteEvaluation"),
            grades: Late::new("Grade"),
        }
    }

    pub(crate) fn bind_evaluations(
        &self,
        basic: &Arc<BasicEvaluationMapper>,
        complete: &Arc<CompleteEvaluationMapper>,
        grades: &Arc<GradeMapper>,
    ) {
        self.basic_evaluations.bind(basic);
        self.complete_evaluations.bind(complete);
        self.grades.bind(grades);
    }

    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<Restaurant>>> {
        if let Some(restaurant) = self.cache.get(id) {
            return Ok(Some(restaurant));
        }
        let row = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_RESTAURANT), [id], row_to_restaurant)
            .optional()?;
        match row {
            Some(row) => self.hydrate(conn, row).map(Some),
            None => Ok(None),
        }
    }

    /// Restaurants with exactly this name
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Shared<Restaurant>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} WHERE nom = ?1 ORDER BY numero", SELECT_RESTAURANT), [name])
    }

    /// Restaurants whose name contains `fragment`, case-insensitively
    pub fn find_by_name_fragment(&self, fragment: &str) -> Result<Vec<Shared<Restaurant>>> {
        let conn = self.db.connection()?;
        let pattern = format!("%{}%", fragment);
        self.query(&conn, &format!("{} WHERE nom LIKE ?1 ORDER BY nom", SELECT_RESTAURANT), [pattern])
    }

    pub fn find_by_city(&self, city: &Shared<City>) -> Result<Vec<Shared<Restaurant>>> {
        let city_id = persisted_id(city)?;
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} WHERE fk_vill = ?1 ORDER BY nom", SELECT_RESTAURANT), [city_id])
    }

    pub fn find_by_type(&self, kind: &Shared<RestaurantType>) -> Result<Vec<Shared<Restaurant>>> {
        let type_id = persisted_id(kind)?;
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} WHERE fk_type = ?1 ORDER BY nom", SELECT_RESTAURANT), [type_id])
    }

    fn query<P: Params>(&self, conn: &Connection, sql: &str, params: P) -> Result<Vec<Shared<Restaurant>>> {
        let rows = {
            let mut stmt = conn.prepare(sql)?;
            stmt.query_map(params, row_to_restaurant)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(|row| self.hydrate(conn, row)).collect()
    }

    /// Build the in-memory restaurant for a row, or return the cached one
    fn hydrate(&self, conn: &Connection, row: RestaurantRow) -> Result<Shared<Restaurant>> {
        if let Some(restaurant) = self.cache.get(row.id) {
            return Ok(restaurant);
        }
        let _guard = self.hydration.lock();
        if let Some(restaurant) = self.cache.get(row.id) {
            return Ok(restaurant);
        }
        tracing::debug!("Hydrating restaurant #{}", row.id);

        let city = self
            .cities
            .find_by_id_with(conn, row.city_id)?
            .ok_or(Error::DanglingReference {
                entity: "Restaurant",
                id: row.id,
                target: "City",
                target_id: row.city_id,
            })?;
        let kind = self
            .types
            .find_by_id_with(conn, row.type_id)?
            .ok_or(Error::DanglingReference {
                entity: "Restaurant",
                id: row.id,
                target: "RestaurantType",
                target_id: row.type_id,
            })?;

        let id = row.id;
        let mut restaurant = Restaurant::new(
            row.name,
            row.description,
            row.website,
            Localisation::new(row.street, city.clone()),
            kind.clone(),
        );
        restaurant.id = Some(id);
        let handle = shared(restaurant);

        let evaluations = match self.load_evaluations(conn, &handle, id) {
            Ok(evaluations) => evaluations,
            Err(err) => {
                // Dependents cached so far now point at a dead restaurant
                drop(handle);
                self.evict_orphans();
                return Err(err);
            }
        };
        handle.write().evaluations = evaluations;

        let cached = self.cache.load_shared(id, handle);
        link(&city, &kind, id);
        Ok(cached)
    }

    fn load_evaluations(
        &self,
        conn: &Connection,
        handle: &Shared<Restaurant>,
        id: i64,
    ) -> Result<Vec<Evaluation>> {
        let basic = self.basic_evaluations.get()?.find_by_restaurant_with(conn, handle, id)?;
        let complete = self.complete_evaluations.get()?.find_by_restaurant_with(conn, handle, id)?;
        Ok(basic
            .into_iter()
            .map(Evaluation::Basic)
            .chain(complete.into_iter().map(Evaluation::Complete))
            .collect())
    }

    /// Evict evaluations and grades whose owner was never cached.
    ///
    /// Grades go last: they only lose their owner once the reviews holding
    /// them have been evicted.
    fn evict_orphans(&self) {
        let mut evicted = 0;
        if let Ok(basic) = self.basic_evaluations.get() {
            evicted += basic.evict_orphans().len();
        }
        if let Ok(complete) = self.complete_evaluations.get() {
            evicted += complete.evict_orphans().len();
        }
        if let Ok(grades) = self.grades.get() {
            evicted += grades.evict_orphans().len();
        }
        if evicted > 0 {
            tracing::debug!("Evicted {} entries left by a failed hydration", evicted);
        }
    }

    /// Delete the restaurant row itself; dependents must already be gone
    pub(crate) fn delete_row_with(&self, conn: &Connection, id: i64) -> Result<usize> {
        Ok(conn.execute("DELETE FROM RESTAURANTS WHERE numero = ?1", [id])?)
    }

    /// Evict a deleted restaurant and detach it from its city and type
    fn forget(&self, id: i64) {
        if let Some(restaurant) = self.cache.remove(id) {
            let (city, kind) = {
                let r = restaurant.read();
                (r.city().clone(), r.restaurant_type.clone())
            };
            city.write().restaurants.remove(&id);
            kind.write().restaurants.remove(&id);
        }
    }
}

impl Mapper for RestaurantMapper {
    type Entity = Restaurant;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<Restaurant>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<Restaurant>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} ORDER BY nom", SELECT_RESTAURANT), [])
    }

    /// City and type must already be persisted
    fn create(&self, entity: &Shared<Restaurant>) -> Result<Shared<Restaurant>> {
        let fields = trace_failure("create", "Restaurant", None, RestaurantFields::read(entity))?;
        if fields.id.is_some() {
            return Ok(entity.clone());
        }

        let result = self.db.in_transaction(|tx| {
            let allocated = KEYS.allocate(tx)?;
            tx.execute(
                r#"
                INSERT INTO RESTAURANTS (numero, nom, description, site_web, adresse, fk_type, fk_vill)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    allocated,
                    fields.name,
                    fields.description,
                    fields.website,
                    fields.street,
                    fields.type_id,
                    fields.city_id,
                ],
            )?;
            Ok(KEYS.resolve(tx, allocated))
        });

        let id = trace_failure("create", "Restaurant", None, result)?;
        entity.write().id = Some(id);
        let cached = self.cache.put(id, entity);
        link(&fields.city, &fields.kind, id);
        tracing::info!("Created restaurant #{} ({})", id, fields.name);
        Ok(cached)
    }

    fn update(&self, entity: &Shared<Restaurant>) -> Result<bool> {
        let fields = trace_failure("update", "Restaurant", None, RestaurantFields::read(entity))?;
        let Some(id) = fields.id else {
            return Ok(false);
        };
        let previous = self.cache.get(id).map(|r| {
            let r = r.read();
            (r.city().clone(), r.restaurant_type.clone())
        });

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                r#"
                UPDATE RESTAURANTS
                SET nom = ?1, description = ?2, site_web = ?3, adresse = ?4, fk_type = ?5, fk_vill = ?6
                WHERE numero = ?7
                "#,
                params![
                    fields.name,
                    fields.description,
                    fields.website,
                    fields.street,
                    fields.type_id,
                    fields.city_id,
                    id,
                ],
            )?)
        });

        if trace_failure("update", "Restaurant", Some(id), result)? == 0 {
            return Ok(false);
        }
        self.cache.put(id, entity);

        if let Some((old_city, old_kind)) = previous {
            if !Arc::ptr_eq(&old_city, &fields.city) {
                old_city.write().restaurants.remove(&id);
            }
            if !Arc::ptr_eq(&old_kind, &fields.kind) {
                old_kind.write().restaurants.remove(&id);
            }
        }
        link(&fields.city, &fields.kind, id);
        Ok(true)
    }

    /// Deletes grades, complete evaluations, basic evaluations and the
    /// restaurant in one transaction
    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let grades = self.grades.get()?;
        let complete = self.complete_evaluations.get()?;
        let basic = self.basic_evaluations.get()?;
        let dependents = RestaurantDependents {
            grades: &grades,
            complete_evaluations: &complete,
            basic_evaluations: &basic,
        };

        let result = self
            .db
            .in_transaction(|tx| cascade::delete_restaurant(tx, id, &dependents, self));
        let report = trace_failure("delete", "Restaurant", Some(id), result)?;

        grades.forget_all(&report.grades);
        complete.forget_all(&report.complete_evaluations);
        basic.forget_all(&report.basic_evaluations);
        self.forget(id);
        tracing::info!("Deleted restaurant #{} ({} rows)", id, report.total());
        Ok(!report.restaurants.is_empty())
    }

    fn identity_map(&self) -> &IdentityMap<Restaurant> {
        &self.cache
    }
}

fn link(city: &Shared<City>, kind: &Shared<RestaurantType>, id: i64) {
    city.write().restaurants.insert(id);
    kind.write().restaurants.insert(id);
}

fn row_to_restaurant(row: &rusqlite::Row) -> rusqlite::Result<RestaurantRow> {
    Ok(RestaurantRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        website: row.get(3)?,
        street: row.get(4)?,
        type_id: row.get(5)?,
        city_id: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BasicEvaluation, CompleteEvaluation, EvaluationCriteria};
    use crate::mapper::testing;

    #[test]
    fn test_create_links_city_and_type() {
        let fixture = testing::Fixture::new();
        let id = fixture.restaurant.read().id.unwrap();

        assert!(fixture.city.read().restaurants.contains(&id));
        assert!(fixture.kind.read().restaurants.contains(&id));
        assert_eq!(testing::count(&fixture.registry, "RESTAURANTS"), 1);
    }

    #[test]
    fn test_create_requires_persisted_city() {
        let fixture = testing::Fixture::new();
        let unsaved = shared(City::new("3000", "Bern"));
        let restaurant = shared(Restaurant::new(
            "Zum Bären",
            None,
            None,
            Localisation::new("Marktgasse 1", unsaved),
            fixture.kind.clone(),
        ));

        let result = fixture.registry.restaurants.create(&restaurant);

        assert!(matches!(result, Err(Error::NotPersisted("City"))));
        assert_eq!(restaurant.read().id, None);
        assert_eq!(fixture.registry.restaurants.identity_map().len(), 1);
    }

    #[test]
    fn test_identity_across_finders() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let id = fixture.restaurant.read().id.unwrap();

        let by_id = registry.restaurants.find_by_id(id).unwrap().unwrap();
        let by_name = registry.restaurants.find_by_name("Da Mario").unwrap();
        let by_city = registry.restaurants.find_by_city(&fixture.city).unwrap();

        assert!(Arc::ptr_eq(&by_id, &fixture.restaurant));
        assert!(Arc::ptr_eq(&by_name[0], &fixture.restaurant));
        assert!(Arc::ptr_eq(&by_city[0], &fixture.restaurant));
    }

    #[test]
    fn test_hydration_in_fresh_session() {
        let fixture = testing::Fixture::new();
        let id = fixture.restaurant.read().id.unwrap();
        let vote = BasicEvaluation::new(testing::date(), &fixture.restaurant, true, "192.168.1.4");
        fixture.registry.basic_evaluations.create(&shared(vote)).unwrap();

        let session = testing::registry_reload(&fixture.registry);
        let loaded = session.restaurants.find_by_id(id).unwrap().unwrap();
        let again = session.restaurants.find_by_id(id).unwrap().unwrap();
        assert!(Arc::ptr_eq(&loaded, &again));

        let r = loaded.read();
        assert_eq!(r.name, "Da Mario");
        assert_eq!(r.description.as_deref(), Some("Pizzas au feu de bois"));
        assert_eq!(r.website, None);
        assert_eq!(r.localisation.street, "Rue du Lac 1");
        assert_eq!(r.city().read().name, "Neuchâtel");
        assert_eq!(r.restaurant_type.read().label, "Pizzeria");
        assert_eq!(r.evaluations.len(), 1);
        assert_eq!(r.likes(), 1);

        // References resolve through the other mappers' identity maps
        let city = session.cities.find_by_id(r.city().read().id.unwrap()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&city, r.city()));
        assert!(city.read().restaurants.contains(&id));
    }

    #[test]
    fn test_find_by_name_fragment_and_type() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let other = shared(Restaurant::new(
            "Chez Marius",
            None,
            Some("https://marius.example".to_string()),
            Localisation::new("Quai Ostervald 4", fixture.city.clone()),
            fixture.kind.clone(),
        ));
        registry.restaurants.create(&other).unwrap();

        assert_eq!(registry.restaurants.find_by_name_fragment("Mar").unwrap().len(), 2);
        assert_eq!(registry.restaurants.find_by_name_fragment("mario").unwrap().len(), 1);
        assert_eq!(registry.restaurants.find_by_type(&fixture.kind).unwrap().len(), 2);
        assert_eq!(registry.restaurants.find_all().unwrap().len(), 2);
    }

    #[test]
    fn test_update_moves_back_references() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let id = fixture.restaurant.read().id.unwrap();
        let lausanne = registry.cities.create(&shared(City::new("1003", "Lausanne"))).unwrap();

        {
            let mut r = fixture.restaurant.write();
            r.localisation = Localisation::new("Rue de Bourg 8", lausanne.clone());
            r.website = Some("https://damario.example".to_string());
        }
        assert!(registry.restaurants.update(&fixture.restaurant).unwrap());

        assert!(!fixture.city.read().restaurants.contains(&id));
        assert!(lausanne.read().restaurants.contains(&id));

        let session = testing::registry_reload(registry);
        let stored = session.restaurants.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.read().city().read().name, "Lausanne");
        assert_eq!(stored.read().website.as_deref(), Some("https://damario.example"));
    }

    #[test]
    fn test_dangling_reference_is_reported() {
        let fixture = testing::Fixture::new();
        let id = fixture.restaurant.read().id.unwrap();
        {
            let conn = fixture.registry.db().connection().unwrap();
            conn.execute_batch(
                "PRAGMA foreign_keys = OFF; UPDATE RESTAURANTS SET fk_vill = 99; PRAGMA foreign_keys = ON;",
            )
            .unwrap();
        }

        let session = testing::registry_reload(&fixture.registry);
        let result = session.restaurants.find_by_id(id);

        assert!(matches!(
            result,
            Err(Error::DanglingReference { target: "City", target_id: 99, .. })
        ));
        assert!(session.restaurants.identity_map().is_empty());
    }

    #[test]
    fn test_update_of_missing_row_is_false() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let ghost = shared(Restaurant::new(
            "Fantôme",
            None,
            None,
            Localisation::new("Nulle part", fixture.city.clone()),
            fixture.kind.clone(),
        ));
        ghost.write().id = Some(99);

        assert!(!registry.restaurants.update(&ghost).unwrap());

        assert!(!registry.restaurants.identity_map().contains(99));
        assert!(!fixture.city.read().restaurants.contains(&99));
        assert!(!fixture.kind.read().restaurants.contains(&99));
        let id = fixture.restaurant.read().id.unwrap();
        let cached = registry.restaurants.identity_map().get(id).unwrap();
        assert!(Arc::ptr_eq(&cached, &fixture.restaurant));
        assert_eq!(testing::count(registry, "RESTAURANTS"), 1);
    }

    #[test]
    fn test_failed_hydration_leaves_no_orphans() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let id = fixture.restaurant.read().id.unwrap();
        let service = registry.criteria.create(&shared(EvaluationCriteria::new("Service", ""))).unwrap();
        let cuisine = registry.criteria.create(&shared(EvaluationCriteria::new("Cuisine", ""))).unwrap();
        let cuisine_id = cuisine.read().id.unwrap();

        let vote = BasicEvaluation::new(testing::date(), &fixture.restaurant, true, "10.0.0.1");
        let vote_id = registry.basic_evaluations.create(&shared(vote)).unwrap().read().id.unwrap();
        let first = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "bien", "alice"));
        CompleteEvaluation::add_grade(&first, &service, 4);
        registry.complete_evaluations.create(&first).unwrap();
        let second = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "bof", "bob"));
        CompleteEvaluation::add_grade(&second, &service, 3);
        CompleteEvaluation::add_grade(&second, &cuisine, 2);
        registry.complete_evaluations.create(&second).unwrap();

        let break_link = format!(
            "PRAGMA foreign_keys = OFF; UPDATE NOTES SET fk_crit = 99 WHERE fk_crit = {}; PRAGMA foreign_keys = ON;",
            cuisine_id
        );
        registry.db().connection().unwrap().execute_batch(&break_link).unwrap();

        // The vote, the first review and its grade load before the broken grade
        let session = testing::registry_reload(registry);
        let result = session.restaurants.find_by_id(id);
        assert!(matches!(
            result,
            Err(Error::DanglingReference { target: "EvaluationCriteria", target_id: 99, .. })
        ));
        let sizes = session.cache_sizes();
        assert_eq!(sizes.restaurants, 0);
        assert_eq!(sizes.basic_evaluations, 0);
        assert_eq!(sizes.complete_evaluations, 0);
        assert_eq!(sizes.grades, 0);

        let repair = format!("UPDATE NOTES SET fk_crit = {} WHERE fk_crit = 99", cuisine_id);
        registry.db().connection().unwrap().execute_batch(&repair).unwrap();

        let loaded = session.restaurants.find_by_id(id).unwrap().unwrap();
        assert_eq!(loaded.read().evaluations.len(), 3);
        let vote = session.basic_evaluations.find_by_id(vote_id).unwrap().unwrap();
        let owner = vote.read().restaurant().unwrap();
        assert!(Arc::ptr_eq(&owner, &loaded));
        for evaluation in &loaded.read().evaluations {
            if let Some(review) = evaluation.as_complete() {
                for grade in &review.read().grades {
                    let owner = grade.read().evaluation().unwrap();
                    assert!(Arc::ptr_eq(&owner, review));
                }
            }
        }
        assert_eq!(session.cache_sizes().grades, 3);
        assert!(session.basic_evaluations.update(&vote).unwrap());
    }

    #[test]
    fn test_example_scenario() {
        let registry = testing::registry();
        let city = registry.cities.create(&shared(City::new("2000", "Neuchâtel"))).unwrap();
        let kind = registry
            .types
            .create(&shared(RestaurantType::new("Pizzeria", "Pizzas au feu de bois")))
            .unwrap();
        let restaurant = registry
            .restaurants
            .create(&shared(Restaurant::new(
                "Da Mario",
                None,
                None,
                Localisation::new("Rue du Lac 1", city.clone()),
                kind.clone(),
            )))
            .unwrap();
        let criteria = registry
            .criteria
            .create(&shared(EvaluationCriteria::new("Service", "Accueil")))
            .unwrap();

        let like = registry
            .basic_evaluations
            .create(&shared(BasicEvaluation::new(testing::date(), &restaurant, true, "10.0.0.7")))
            .unwrap();
        let review = shared(CompleteEvaluation::new(testing::date(), &restaurant, "great", "bob"));
        CompleteEvaluation::add_grade(&review, &criteria, 4);
        let review = registry.complete_evaluations.create(&review).unwrap();

        let id = restaurant.read().id.unwrap();
        let found = registry.restaurants.find_by_id(id).unwrap().unwrap();
        {
            let r = found.read();
            assert_eq!(r.evaluations.len(), 2);
            assert!(r.evaluations.iter().any(|e| e.ptr_eq(&Evaluation::Basic(like.clone()))));
            assert!(r.evaluations.iter().any(|e| e.ptr_eq(&Evaluation::Complete(review.clone()))));
        }

        assert!(registry.restaurants.delete(&found).unwrap());
        assert_eq!(testing::count(&registry, "VILLES"), 1);
        assert_eq!(testing::count(&registry, "TYPES_GASTRONOMIQUES"), 1);
        assert_eq!(testing::count(&registry, "LIKES"), 0);
        assert_eq!(testing::count(&registry, "COMMENTAIRES"), 0);
        assert_eq!(testing::count(&registry, "NOTES"), 0);
        assert!(registry.cities.find_by_id(city.read().id.unwrap()).unwrap().is_some());
    }
}
