//! Mapper registry - one mapper per entity type, wired together

use std::sync::Arc;
use crate::storage::ConnectionProvider;
use super::{
    BasicEvaluationMapper, CityMapper, CompleteEvaluationMapper, CriteriaMapper, GradeMapper,
    Mapper, RestaurantMapper, RestaurantTypeMapper,
};

/// Single place where every mapper is created and looked up.
///
/// Each registry is its own session: two registries over the same database
/// share rows but never share in-memory instances.
pub struct MapperRegistry {
    db: Arc<ConnectionProvider>,
    pub cities: Arc<CityMapper>,
    pub types: Arc<RestaurantTypeMapper>,
    pub criteria: Arc<CriteriaMapper>,
    pub restaurants: Arc<RestaurantMapper>,
    pub basic_evaluations: Arc<BasicEvaluationMapper>,
    pub complete_evaluations: Arc<CompleteEvaluationMapper>,
    pub grades: Arc<GradeMapper>,
}

/// Number of cached instances per entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheSizes {
    pub cities: usize,
    pub types: usize,
    pub criteria: usize,
    pub restaurants: usize,
    pub basic_evaluations: usize,
    pub complete_evaluations: usize,
    pub grades: usize,
}

impl MapperRegistry {
    /// Build every mapper, then bind the references that run both ways
    pub fn new(db: Arc<ConnectionProvider>) -> Self {
        let cities = Arc::new(CityMapper::new(db.clone()));
        let types = Arc::new(RestaurantTypeMapper::new(db.clone()));
        let criteria = Arc::new(CriteriaMapper::new(db.clone()));
        let restaurants = Arc::new(RestaurantMapper::new(db.clone(), cities.clone(), types.clone()));
        let basic_evaluations = Arc::new(BasicEvaluationMapper::new(db.clone()));
        let complete_evaluations = Arc::new(CompleteEvaluationMapper::new(db.clone()));
        let grades = Arc::new(GradeMapper::new(db.clone(), criteria.clone()));

        restaurants.bind_evaluations(&basic_evaluations, &complete_evaluations, &grades);
        basic_evaluations.bind_restaurants(&restaurants);
        complete_evaluations.bind(&restaurants, &grades);
        grades.bind_evaluations(&complete_evaluations);
        criteria.bind_grades(&grades);

        tracing::debug!("Mapper registry ready on {}", db.location());
        Self {
            db,
            cities,
            types,
            criteria,
            restaurants,
            basic_evaluations,
            complete_evaluations,
            grades,
        }
    }

    /// The connection provider shared by every mapper
    pub fn db(&self) -> &Arc<ConnectionProvider> {
        &self.db
    }

    pub fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            cities: self.cities.identity_map().len(),
            types: self.types.identity_map().len(),
            criteria: self.criteria.identity_map().len(),
            restaurants: self.restaurants.identity_map().len(),
            basic_evaluations: self.basic_evaluations.identity_map().len(),
            complete_evaluations: self.complete_evaluations.identity_map().len(),
            grades: self.grades.identity_map().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use crate::domain::{shared, BasicEvaluation, City, Localisation, Restaurant, RestaurantType};
    use crate::mapper::testing;
    use crate::storage::PoolSettings;

    #[test]
    fn test_registry_is_wired() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let vote = shared(BasicEvaluation::new(testing::date(), &fixture.restaurant, true, "::1"));
        registry.basic_evaluations.create(&vote).unwrap();

        // Deleting through the restaurant mapper reaches the evaluation mapper
        assert!(registry.restaurants.delete(&fixture.restaurant).unwrap());
        assert_eq!(registry.cache_sizes().basic_evaluations, 0);
    }

    #[test]
    fn test_sessions_do_not_share_instances() {
        let fixture = testing::Fixture::new();
        let id = fixture.restaurant.read().id.unwrap();

        let session = testing::registry_reload(&fixture.registry);
        let loaded = session.restaurants.find_by_id(id).unwrap().unwrap();

        assert!(!Arc::ptr_eq(&loaded, &fixture.restaurant));
        assert_eq!(
            session.cache_sizes(),
            CacheSizes {
                cities: 1,
                types: 1,
                restaurants: 1,
                ..CacheSizes::default()
            }
        );
    }

    #[test]
    fn test_concurrent_sessions_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(ConnectionProvider::open(&dir.path().join("restodir.db"), &PoolSettings::default()).unwrap());
        let registry = Arc::new(MapperRegistry::new(db));
        let city = registry.cities.create(&shared(City::new("2000", "Neuchâtel"))).unwrap();
        let kind = registry.types.create(&shared(RestaurantType::new("Bistrot", ""))).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let registry = registry.clone();
                let city = city.clone();
                let kind = kind.clone();
                thread::spawn(move || {
                    let restaurant = shared(Restaurant::new(
                        format!("Bistrot {}", n),
                        None,
                        None,
                        Localisation::new("Rue du Seyon 1", city),
                        kind,
                    ));
                    let restaurant = registry.restaurants.create(&restaurant).unwrap();
                    for like in [true, false] {
                        let vote = BasicEvaluation::new(testing::date(), &restaurant, like, "10.0.0.1");
                        registry.basic_evaluations.create(&shared(vote)).unwrap();
                    }
                    restaurant.read().id.unwrap()
                })
            })
            .collect();

        let mut ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(city.read().restaurants.len(), 4);
        assert_eq!(testing::count(&registry, "LIKES"), 8);

        let session = testing::registry_reload(&registry);
        for id in ids {
            let restaurant = session.restaurants.find_by_id(id).unwrap().unwrap();
            assert_eq!(restaurant.read().likes(), 1);
            assert_eq!(restaurant.read().dislikes(), 1);
        }
    }
}
