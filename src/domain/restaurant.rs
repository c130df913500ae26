//! Restaurant aggregate
//!
//! A restaurant references its city (through the embedded `Localisation`)
//! and its type, and owns every evaluation made about it.

use super::{Entity, Evaluation, Shared, City, RestaurantType};

/// Postal address of a restaurant. Not persisted on its own.
#[derive(Debug, Clone)]
pub struct Localisation {
    pub street: String,
    pub city: Shared<City>,
}

impl Localisation {
    pub fn new(street: impl Into<String>, city: Shared<City>) -> Self {
        Self {
            street: street.into(),
            city,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Restaurant {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub localisation: Localisation,
    pub restaurant_type: Shared<RestaurantType>,
    /// Owned evaluations; deleting the restaurant deletes all of them
    pub evaluations: Vec<Evaluation>,
}

impl Restaurant {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        website: Option<String>,
        localisation: Localisation,
        restaurant_type: Shared<RestaurantType>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description,
            website,
            localisation,
            restaurant_type,
            evaluations: Vec::new(),
        }
    }

    pub fn city(&self) -> &Shared<City> {
        &self.localisation.city
    }

    /// Number of positive basic evaluations
    pub fn likes(&self) -> usize {
        self.count_appreciations(true)
    }

    /// Number of negative basic evaluations
    pub fn dislikes(&self) -> usize {
        self.count_appreciations(false)
    }

    fn count_appreciations(&self, like: bool) -> usize {
        self.evaluations
            .iter()
            .filter_map(Evaluation::as_basic)
            .filter(|basic| basic.read().like == like)
            .count()
    }

    /// Add an evaluation unless this instance is already in the collection
    pub(crate) fn attach_evaluation(&mut self, evaluation: Evaluation) {
        if !self.evaluations.iter().any(|e| e.ptr_eq(&evaluation)) {
            self.evaluations.push(evaluation);
        }
    }

    /// Drop an evaluation from the in-memory collection
    pub(crate) fn remove_evaluation(&mut self, evaluation: &Evaluation) {
        self.evaluations.retain(|e| !e.ptr_eq(evaluation));
    }
}

impl Entity for Restaurant {
    const NAME: &'static str = "Restaurant";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.name = other.name.clone();
        self.description = other.description.clone();
        self.website = other.website.clone();
        self.localisation = other.localisation.clone();
        self.restaurant_type = other.restaurant_type.clone();
    }
}
