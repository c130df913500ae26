use std::collections::BTreeSet;
use serde::Serialize;
use super::Entity;

/// Gastronomic type of a restaurant (pizzeria, brasserie, ...).
///
/// The label is unique across all types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestaurantType {
    pub id: Option<i64>,
    pub label: String,
    pub description: String,
    /// Keys of the restaurants of this type (not owned)
    pub restaurants: BTreeSet<i64>,
}

impl RestaurantType {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            description: description.into(),
            restaurants: BTreeSet::new(),
        }
    }
}

impl Entity for RestaurantType {
    const NAME: &'static str = "RestaurantType";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.label = other.label.clone();
        self.description = other.description.clone();
    }
}
