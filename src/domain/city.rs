use std::collections::BTreeSet;
use serde::Serialize;
use super::Entity;

/// A city restaurants can be located in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct City {
    pub id: Option<i64>,
    pub zip_code: String,
    pub name: String,
    /// Keys of the restaurants known to be located here (not owned)
    pub restaurants: BTreeSet<i64>,
}

impl City {
    pub fn new(zip_code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            zip_code: zip_code.into(),
            name: name.into(),
            restaurants: BTreeSet::new(),
        }
    }
}

impl Entity for City {
    const NAME: &'static str = "City";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.zip_code = other.zip_code.clone();
        self.name = other.name.clone();
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.zip_code, self.name)
    }
}
