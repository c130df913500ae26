use serde::Serialize;
use super::Entity;

/// Criterion a complete evaluation grades (service, cuisine, setting, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationCriteria {
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
}

impl EvaluationCriteria {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Entity for EvaluationCriteria {
    const NAME: &'static str = "EvaluationCriteria";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.name = other.name.clone();
        self.description = other.description.clone();
    }
}
