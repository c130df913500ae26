//! Evaluations of a restaurant
//!
//! Two variants share a visit date and an owning restaurant:
//! - `BasicEvaluation`: a like/dislike vote tagged with the voter's IP
//! - `CompleteEvaluation`: a comment with one grade per criterion

use std::sync::{Arc, Weak};
use chrono::NaiveDate;
use parking_lot::RwLock;
use super::{shared, Entity, EvaluationCriteria, Restaurant, Shared};

/// Weak back-reference to an owner; the owner keeps the strong side
pub type Owner<T> = Weak<RwLock<T>>;

/// Any evaluation held in a restaurant's collection
#[derive(Debug, Clone)]
pub enum Evaluation {
    Basic(Shared<BasicEvaluation>),
    Complete(Shared<CompleteEvaluation>),
}

impl Evaluation {
    pub fn as_basic(&self) -> Option<&Shared<BasicEvaluation>> {
        match self {
            Evaluation::Basic(e) => Some(e),
            Evaluation::Complete(_) => None,
        }
    }

    pub fn as_complete(&self) -> Option<&Shared<CompleteEvaluation>> {
        match self {
            Evaluation::Complete(e) => Some(e),
            Evaluation::Basic(_) => None,
        }
    }

    /// Same variant and same live instance
    pub fn ptr_eq(&self, other: &Evaluation) -> bool {
        match (self, other) {
            (Evaluation::Basic(a), Evaluation::Basic(b)) => Arc::ptr_eq(a, b),
            (Evaluation::Complete(a), Evaluation::Complete(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Quick like/dislike vote
#[derive(Debug, Clone)]
pub struct BasicEvaluation {
    pub id: Option<i64>,
    pub visit_date: NaiveDate,
    pub restaurant: Owner<Restaurant>,
    pub like: bool,
    pub ip_address: String,
}

impl BasicEvaluation {
    pub fn new(
        visit_date: NaiveDate,
        restaurant: &Shared<Restaurant>,
        like: bool,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            visit_date,
            restaurant: Arc::downgrade(restaurant),
            like,
            ip_address: ip_address.into(),
        }
    }

    pub fn restaurant(&self) -> Option<Shared<Restaurant>> {
        self.restaurant.upgrade()
    }
}

impl Entity for BasicEvaluation {
    const NAME: &'static str = "BasicEvaluation";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.visit_date = other.visit_date;
        self.restaurant = other.restaurant.clone();
        self.like = other.like;
        self.ip_address = other.ip_address.clone();
    }
}

/// Detailed review: a comment plus one grade per evaluated criterion
#[derive(Debug, Clone)]
pub struct CompleteEvaluation {
    pub id: Option<i64>,
    pub visit_date: NaiveDate,
    pub restaurant: Owner<Restaurant>,
    pub comment: String,
    pub username: String,
    /// Owned grades; deleting the evaluation deletes all of them
    pub grades: Vec<Shared<Grade>>,
}

impl CompleteEvaluation {
    pub fn new(
        visit_date: NaiveDate,
        restaurant: &Shared<Restaurant>,
        comment: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            visit_date,
            restaurant: Arc::downgrade(restaurant),
            comment: comment.into(),
            username: username.into(),
            grades: Vec::new(),
        }
    }

    pub fn restaurant(&self) -> Option<Shared<Restaurant>> {
        self.restaurant.upgrade()
    }

    /// Attach a new, not yet persisted grade to `evaluation`.
    ///
    /// The grade is stored when the evaluation is created, or later through
    /// the grade mapper.
    pub fn add_grade(
        evaluation: &Shared<CompleteEvaluation>,
        criteria: &Shared<EvaluationCriteria>,
        score: i32,
    ) -> Shared<Grade> {
        let grade = shared(Grade::new(score, evaluation, criteria));
        evaluation.write().grades.push(grade.clone());
        grade
    }

    pub(crate) fn attach_grade(&mut self, grade: &Shared<Grade>) {
        if !self.grades.iter().any(|g| Arc::ptr_eq(g, grade)) {
            self.grades.push(grade.clone());
        }
    }

    pub(crate) fn detach_grade(&mut self, grade: &Shared<Grade>) {
        self.grades.retain(|g| !Arc::ptr_eq(g, grade));
    }

    /// Mean of all grade scores, `None` without grades
    pub fn average_grade(&self) -> Option<f64> {
        if self.grades.is_empty() {
            return None;
        }
        let total: i32 = self.grades.iter().map(|g| g.read().score).sum();
        Some(total as f64 / self.grades.len() as f64)
    }
}

impl Entity for CompleteEvaluation {
    const NAME: &'static str = "CompleteEvaluation";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.visit_date = other.visit_date;
        self.restaurant = other.restaurant.clone();
        self.comment = other.comment.clone();
        self.username = other.username.clone();
    }
}

/// Score given to one criterion inside a complete evaluation.
///
/// Scores are expected in 1..=5; the data layer does not enforce it.
#[derive(Debug, Clone)]
pub struct Grade {
    pub id: Option<i64>,
    pub score: i32,
    pub evaluation: Owner<CompleteEvaluation>,
    pub criteria: Shared<EvaluationCriteria>,
}

impl Grade {
    pub fn new(
        score: i32,
        evaluation: &Shared<CompleteEvaluation>,
        criteria: &Shared<EvaluationCriteria>,
    ) -> Self {
        Self {
            id: None,
            score,
            evaluation: Arc::downgrade(evaluation),
            criteria: criteria.clone(),
        }
    }

    pub fn evaluation(&self) -> Option<Shared<CompleteEvaluation>> {
        self.evaluation.upgrade()
    }
}

impl Entity for Grade {
    const NAME: &'static str = "Grade";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign(&mut self, other: &Self) {
        self.score = other.score;
        self.evaluation = other.evaluation.clone();
        self.criteria = other.criteria.clone();
    }
}
