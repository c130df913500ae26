//! Cascading deletes
//!
//! Owners are removed only after everything that references them, in the
//! order the foreign keys demand:
//! 1. NOTES of the restaurant's comments
//! 2. COMMENTAIRES of the restaurant
//! 3. LIKES of the restaurant
//! 4. the RESTAURANTS row
//!
//! Every function runs on the caller's transaction and leaves the identity
//! maps alone. The returned [`CascadeReport`] lists what was removed, so the
//! caller can evict it once the transaction has committed.

use rusqlite::Connection;
use crate::Result;
use super::{
    BasicEvaluationMapper, CompleteEvaluationMapper, CriteriaMapper, GradeMapper, RestaurantMapper,
};

/// Keys removed by one cascade, per table
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CascadeReport {
    pub grades: Vec<i64>,
    pub complete_evaluations: Vec<i64>,
    pub basic_evaluations: Vec<i64>,
    pub restaurants: Vec<i64>,
    pub criteria: Vec<i64>,
}

impl CascadeReport {
    /// Total number of rows removed
    pub fn total(&self) -> usize {
        self.grades.len()
            + self.complete_evaluations.len()
            + self.basic_evaluations.len()
            + self.restaurants.len()
            + self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Mappers owning the rows below a restaurant
pub struct RestaurantDependents<'a> {
    pub grades: &'a GradeMapper,
    pub complete_evaluations: &'a CompleteEvaluationMapper,
    pub basic_evaluations: &'a BasicEvaluationMapper,
}

/// Remove a restaurant and everything it owns
pub fn delete_restaurant(
    conn: &Connection,
    restaurant_id: i64,
    dependents: &RestaurantDependents<'_>,
    restaurants: &RestaurantMapper,
) -> Result<CascadeReport> {
    let mut report = CascadeReport {
        grades: dependents.grades.delete_by_restaurant_with(conn, restaurant_id)?,
        complete_evaluations: dependents
            .complete_evaluations
            .delete_by_restaurant_with(conn, restaurant_id)?,
        basic_evaluations: dependents
            .basic_evaluations
            .delete_by_restaurant_with(conn, restaurant_id)?,
        ..CascadeReport::default()
    };

    if restaurants.delete_row_with(conn, restaurant_id)? > 0 {
        report.restaurants.push(restaurant_id);
    }

    tracing::debug!(
        "Cascade for restaurant #{}: {} grades, {} comments, {} likes",
        restaurant_id,
        report.grades.len(),
        report.complete_evaluations.len(),
        report.basic_evaluations.len()
    );
    Ok(report)
}

/// Remove a complete evaluation and its grades
pub fn delete_complete_evaluation(
    conn: &Connection,
    evaluation_id: i64,
    grades: &GradeMapper,
    evaluations: &CompleteEvaluationMapper,
) -> Result<CascadeReport> {
    let mut report = CascadeReport {
        grades: grades.delete_by_evaluation_with(conn, evaluation_id)?,
        ..CascadeReport::default()
    };

    if evaluations.delete_row_with(conn, evaluation_id)? > 0 {
        report.complete_evaluations.push(evaluation_id);
    }
    Ok(report)
}

/// Remove an evaluation criteria and every grade given on it
pub fn delete_criteria(
    conn: &Connection,
    criteria_id: i64,
    grades: &GradeMapper,
    criteria: &CriteriaMapper,
) -> Result<CascadeReport> {
    let mut report = CascadeReport {
        grades: grades.delete_by_criteria_with(conn, criteria_id)?,
        ..CascadeReport::default()
    };

    if criteria.delete_row_with(conn, criteria_id)? > 0 {
        report.criteria.push(criteria_id);
    }
    Ok(report)
}
