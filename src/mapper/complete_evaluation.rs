//! Complete evaluation mapper (table COMMENTAIRES)
//!
//! A complete evaluation is always hydrated together with its grades, and
//! created together with them in one transaction.

use std::sync::Arc;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Params};
use crate::domain::{persisted_id, shared, CompleteEvaluation, Evaluation, Grade, Restaurant, Shared};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::{Error, Result};
use super::{
    cascade, delete_returning_keys, trace_failure, GradeMapper, IdentityMap, Late, Mapper,
    RestaurantMapper,
};

const SELECT_COMMENT: &str =
    "SELECT numero, date_eval, commentaire, nom_utilisateur, fk_rest FROM COMMENTAIRES";
const KEYS: KeyStrategy = KeyStrategy::Sequence("SEQ_COMMENTAIRES");

struct CommentRow {
    id: i64,
    visit_date: NaiveDate,
    comment: String,
    username: String,
    restaurant_id: i64,
}

/// A grade of a new evaluation, with the keys its row needs
struct PendingGrade {
    grade: Shared<Grade>,
    score: i32,
    criteria_id: i64,
}

pub struct CompleteEvaluationMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<CompleteEvaluation>,
    restaurants: Late<RestaurantMapper>,
    grades: Late<GradeMapper>,
}

impl CompleteEvaluationMapper {
    pub fn new(db: Arc<ConnectionProvider>) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
            restaurants: Late::new("Restaurant"),
            grades: Late::new("Grade"),
        }
    }

    pub(crate) fn bind(&self, restaurants: &Arc<RestaurantMapper>, grades: &Arc<GradeMapper>) {
        self.restaurants.bind(restaurants);
        self.grades.bind(grades);
    }

    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<CompleteEvaluation>>> {
        if let Some(evaluation) = self.cache.get(id) {
            return Ok(Some(evaluation));
        }
        let row = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_COMMENT), [id], row_to_comment)
            .optional()?;
        match row {
            Some(row) => self.resolve(conn, row).map(Some),
            None => Ok(None),
        }
    }

    pub fn find_by_restaurant(&self, restaurant: &Shared<Restaurant>) -> Result<Vec<Shared<CompleteEvaluation>>> {
        let restaurant_id = persisted_id(restaurant)?;
        let conn = self.db.connection()?;
        let canonical = self
            .restaurants
            .get()?
            .find_by_id_with(&conn, restaurant_id)?
            .ok_or(Error::NotPersisted("Restaurant"))?;
        self.find_by_restaurant_with(&conn, &canonical, restaurant_id)
    }

    /// Every review written by `username`, across restaurants
    pub fn find_by_username(&self, username: &str) -> Result<Vec<Shared<CompleteEvaluation>>> {
        let conn = self.db.connection()?;
        self.query(
            &conn,
            &format!("{} WHERE nom_utilisateur = ?1 ORDER BY numero", SELECT_COMMENT),
            [username],
        )
    }

    /// Load the reviews of a restaurant that is being hydrated
    pub(crate) fn find_by_restaurant_with(
        &self,
        conn: &Connection,
        restaurant: &Shared<Restaurant>,
        restaurant_id: i64,
    ) -> Result<Vec<Shared<CompleteEvaluation>>> {
        let rows = {
            let mut stmt = conn.prepare(&format!("{} WHERE fk_rest = ?1 ORDER BY numero", SELECT_COMMENT))?;
            stmt.query_map([restaurant_id], row_to_comment)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter()
            .map(|row| match self.cache.get(row.id) {
                Some(cached) => Ok(cached),
                None => self.build(conn, row, restaurant),
            })
            .collect()
    }

    fn query<P: Params>(&self, conn: &Connection, sql: &str, params: P) -> Result<Vec<Shared<CompleteEvaluation>>> {
        let rows = {
            let mut stmt = conn.prepare(sql)?;
            stmt.query_map(params, row_to_comment)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(|row| self.resolve(conn, row)).collect()
    }

    /// Resolve a review loaded on its own through its restaurant
    fn resolve(&self, conn: &Connection, row: CommentRow) -> Result<Shared<CompleteEvaluation>> {
        if let Some(cached) = self.cache.get(row.id) {
            return Ok(cached);
        }
        let restaurant = self
            .restaurants
            .get()?
            .find_by_id_with(conn, row.restaurant_id)?
            .ok_or(Error::DanglingReference {
                entity: "CompleteEvaluation",
                id: row.id,
                target: "Restaurant",
                target_id: row.restaurant_id,
            })?;
        if let Some(cached) = self.cache.get(row.id) {
            return Ok(cached);
        }
        let evaluation = self.build(conn, row, &restaurant)?;
        restaurant.write().attach_evaluation(Evaluation::Complete(evaluation.clone()));
        Ok(evaluation)
    }

    /// Build a review and its grades, then cache it
    fn build(
        &self,
        conn: &Connection,
        row: CommentRow,
        restaurant: &Shared<Restaurant>,
    ) -> Result<Shared<CompleteEvaluation>> {
        let id = row.id;
        let mut evaluation = CompleteEvaluation::new(row.visit_date, restaurant, row.comment, row.username);
        evaluation.id = Some(id);
        let handle = shared(evaluation);

        let grades = self.grades.get()?.find_by_evaluation_with(conn, &handle, id)?;
        handle.write().grades = grades;
        Ok(self.cache.load_shared(id, handle))
    }

    pub(crate) fn delete_by_restaurant_with(&self, conn: &Connection, restaurant_id: i64) -> Result<Vec<i64>> {
        delete_returning_keys(
            conn,
            "DELETE FROM COMMENTAIRES WHERE fk_rest = ?1 RETURNING numero",
            restaurant_id,
        )
    }

    /// Delete the comment row itself; its grades must already be gone
    pub(crate) fn delete_row_with(&self, conn: &Connection, id: i64) -> Result<usize> {
        Ok(conn.execute("DELETE FROM COMMENTAIRES WHERE numero = ?1", [id])?)
    }

    /// Evict a deleted review and detach it from its restaurant
    pub(crate) fn forget(&self, id: i64) {
        if let Some(evaluation) = self.cache.remove(id) {
            let owner = evaluation.read().restaurant();
            if let Some(restaurant) = owner {
                restaurant.write().remove_evaluation(&Evaluation::Complete(evaluation));
            }
        }
    }

    /// Evict reviews whose restaurant is no longer alive
    pub(crate) fn evict_orphans(&self) -> Vec<i64> {
        self.cache.evict_where(|e| e.restaurant().is_none())
    }

    pub(crate) fn forget_all(&self, ids: &[i64]) {
        for id in ids {
            self.forget(*id);
        }
    }
}

impl Mapper for CompleteEvaluationMapper {
    type Entity = CompleteEvaluation;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<CompleteEvaluation>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<CompleteEvaluation>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} ORDER BY numero", SELECT_COMMENT), [])
    }

    /// Inserts the review and all of its unsaved grades in one transaction
    fn create(&self, entity: &Shared<CompleteEvaluation>) -> Result<Shared<CompleteEvaluation>> {
        let snapshot = entity.read().clone();
        if snapshot.id.is_some() {
            return Ok(entity.clone());
        }
        let grades = self.grades.get()?;
        let restaurant = trace_failure(
            "create",
            "CompleteEvaluation",
            None,
            snapshot.restaurant().ok_or(Error::NotPersisted("Restaurant")),
        )?;
        let restaurant_id = trace_failure("create", "CompleteEvaluation", None, persisted_id(&restaurant))?;
        let pending = trace_failure("create", "CompleteEvaluation", None, pending_grades(&snapshot.grades))?;

        let result = self.db.in_transaction(|tx| {
            let allocated = KEYS.allocate(tx)?;
            tx.execute(
                r#"
                INSERT INTO COMMENTAIRES (numero, date_eval, commentaire, nom_utilisateur, fk_rest)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    allocated,
                    snapshot.visit_date,
                    snapshot.comment,
                    snapshot.username,
                    restaurant_id,
                ],
            )?;
            let id = KEYS.resolve(tx, allocated);
            let grade_ids = pending
                .iter()
                .map(|p| grades.insert_row_with(tx, p.score, id, p.criteria_id))
                .collect::<Result<Vec<_>>>()?;
            Ok((id, grade_ids))
        });

        let (id, grade_ids) = trace_failure("create", "CompleteEvaluation", None, result)?;
        entity.write().id = Some(id);
        let cached = self.cache.put(id, entity);
        for (p, grade_id) in pending.iter().zip(grade_ids) {
            grades.cache_created(grade_id, &p.grade);
        }
        restaurant.write().attach_evaluation(Evaluation::Complete(cached.clone()));
        tracing::info!(
            "Created review #{} by {} with {} grades",
            id,
            snapshot.username,
            pending.len()
        );
        Ok(cached)
    }

    /// Writes the comment row only; grades are updated through their mapper
    fn update(&self, entity: &Shared<CompleteEvaluation>) -> Result<bool> {
        let snapshot = entity.read().clone();
        let Some(id) = snapshot.id else {
            return Ok(false);
        };
        let restaurant = trace_failure(
            "update",
            "CompleteEvaluation",
            Some(id),
            snapshot.restaurant().ok_or(Error::NotPersisted("Restaurant")),
        )?;
        let restaurant_id = trace_failure("update", "CompleteEvaluation", Some(id), persisted_id(&restaurant))?;
        let previous_owner = self.cache.get(id).and_then(|e| e.read().restaurant());

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                r#"
                UPDATE COMMENTAIRES
                SET date_eval = ?1, commentaire = ?2, nom_utilisateur = ?3, fk_rest = ?4
                WHERE numero = ?5
                "#,
                params![
                    snapshot.visit_date,
                    snapshot.comment,
                    snapshot.username,
                    restaurant_id,
                    id,
                ],
            )?)
        });

        if trace_failure("update", "CompleteEvaluation", Some(id), result)? == 0 {
            return Ok(false);
        }
        let cached = Evaluation::Complete(self.cache.put(id, entity));
        if let Some(previous) = previous_owner {
            if !Arc::ptr_eq(&previous, &restaurant) {
                previous.write().remove_evaluation(&cached);
            }
        }
        restaurant.write().attach_evaluation(cached);
        Ok(true)
    }

    /// Deletes the grades first, then the review
    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let grades = self.grades.get()?;
        let result = self
            .db
            .in_transaction(|tx| cascade::delete_complete_evaluation(tx, id, &grades, self));

        let report = trace_failure("delete", "CompleteEvaluation", Some(id), result)?;
        grades.forget_all(&report.grades);
        self.forget(id);
        Ok(!report.complete_evaluations.is_empty())
    }

    fn identity_map(&self) -> &IdentityMap<CompleteEvaluation> {
        &self.cache
    }
}

/// Unsaved grades of a new review; every criteria must already be persisted
fn pending_grades(grades: &[Shared<Grade>]) -> Result<Vec<PendingGrade>> {
    grades
        .iter()
        .filter(|g| g.read().id.is_none())
        .map(|g| {
            let (score, criteria) = {
                let g = g.read();
                (g.score, g.criteria.clone())
            };
            Ok(PendingGrade {
                grade: g.clone(),
                score,
                criteria_id: persisted_id(&criteria)?,
            })
        })
        .collect()
}

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        visit_date: row.get(1)?,
        comment: row.get(2)?,
        username: row.get(3)?,
        restaurant_id: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvaluationCriteria;
    use crate::mapper::testing;

    fn criteria(fixture: &testing::Fixture, name: &str) -> Shared<EvaluationCriteria> {
        fixture
            .registry
            .criteria
            .create(&shared(EvaluationCriteria::new(name, "")))
            .unwrap()
    }

    fn review(fixture: &testing::Fixture, user: &str, scores: &[(&Shared<EvaluationCriteria>, i32)]) -> Shared<CompleteEvaluation> {
        let review = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "Très bon", user));
        for (c, score) in scores {
            CompleteEvaluation::add_grade(&review, c, *score);
        }
        fixture.registry.complete_evaluations.create(&review).unwrap()
    }

    #[test]
    fn test_create_stores_grades() {
        let fixture = testing::Fixture::new();
        let service = criteria(&fixture, "Service");
        let cuisine = criteria(&fixture, "Cuisine");

        let created = review(&fixture, "bob", &[(&service, 4), (&cuisine, 5)]);

        assert_eq!(created.read().id, Some(1));
        assert_eq!(testing::count(&fixture.registry, "NOTES"), 2);
        assert_eq!(fixture.registry.grades.identity_map().len(), 2);
        assert!(created.read().grades.iter().all(|g| g.read().id.is_some()));
        assert_eq!(fixture.restaurant.read().evaluations.len(), 1);
    }

    #[test]
    fn test_create_with_unsaved_criteria_rolls_back() {
        let fixture = testing::Fixture::new();
        let service = criteria(&fixture, "Service");
        let unsaved = shared(EvaluationCriteria::new("Ambiance", ""));
        let draft = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "hmm", "eve"));
        CompleteEvaluation::add_grade(&draft, &service, 3);
        CompleteEvaluation::add_grade(&draft, &unsaved, 2);

        let result = fixture.registry.complete_evaluations.create(&draft);

        assert!(matches!(result, Err(Error::NotPersisted("EvaluationCriteria"))));
        assert_eq!(draft.read().id, None);
        assert_eq!(testing::count(&fixture.registry, "COMMENTAIRES"), 0);
        assert_eq!(testing::count(&fixture.registry, "NOTES"), 0);
        assert!(fixture.restaurant.read().evaluations.is_empty());
    }

    #[test]
    fn test_grade_insert_failure_rolls_back_review() {
        let fixture = testing::Fixture::new();
        let service = criteria(&fixture, "Service");
        {
            let conn = fixture.registry.db().connection().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER block_notes BEFORE INSERT ON NOTES BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            )
            .unwrap();
        }
        let draft = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "hmm", "eve"));
        CompleteEvaluation::add_grade(&draft, &service, 3);

        assert!(fixture.registry.complete_evaluations.create(&draft).is_err());
        assert_eq!(testing::count(&fixture.registry, "COMMENTAIRES"), 0);
        assert!(fixture.registry.complete_evaluations.identity_map().is_empty());
        assert_eq!(draft.read().grades[0].read().id, None);
    }

    #[test]
    fn test_hydrated_with_grades_in_fresh_session() {
        let fixture = testing::Fixture::new();
        let service = criteria(&fixture, "Service");
        let cuisine = criteria(&fixture, "Cuisine");
        let id = review(&fixture, "bob", &[(&service, 4), (&cuisine, 2)]).read().id.unwrap();

        let session = testing::registry_reload(&fixture.registry);
        let loaded = session.complete_evaluations.find_by_id(id).unwrap().unwrap();

        let e = loaded.read();
        assert_eq!(e.username, "bob");
        assert_eq!(e.comment, "Très bon");
        assert_eq!(e.grades.len(), 2);
        assert_eq!(e.average_grade(), Some(3.0));
        for grade in &e.grades {
            assert!(Arc::ptr_eq(&grade.read().evaluation().unwrap(), &loaded));
        }
        let restaurant = e.restaurant().unwrap();
        assert_eq!(restaurant.read().evaluations.len(), 1);
    }

    #[test]
    fn test_find_by_username_and_restaurant() {
        let fixture = testing::Fixture::new();
        let service = criteria(&fixture, "Service");
        review(&fixture, "bob", &[(&service, 4)]);
        review(&fixture, "alice", &[(&service, 5)]);
        review(&fixture, "bob", &[]);

        let mapper = &fixture.registry.complete_evaluations;
        assert_eq!(mapper.find_by_username("bob").unwrap().len(), 2);
        assert_eq!(mapper.find_by_username("carol").unwrap().len(), 0);
        assert_eq!(mapper.find_by_restaurant(&fixture.restaurant).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_removes_grades() {
        let fixture = testing::Fixture::new();
        let service = criteria(&fixture, "Service");
        let created = review(&fixture, "bob", &[(&service, 4)]);

        assert!(fixture.registry.complete_evaluations.delete(&created).unwrap());

        assert_eq!(testing::count(&fixture.registry, "COMMENTAIRES"), 0);
        assert_eq!(testing::count(&fixture.registry, "NOTES"), 0);
        assert!(fixture.registry.grades.identity_map().is_empty());
        assert!(fixture.restaurant.read().evaluations.is_empty());
        assert!(!fixture.registry.complete_evaluations.delete(&created).unwrap());
    }

    #[test]
    fn test_update_comment() {
        let fixture = testing::Fixture::new();
        let created = review(&fixture, "bob", &[]);
        let id = created.read().id.unwrap();

        created.write().comment = "Moins bon qu'avant".to_string();
        assert!(fixture.registry.complete_evaluations.update(&created).unwrap());

        let session = testing::registry_reload(&fixture.registry);
        let stored = session.complete_evaluations.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.read().comment, "Moins bon qu'avant");
    }
}
