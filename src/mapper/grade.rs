//! Grade mapper (table NOTES)

use std::sync::Arc;
use rusqlite::{params, Connection, OptionalExtension, Params};
use crate::domain::{persisted_id, CompleteEvaluation, EvaluationCriteria, Grade, Shared};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::{Error, Result};
use super::{
    delete_returning_keys, trace_failure, CompleteEvaluationMapper, CriteriaMapper, IdentityMap,
    Late, Mapper,
};

const SELECT_GRADE: &str = "SELECT numero, note, fk_comment, fk_crit FROM NOTES";
const KEYS: KeyStrategy = KeyStrategy::Sequence("SEQ_NOTES");

struct GradeRow {
    id: i64,
    score: i32,
    evaluation_id: i64,
    criteria_id: i64,
}

pub struct GradeMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<Grade>,
    criteria: Arc<CriteriaMapper>,
    evaluations: Late<CompleteEvaluationMapper>,
}

impl GradeMapper {
    pub fn new(db: Arc<ConnectionProvider>, criteria: Arc<CriteriaMapper>) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
            criteria,
            evaluations: Late::new("CompleteEvaluation"),
        }
    }

    pub(crate) fn bind_evaluations(&self, evaluations: &Arc<CompleteEvaluationMapper>) {
        self.evaluations.bind(evaluations);
    }

    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<Grade>>> {
        if let Some(grade) = self.cache.get(id) {
            return Ok(Some(grade));
        }
        let row = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_GRADE), [id], row_to_grade)
            .optional()?;
        match row {
            Some(row) => self.resolve(conn, row).map(Some),
            None => Ok(None),
        }
    }

    /// Grades of one complete evaluation, in insertion order
    pub fn find_by_evaluation(&self, evaluation: &Shared<CompleteEvaluation>) -> Result<Vec<Shared<Grade>>> {
        let evaluation_id = persisted_id(evaluation)?;
        let conn = self.db.connection()?;
        let canonical = self
            .evaluations
            .get()?
            .find_by_id_with(&conn, evaluation_id)?
            .ok_or(Error::NotPersisted("CompleteEvaluation"))?;
        self.find_by_evaluation_with(&conn, &canonical, evaluation_id)
    }

    /// Every grade given on a criteria, across all evaluations
    pub fn find_by_criteria(&self, criteria: &Shared<EvaluationCriteria>) -> Result<Vec<Shared<Grade>>> {
        let criteria_id = persisted_id(criteria)?;
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} WHERE fk_crit = ?1 ORDER BY numero", SELECT_GRADE), [criteria_id])
    }

    /// Load the grades of an evaluation that is being hydrated
    pub(crate) fn find_by_evaluation_with(
        &self,
        conn: &Connection,
        evaluation: &Shared<CompleteEvaluation>,
        evaluation_id: i64,
    ) -> Result<Vec<Shared<Grade>>> {
        let rows = {
            let mut stmt = conn.prepare(&format!("{} WHERE fk_comment = ?1 ORDER BY numero", SELECT_GRADE))?;
            stmt.query_map([evaluation_id], row_to_grade)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter()
            .map(|row| match self.cache.get(row.id) {
                Some(cached) => Ok(cached),
                None => self.build(conn, row, evaluation),
            })
            .collect()
    }

    fn query<P: Params>(&self, conn: &Connection, sql: &str, params: P) -> Result<Vec<Shared<Grade>>> {
        let rows = {
            let mut stmt = conn.prepare(sql)?;
            stmt.query_map(params, row_to_grade)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(|row| self.resolve(conn, row)).collect()
    }

    /// Resolve a grade loaded on its own through its evaluation
    fn resolve(&self, conn: &Connection, row: GradeRow) -> Result<Shared<Grade>> {
        if let Some(cached) = self.cache.get(row.id) {
            return Ok(cached);
        }
        let evaluation = self
            .evaluations
            .get()?
            .find_by_id_with(conn, row.evaluation_id)?
            .ok_or(Error::DanglingReference {
                entity: "Grade",
                id: row.id,
                target: "CompleteEvaluation",
                target_id: row.evaluation_id,
            })?;
        // Loading the evaluation normally loaded its grades too
        if let Some(cached) = self.cache.get(row.id) {
            return Ok(cached);
        }
        let grade = self.build(conn, row, &evaluation)?;
        evaluation.write().attach_grade(&grade);
        Ok(grade)
    }

    fn build(&self, conn: &Connection, row: GradeRow, evaluation: &Shared<CompleteEvaluation>) -> Result<Shared<Grade>> {
        let criteria = self
            .criteria
            .find_by_id_with(conn, row.criteria_id)?
            .ok_or(Error::DanglingReference {
                entity: "Grade",
                id: row.id,
                target: "EvaluationCriteria",
                target_id: row.criteria_id,
            })?;
        let mut grade = Grade::new(row.score, evaluation, &criteria);
        grade.id = Some(row.id);
        Ok(self.cache.load(row.id, grade))
    }

    /// Insert one NOTES row inside the caller's transaction
    pub(crate) fn insert_row_with(
        &self,
        conn: &Connection,
        score: i32,
        evaluation_id: i64,
        criteria_id: i64,
    ) -> Result<i64> {
        let allocated = KEYS.allocate(conn)?;
        conn.execute(
            "INSERT INTO NOTES (numero, note, fk_comment, fk_crit) VALUES (?1, ?2, ?3, ?4)",
            params![allocated, score, evaluation_id, criteria_id],
        )?;
        Ok(KEYS.resolve(conn, allocated))
    }

    /// Register a grade inserted by [`GradeMapper::insert_row_with`] once its
    /// transaction has committed
    pub(crate) fn cache_created(&self, id: i64, grade: &Shared<Grade>) -> Shared<Grade> {
        grade.write().id = Some(id);
        self.cache.put(id, grade)
    }

    pub(crate) fn delete_by_restaurant_with(&self, conn: &Connection, restaurant_id: i64) -> Result<Vec<i64>> {
        delete_returning_keys(
            conn,
            "DELETE FROM NOTES WHERE fk_comment IN (SELECT numero FROM COMMENTAIRES WHERE fk_rest = ?1) RETURNING numero",
            restaurant_id,
        )
    }

    pub(crate) fn delete_by_evaluation_with(&self, conn: &Connection, evaluation_id: i64) -> Result<Vec<i64>> {
        delete_returning_keys(conn, "DELETE FROM NOTES WHERE fk_comment = ?1 RETURNING numero", evaluation_id)
    }

    pub(crate) fn delete_by_criteria_with(&self, conn: &Connection, criteria_id: i64) -> Result<Vec<i64>> {
        delete_returning_keys(conn, "DELETE FROM NOTES WHERE fk_crit = ?1 RETURNING numero", criteria_id)
    }

    /// Evict a deleted grade and detach it from its evaluation
    pub(crate) fn forget(&self, id: i64) {
        if let Some(grade) = self.cache.remove(id) {
            let owner = grade.read().evaluation();
            if let Some(evaluation) = owner {
                evaluation.write().detach_grade(&grade);
            }
        }
    }

    /// Evict grades whose evaluation is no longer alive
    pub(crate) fn evict_orphans(&self) -> Vec<i64> {
        self.cache.evict_where(|g| g.evaluation().is_none())
    }

    pub(crate) fn forget_all(&self, ids: &[i64]) {
        for id in ids {
            self.forget(*id);
        }
    }
}

impl Mapper for GradeMapper {
    type Entity = Grade;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<Grade>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<Grade>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} ORDER BY numero", SELECT_GRADE), [])
    }

    /// Add a grade to an evaluation that is already persisted
    fn create(&self, entity: &Shared<Grade>) -> Result<Shared<Grade>> {
        let (id, score, evaluation, criteria) = {
            let g = entity.read();
            (g.id, g.score, g.evaluation(), g.criteria.clone())
        };
        if id.is_some() {
            return Ok(entity.clone());
        }
        let evaluation = trace_failure(
            "create",
            "Grade",
            None,
            evaluation.ok_or(Error::NotPersisted("CompleteEvaluation")),
        )?;
        let keys = persisted_id(&evaluation).and_then(|e| Ok((e, persisted_id(&criteria)?)));
        let (evaluation_id, criteria_id) = trace_failure("create", "Grade", None, keys)?;

        let result = self
            .db
            .in_transaction(|tx| self.insert_row_with(tx, score, evaluation_id, criteria_id));

        let id = trace_failure("create", "Grade", None, result)?;
        let cached = self.cache_created(id, entity);
        evaluation.write().attach_grade(&cached);
        tracing::debug!("Created grade #{} on evaluation #{}", id, evaluation_id);
        Ok(cached)
    }

    fn update(&self, entity: &Shared<Grade>) -> Result<bool> {
        let (id, score, evaluation, criteria) = {
            let g = entity.read();
            (g.id, g.score, g.evaluation(), g.criteria.clone())
        };
        let Some(id) = id else {
            return Ok(false);
        };
        let evaluation = trace_failure(
            "update",
            "Grade",
            Some(id),
            evaluation.ok_or(Error::NotPersisted("CompleteEvaluation")),
        )?;
        let keys = persisted_id(&evaluation).and_then(|e| Ok((e, persisted_id(&criteria)?)));
        let (evaluation_id, criteria_id) = trace_failure("update", "Grade", Some(id), keys)?;
        let previous_owner = self.cache.get(id).and_then(|g| g.read().evaluation());

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                "UPDATE NOTES SET note = ?1, fk_comment = ?2, fk_crit = ?3 WHERE numero = ?4",
                params![score, evaluation_id, criteria_id, id],
            )?)
        });

        if trace_failure("update", "Grade", Some(id), result)? == 0 {
            return Ok(false);
        }
        let cached = self.cache.put(id, entity);
        if let Some(previous) = previous_owner {
            if !Arc::ptr_eq(&previous, &evaluation) {
                previous.write().detach_grade(&cached);
            }
        }
        evaluation.write().attach_grade(&cached);
        Ok(true)
    }

    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = self
            .db
            .in_transaction(|tx| Ok(tx.execute("DELETE FROM NOTES WHERE numero = ?1", [id])?));

        let deleted = trace_failure("delete", "Grade", Some(id), result)?;
        self.forget(id);
        Ok(deleted > 0)
    }

    fn identity_map(&self) -> &IdentityMap<Grade> {
        &self.cache
    }
}

fn row_to_grade(row: &rusqlite::Row) -> rusqlite::Result<GradeRow> {
    Ok(GradeRow {
        id: row.get(0)?,
        score: row.get(1)?,
        evaluation_id: row.get(2)?,
        criteria_id: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared;
    use crate::mapper::testing;

    struct Reviewed {
        fixture: testing::Fixture,
        review: Shared<CompleteEvaluation>,
        service: Shared<EvaluationCriteria>,
        cuisine: Shared<EvaluationCriteria>,
    }

    fn reviewed() -> Reviewed {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let service = registry.criteria.create(&shared(EvaluationCriteria::new("Service", ""))).unwrap();
        let cuisine = registry.criteria.create(&shared(EvaluationCriteria::new("Cuisine", ""))).unwrap();
        let review = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "Très bon", "bob"));
        CompleteEvaluation::add_grade(&review, &service, 4);
        let review = registry.complete_evaluations.create(&review).unwrap();
        Reviewed {
            fixture,
            review,
            service,
            cuisine,
        }
    }

    #[test]
    fn test_grades_created_with_their_evaluation() {
        let r = reviewed();
        let grades = r.review.read().grades.clone();
        assert_eq!(grades.len(), 1);
        let id = grades[0].read().id.unwrap();

        let found = r.fixture.registry.grades.find_by_id(id).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &grades[0]));
    }

    #[test]
    fn test_create_attaches_to_evaluation() {
        let r = reviewed();
        let registry = &r.fixture.registry;
        let grade = shared(Grade::new(2, &r.review, &r.cuisine));

        let created = registry.grades.create(&grade).unwrap();

        assert!(Arc::ptr_eq(&created, &grade));
        assert_eq!(r.review.read().grades.len(), 2);
        assert_eq!(r.review.read().average_grade(), Some(3.0));
        assert_eq!(testing::count(registry, "NOTES"), 2);
    }

    #[test]
    fn test_create_on_unsaved_evaluation_fails() {
        let r = reviewed();
        let draft = shared(CompleteEvaluation::new(testing::date(), &r.fixture.restaurant, "draft", "eve"));
        let grade = shared(Grade::new(5, &draft, &r.service));

        let result = r.fixture.registry.grades.create(&grade);

        assert!(matches!(result, Err(Error::NotPersisted("CompleteEvaluation"))));
        assert_eq!(testing::count(&r.fixture.registry, "NOTES"), 1);
    }

    #[test]
    fn test_find_by_criteria_in_fresh_session() {
        let r = reviewed();
        let session = testing::registry_reload(&r.fixture.registry);
        let service = session.criteria.find_by_name("Service").unwrap().unwrap();

        let grades = session.grades.find_by_criteria(&service).unwrap();

        assert_eq!(grades.len(), 1);
        let grade = grades[0].read();
        assert_eq!(grade.score, 4);
        assert!(Arc::ptr_eq(&grade.criteria, &service));
        // The evaluation it belongs to lists this exact instance
        let evaluation = grade.evaluation().unwrap();
        assert!(Arc::ptr_eq(&evaluation.read().grades[0], &grades[0]));
    }

    #[test]
    fn test_find_by_evaluation() {
        let r = reviewed();
        let grades = r.fixture.registry.grades.find_by_evaluation(&r.review).unwrap();
        assert_eq!(grades.len(), 1);
        assert!(Arc::ptr_eq(&grades[0], &r.review.read().grades[0]));
    }

    #[test]
    fn test_update_and_delete() {
        let r = reviewed();
        let registry = &r.fixture.registry;
        let grade = r.review.read().grades[0].clone();
        let id = grade.read().id.unwrap();

        grade.write().score = 1;
        assert!(registry.grades.update(&grade).unwrap());
        let session = testing::registry_reload(registry);
        assert_eq!(session.grades.find_by_id(id).unwrap().unwrap().read().score, 1);

        assert!(registry.grades.delete_by_id(id).unwrap());
        assert!(r.review.read().grades.is_empty());
        assert!(!registry.grades.delete_by_id(id).unwrap());
    }
}
