//! Evaluation criteria mapper (table CRITERES_EVALUATION)

use std::sync::Arc;
use rusqlite::{params, Connection, OptionalExtension, Params};
use crate::domain::{EvaluationCriteria, Shared};
use crate::storage::{ConnectionProvider, KeyStrategy};
use crate::Result;
use super::{cascade, trace_failure, GradeMapper, IdentityMap, Late, Mapper};

const SELECT_CRITERIA: &str = "SELECT numero, nom, description FROM CRITERES_EVALUATION";
const KEYS: KeyStrategy = KeyStrategy::Sequence("SEQ_CRITERES_EVALUATION");

pub struct CriteriaMapper {
    db: Arc<ConnectionProvider>,
    cache: IdentityMap<EvaluationCriteria>,
    grades: Late<GradeMapper>,
}

impl CriteriaMapper {
    pub fn new(db: Arc<ConnectionProvider>) -> Self {
        Self {
            db,
            cache: IdentityMap::new(),
            grades: Late::new("Grade"),
        }
    }

    pub(crate) fn bind_grades(&self, grades: &Arc<GradeMapper>) {
        self.grades.bind(grades);
    }

    pub fn find_by_id_with(&self, conn: &Connection, id: i64) -> Result<Option<Shared<EvaluationCriteria>>> {
        if let Some(criteria) = self.cache.get(id) {
            return Ok(Some(criteria));
        }
        let criteria = conn
            .query_row(&format!("{} WHERE numero = ?1", SELECT_CRITERIA), [id], row_to_criteria)
            .optional()?;
        Ok(criteria.map(|c| self.cache.load(id, c)))
    }

    /// The criteria with this exact name (names are unique)
    pub fn find_by_name(&self, name: &str) -> Result<Option<Shared<EvaluationCriteria>>> {
        let conn = self.db.connection()?;
        let found = self.query(&conn, &format!("{} WHERE nom = ?1", SELECT_CRITERIA), [name])?;
        Ok(found.into_iter().next())
    }

    fn query<P: Params>(&self, conn: &Connection, sql: &str, params: P) -> Result<Vec<Shared<EvaluationCriteria>>> {
        let mut stmt = conn.prepare(sql)?;
        let criteria = stmt
            .query_map(params, row_to_criteria)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(criteria
            .into_iter()
            .filter_map(|c| c.id.map(|id| self.cache.load(id, c)))
            .collect())
    }

    /// Delete the criteria row itself; grades must already be gone
    pub(crate) fn delete_row_with(&self, conn: &Connection, id: i64) -> Result<usize> {
        Ok(conn.execute("DELETE FROM CRITERES_EVALUATION WHERE numero = ?1", [id])?)
    }
}

impl Mapper for CriteriaMapper {
    type Entity = EvaluationCriteria;

    fn find_by_id(&self, id: i64) -> Result<Option<Shared<EvaluationCriteria>>> {
        let conn = self.db.connection()?;
        self.find_by_id_with(&conn, id)
    }

    fn find_all(&self) -> Result<Vec<Shared<EvaluationCriteria>>> {
        let conn = self.db.connection()?;
        self.query(&conn, &format!("{} ORDER BY numero", SELECT_CRITERIA), [])
    }

    /// A name that already exists resolves to the existing criteria
    fn create(&self, entity: &Shared<EvaluationCriteria>) -> Result<Shared<EvaluationCriteria>> {
        let criteria = entity.read().clone();
        if criteria.id.is_some() {
            return Ok(entity.clone());
        }

        let result = self.db.in_transaction(|tx| {
            let allocated = KEYS.allocate(tx)?;
            tx.execute(
                "INSERT INTO CRITERES_EVALUATION (numero, nom, description) VALUES (?1, ?2, ?3)",
                params![allocated, criteria.name, criteria.description],
            )?;
            Ok(KEYS.resolve(tx, allocated))
        });

        match result {
            Ok(id) => {
                entity.write().id = Some(id);
                tracing::info!("Created evaluation criteria #{} ({})", id, criteria.name);
                Ok(self.cache.put(id, entity))
            }
            Err(err) if err.is_unique_violation() => {
                tracing::warn!("Evaluation criteria '{}' already exists, reusing it", criteria.name);
                match self.find_by_name(&criteria.name)? {
                    Some(existing) => Ok(existing),
                    None => Err(err),
                }
            }
            Err(err) => trace_failure("create", "EvaluationCriteria", None, Err(err)),
        }
    }

    fn update(&self, entity: &Shared<EvaluationCriteria>) -> Result<bool> {
        let criteria = entity.read().clone();
        let Some(id) = criteria.id else {
            return Ok(false);
        };

        let result = self.db.in_transaction(|tx| {
            Ok(tx.execute(
                "UPDATE CRITERES_EVALUATION SET nom = ?1, description = ?2 WHERE numero = ?3",
                params![criteria.name, criteria.description, id],
            )?)
        });

        if trace_failure("update", "EvaluationCriteria", Some(id), result)? == 0 {
            return Ok(false);
        }
        self.cache.put(id, entity);
        Ok(true)
    }

    /// Deletes every grade given on this criteria first
    fn delete_by_id(&self, id: i64) -> Result<bool> {
        let grades = self.grades.get()?;
        let result = self
            .db
            .in_transaction(|tx| cascade::delete_criteria(tx, id, &grades, self));

        let report = trace_failure("delete", "EvaluationCriteria", Some(id), result)?;
        grades.forget_all(&report.grades);
        self.cache.remove(id);
        Ok(!report.criteria.is_empty())
    }

    fn identity_map(&self) -> &IdentityMap<EvaluationCriteria> {
        &self.cache
    }
}

fn row_to_criteria(row: &rusqlite::Row) -> rusqlite::Result<EvaluationCriteria> {
    Ok(EvaluationCriteria {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{shared, CompleteEvaluation};
    use crate::mapper::testing;

    #[test]
    fn test_duplicate_name_returns_existing() {
        let registry = testing::registry();
        let service = registry
            .criteria
            .create(&shared(EvaluationCriteria::new("Service", "Accueil et service")))
            .unwrap();

        let resolved = registry
            .criteria
            .create(&shared(EvaluationCriteria::new("Service", "dup")))
            .unwrap();

        assert!(Arc::ptr_eq(&resolved, &service));
        assert_eq!(testing::count(&registry, "CRITERES_EVALUATION"), 1);
    }

    #[test]
    fn test_find_by_name() {
        let registry = testing::registry();
        registry.criteria.create(&shared(EvaluationCriteria::new("Cuisine", ""))).unwrap();
        assert!(registry.criteria.find_by_name("Cuisine").unwrap().is_some());
        assert!(registry.criteria.find_by_name("Ambiance").unwrap().is_none());
    }

    #[test]
    fn test_delete_cascades_to_grades() {
        let fixture = testing::Fixture::new();
        let registry = &fixture.registry;
        let service = registry.criteria.create(&shared(EvaluationCriteria::new("Service", ""))).unwrap();
        let cuisine = registry.criteria.create(&shared(EvaluationCriteria::new("Cuisine", ""))).unwrap();

        let review = shared(CompleteEvaluation::new(testing::date(), &fixture.restaurant, "ok", "bob"));
        CompleteEvaluation::add_grade(&review, &service, 3);
        CompleteEvaluation::add_grade(&review, &cuisine, 5);
        registry.complete_evaluations.create(&review).unwrap();
        assert_eq!(testing::count(registry, "NOTES"), 2);

        assert!(registry.criteria.delete(&service).unwrap());

        assert_eq!(testing::count(registry, "NOTES"), 1);
        assert_eq!(testing::count(registry, "CRITERES_EVALUATION"), 1);
        assert_eq!(registry.grades.identity_map().len(), 1);
        // The surviving grade is the only one left on the review
        let review = review.read();
        assert_eq!(review.grades.len(), 1);
        assert!(Arc::ptr_eq(&review.grades[0].read().criteria, &cuisine));
    }
}
