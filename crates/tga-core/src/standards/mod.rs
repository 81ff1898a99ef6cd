//! Versioned repository of technical standards.
//!
//! Loaded once per process from a [`StandardsSource`], then queried with a
//! pure applicability filter by region, building category and discipline.

pub mod dataset;
pub mod source;

use tracing::info;

use crate::domain::{BuildingCategory, Discipline, Region, StandardsError};

pub use dataset::{
    Applicability, CheckScope, Comparison, RuleCheck, StandardBody, StandardClause, StandardsSet,
};
pub use source::{EmbeddedStandards, FileStandards, StandardsSource};

/// Immutable, validated standards dataset.
#[derive(Debug, Clone)]
pub struct StandardsRepository {
    set: StandardsSet,
}

impl StandardsRepository {
    /// Fetch and validate a dataset.
    pub async fn load(source: &dyn StandardsSource) -> Result<Self, StandardsError> {
        let set = source.load().await?;
        let repo = Self::from_set(set)?;
        info!(
            event = "standards.loaded",
            source = %source.describe(),
            version = %repo.version(),
            clauses = repo.clauses().len(),
        );
        Ok(repo)
    }

    pub fn from_set(set: StandardsSet) -> Result<Self, StandardsError> {
        set.validate()?;
        Ok(Self { set })
    }

    pub fn version(&self) -> &str {
        &self.set.version
    }

    pub fn clauses(&self) -> &[StandardClause] {
        &self.set.clauses
    }

    pub fn clause(&self, id: &str) -> Option<&StandardClause> {
        self.set.clauses.iter().find(|c| c.id == id)
    }

    /// Clauses applicable to the combination, in dataset order. May be empty.
    pub fn applicable_standards(
        &self,
        region: Region,
        category: BuildingCategory,
        discipline: Discipline,
    ) -> Vec<StandardClause> {
        self.set
            .clauses
            .iter()
            .filter(|c| c.applicability.matches(region, category, discipline))
            .cloned()
            .collect()
    }

    /// Like [`applicable_standards`](Self::applicable_standards) but an empty
    /// result is `NoApplicableStandards`.
    pub fn lookup(
        &self,
        region: Region,
        category: BuildingCategory,
        discipline: Discipline,
    ) -> Result<Vec<StandardClause>, StandardsError> {
        let clauses = self.applicable_standards(region, category, discipline);
        if clauses.is_empty() {
            return Err(StandardsError::NoApplicableStandards {
                region: region.to_string(),
                category: category.to_string(),
                discipline,
            });
        }
        Ok(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn embedded() -> StandardsRepository {
        StandardsRepository::load(&EmbeddedStandards)
            .await
            .expect("embedded standards")
    }

    #[tokio::test]
    async fn test_germany_office_electrical() {
        let repo = embedded().await;
        let clauses =
            repo.applicable_standards(Region::Germany, BuildingCategory::Office, Discipline::Electrical);
        let ids: Vec<&str> = clauses.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"DIN 18015-1 §4.2"));
        assert!(ids.contains(&"DIN 18015-2 §5"));
        assert!(clauses
            .iter()
            .all(|c| c.applicability.disciplines.contains(&Discipline::Electrical)));
        assert!(!ids.iter().any(|id| id.starts_with("ISO")));
    }

    #[tokio::test]
    async fn test_category_filter() {
        let repo = embedded().await;
        let office =
            repo.applicable_standards(Region::Germany, BuildingCategory::Office, Discipline::Hydraulic);
        let residential = repo.applicable_standards(
            Region::Germany,
            BuildingCategory::Residential,
            Discipline::Hydraulic,
        );
        assert!(office.iter().any(|c| c.id == "ASR A4.1 §5.2"));
        assert!(!residential.iter().any(|c| c.id == "ASR A4.1 §5.2"));
    }

    #[tokio::test]
    async fn test_lookup_empty_is_error() {
        let repo = embedded().await;
        let err = repo
            .lookup(
                Region::International,
                BuildingCategory::Office,
                Discipline::Hydraulic,
            )
            .unwrap_err();
        assert!(matches!(err, StandardsError::NoApplicableStandards { .. }));
        assert!(err.to_string().contains("international"));
    }

    #[tokio::test]
    async fn test_every_combination_is_pure() {
        let repo = embedded().await;
        for region in Region::ALL {
            for discipline in Discipline::ALL {
                let a = repo.applicable_standards(region, BuildingCategory::Office, discipline);
                let b = repo.applicable_standards(region, BuildingCategory::Office, discipline);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_from_set_validates() {
        let set = StandardsSet {
            version: String::new(),
            clauses: Vec::new(),
        };
        assert!(matches!(
            StandardsRepository::from_set(set),
            Err(StandardsError::InvalidDataset(_))
        ));
    }
}
