//! Export and import of a whole campaign.
//!
//! An export is every top-level object of every standalone type in one
//! owner's scope. An import persists a bundle into a scope in a single unit
//! of work.

use std::sync::Arc;

use serde_json::Value;
use taleweaver_domain::object::document_obj_id;
use taleweaver_domain::registry::{describe_prefix, standalone_types};
use taleweaver_domain::{Document, OwnerId};
use taleweaver_shared::{ExportBundle, ImportSummary, EXPORT_FORMAT_VERSION};

use crate::infrastructure::ports::{ClockPort, ObjectRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Unsupported export format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

pub struct TransferUseCases {
    repo: Arc<dyn ObjectRepo>,
    clock: Arc<dyn ClockPort>,
}

impl TransferUseCases {
    pub fn new(repo: Arc<dyn ObjectRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { repo, clock }
    }

    pub async fn export(&self, owner: OwnerId) -> Result<ExportBundle, TransferError> {
        let mut bundle = ExportBundle::new(self.clock.now());
        for descriptor in standalone_types() {
            let documents = self.repo.list(descriptor.prefix, owner).await?;
            if documents.is_empty() {
                continue;
            }
            bundle.objects.insert(
                descriptor.prefix.to_string(),
                documents.into_iter().map(Value::Object).collect(),
            );
        }
        tracing::info!(owner = %owner, objects = bundle.object_count(), "Exported campaign");
        Ok(bundle)
    }

    pub async fn import(
        &self,
        bundle: ExportBundle,
        owner: OwnerId,
    ) -> Result<ImportSummary, TransferError> {
        if bundle.format_version != EXPORT_FORMAT_VERSION {
            return Err(TransferError::UnsupportedVersion {
                found: bundle.format_version,
                expected: EXPORT_FORMAT_VERSION,
            });
        }

        let mut documents = Vec::with_capacity(bundle.object_count());
        for (prefix, values) in bundle.objects {
            let descriptor =
                describe_prefix(&prefix).map_err(|e| TransferError::InvalidBundle(e.to_string()))?;
            for value in values {
                let Value::Object(doc) = value else {
                    return Err(TransferError::InvalidBundle(format!(
                        "{prefix} entries must be JSON objects"
                    )));
                };
                check_entry(&prefix, descriptor, &doc)?;
                documents.push(doc);
            }
        }

        if documents.is_empty() {
            return Ok(ImportSummary::default());
        }

        let outcomes = self.repo.import(documents, owner).await?;
        let created = outcomes.iter().filter(|o| o.created).count();
        let summary = ImportSummary {
            created,
            unchanged: outcomes.len() - created,
        };
        tracing::info!(
            owner = %owner,
            created = summary.created,
            unchanged = summary.unchanged,
            "Imported campaign"
        );
        Ok(summary)
    }
}

/// Each entry must sit under its own prefix and carry an assigned identifier.
fn check_entry(
    prefix: &str,
    descriptor: &taleweaver_domain::TypeDescriptor,
    doc: &Document,
) -> Result<(), TransferError> {
    let id = document_obj_id(doc, descriptor)
        .map_err(|e| TransferError::InvalidBundle(format!("under {prefix}: {e}")))?;
    if !id.is_assigned() {
        return Err(TransferError::InvalidBundle(format!("{prefix} entry has no assigned obj_id")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{MockObjectRepo, PersistOutcome};

    fn fixed_clock() -> Arc<dyn ClockPort> {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("date");
        Arc::new(FixedClock(now))
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn rule(numeric: u64) -> Document {
        doc(json!({
            "obj_id": {"prefix": "R", "numeric": numeric},
            "description": "d",
            "effect": "e",
            "components": []
        }))
    }

    #[tokio::test]
    async fn export_groups_non_empty_types_by_prefix() {
        let mut repo = MockObjectRepo::new();
        repo.expect_list().returning(|prefix, _| {
            Ok(if prefix == "R" {
                vec![rule(1), rule(2)]
            } else {
                Vec::new()
            })
        });

        let transfer = TransferUseCases::new(Arc::new(repo), fixed_clock());
        let bundle = transfer.export(OwnerId::SHARED).await.expect("export");

        assert_eq!(bundle.format_version, EXPORT_FORMAT_VERSION);
        assert_eq!(bundle.exported_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        assert_eq!(bundle.objects.keys().collect::<Vec<_>>(), ["R"]);
        assert_eq!(bundle.object_count(), 2);
    }

    #[tokio::test]
    async fn import_counts_created_and_unchanged() {
        let mut repo = MockObjectRepo::new();
        repo.expect_import()
            .withf(|docs, owner| docs.len() == 2 && owner.get() == 4)
            .times(1)
            .returning(|docs, _| {
                Ok(docs
                    .into_iter()
                    .enumerate()
                    .map(|(i, document)| PersistOutcome {
                        document,
                        created: i == 0,
                    })
                    .collect())
            });

        let mut bundle = ExportBundle::new(Utc::now());
        let rules = vec![Value::Object(rule(1)), Value::Object(rule(2))];
        bundle.objects.insert("R".to_string(), rules);

        let transfer = TransferUseCases::new(Arc::new(repo), fixed_clock());
        let owner = OwnerId::new(4).expect("owner");
        let summary = transfer.import(bundle, owner).await.expect("import");
        assert_eq!(
            summary,
            ImportSummary {
                created: 1,
                unchanged: 1
            }
        );
    }

    #[tokio::test]
    async fn import_rejects_other_format_versions() {
        let repo = MockObjectRepo::new();
        let mut bundle = ExportBundle::new(Utc::now());
        bundle.format_version = 99;

        let transfer = TransferUseCases::new(Arc::new(repo), fixed_clock());
        let result = transfer.import(bundle, OwnerId::SHARED).await;
        assert!(matches!(
            result,
            Err(TransferError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[tokio::test]
    async fn import_rejects_entries_filed_under_the_wrong_prefix() {
        let repo = MockObjectRepo::new();
        let mut bundle = ExportBundle::new(Utc::now());
        bundle
            .objects
            .insert("C".to_string(), vec![Value::Object(rule(1))]);

        let transfer = TransferUseCases::new(Arc::new(repo), fixed_clock());
        let result = transfer.import(bundle, OwnerId::SHARED).await;
        assert!(matches!(result, Err(TransferError::InvalidBundle(_))));
    }

    #[tokio::test]
    async fn import_rejects_draft_entries() {
        let repo = MockObjectRepo::new();
        let mut bundle = ExportBundle::new(Utc::now());
        bundle
            .objects
            .insert("R".to_string(), vec![Value::Object(rule(0))]);

        let transfer = TransferUseCases::new(Arc::new(repo), fixed_clock());
        let result = transfer.import(bundle, OwnerId::SHARED).await;
        assert!(matches!(result, Err(TransferError::InvalidBundle(_))));
    }
}
