use anyhow::{Context, Result};

use super::{print_json, with_service};
use docket::{CaseFilter, CaseId, CaseKind, CaseStatus, DocketConfig, Holder};

pub struct ShowCommand {
    pub case_id: CaseId,
    pub include_deleted: bool,
}

impl ShowCommand {
    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            let view = service.case_view(self.case_id, self.include_deleted).await?;
            print_json(&view)
        })
        .await
    }
}

pub struct HistoryCommand {
    pub case_id: CaseId,
}

impl HistoryCommand {
    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            print_json(&service.history_for(self.case_id).await?)
        })
        .await
    }
}

pub struct SignaturesCommand {
    pub case_id: CaseId,
}

impl SignaturesCommand {
    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            print_json(&service.signatures_for(self.case_id).await?)
        })
        .await
    }
}

pub struct ListCommand {
    pub filter: CaseFilter,
}

impl ListCommand {
    /// Build the filter from raw flags. A status is only meaningful within
    /// one kind's state set, so `--status` needs `--kind`.
    pub fn new(
        kind: Option<CaseKind>,
        status: Option<String>,
        holder: Option<String>,
        include_deleted: bool,
    ) -> Result<Self> {
        let status = match status {
            Some(name) => {
                let kind = kind.context("--status needs --kind")?;
                let parsed = CaseStatus::parse(kind, &name.to_ascii_uppercase())
                    .with_context(|| format!("{name} is not a {kind} status"))?;
                Some(parsed)
            }
            None => None,
        };
        let holder = match holder {
            Some(raw) => Some(Holder::decode(&raw).with_context(|| format!("unrecognised holder {raw}"))?),
            None => None,
        };

        Ok(Self {
            filter: CaseFilter {
                kind,
                status,
                holder,
                include_deleted,
            },
        })
    }

    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            print_json(&service.list_cases(&self.filter).await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket::RoutedStatus;

    #[test]
    fn test_list_filter_parses_status_within_kind() {
        let list = ListCommand::new(Some(CaseKind::Routed), Some("ongoing".into()), Some("dept:ACC".into()), false)
            .unwrap();
        assert_eq!(list.filter.status, Some(RoutedStatus::Ongoing.into()));
        assert_eq!(list.filter.holder, Some(Holder::department("ACC")));
    }

    #[test]
    fn test_status_without_kind_rejected() {
        assert!(ListCommand::new(None, Some("PENDING".into()), None, false).is_err());
        assert!(ListCommand::new(Some(CaseKind::Hierarchical), Some("ONGOING".into()), None, false).is_err());
    }
}
