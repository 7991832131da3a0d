use anyhow::Result;

use super::{print_json, with_service};
use docket::{
    Action, Actor, CaseId, CaseKind, CasePayload, CaseView, DepartmentId, DocketConfig, NewCase,
    TransitionResponse,
};

pub struct CreateCommand {
    pub actor: Actor,
    pub new_case: NewCase,
}

impl CreateCommand {
    pub fn new(
        actor: Actor,
        kind: CaseKind,
        subject: String,
        reference: Option<String>,
        target: Option<String>,
        escalate: bool,
    ) -> Self {
        let mut payload = CasePayload::new(subject);
        if let Some(reference) = reference {
            payload = payload.with_reference(reference);
        }
        Self {
            actor,
            new_case: NewCase {
                kind,
                target_department: target.map(DepartmentId),
                requires_escalation: escalate,
                payload,
            },
        }
    }

    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            let outcome = service.create_case(&self.actor, self.new_case.clone()).await?;
            print_json(&CaseView::from(&outcome.case))
        })
        .await
    }
}

pub struct TransitionCommand {
    pub case_id: CaseId,
    pub action: Action,
    pub actor: Actor,
    pub target: Option<DepartmentId>,
    pub remarks: Option<String>,
}

impl TransitionCommand {
    pub fn new(case_id: CaseId, action: Action, actor: Actor) -> Self {
        Self {
            case_id,
            action,
            actor,
            target: None,
            remarks: None,
        }
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target.map(DepartmentId);
        self
    }

    pub fn with_remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }

    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            let outcome = service
                .dispatch(
                    self.case_id,
                    self.action,
                    &self.actor,
                    self.target.as_ref(),
                    self.remarks.clone(),
                )
                .await?;
            print_json(&TransitionResponse::from(&outcome))
        })
        .await
    }
}
