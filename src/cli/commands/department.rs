use anyhow::Result;

use super::{print_json, with_service};
use docket::{Department, DocketConfig};

pub struct AddDepartmentCommand {
    pub department: Department,
}

impl AddDepartmentCommand {
    pub fn new(id: String, name: String, code: String, inactive: bool) -> Self {
        let mut department = Department::new(id, name, code);
        department.is_active = !inactive;
        Self { department }
    }

    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            service.register_department(self.department.clone()).await?;
            print_json(&self.department)
        })
        .await
    }
}

pub struct ListDepartmentsCommand;

impl ListDepartmentsCommand {
    pub async fn execute(&self, database: Option<&str>, config: &DocketConfig) -> Result<()> {
        with_service(database, config, |service| async move {
            let departments = service.departments().await?;
            print_json(&departments)
        })
        .await
    }
}
