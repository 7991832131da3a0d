use clap::{Args, Parser, Subcommand};
use docket::{Actor, DepartmentId, Role};

pub mod commands;

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "Document routing and hierarchical approval workflows")]
#[command(long_about = "Docket tracks documents as they move between departments and up a \
                       two-level executive hierarchy, with an immutable audit trail and a \
                       signature ledger. Start with 'docket init'.")]
pub struct Cli {
    /// Database URL, overriding the configured one
    #[arg(long, global = true, help = "SQLite URL, e.g. sqlite://./docket.db")]
    pub database: Option<String>,

    /// Explicit configuration file
    #[arg(long, global = true, help = "Read configuration from this TOML file")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identity the command acts as
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    /// Acting user id
    #[arg(long = "actor", help = "User id performing the action")]
    pub user_id: String,
    /// Acting user's role
    #[arg(long, default_value = "staff", help = "staff, administrator, dean or president")]
    pub role: Role,
    /// Acting user's department
    #[arg(long, help = "Department the acting user belongs to")]
    pub department: Option<String>,
}

impl ActorArgs {
    pub fn actor(&self) -> Actor {
        Actor::new(
            self.user_id.clone(),
            self.role,
            self.department.as_deref().map(DepartmentId::from),
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database, run migrations and seed configured departments
    Init {
        /// Also write a docket.toml with the effective configuration
        #[arg(long, help = "Write docket.toml in the current directory")]
        write_config: bool,
        /// Overwrite an existing docket.toml
        #[arg(long, help = "Overwrite an existing docket.toml")]
        force: bool,
    },
    /// Manage departments
    #[command(subcommand)]
    Department(DepartmentCommands),
    /// Open a new case
    Create {
        /// ROUTED or HIERARCHICAL
        #[arg(long, default_value = "routed")]
        kind: docket::CaseKind,
        /// Document subject
        #[arg(long)]
        subject: String,
        /// External reference number
        #[arg(long)]
        reference: Option<String>,
        /// Department that receives a routed case first
        #[arg(long = "to")]
        target: Option<String>,
        /// Routed case needs dean and president sign-off
        #[arg(long)]
        escalate: bool,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Apply an action to a case
    Transition {
        /// Case id
        case_id: docket::CaseId,
        /// receive, forward, release, review, escalate, endorse, complete,
        /// decline, delete, approve_level1, approve_level2 or reject
        action: docket::Action,
        /// Target department for forward and release
        #[arg(long = "to")]
        target: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Show a case with its derived flags
    Show {
        case_id: docket::CaseId,
        #[arg(long)]
        include_deleted: bool,
    },
    /// Audit history of a case
    History { case_id: docket::CaseId },
    /// Signatures recorded on a case
    Signatures { case_id: docket::CaseId },
    /// List cases
    List {
        #[arg(long)]
        kind: Option<docket::CaseKind>,
        /// Status name, e.g. ONGOING (requires --kind)
        #[arg(long)]
        status: Option<String>,
        /// Holder, e.g. dept:ACC or LEVEL1
        #[arg(long)]
        holder: Option<String>,
        #[arg(long)]
        include_deleted: bool,
    },
}

#[derive(Subcommand)]
pub enum DepartmentCommands {
    /// Add or update a department
    Add {
        id: String,
        name: String,
        code: String,
        #[arg(long)]
        inactive: bool,
    },
    /// List departments
    List,
}
