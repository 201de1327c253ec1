//! Authorization decisions for every action the API exposes.
//!
//! Everything here is pure: callers build an [`Actor`] from the session and the
//! profile row, describe what they want to do as an [`Action`], and either get
//! `Ok(())` or an [`AccessDenied`] that must be surfaced before any database or
//! storage call is made. Anything not explicitly allowed is denied.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Department, Designation, FunctionalRole, PolicyCategory};

pub const MANAGER_POLICY_VIEW_SECS: u64 = 7200;
pub const SENSITIVE_POLICY_VIEW_SECS: u64 = 1800;
pub const DEFAULT_POLICY_VIEW_SECS: u64 = 3600;
pub const DOCUMENT_VIEW_SECS: u64 = 3600;
pub const DOWNLOAD_SECS: u64 = 600;

/// The caller of an operation. Seniority and functional role are independent
/// axes; an HR officer is both `Officer` and `Hr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub designation: Option<Designation>,
    pub role: FunctionalRole,
    pub department: Option<Department>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorClass {
    GeneralManager,
    Manager,
    Hr,
    Employee,
}

impl Actor {
    /// Dashboard classification. Permission checks use the predicates below,
    /// which look at both axes, rather than this single label.
    pub fn class(&self) -> ActorClass {
        match (self.designation, self.role) {
            (Some(Designation::GeneralManager), _) => ActorClass::GeneralManager,
            (Some(Designation::Manager), _) => ActorClass::Manager,
            (_, FunctionalRole::Hr) => ActorClass::Hr,
            _ => ActorClass::Employee,
        }
    }

    fn is_general_manager(&self) -> bool {
        self.designation == Some(Designation::GeneralManager)
    }

    fn is_manager_or_above(&self) -> bool {
        matches!(
            self.designation,
            Some(Designation::GeneralManager | Designation::Manager)
        )
    }

    fn is_hr(&self) -> bool {
        self.role == FunctionalRole::Hr
    }
}

/// The attributes of a personal document that decisions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRef {
    pub owner_id: Uuid,
    pub department: Department,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UploadDocument,
    ListOwnDocuments,
    ViewDocument(DocumentRef),
    DeleteDocument(DocumentRef),
    ReviewDocument(DocumentRef),
    OpenReviewDashboard,
    ListEmployees,
    DeleteEmployee { target_id: Uuid },
    ViewPolicy,
    ManagePolicies,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::UploadDocument => "upload document",
            Action::ListOwnDocuments => "list own documents",
            Action::ViewDocument(_) => "view document",
            Action::DeleteDocument(_) => "delete document",
            Action::ReviewDocument(_) => "review document",
            Action::OpenReviewDashboard => "open review dashboard",
            Action::ListEmployees => "list employees",
            Action::DeleteEmployee { .. } => "delete employee",
            Action::ViewPolicy => "view company policy",
            Action::ManagePolicies => "manage company policies",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not permitted to {action}")]
pub struct AccessDenied {
    pub action: &'static str,
}

pub fn is_reviewer(actor: &Actor) -> bool {
    actor.is_general_manager() || actor.is_hr()
}

pub fn can_manage_employees(actor: &Actor) -> bool {
    actor.is_manager_or_above()
}

pub fn can_manage_policies(actor: &Actor) -> bool {
    actor.is_manager_or_above()
}

/// HR reviews everything; a general manager reviews documents routed to their
/// own department. Managers have no review path.
pub fn can_review_document(actor: &Actor, doc: &DocumentRef) -> bool {
    if actor.is_hr() {
        return true;
    }
    actor.is_general_manager() && actor.department == Some(doc.department)
}

pub fn can_view_document(actor: &Actor, doc: &DocumentRef) -> bool {
    actor.id == doc.owner_id || can_review_document(actor, doc)
}

pub fn can_delete_document(actor: &Actor, doc: &DocumentRef) -> bool {
    actor.id == doc.owner_id || can_review_document(actor, doc)
}

pub fn can_delete_employee(actor: &Actor, target_id: Uuid) -> bool {
    can_manage_employees(actor) && actor.id != target_id
}

pub fn authorize(actor: &Actor, action: Action) -> Result<(), AccessDenied> {
    let allowed = match action {
        Action::UploadDocument | Action::ListOwnDocuments | Action::ViewPolicy => true,
        Action::ViewDocument(doc) => can_view_document(actor, &doc),
        Action::DeleteDocument(doc) => can_delete_document(actor, &doc),
        Action::ReviewDocument(doc) => can_review_document(actor, &doc),
        Action::OpenReviewDashboard => review_scope(actor).is_some(),
        Action::ListEmployees => can_manage_employees(actor),
        Action::DeleteEmployee { target_id } => can_delete_employee(actor, target_id),
        Action::ManagePolicies => can_manage_policies(actor),
    };

    if allowed {
        Ok(())
    } else {
        Err(AccessDenied {
            action: action.label(),
        })
    }
}

/// Which documents a reviewer's dashboard surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewScope {
    AllDepartments,
    Department(Department),
}

pub fn review_scope(actor: &Actor) -> Option<ReviewScope> {
    if actor.is_hr() {
        return Some(ReviewScope::AllDepartments);
    }
    match (actor.is_general_manager(), actor.department) {
        (true, Some(department)) => Some(ReviewScope::Department(department)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    View,
    Download,
}

/// Lifetime of a presigned URL over a company policy blob.
pub fn policy_grant_duration(actor: &Actor, category: PolicyCategory, kind: GrantKind) -> Duration {
    let secs = match kind {
        GrantKind::Download => DOWNLOAD_SECS,
        GrantKind::View if actor.is_manager_or_above() => MANAGER_POLICY_VIEW_SECS,
        GrantKind::View if category.is_sensitive() => SENSITIVE_POLICY_VIEW_SECS,
        GrantKind::View => DEFAULT_POLICY_VIEW_SECS,
    };
    Duration::from_secs(secs)
}

/// Personal documents use a flat preview window regardless of who asks.
pub fn document_grant_duration(kind: GrantKind) -> Duration {
    match kind {
        GrantKind::View => Duration::from_secs(DOCUMENT_VIEW_SECS),
        GrantKind::Download => Duration::from_secs(DOWNLOAD_SECS),
    }
}
