use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::authz::{Actor, DocumentRef};
use crate::domain::{
    Department, Designation, DocumentCategory, DocumentStatus, FunctionalRole, PolicyCategory,
    UnknownVariant,
};
use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role: String,
    pub profile_completed: bool,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub emergency_contact: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_branch: Option<String>,
    pub picture_key: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Profile {
    /// Builds the authorization subject. Unparseable department or designation
    /// columns are treated as absent, which only ever removes privileges.
    pub fn to_actor(&self) -> Actor {
        Actor {
            id: self.id,
            designation: self
                .designation
                .as_deref()
                .and_then(|raw| raw.parse::<Designation>().ok()),
            role: FunctionalRole::from_column(Some(&self.role)),
            department: self
                .department
                .as_deref()
                .and_then(|raw| raw.parse::<Department>().ok()),
        }
    }

    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role: String,
    pub profile_completed: bool,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub emergency_contact: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_branch: Option<String>,
}

impl NewProfile {
    /// Placeholder row for an identity that signed in before registering a profile.
    pub fn stub(id: Uuid, email: String) -> Self {
        Self {
            id,
            email,
            first_name: None,
            last_name: None,
            department: None,
            designation: None,
            role: FunctionalRole::Employee.as_str().to_string(),
            profile_completed: false,
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            emergency_contact: None,
            bank_name: None,
            bank_account_number: None,
            bank_branch: None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub department: String,
    pub file_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
    pub reviewer_id: Option<Uuid>,
    pub review_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
    pub approved_at: Option<NaiveDateTime>,
}

impl Document {
    pub fn status(&self) -> Result<DocumentStatus, UnknownVariant> {
        self.status.parse()
    }

    pub fn access_ref(&self) -> Result<DocumentRef, UnknownVariant> {
        Ok(DocumentRef {
            owner_id: self.uploaded_by,
            department: self.department.parse()?,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub department: String,
    pub file_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
}

impl NewDocument {
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: Uuid,
        owner: Uuid,
        title: String,
        description: Option<String>,
        category: DocumentCategory,
        department: Department,
        file_key: String,
        file: &crate::uploads::ValidatedFile,
    ) -> Self {
        Self {
            id,
            uploaded_by: owner,
            title,
            description,
            category: category.as_str().to_string(),
            department: department.as_str().to_string(),
            file_key,
            file_name: file.file_name.clone(),
            file_size: file.bytes.len() as i64,
            mime_type: file.mime_type.clone(),
            status: DocumentStatus::Pending.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = company_policies)]
pub struct CompanyPolicy {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub uploaded_by: Option<Uuid>,
    pub file_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: NaiveDateTime,
}

impl CompanyPolicy {
    pub fn category(&self) -> Result<PolicyCategory, UnknownVariant> {
        self.category.parse()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = company_policies)]
pub struct NewCompanyPolicy {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub uploaded_by: Option<Uuid>,
    pub file_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
}
