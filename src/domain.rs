//! Closed vocabularies shared by profiles, documents and company policies.
//!
//! Every enum is stored as its wire spelling in a text column and parsed back
//! at the edge, so rows written by older builds with unknown values surface as
//! [`UnknownVariant`] instead of panicking.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Organizational unit. Documents carry their own department for routing,
    /// independent of the uploader's.
    Department, "department" {
        Systems => "systems",
        FinanceAccounts => "finance_accounts",
        HumanResources => "human_resources",
        Operations => "operations",
        SalesMarketing => "sales_marketing",
        SupplyChain => "supply_chain",
        LegalCompliance => "legal_compliance",
        Administration => "administration",
        CustomerService => "customer_service",
    }
}

wire_enum! {
    /// Seniority rank, declared from most to least senior.
    Designation, "designation" {
        GeneralManager => "general_manager",
        Manager => "manager",
        AssistantManager => "assistant_manager",
        DeputyManager => "deputy_manager",
        ManagementTrainee => "management_trainee",
        SrOfficer => "sr_officer",
        Officer => "officer",
    }
}

impl Designation {
    /// Higher is more senior.
    pub fn seniority(&self) -> u8 {
        match self {
            Designation::GeneralManager => 7,
            Designation::Manager => 6,
            Designation::AssistantManager => 5,
            Designation::DeputyManager => 4,
            Designation::ManagementTrainee => 3,
            Designation::SrOfficer => 2,
            Designation::Officer => 1,
        }
    }
}

impl PartialOrd for Designation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Designation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seniority().cmp(&other.seniority())
    }
}

wire_enum! {
    /// Functional capability held independently of seniority.
    FunctionalRole, "role" {
        Employee => "employee",
        Hr => "hr",
    }
}

impl Default for FunctionalRole {
    fn default() -> Self {
        FunctionalRole::Employee
    }
}

impl FunctionalRole {
    /// Missing or unrecognised role columns collapse to `Employee`.
    pub fn from_column(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

wire_enum! {
    DocumentCategory, "document category" {
        Educational => "Educational",
        Professional => "Professional",
        Medical => "Medical",
        Identity => "Identity",
        Financial => "Financial",
        Legal => "Legal",
        Training => "Training",
        Other => "Other",
    }
}

wire_enum! {
    PolicyCategory, "policy category" {
        Hr => "hr",
        It => "it",
        Finance => "finance",
        Operations => "operations",
        Compliance => "compliance",
        Legal => "legal",
        Safety => "safety",
        General => "general",
    }
}

impl PolicyCategory {
    /// Categories whose previews get the shortened grant window.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, PolicyCategory::Compliance | PolicyCategory::Legal)
    }
}

wire_enum! {
    DocumentStatus, "document status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Pending
    }
}
