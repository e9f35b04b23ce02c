use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::database::models::{DetailedRequirement, FeeBreakdown, PdfRef, VisaType, VisaTypeQuery};
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::state::AppState;
use crate::types::{Role, VisaCategory};

/// Shown to non-subscribers when an entry has no public requirement list
pub const GENERIC_REQUIREMENTS: [&str; 6] = [
    "Valid passport with at least six months of remaining validity",
    "Completed and signed visa application form",
    "Two recent passport-size photographs",
    "Proof of travel arrangements (flight reservation or itinerary)",
    "Proof of accommodation for the duration of the stay",
    "Proof of sufficient financial means",
];

pub const UPGRADE_MESSAGE: &str =
    "Subscribe to see the complete requirement checklist, fees, processing times and official forms.";

/// What a non-subscriber may see about one visa type
#[derive(Debug, Clone, Serialize)]
pub struct PublicRequirements {
    pub visa_type_id: Uuid,
    pub country: String,
    pub country_code: String,
    pub name: String,
    pub category: VisaCategory,
    pub requirements: Vec<String>,
    /// True when `requirements` is the generic fallback list
    pub is_generic: bool,
    pub upgrade_message: &'static str,
}

/// Full entry for subscribers and admins
#[derive(Debug, Clone, Serialize)]
pub struct DetailedRequirements {
    pub visa_type_id: Uuid,
    pub country: String,
    pub country_code: String,
    pub name: String,
    pub category: VisaCategory,
    pub public_requirements: Vec<String>,
    pub detailed_requirements: Vec<DetailedRequirement>,
    pub fees: FeeBreakdown,
    pub processing_time: String,
    pub validity: String,
    pub max_stay: String,
    pub pdf_files: Vec<PdfRef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum RequirementsView {
    Public(PublicRequirements),
    Detailed(DetailedRequirements),
}

/// Listing row without any subscriber-tier field
#[derive(Debug, Clone, Serialize)]
pub struct VisaTypeSummary {
    pub id: Uuid,
    pub country: String,
    pub country_code: String,
    pub name: String,
    pub category: VisaCategory,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum VisaTypeListing {
    Public {
        visa_types: Vec<VisaTypeSummary>,
        upgrade_message: &'static str,
    },
    Detailed {
        visa_types: Vec<DetailedRequirements>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountrySummary {
    pub country: String,
    pub country_code: String,
    pub visa_type_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub country: String,
    pub country_code: String,
    /// category -> visa type names
    pub categories: BTreeMap<VisaCategory, Vec<String>>,
}

impl From<&VisaType> for VisaTypeSummary {
    fn from(entry: &VisaType) -> Self {
        Self {
            id: entry.id,
            country: entry.country.clone(),
            country_code: entry.country_code.clone(),
            name: entry.name.clone(),
            category: entry.category,
        }
    }
}

fn public_view(entry: &VisaType) -> PublicRequirements {
    let is_generic = entry.public_requirements.is_empty();
    let requirements = if is_generic {
        GENERIC_REQUIREMENTS.iter().map(|s| s.to_string()).collect()
    } else {
        entry.public_requirements.clone()
    };
    PublicRequirements {
        visa_type_id: entry.id,
        country: entry.country.clone(),
        country_code: entry.country_code.clone(),
        name: entry.name.clone(),
        category: entry.category,
        requirements,
        is_generic,
        upgrade_message: UPGRADE_MESSAGE,
    }
}

fn detailed_view(entry: &VisaType) -> DetailedRequirements {
    DetailedRequirements {
        visa_type_id: entry.id,
        country: entry.country.clone(),
        country_code: entry.country_code.clone(),
        name: entry.name.clone(),
        category: entry.category,
        public_requirements: entry.public_requirements.clone(),
        detailed_requirements: entry.detailed_requirements.clone(),
        fees: entry.fees.clone(),
        processing_time: entry.processing_time.clone(),
        validity: entry.validity.clone(),
        max_stay: entry.max_stay.clone(),
        pdf_files: entry.pdf_files.clone(),
    }
}

/// Pick the response tier for `role`
pub fn resolve_requirements(entry: &VisaType, role: Role) -> RequirementsView {
    match role {
        Role::NonSubscriber => RequirementsView::Public(public_view(entry)),
        Role::Subscriber | Role::Admin => RequirementsView::Detailed(detailed_view(entry)),
    }
}

pub async fn get_requirements(state: &AppState, id: Uuid, role: Role) -> Result<RequirementsView, ApiError> {
    let entry = state
        .store
        .find_visa_type(id)
        .await?
        .filter(|entry| entry.is_active)
        .ok_or_else(|| ApiError::not_found("Visa type not found"))?;
    Ok(resolve_requirements(&entry, role))
}

pub async fn list_countries(state: &AppState) -> Result<Vec<CountrySummary>, ApiError> {
    let entries = state.store.list_visa_types(&VisaTypeQuery::default()).await?;

    let mut countries: BTreeMap<String, CountrySummary> = BTreeMap::new();
    for entry in &entries {
        countries
            .entry(entry.country_code.clone())
            .or_insert_with(|| CountrySummary {
                country: entry.country.clone(),
                country_code: entry.country_code.clone(),
                visa_type_count: 0,
            })
            .visa_type_count += 1;
    }

    let mut list: Vec<CountrySummary> = countries.into_values().collect();
    list.sort_by(|a, b| a.country.cmp(&b.country));
    Ok(list)
}

pub async fn list_types(state: &AppState, country: &str, role: Role) -> Result<VisaTypeListing, ApiError> {
    let query = VisaTypeQuery {
        country: Some(country.to_string()),
        ..VisaTypeQuery::default()
    };
    let entries = state.store.list_visa_types(&query).await?;
    if entries.is_empty() {
        return Err(ApiError::not_found(format!("No visa types found for '{}'", country)));
    }

    Ok(match role {
        Role::NonSubscriber => VisaTypeListing::Public {
            visa_types: entries.iter().map(VisaTypeSummary::from).collect(),
            upgrade_message: UPGRADE_MESSAGE,
        },
        Role::Subscriber | Role::Admin => VisaTypeListing::Detailed {
            visa_types: entries.iter().map(detailed_view).collect(),
        },
    })
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SearchParams {
    #[validate(length(max = 100))]
    pub q: Option<String>,
    pub country: Option<String>,
    pub category: Option<VisaCategory>,
}

pub async fn search(state: &AppState, params: SearchParams) -> Result<Vec<VisaTypeSummary>, ApiError> {
    let query = VisaTypeQuery {
        country: params.country.filter(|c| !c.trim().is_empty()),
        category: params.category,
        text: params.q,
        include_inactive: false,
    };
    let entries = state.store.list_visa_types(&query).await?;
    Ok(entries.iter().map(VisaTypeSummary::from).collect())
}

pub async fn matrix(state: &AppState) -> Result<Vec<MatrixRow>, ApiError> {
    let entries = state.store.list_visa_types(&VisaTypeQuery::default()).await?;

    let mut rows: Vec<MatrixRow> = Vec::new();
    for entry in entries {
        let index = match rows.iter().position(|r| r.country_code == entry.country_code) {
            Some(index) => index,
            None => {
                rows.push(MatrixRow {
                    country: entry.country.clone(),
                    country_code: entry.country_code.clone(),
                    categories: BTreeMap::new(),
                });
                rows.len() - 1
            }
        };
        rows[index].categories.entry(entry.category).or_default().push(entry.name);
    }
    Ok(rows)
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_fee").with_message("Fees cannot be negative.".into()));
    }
    Ok(())
}

fn upper_alpha(code: &str) -> Result<(), ValidationError> {
    if !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new("country_code").with_message("Country code must be letters only.".into()));
    }
    Ok(())
}

fn no_blank_entries(items: &[String]) -> Result<(), ValidationError> {
    if items.iter().any(|item| item.trim().is_empty()) {
        return Err(ValidationError::new("blank_requirement").with_message("Requirements cannot be blank.".into()));
    }
    Ok(())
}

/// Fee components as submitted. The total is always derived.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FeeInput {
    #[validate(custom(function = "non_negative"))]
    pub consulate_fee: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub service_fee: Decimal,
    #[validate(length(equal = 3, message = "Currency must be a three-letter code."))]
    pub currency: String,
}

impl FeeInput {
    fn into_breakdown(self) -> FeeBreakdown {
        FeeBreakdown::new(self.consulate_fee, self.service_fee, self.currency.to_uppercase())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VisaTypeInput {
    #[validate(length(min = 2, max = 100))]
    pub country: String,
    #[validate(length(min = 2, max = 3), custom(function = "upper_alpha"))]
    pub country_code: String,
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    pub category: VisaCategory,
    #[serde(default)]
    #[validate(custom(function = "no_blank_entries"))]
    pub public_requirements: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub detailed_requirements: Vec<DetailedRequirement>,
    #[validate(nested)]
    pub fees: FeeInput,
    #[validate(length(min = 1, max = 100))]
    pub processing_time: String,
    #[validate(length(min = 1, max = 100))]
    pub validity: String,
    #[validate(length(min = 1, max = 100))]
    pub max_stay: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VisaTypeUpdate {
    #[validate(length(min = 2, max = 100))]
    pub country: Option<String>,
    #[validate(length(min = 2, max = 3), custom(function = "upper_alpha"))]
    pub country_code: Option<String>,
    #[validate(length(min = 2, max = 120))]
    pub name: Option<String>,
    pub category: Option<VisaCategory>,
    #[validate(custom(function = "no_blank_entries"))]
    pub public_requirements: Option<Vec<String>>,
    #[validate(nested)]
    pub detailed_requirements: Option<Vec<DetailedRequirement>>,
    #[validate(nested)]
    pub fees: Option<FeeInput>,
    #[validate(length(min = 1, max = 100))]
    pub processing_time: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub validity: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub max_stay: Option<String>,
    pub is_active: Option<bool>,
}

impl VisaTypeInput {
    pub fn into_visa_type(self, actor: Option<Uuid>) -> VisaType {
        let now = Utc::now();
        VisaType {
            id: Uuid::new_v4(),
            country: self.country.trim().to_string(),
            country_code: self.country_code.to_uppercase(),
            name: self.name.trim().to_string(),
            category: self.category,
            public_requirements: self.public_requirements,
            detailed_requirements: self.detailed_requirements,
            fees: self.fees.into_breakdown(),
            processing_time: self.processing_time,
            validity: self.validity,
            max_stay: self.max_stay,
            pdf_files: Vec::new(),
            is_active: self.is_active,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        }
    }
}

impl VisaTypeUpdate {
    fn apply(self, entry: &mut VisaType) {
        if let Some(v) = self.country {
            entry.country = v.trim().to_string();
        }
        if let Some(v) = self.country_code {
            entry.country_code = v.to_uppercase();
        }
        if let Some(v) = self.name {
            entry.name = v.trim().to_string();
        }
        if let Some(v) = self.category {
            entry.category = v;
        }
        if let Some(v) = self.public_requirements {
            entry.public_requirements = v;
        }
        if let Some(v) = self.detailed_requirements {
            entry.detailed_requirements = v;
        }
        if let Some(v) = self.fees {
            entry.fees = v.into_breakdown();
        }
        if let Some(v) = self.processing_time {
            entry.processing_time = v;
        }
        if let Some(v) = self.validity {
            entry.validity = v;
        }
        if let Some(v) = self.max_stay {
            entry.max_stay = v;
        }
        if let Some(v) = self.is_active {
            entry.is_active = v;
        }
    }
}

/// Admin listing, inactive entries included
pub async fn list_all(state: &AppState) -> Result<Vec<VisaType>, ApiError> {
    let query = VisaTypeQuery {
        include_inactive: true,
        ..VisaTypeQuery::default()
    };
    Ok(state.store.list_visa_types(&query).await?)
}

pub async fn create(state: &AppState, actor: &Identity, input: VisaTypeInput) -> Result<VisaType, ApiError> {
    let entry = state.store.insert_visa_type(input.into_visa_type(Some(actor.id()))).await?;
    info!(actor = %actor.id(), visa_type_id = %entry.id, country = %entry.country_code, "created visa type");
    Ok(entry)
}

pub async fn update(state: &AppState, actor: &Identity, id: Uuid, changes: VisaTypeUpdate) -> Result<VisaType, ApiError> {
    let mut entry = state
        .store
        .find_visa_type(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Visa type not found"))?;

    changes.apply(&mut entry);
    entry.updated_by = Some(actor.id());
    entry.updated_at = Utc::now();

    let entry = state.store.replace_visa_type(entry).await?;
    info!(actor = %actor.id(), visa_type_id = %entry.id, active = entry.is_active, "updated visa type");
    Ok(entry)
}
