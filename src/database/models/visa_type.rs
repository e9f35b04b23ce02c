use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::types::{UnknownVariant, VisaCategory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DetailedRequirement {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    pub mandatory: bool,
}

/// Fee breakdown. The total is always derived from its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub consulate_fee: Decimal,
    pub service_fee: Decimal,
    pub total_fee: Decimal,
    pub currency: String,
}

impl FeeBreakdown {
    pub fn new(consulate_fee: Decimal, service_fee: Decimal, currency: impl Into<String>) -> Self {
        Self {
            consulate_fee,
            service_fee,
            total_fee: consulate_fee + service_fee,
            currency: currency.into(),
        }
    }
}

/// Reference to a requirement PDF stored by the upload handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfRef {
    pub file_name: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One catalog entry: a country / visa type / category combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisaType {
    pub id: Uuid,
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
    pub is_active: bool,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog lookup options
#[derive(Debug, Clone, Default)]
pub struct VisaTypeQuery {
    /// Country name or code, case-insensitive exact match
    pub country: Option<String>,
    pub category: Option<VisaCategory>,
    /// Free-text match on country, code, name or category
    pub text: Option<String>,
    pub include_inactive: bool,
}

impl VisaTypeQuery {
    pub fn matches(&self, entry: &VisaType) -> bool {
        if !self.include_inactive && !entry.is_active {
            return false;
        }
        if let Some(country) = &self.country {
            let country = country.trim();
            if !entry.country.eq_ignore_ascii_case(country)
                && !entry.country_code.eq_ignore_ascii_case(country)
            {
                return false;
            }
        }
        if let Some(category) = self.category {
            if entry.category != category {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.trim().to_lowercase();
            if !needle.is_empty() {
                let haystacks = [
                    entry.country.to_lowercase(),
                    entry.country_code.to_lowercase(),
                    entry.name.to_lowercase(),
                    entry.category.as_str().replace('_', " "),
                ];
                if !haystacks.iter().any(|h| h.contains(&needle)) {
                    return false;
                }
            }
        }
        true
    }
}

/// Row shape of the `visa_types` table
#[derive(Debug, Clone, FromRow)]
pub struct VisaTypeRow {
    pub id: Uuid,
    pub country: String,
    pub country_code: String,
    pub name: String,
    pub category: String,
    pub public_requirements: Json<Vec<String>>,
    pub detailed_requirements: Json<Vec<DetailedRequirement>>,
    pub fees: Json<FeeBreakdown>,
    pub processing_time: String,
    pub validity: String,
    pub max_stay: String,
    pub pdf_files: Json<Vec<PdfRef>>,
    pub is_active: bool,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<VisaTypeRow> for VisaType {
    type Error = UnknownVariant;

    fn try_from(row: VisaTypeRow) -> Result<Self, Self::Error> {
        Ok(VisaType {
            id: row.id,
            country: row.country,
            country_code: row.country_code,
            name: row.name,
            category: row.category.parse()?,
            public_requirements: row.public_requirements.0,
            detailed_requirements: row.detailed_requirements.0,
            fees: row.fees.0,
            processing_time: row.processing_time,
            validity: row.validity,
            max_stay: row.max_stay,
            pdf_files: row.pdf_files.0,
            is_active: row.is_active,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
