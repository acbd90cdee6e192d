//! Variant descriptions: localized outcome lists plus producer mappings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::Dto;
use crate::entity::Mergeable;
use crate::error::ValidationError;
use crate::validation::Validator;

/// A selectable outcome of a variant market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Translation of one outcome to a producer's outcome id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMappingDto {
    pub outcome_id: String,
    pub product_outcome_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_outcome_name: Option<String>,
}

/// Mapping of the variant to a producer market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDto {
    pub product_id: u32,
    pub market_id: String,
    #[serde(default)]
    pub outcome_mappings: Vec<OutcomeMappingDto>,
}

/// A variant description as returned for a single locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDescriptionDto {
    pub id: String,
    #[serde(default)]
    pub outcomes: Vec<OutcomeDto>,
    #[serde(default)]
    pub mappings: Vec<MappingDto>,
}

/// The per-locale slot stored for a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantDescription {
    pub outcomes: Vec<OutcomeDto>,
    pub mappings: Vec<MappingDto>,
}

impl VariantDescription {
    /// Returns the localized name of an outcome.
    pub fn outcome_name(&self, outcome_id: &str) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.id == outcome_id)
            .map(|outcome| outcome.name.as_str())
    }
}

impl Mergeable for VariantDescriptionDto {
    type Id = String;
    type Localized = VariantDescription;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn into_localized(self) -> VariantDescription {
        VariantDescription {
            outcomes: self.outcomes,
            mappings: self.mappings,
        }
    }

    fn from_dto(dto: &Dto) -> Option<Vec<Self>> {
        match dto {
            Dto::VariantDescriptionList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

// == Mapping Validator ==
/// Rejects variants whose mappings are inconsistent with their outcomes.
///
/// A mapping must name a market, and every mapped outcome must be one of the
/// variant's outcomes. Outcome ids must be unique.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingValidator;

impl Validator<VariantDescriptionDto> for MappingValidator {
    fn validate(&self, payload: &VariantDescriptionDto) -> Result<(), ValidationError> {
        let mut outcome_ids = HashSet::with_capacity(payload.outcomes.len());
        for outcome in &payload.outcomes {
            if !outcome_ids.insert(outcome.id.as_str()) {
                return Err(ValidationError::new(
                    &payload.id,
                    format!("duplicate outcome '{}'", outcome.id),
                ));
            }
        }

        for mapping in &payload.mappings {
            if mapping.market_id.trim().is_empty() {
                return Err(ValidationError::new(
                    &payload.id,
                    format!("mapping for product {} has no market id", mapping.product_id),
                ));
            }
            if let Some(unknown) = mapping
                .outcome_mappings
                .iter()
                .find(|om| !outcome_ids.contains(om.outcome_id.as_str()))
            {
                return Err(ValidationError::new(
                    &payload.id,
                    format!(
                        "mapping to market '{}' references unknown outcome '{}'",
                        mapping.market_id, unknown.outcome_id
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(outcome_ids: &[&str], mapped: &[&str]) -> VariantDescriptionDto {
        VariantDescriptionDto {
            id: "sr:correct_score:max:6".to_string(),
            outcomes: outcome_ids
                .iter()
                .map(|id| OutcomeDto {
                    id: id.to_string(),
                    name: format!("name {}", id),
                })
                .collect(),
            mappings: vec![MappingDto {
                product_id: 3,
                market_id: "374".to_string(),
                outcome_mappings: mapped
                    .iter()
                    .map(|id| OutcomeMappingDto {
                        outcome_id: id.to_string(),
                        product_outcome_id: format!("p{}", id),
                        product_outcome_name: None,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_consistent_mapping_passes() {
        assert!(MappingValidator.validate(&variant(&["1", "2"], &["1", "2"])).is_ok());
    }

    #[test]
    fn test_unknown_outcome_rejected() {
        let err = MappingValidator
            .validate(&variant(&["1"], &["1", "9"]))
            .unwrap_err();
        assert!(err.reason.contains("unknown outcome '9'"));
    }

    #[test]
    fn test_duplicate_outcome_rejected() {
        assert!(MappingValidator.validate(&variant(&["1", "1"], &[])).is_err());
    }

    #[test]
    fn test_empty_market_id_rejected() {
        let mut payload = variant(&["1"], &["1"]);
        payload.mappings[0].market_id = " ".to_string();
        assert!(MappingValidator.validate(&payload).is_err());
    }

    #[test]
    fn test_outcome_name_lookup() {
        let description = variant(&["1", "2"], &[]).into_localized();
        assert_eq!(description.outcome_name("2"), Some("name 2"));
        assert_eq!(description.outcome_name("3"), None);
    }

    #[test]
    fn test_variant_deserialize_defaults() {
        let dto: VariantDescriptionDto = serde_json::from_str(r#"{"id": "v1"}"#).unwrap();
        assert!(dto.outcomes.is_empty());
        assert!(dto.mappings.is_empty());
    }
}
