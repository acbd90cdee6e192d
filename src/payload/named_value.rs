//! Named values: integer ids with a localized description.

use serde::{Deserialize, Serialize};

use super::Dto;
use crate::entity::Mergeable;

/// One named value as returned for a single locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValueDto {
    pub id: i64,
    #[serde(default)]
    pub description: String,
}

impl NamedValueDto {
    pub fn new(id: i64, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

impl Mergeable for NamedValueDto {
    type Id = i64;
    type Localized = String;

    fn id(&self) -> i64 {
        self.id
    }

    fn into_localized(self) -> String {
        self.description
    }

    fn from_dto(dto: &Dto) -> Option<Vec<Self>> {
        match dto {
            Dto::NamedValueList(items) => Some(items.clone()),
            _ => None,
        }
    }
}
