//! DTOs pushed into caches by other parts of the SDK.

use super::{NamedValueDto, VariantDescriptionDto};

// == Dto ==
/// A deserialized API payload of any kind.
///
/// Caches only merge the variants their payload type accepts through
/// [`Mergeable::from_dto`](crate::entity::Mergeable::from_dto).
#[derive(Debug, Clone, PartialEq)]
pub enum Dto {
    /// Named values (match statuses, void reasons, ...) for one locale
    NamedValueList(Vec<NamedValueDto>),
    /// The variant description list for one locale
    VariantDescriptionList(Vec<VariantDescriptionDto>),
    /// Any other kind, identified by name only
    Other { kind: String },
}

impl Dto {
    /// Returns a short name for logs.
    pub fn kind(&self) -> &str {
        match self {
            Dto::NamedValueList(_) => "named_value_list",
            Dto::VariantDescriptionList(_) => "variant_description_list",
            Dto::Other { kind } => kind,
        }
    }
}
