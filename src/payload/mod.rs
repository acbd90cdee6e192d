//! Payload Module
//!
//! Payload kinds fetched from the Sports API and merged by the caches.

mod dto;
mod named_value;
mod variant;

pub use dto::Dto;
pub use named_value::NamedValueDto;
pub use variant::{
    MappingDto, MappingValidator, OutcomeDto, OutcomeMappingDto, VariantDescription,
    VariantDescriptionDto,
};
