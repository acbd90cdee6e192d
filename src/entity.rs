//! Localized Entity Module
//!
//! Cached entities carrying one payload slot per locale and the set of
//! locales already merged into them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::locale::{missing_locales, Locale};
use crate::payload::Dto;

// == Mergeable ==
/// Capability of a fetched payload to be folded into a [`LocalizedEntity`].
///
/// Only payload types a cache understands implement this. DTO variants the
/// type does not accept in [`from_dto`](Mergeable::from_dto) are ignored.
pub trait Mergeable: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Identifier of the entity the payload belongs to
    type Id: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Per-locale content stored in the entity
    type Localized: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static;

    /// Returns the id of the entity this payload describes.
    fn id(&self) -> Self::Id;

    /// Converts the payload into the slot stored for its locale.
    fn into_localized(self) -> Self::Localized;

    /// Extracts payloads of this type from a pushed DTO.
    ///
    /// The default accepts nothing.
    fn from_dto(dto: &Dto) -> Option<Vec<Self>> {
        let _ = dto;
        None
    }
}

// == Localized Entity ==
/// A cached entity with per-locale payloads.
///
/// Invariant: every locale with a value is also in `fetched`. A locale may be
/// fetched without a value when upstream has nothing for this id.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedEntity<M: Mergeable> {
    id: M::Id,
    values: BTreeMap<Locale, M::Localized>,
    fetched: BTreeSet<Locale>,
}

impl<M: Mergeable> LocalizedEntity<M> {
    /// Creates an entity with nothing fetched.
    pub fn new(id: M::Id) -> Self {
        Self {
            id,
            values: BTreeMap::new(),
            fetched: BTreeSet::new(),
        }
    }

    /// Creates an entity seeded with one locale.
    pub fn seeded(id: M::Id, locale: Locale, value: M::Localized) -> Self {
        let mut entity = Self::new(id);
        entity.merge(locale, value);
        entity
    }

    /// Creates a placeholder whose locales are fetched but empty.
    pub fn shell<'a>(id: M::Id, locales: impl IntoIterator<Item = &'a Locale>) -> Self {
        let mut entity = Self::new(id);
        entity.mark_fetched(locales);
        entity
    }

    pub fn id(&self) -> &M::Id {
        &self.id
    }

    /// Returns the payload for a locale, if one was merged.
    pub fn get(&self, locale: &Locale) -> Option<&M::Localized> {
        self.values.get(locale)
    }

    pub fn values(&self) -> &BTreeMap<Locale, M::Localized> {
        &self.values
    }

    pub fn fetched_locales(&self) -> &BTreeSet<Locale> {
        &self.fetched
    }

    /// Returns true if every wanted locale was fetched.
    pub fn covers<'a>(&self, wanted: impl IntoIterator<Item = &'a Locale>) -> bool {
        wanted.into_iter().all(|locale| self.fetched.contains(locale))
    }

    /// Returns the wanted locales that were not fetched yet.
    pub fn missing<'a>(&self, wanted: impl IntoIterator<Item = &'a Locale>) -> BTreeSet<Locale> {
        missing_locales(wanted, &self.fetched)
    }

    /// Returns true when no locale carries a value.
    pub fn is_shell(&self) -> bool {
        self.values.is_empty()
    }

    // == Merge ==
    /// Overwrites the slot of `locale` and marks it fetched; other locales are untouched.
    pub fn merge(&mut self, locale: Locale, value: M::Localized) {
        self.fetched.insert(locale.clone());
        self.values.insert(locale, value);
    }

    /// Marks locales fetched without giving them a value.
    pub fn mark_fetched<'a>(&mut self, locales: impl IntoIterator<Item = &'a Locale>) {
        self.fetched.extend(locales.into_iter().cloned());
    }
}
