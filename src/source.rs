//! Data Source Module
//!
//! The external collaborator that fetches one locale's payloads.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::locale::Locale;

// == Data Source ==
/// Fetches every payload available for a locale.
///
/// Implementations may fail with [`CacheError::Fetch`] when the remote party
/// is unreachable or [`CacheError::Deserialization`] when the payload is
/// malformed. The coordinator issues at most one call per missing locale.
#[async_trait]
pub trait DataSource<M>: Send + Sync {
    /// Name of the fetched resource, used in logs and errors.
    fn resource(&self) -> &str;

    async fn fetch(&self, locale: &Locale) -> Result<Vec<M>>;
}

// == File Data Source ==
/// Reads `{dir}/{resource}_{locale}.json`, a JSON array of payloads.
#[derive(Debug, Clone)]
pub struct FileDataSource<M> {
    dir: PathBuf,
    resource: String,
    _payload: PhantomData<fn() -> M>,
}

impl<M> FileDataSource<M> {
    pub fn new(dir: impl Into<PathBuf>, resource: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            resource: resource.into(),
            _payload: PhantomData,
        }
    }

    /// Path of the file holding `locale`.
    pub fn path_for(&self, locale: &Locale) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.resource, locale))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl<M> DataSource<M> for FileDataSource<M>
where
    M: DeserializeOwned + Send + 'static,
{
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn fetch(&self, locale: &Locale) -> Result<Vec<M>> {
        let path = self.path_for(locale);
        debug!(path = %path.display(), "reading payload file");

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| CacheError::Fetch {
                resource: self.resource.clone(),
                locale: locale.clone(),
                message: format!("{}: {}", path.display(), err),
            })?;

        serde_json::from_slice(&bytes).map_err(|err| CacheError::Deserialization {
            resource: self.resource.clone(),
            locale: locale.clone(),
            message: err.to_string(),
        })
    }
}
