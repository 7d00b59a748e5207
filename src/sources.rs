//! Source site registry and composite source identifiers.
//!
//! Design-set sources are addressed by names of the form
//! `tla_<provider>_<license>_<slug>`. The registry maps such names to the
//! site they are fetched from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Prefix marking names that this service resolves itself.
pub const SOURCE_PREFIX: &str = "tla_";

/// Name of the built-in system source site.
pub const SYSTEM_SITE_NAME: &str = "tla_abcde_abcde_abcdefghijklmnopq_melati";

/// A design-set source site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceSite {
    pub label: String,
    pub url: String,
    #[serde(default, rename = "accesskey")]
    pub access_key: String,
    #[serde(default)]
    pub system: bool,
}

/// Registry of source sites keyed by site name.
#[derive(Debug, Clone, Default)]
pub struct SourceSites {
    sites: BTreeMap<String, SourceSite>,
}

impl SourceSites {
    /// Builds the registry from the built-in defaults merged with `configured`.
    ///
    /// Configured entries are applied last, so a configured site with a
    /// default's name replaces it.
    pub fn with_defaults(configured: &BTreeMap<String, SourceSite>) -> Self {
        let mut sites = BTreeMap::new();
        sites.insert(
            SYSTEM_SITE_NAME.to_string(),
            SourceSite {
                label: "Melati [de.test]".to_string(),
                url: "https://thelostasura.com".to_string(),
                access_key: String::new(),
                system: true,
            },
        );
        sites.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { sites }
    }

    pub fn get(&self, name: &str) -> Option<&SourceSite> {
        self.sites.get(name)
    }
}

/// Errors produced while parsing a composite source identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("source identifier must start with 'tla_'")]
    MissingPrefix,
    #[error("source identifier '{0}' must have provider, license and slug parts")]
    Malformed(String),
}

/// Parsed `tla_<provider>_<license>_<slug>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceIdentifier {
    pub provider: String,
    pub license: String,
    /// Everything after the license part, underscores included.
    pub slug: String,
}

impl SourceIdentifier {
    pub fn parse(name: &str) -> Result<Self, IdentifierError> {
        let rest = name
            .strip_prefix(SOURCE_PREFIX)
            .ok_or(IdentifierError::MissingPrefix)?;

        let mut parts = rest.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(provider), Some(license), Some(slug))
                if !provider.is_empty() && !license.is_empty() && !slug.is_empty() =>
            {
                Ok(Self {
                    provider: provider.to_string(),
                    license: license.to_string(),
                    slug: slug.to_string(),
                })
            }
            _ => Err(IdentifierError::Malformed(name.to_string())),
        }
    }
}
