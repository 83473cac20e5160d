//! Targeting filter for store-generated split APKs.
//!
//! The store produces one split per screen density and per language (plus
//! feature splits). Only the splits whose density or language is in the
//! configured [`TargetingSelection`] are forwarded downstream.

mod filter;
mod manifest;

use std::collections::HashSet;

pub use filter::*;
pub use manifest::*;

use crate::config::TargetingConfig;

/// Desired density aliases and language codes, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetingSelection {
    densities: HashSet<String>,
    languages: HashSet<String>,
}

impl TargetingSelection {
    pub fn new<D, L>(densities: D, languages: L) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            densities: densities.into_iter().map(Into::into).collect(),
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn densities(&self) -> &HashSet<String> {
        &self.densities
    }

    pub fn languages(&self) -> &HashSet<String> {
        &self.languages
    }
}

impl From<&TargetingConfig> for TargetingSelection {
    fn from(config: &TargetingConfig) -> Self {
        Self::new(config.densities.iter().cloned(), config.languages.iter().cloned())
    }
}
