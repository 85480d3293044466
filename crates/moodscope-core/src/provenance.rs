use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Which acquisition or estimation tier produced a feature vector.
///
/// Variants are ordered from most to least trustworthy, so the maximum over
/// a collection is its weakest member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Provider features fetched with the primary credentials.
    ProviderReal,
    /// Provider features fetched with the alternate credentials.
    ProviderAltAuth,
    /// Estimated from metadata blended with folksonomy tags.
    AiEstimated,
    /// Estimated from metadata by the keyword rules alone.
    RuleEstimated,
}

/// Coarse grouping of [`Provenance`]: measured by the provider or estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceTier {
    Provider,
    Estimated,
}

/// Canonical names, matching the serialized form.
const PROVENANCE_NAMES: &[(Provenance, &str)] = &[
    (Provenance::ProviderReal, "provider-real"),
    (Provenance::ProviderAltAuth, "provider-alt-auth"),
    (Provenance::AiEstimated, "ai-estimated"),
    (Provenance::RuleEstimated, "rule-estimated"),
];

impl Provenance {
    #[must_use]
    pub const fn tier(self) -> ProvenanceTier {
        match self {
            Self::ProviderReal | Self::ProviderAltAuth => ProvenanceTier::Provider,
            Self::AiEstimated | Self::RuleEstimated => ProvenanceTier::Estimated,
        }
    }

    #[must_use]
    pub const fn is_estimated(self) -> bool {
        matches!(self.tier(), ProvenanceTier::Estimated)
    }

    pub fn as_str(self) -> &'static str {
        PROVENANCE_NAMES
            .iter()
            .find(|(p, _)| *p == self)
            .map_or("unknown", |(_, name)| name)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PROVENANCE_NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(p, _)| *p)
            .ok_or_else(|| Error::InvalidData(format!("unknown provenance: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(Provenance::ProviderReal.tier(), ProvenanceTier::Provider);
        assert_eq!(Provenance::ProviderAltAuth.tier(), ProvenanceTier::Provider);
        assert_eq!(Provenance::AiEstimated.tier(), ProvenanceTier::Estimated);
        assert!(Provenance::RuleEstimated.is_estimated());
        assert!(!Provenance::ProviderAltAuth.is_estimated());
    }

    #[test]
    fn test_ordering_puts_weakest_last() {
        let all = [
            Provenance::AiEstimated,
            Provenance::ProviderReal,
            Provenance::RuleEstimated,
        ];
        assert_eq!(all.iter().max(), Some(&Provenance::RuleEstimated));
        assert_eq!(all.iter().min(), Some(&Provenance::ProviderReal));
    }

    #[test]
    fn test_serde_names_match_display() {
        for &(p, name) in PROVENANCE_NAMES {
            assert_eq!(p.to_string(), name);
            assert_eq!(serde_json::to_string(&p).unwrap(), format!("\"{name}\""));
            assert_eq!(name.parse::<Provenance>().unwrap(), p);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("measured".parse::<Provenance>().is_err());
    }
}
