//! Seed entity vocabulary: the legal entity anchored by the configured BPNL
//! and its default enablement service stack.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// BpnlError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum BpnlError {
    #[error("business partner number (bpnl) is not configured")]
    Missing,

    #[error("business partner number (bpnl) is empty")]
    Empty,

    #[error("business partner number (bpnl) '{value}' is malformed: {reason}")]
    Malformed { value: String, reason: &'static str },
}

impl From<BpnlError> for InternalError {
    fn from(err: BpnlError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Model, err.to_string())
    }
}

///
/// Bpnl
///
/// Business partner number of a legal entity (BPNL); the business key of a
/// `LegalEntity`.
/// Surrounding whitespace is trimmed; anything else must be printable and
/// free of interior whitespace.
///

#[derive(
    Clone, Debug, Deref, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Bpnl(String);

impl Bpnl {
    pub fn parse(raw: &str) -> Result<Self, BpnlError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(BpnlError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(BpnlError::Malformed {
                value: value.to_string(),
                reason: "contains whitespace",
            });
        }
        if value.chars().any(char::is_control) {
            return Err(BpnlError::Malformed {
                value: value.escape_default().to_string(),
                reason: "contains control characters",
            });
        }

        Ok(Self(value.to_string()))
    }

    /// Parse an optional configured value; `None` is `BpnlError::Missing`.
    pub fn from_config(raw: Option<&str>) -> Result<Self, BpnlError> {
        raw.map_or(Err(BpnlError::Missing), Self::parse)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Bpnl {
    type Error = BpnlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Bpnl> for String {
    fn from(bpnl: Bpnl) -> Self {
        bpnl.0
    }
}

///
/// LegalEntityId
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct LegalEntityId(pub i64);

///
/// StackId
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct StackId(pub i64);

///
/// LegalEntity
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LegalEntity {
    pub id: LegalEntityId,
    pub bpnl: Bpnl,
}

///
/// EnablementServiceStack
///
/// A connector/registry stack owned by one legal entity. Names are unique
/// across all legal entities.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnablementServiceStack {
    pub id: StackId,
    pub name: String,
    pub legal_entity_id: LegalEntityId,
    pub connection_settings: Option<serde_json::Value>,
}

///
/// NewEnablementServiceStack
/// Insert payload; the store assigns the identity.
///

#[derive(Clone, Debug, PartialEq)]
pub struct NewEnablementServiceStack {
    pub name: String,
    pub legal_entity_id: LegalEntityId,
    pub connection_settings: Option<serde_json::Value>,
}

impl NewEnablementServiceStack {
    #[must_use]
    pub fn new(name: impl Into<String>, legal_entity_id: LegalEntityId) -> Self {
        Self {
            name: name.into(),
            legal_entity_id,
            connection_settings: None,
        }
    }

    #[must_use]
    pub(crate) fn into_stack(self, id: StackId) -> EnablementServiceStack {
        EnablementServiceStack {
            id,
            name: self.name,
            legal_entity_id: self.legal_entity_id,
            connection_settings: self.connection_settings,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let bpnl = Bpnl::parse("  BPNL000000000001\n").unwrap();

        assert_eq!(bpnl.as_str(), "BPNL000000000001");
    }

    #[test]
    fn parse_rejects_empty_and_blank_values() {
        assert_eq!(Bpnl::parse(""), Err(BpnlError::Empty));
        assert_eq!(Bpnl::parse("   \t"), Err(BpnlError::Empty));
    }

    #[test]
    fn parse_rejects_interior_whitespace() {
        let err = Bpnl::parse("BPNL 123").unwrap_err();

        assert!(matches!(
            err,
            BpnlError::Malformed {
                reason: "contains whitespace",
                ..
            }
        ));
    }

    #[test]
    fn parse_rejects_control_characters() {
        let err = Bpnl::parse("BPNL\u{7}123").unwrap_err();

        assert!(matches!(
            err,
            BpnlError::Malformed {
                reason: "contains control characters",
                ..
            }
        ));
    }

    #[test]
    fn from_config_reports_missing_key() {
        assert_eq!(Bpnl::from_config(None), Err(BpnlError::Missing));
        assert_eq!(
            Bpnl::from_config(Some("BPNL123")).unwrap().as_str(),
            "BPNL123"
        );
    }

    #[test]
    fn bpnl_deserialization_validates() {
        let ok: Bpnl = serde_json::from_str("\"BPNL123\"").unwrap();
        assert_eq!(ok.as_str(), "BPNL123");

        assert!(serde_json::from_str::<Bpnl>("\"\"").is_err());
    }

    #[test]
    fn new_stack_payload_starts_without_settings() {
        let payload = NewEnablementServiceStack::new("EDC/DTR Default", LegalEntityId(7));
        let stack = payload.into_stack(StackId(3));

        assert_eq!(stack.id, StackId(3));
        assert_eq!(stack.legal_entity_id, LegalEntityId(7));
        assert_eq!(stack.connection_settings, None);
    }
}
