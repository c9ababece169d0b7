use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Value object: Correlation ID
///
/// Opaque caller-supplied identifier for one logical request. Uniqueness
/// among in-flight requests is the caller's responsibility; the registry
/// rejects a duplicate while the first is still running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Create a correlation id from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An id is well formed when it carries at least one non-whitespace character
    pub fn is_well_formed(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Value object: internal routing key
///
/// Allocated once per submission and carried through the platform callback,
/// so redelivered signals find their submission even when two requests
/// share a correlation id over time or carry none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingKey(pub Uuid);

impl RoutingKey {
    /// Allocate a fresh key
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a key carried back by a platform callback
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value object: opaque token handed back by the platform with a resolvable error
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionToken(pub String);

impl ResolutionToken {
    /// Create a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

/// A single eSIM provisioning request
///
/// Immutable once handed to the dispatcher, which shares it behind an `Arc`
/// with the adapter for the life of the request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    /// Activation address, usually of the form `LPA:1$...`
    #[serde(default)]
    pub address: String,

    /// Matching id for the SM-DP+ server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_id: Option<String>,

    /// Object identifier of the SM-DP+ server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    /// Confirmation code required by some carriers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_code: Option<String>,

    /// ICCID of the profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iccid: Option<String>,

    /// EID of the target eUICC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eid: Option<String>,

    /// Caller-supplied correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl ProvisioningRequest {
    /// Create a request for the given activation address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Attach a correlation id
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(CorrelationId(id.into()));
        self
    }

    /// Attach a matching id
    pub fn with_matching_id(mut self, matching_id: impl Into<String>) -> Self {
        self.matching_id = Some(matching_id.into());
        self
    }

    /// Attach a confirmation code
    pub fn with_confirmation_code(mut self, code: impl Into<String>) -> Self {
        self.confirmation_code = Some(code.into());
        self
    }

    /// Attach an ICCID
    pub fn with_iccid(mut self, iccid: impl Into<String>) -> Self {
        self.iccid = Some(iccid.into());
        self
    }

    /// Attach an EID
    pub fn with_eid(mut self, eid: impl Into<String>) -> Self {
        self.eid = Some(eid.into());
        self
    }

    /// Attach an OID
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    /// Whether the address carries anything besides whitespace
    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }
}
