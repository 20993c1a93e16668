//! Token claims and their temporal validation.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried in a signed URL token
///
/// The subject is the origin URL; the codec treats it as an opaque string.
/// A token without `exp` never expires, one without `nbf` is valid at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (iss), also the key-store namespace
    #[serde(rename = "iss", default)]
    pub issuer: String,

    /// Subject (sub), the URL to relay
    #[serde(rename = "sub", default)]
    pub subject: String,

    /// Not before (nbf)
    #[serde(
        rename = "nbf",
        default,
        with = "numeric_date",
        skip_serializing_if = "numeric_date::is_unset"
    )]
    pub not_before: Option<DateTime<Utc>>,

    /// Expiration time (exp)
    #[serde(
        rename = "exp",
        default,
        with = "numeric_date",
        skip_serializing_if = "numeric_date::is_unset"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Claims {
    pub fn new(issuer: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            not_before: None,
            expires_at: None,
        }
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check `nbf` and `exp` against `now`, tolerating `leeway` of clock skew
    ///
    /// Timestamps are compared at whole-second resolution. A token is not yet
    /// valid when `nbf > now + leeway` and expired when `exp <= now - leeway`;
    /// both conditions are reported together.
    ///
    /// # Errors
    ///
    /// Returns the set of violated bounds when at least one is violated.
    pub fn validate_at(&self, now: DateTime<Utc>, leeway: Duration) -> Result<(), ValidityErrors> {
        let now = now.timestamp();
        let leeway = i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX);

        let errors = ValidityErrors {
            not_yet_valid: self
                .not_before
                .is_some_and(|nbf| nbf.timestamp() > now.saturating_add(leeway)),
            expired: self
                .expires_at
                .is_some_and(|exp| exp.timestamp() <= now.saturating_sub(leeway)),
        };

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Temporal bounds a token violated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityErrors {
    pub not_yet_valid: bool,
    pub expired: bool,
}

impl ValidityErrors {
    pub fn is_empty(&self) -> bool {
        !self.not_yet_valid && !self.expired
    }
}

impl fmt::Display for ValidityErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.not_yet_valid, self.expired) {
            (true, true) => f.write_str("token is not valid yet and has expired"),
            (true, false) => f.write_str("token is not valid yet"),
            (false, true) => f.write_str("token has expired"),
            (false, false) => f.write_str("token is within its validity window"),
        }
    }
}

/// JWT NumericDate (seconds since the epoch) where `0` means "absent"
mod numeric_date {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn is_unset(value: &Option<DateTime<Utc>>) -> bool {
        value.is_none_or(|at| at.timestamp() == 0)
    }

    pub(super) fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) if at.timestamp() != 0 => serializer.serialize_i64(at.timestamp()),
            _ => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(0) => Ok(None),
            Some(secs) => DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or_else(|| D::Error::custom("numeric date out of range")),
        }
    }
}
