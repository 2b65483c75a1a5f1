//! Typed job identifier.
//!
//! Jobs are keyed by the store's integer rowid. The newtype keeps raw
//! integers from being passed where a job id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Unique identifier for an encoding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    /// Wrap a raw store rowid.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Return the inner integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_i64() {
        let id = JobId::from(42);
        let back: i64 = id.into();
        assert_eq!(back, 42);
    }

    #[test]
    fn display_and_from_str() {
        let id = JobId::new(7);
        let s = id.to_string();
        let parsed: JobId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let id = JobId::new(99);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "99");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn invalid_from_str() {
        let result = JobId::from_str("not-a-number");
        assert!(result.is_err());
    }

    #[test]
    fn hash_map_usage() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(JobId::new(1), "a");
        assert_eq!(map.get(&JobId::new(1)), Some(&"a"));
    }
}
