//! SourceId - heartbeat source name
//!
//! Uses `Arc<str>` internally so evaluation reports and metric labels can
//! clone it freely.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of a monitored heartbeat source (`"velocity"`, `"ultrasonic"`, ...).
///
/// The set of names is fixed at configuration time; afterwards a name is only
/// ever cloned, compared, or used as a map key.
///
/// # Examples
/// ```
/// use contracts::SourceId;
///
/// let id: SourceId = "velocity".into();
/// assert_eq!(id, "velocity");
/// assert_eq!(id.to_string(), "velocity");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Create a new SourceId
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Underlying name
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0.to_string()
    }
}

impl PartialEq<str> for SourceId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SourceId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({:?})", &*self.0)
    }
}
