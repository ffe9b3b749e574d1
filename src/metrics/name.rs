//! Metric identity.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Placeholder used for missing parts when parsing short names.
const DEFAULT_PART: &str = "o";

/// Domain used in registration handles when a name has no group.
const DEFAULT_DOMAIN: &str = "metron";

/// Immutable `(group, type, name)` identifier of a metric.
///
/// The flat `simple_name` is derived once at construction; it is the
/// registry key and the ordering used for reports.
#[derive(Debug, Clone, Serialize)]
pub struct MetricName {
    group: String,
    metric_type: String,
    name: String,
    simple_name: String,
}

impl MetricName {
    /// Create a name from its three parts. Empty parts are left out of the
    /// simple name.
    pub fn new(
        group: impl Into<String>,
        metric_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let group = group.into();
        let metric_type = metric_type.into();
        let name = name.into();
        let simple_name = join_parts(&group, &metric_type, &name);
        Self {
            group,
            metric_type,
            name,
            simple_name,
        }
    }

    /// Create a base name used to derive a family of names via [`with_name`](Self::with_name).
    pub fn base(group: impl Into<String>, metric_type: impl Into<String>) -> Self {
        Self::new(group, metric_type, "")
    }

    /// Parse a dotted name.
    ///
    /// The last segment is the name, the one before it the type and anything
    /// earlier the group: `org.test.Hello.rob` gives group `org.test`, type
    /// `Hello` and name `rob`. Missing group/type parts become `"o"`.
    pub fn parse(value: &str) -> Self {
        let parts: Vec<&str> = value.split('.').collect();
        match parts.len() {
            0 | 1 => Self::new(DEFAULT_PART, DEFAULT_PART, value),
            2 => Self::new(DEFAULT_PART, parts[0], parts[1]),
            n => Self::new(parts[..n - 2].join("."), parts[n - 2], parts[n - 1]),
        }
    }

    /// Same group and type with a different name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self::new(self.group.clone(), self.metric_type.clone(), name)
    }

    /// Same group and type with `.suffix` appended to the name.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let name = if self.name.is_empty() {
            suffix.to_string()
        } else {
            format!("{}.{}", self.name, suffix)
        };
        self.with_name(name)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn metric_type(&self) -> &str {
        &self.metric_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flat `group.type.name` form used as cache key and external identifier.
    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    /// Handle string for registration with an external management facility,
    /// in `domain:type=Type,name=name` form.
    pub fn registration_handle(&self) -> String {
        let domain = if self.group.is_empty() {
            DEFAULT_DOMAIN
        } else {
            self.group.as_str()
        };
        let mut handle = format!("{}:type={}", domain, self.metric_type);
        if !self.name.is_empty() {
            handle.push_str(",name=");
            handle.push_str(&self.name);
        }
        handle
    }
}

fn join_parts(group: &str, metric_type: &str, name: &str) -> String {
    [group, metric_type, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

impl PartialEq for MetricName {
    fn eq(&self, other: &Self) -> bool {
        self.simple_name == other.simple_name
    }
}

impl Eq for MetricName {}

impl std::hash::Hash for MetricName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.simple_name.hash(state);
    }
}

impl PartialOrd for MetricName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetricName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.simple_name.cmp(&other.simple_name)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name)
    }
}

impl From<&str> for MetricName {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
