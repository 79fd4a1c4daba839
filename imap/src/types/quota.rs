//! Quota types (RFC 2087).

/// Usage and limit for a single quota resource (e.g. `STORAGE`, `MESSAGE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaResource {
    /// Resource name, e.g. "STORAGE" or "MESSAGE".
    pub name: String,
    /// Current usage.
    pub usage: u64,
    /// Usage limit.
    pub limit: u64,
}

/// A quota root and the resources it tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Resources tracked under this root.
    pub resources: Vec<QuotaResource>,
}

impl Quota {
    /// Returns the named resource's usage/limit, if tracked.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&QuotaResource> {
        self.resources
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_lookup_is_case_insensitive() {
        let quota = Quota {
            root: String::new(),
            resources: vec![QuotaResource {
                name: "STORAGE".to_string(),
                usage: 100,
                limit: 1000,
            }],
        };
        assert!(quota.resource("storage").is_some());
        assert!(quota.resource("message").is_none());
    }
}
