use crate::k8s::labels::{self, Map};
use std::fmt;

/// An equality-based label selector, rendered as `key=value,...` in key order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector(Map);

/// Scopes a listing of endpoints created by this backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub protocol: Option<String>,
    pub network: Option<String>,
    pub user_id: Option<String>,
}

// === impl Selector ===

impl Selector {
    pub fn with(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: &Map) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// === impl ListFilter ===

impl ListFilter {
    pub fn selector(&self) -> Selector {
        let mut selector = Selector::default().with(labels::CREATED_BY, labels::CREATED_BY_VALUE);
        for (key, value) in [
            (labels::PROTOCOL, &self.protocol),
            (labels::NETWORK, &self.network),
            (labels::USER_ID, &self.user_id),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                selector = selector.with(key, value);
            }
        }
        selector
    }
}
