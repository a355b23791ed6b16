//! Allocates the public path segments under which endpoint ports are served.
//!
//! All endpoints share one host, so a public id must be unique across tenants. Uniqueness is
//! not checked: ids are random tokens long enough that collisions are improbable, suffixed with
//! the tenant id.

use rand::{distributions::Alphanumeric, Rng};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicIdAllocator {
    length: usize,
}

// === impl PublicIdAllocator ===

impl PublicIdAllocator {
    pub const DEFAULT_LENGTH: usize = 16;

    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn allocate(&self, count: usize, tenant_id: &str) -> Vec<String> {
        let suffix = tenant_id.replace('-', "");
        (0..count)
            .map(|_| {
                let mut id = random_string(self.length).to_lowercase();
                id.push_str(&suffix);
                id
            })
            .collect()
    }
}

impl Default for PublicIdAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

/// Returns `len` random ASCII alphanumeric characters.
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn allocates_suffixed_ids() {
        let ids = PublicIdAllocator::new(12).allocate(3, "4f1a-b2-c3");
        assert_eq!(ids.len(), 3);
        for id in &ids {
            assert_eq!(id.len(), 12 + "4f1ab2c3".len());
            assert!(id.ends_with("4f1ab2c3"), "{id}");
            let token = &id[..12];
            assert!(token
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
    }

    #[test]
    fn allocates_nothing() {
        assert!(PublicIdAllocator::default().allocate(0, "u").is_empty());
    }

    #[test]
    fn random_strings() {
        let s = random_string(8);
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
