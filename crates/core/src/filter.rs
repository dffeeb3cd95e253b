// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable key filtering.
//!
//! Deployments exclude internal metadata keys (e.g. `_sync:` prefixes)
//! without modifying the consumer core. Filtering applies to mutations and
//! deletions only; snapshot markers, stream ends, and seqno advances always
//! pass through.

/// Predicate over document keys.
///
/// `excludes` returning true drops the event before dispatch.
pub trait KeyFilter: Send + Sync + 'static {
    fn excludes(&self, key: &[u8]) -> bool;
}

/// Filter that excludes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl KeyFilter for AcceptAll {
    fn excludes(&self, _key: &[u8]) -> bool {
        false
    }
}

/// Excludes keys starting with any of the configured prefixes.
#[derive(Debug, Clone, Default)]
pub struct PrefixFilter {
    prefixes: Vec<Vec<u8>>,
}

impl PrefixFilter {
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        Self { prefixes: prefixes.into_iter().map(Into::into).collect() }
    }
}

impl KeyFilter for PrefixFilter {
    fn excludes(&self, key: &[u8]) -> bool {
        self.prefixes.iter().any(|p| key.starts_with(p))
    }
}

impl<F> KeyFilter for F
where
    F: Fn(&[u8]) -> bool + Send + Sync + 'static,
{
    fn excludes(&self, key: &[u8]) -> bool {
        self(key)
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
