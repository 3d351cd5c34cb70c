//! Deduplicated data-inconsistency warnings.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::session::SymTag;

/// Reports unhandled child kinds once per `(parent tag, child tag)` pair
///
/// Scoped to one registry: a fresh registry reports every pair again.
#[derive(Debug, Default)]
pub struct DiagnosticSink
{
    seen: Mutex<HashSet<(SymTag, SymTag)>>,
}

impl DiagnosticSink
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Note that a `child` record was found under a `parent` that has no
    /// bucket for it. Returns `true` the first time the pair is seen.
    pub fn unhandled_child(&self, parent: SymTag, child: SymTag, parent_name: &str) -> bool
    {
        let first = match self.seen.lock() {
            Ok(mut seen) => seen.insert((parent, child)),
            Err(poisoned) => poisoned.into_inner().insert((parent, child)),
        };
        if first {
            tracing::warn!(%parent, %child, parent_name, "skipping child of unhandled kind");
        }
        first
    }

    /// Number of distinct pairs reported so far.
    pub fn reported(&self) -> usize
    {
        match self.seen.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_each_pair_reported_once()
    {
        let sink = DiagnosticSink::new();
        assert!(sink.unhandled_child(SymTag::Udt, SymTag::Friend, "Widget"));
        assert!(!sink.unhandled_child(SymTag::Udt, SymTag::Friend, "Gadget"));
        assert!(sink.unhandled_child(SymTag::Udt, SymTag::Thunk, "Widget"));
        assert!(sink.unhandled_child(SymTag::Enum, SymTag::Friend, "Color"));
        assert_eq!(sink.reported(), 3);
    }
}
