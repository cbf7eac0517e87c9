//! Scoped suspension of secondary-index maintenance.

use crate::methods::Methods;

/// Disables indexing on a strategy for the lifetime of the guard.
///
/// Indexing is re-enabled on drop only if this guard disabled it; an inner
/// guard nested inside an outer one leaves the outer toggle in place.
///
/// Only a top-level write transaction touching a single collection may
/// disable indexing, and inside the guarded scope it must either only read
/// or only write. Reads of keys written under the guard do not see those
/// writes.
#[must_use = "dropping the guard re-enables indexing"]
pub struct IndexingDisabler<'a> {
    methods: Option<&'a dyn Methods>,
}

impl<'a> IndexingDisabler<'a> {
    /// Disables indexing on `methods` if `condition` holds.
    pub fn new(methods: &'a dyn Methods, condition: bool) -> Self {
        let methods = (condition && methods.disable_indexing()).then_some(methods);
        Self { methods }
    }

    /// Returns true if this guard disabled indexing and will re-enable it.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.methods.is_some()
    }
}

impl Drop for IndexingDisabler<'_> {
    fn drop(&mut self) {
        if let Some(methods) = self.methods.take() {
            methods.enable_indexing();
        }
    }
}

impl std::fmt::Debug for IndexingDisabler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingDisabler")
            .field("active", &self.is_active())
            .finish()
    }
}
