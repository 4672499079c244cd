use crate::ObjectId;
use athenz_policy_controller_k8s_api::ResourceExt;
use std::collections::BTreeMap;

/// The live objects of one kind, as listed at the start of a reconciliation pass.
///
/// Entries are marked as processed when a desired object claims them; whatever remains
/// unprocessed at the end of the pass is a deletion candidate. The index is rebuilt every pass.
#[derive(Debug)]
pub struct LiveIndex<T> {
    entries: BTreeMap<ObjectId, Entry<T>>,
}

#[derive(Debug)]
struct Entry<T> {
    object: T,
    processed: bool,
}

// === impl LiveIndex ===

impl<T: ResourceExt> LiveIndex<T> {
    pub fn new(objects: impl IntoIterator<Item = T>) -> Self {
        let entries = objects
            .into_iter()
            .map(|object| {
                let id = ObjectId::of(&object);
                (
                    id,
                    Entry {
                        object,
                        processed: false,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl<T> LiveIndex<T> {
    /// Marks the entry as processed and returns its live object.
    pub fn claim(&mut self, id: &ObjectId) -> Option<&T> {
        let entry = self.entries.get_mut(id)?;
        entry.processed = true;
        Some(&entry.object)
    }

    /// Identities of entries that no desired object claimed, in order.
    pub fn unprocessed(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.processed)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use athenz_policy_controller_k8s_api::rbac::{ServiceRole, ServiceRoleSpec};

    fn role(ns: &str, name: &str) -> ServiceRole {
        let mut role = ServiceRole::new(name, ServiceRoleSpec::default());
        role.metadata.namespace = Some(ns.to_string());
        role
    }

    #[test]
    fn unclaimed_entries_remain() {
        let mut index = LiveIndex::new(vec![role("a", "x"), role("a", "y"), role("b", "x")]);
        assert_eq!(index.unprocessed().count(), 3);

        assert!(index.claim(&ObjectId::new("a", "x")).is_some());
        assert!(index.claim(&ObjectId::new("c", "x")).is_none());
        // Claiming twice still yields the live object.
        assert!(index.claim(&ObjectId::new("a", "x")).is_some());

        assert_eq!(
            index.unprocessed().cloned().collect::<Vec<_>>(),
            vec![ObjectId::new("a", "y"), ObjectId::new("b", "x")]
        );
    }
}
