use crate::container::ContainerId;
use crate::mount::{ExternalMount, MountIdentity};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// An attached mount and the containers depending on it.
#[derive(Clone, Debug)]
struct Slot {
    /// The mount as it was attached, shared by every entry with the same identity.
    mount: Arc<ExternalMount>,
    /// Number of ledger entries per container referencing this mount.
    holders: BTreeMap<ContainerId, usize>,
}

/// The `Ledger` records which external mounts every container depends on.
///
/// Mounts are stored once per identity. A volume is attached as long as its identity
/// has a slot, and a slot lives as long as at least one entry references it.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    /// The ordered entries of every container, duplicates included.
    containers: BTreeMap<ContainerId, Vec<MountIdentity>>,
    /// The attached mounts by identity.
    arena: HashMap<MountIdentity, Slot>,
}

impl Ledger {
    /// Check if a mount with this identity is attached for at least one container.
    pub fn is_attached(&self, identity: &MountIdentity) -> bool {
        self.arena.contains_key(identity)
    }

    /// Get the attached mount for an identity.
    pub fn attached(&self, identity: &MountIdentity) -> Option<&Arc<ExternalMount>> {
        self.arena.get(identity).map(|slot| &slot.mount)
    }

    /// Number of distinct containers referencing an identity.
    pub fn holders(&self, identity: &MountIdentity) -> usize {
        self.arena
            .get(identity)
            .map_or(0, |slot| slot.holders.len())
    }

    pub fn contains(&self, container: &ContainerId) -> bool {
        self.containers.contains_key(container)
    }

    /// The distinct identities a container depends on, in request order.
    pub fn identities_of(&self, container: &ContainerId) -> Vec<MountIdentity> {
        let mut identities = Vec::<MountIdentity>::new();
        for identity in self.containers.get(container).into_iter().flatten() {
            if !identities.contains(identity) {
                identities.push(identity.clone());
            }
        }
        identities
    }

    /// Record that `container` depends on `mount`.
    ///
    /// If the identity is already attached, the entry points to the existing mount and the
    /// options of `mount` are dropped.
    pub fn insert(&mut self, container: &ContainerId, mount: ExternalMount) -> Arc<ExternalMount> {
        let identity = mount.identity();

        let slot = self.arena.entry(identity.clone()).or_insert_with(|| Slot {
            mount: Arc::new(mount),
            holders: BTreeMap::new(),
        });
        *slot.holders.entry(container.clone()).or_insert(0) += 1;

        self.containers
            .entry(container.clone())
            .or_default()
            .push(identity);

        Arc::clone(&slot.mount)
    }

    /// Remove every entry of a container.
    ///
    /// Returns the identities no container depends on anymore.
    pub fn remove_container(&mut self, container: &ContainerId) -> Vec<MountIdentity> {
        let mut released = Vec::<MountIdentity>::new();

        for identity in self.containers.remove(container).unwrap_or_default() {
            if let Some(slot) = self.arena.get_mut(&identity) {
                slot.holders.remove(container);
                if slot.holders.is_empty() {
                    self.arena.remove(&identity);
                    released.push(identity);
                }
            }
        }

        released
    }

    /// Iterate over every entry, ordered by container then by request order.
    pub fn iter(&self) -> impl Iterator<Item = (&ContainerId, &ExternalMount)> {
        self.containers.iter().flat_map(move |(container, identities)| {
            identities.iter().filter_map(move |identity| {
                self.arena
                    .get(identity)
                    .map(|slot| (container, slot.mount.as_ref()))
            })
        })
    }

    /// The containers having at least one entry.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerId> {
        self.containers.keys()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.containers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(id: &str) -> ContainerId {
        id.parse().unwrap()
    }

    fn mount(volume: &str, options: &str) -> ExternalMount {
        ExternalMount::new("d1", volume, options, "rexray")
    }

    #[test]
    fn test_shared_mount_is_attached_until_last_holder_leaves() {
        let mut ledger = Ledger::default();
        let identity = mount("v1", "").identity();

        ledger.insert(&id("x"), mount("v1", ""));
        ledger.insert(&id("y"), mount("v1", ""));

        assert!(ledger.is_attached(&identity));
        assert_eq!(ledger.holders(&identity), 2);
        assert_eq!(ledger.len(), 2);

        assert!(ledger.remove_container(&id("x")).is_empty());
        assert!(ledger.is_attached(&identity));
        assert_eq!(ledger.holders(&identity), 1);

        assert_eq!(ledger.remove_container(&id("y")), vec![identity.clone()]);
        assert!(!ledger.is_attached(&identity));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_duplicate_entries_count_one_holder() {
        let mut ledger = Ledger::default();
        let identity = mount("v1", "").identity();

        ledger.insert(&id("x"), mount("v1", ""));
        ledger.insert(&id("x"), mount("v1", ""));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.identities_of(&id("x")), vec![identity.clone()]);
        assert_eq!(ledger.holders(&identity), 1);
        assert_eq!(ledger.remove_container(&id("x")), vec![identity.clone()]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_first_attached_options_win() {
        let mut ledger = Ledger::default();

        ledger.insert(&id("x"), mount("v1", "size=5"));
        let shared = ledger.insert(&id("y"), mount("v1", "size=10"));

        assert_eq!(shared.options, "size=5");
        assert!(ledger.iter().all(|(_, m)| m.options == "size=5"));
    }

    #[test]
    fn test_iter_is_ordered_by_container() {
        let mut ledger = Ledger::default();

        ledger.insert(&id("b"), mount("v2", ""));
        ledger.insert(&id("a"), mount("v1", ""));
        ledger.insert(&id("b"), mount("v3", ""));

        let entries = ledger
            .iter()
            .map(|(c, m)| (c.as_str(), m.volume.as_str()))
            .collect::<Vec<(&str, &str)>>();

        assert_eq!(entries, vec![("a", "v1"), ("b", "v2"), ("b", "v3")]);
        assert_eq!(ledger.containers().count(), 2);
    }

    #[test]
    fn test_remove_unknown_container() {
        let mut ledger = Ledger::default();
        ledger.insert(&id("x"), mount("v1", ""));

        assert!(ledger.remove_container(&id("y")).is_empty());
        assert_eq!(ledger.len(), 1);
    }
}
