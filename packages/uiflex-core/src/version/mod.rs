//! Named, layered versions of change sets.

mod version_store;

pub use version_store::{Version, VersionId, VersionStore, VersionType};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, ChangeKind, ChangeSet, Layer};
    use crate::error::FlexError;
    use ntest::timeout;
    use serde_json::json;

    fn change_set(ids: &[&str]) -> ChangeSet {
        ChangeSet::from_changes(
            ids.iter()
                .map(|id| Change::new(*id, ChangeKind::Hide, "a", json!({}), Layer::Customer))
                .collect(),
        )
        .unwrap()
    }

    #[timeout(1000)]
    #[test]
    fn test_create_version_is_draft() {
        let store = VersionStore::new();
        let id = store
            .create_version("app", change_set(&["1"]), Some("first".to_string()))
            .unwrap();

        let version = store.get(id).unwrap();
        assert_eq!(version.version_type, VersionType::Draft);
        assert_eq!(version.title.as_deref(), Some("first"));
        assert_eq!(store.draft("app").unwrap().unwrap().id, id);
        assert!(matches!(
            store.get_active("app"),
            Err(FlexError::NoActiveVersion { .. })
        ));
    }

    #[timeout(1000)]
    #[test]
    fn test_new_draft_replaces_old_draft() {
        let store = VersionStore::new();
        let first = store.create_version("app", change_set(&["1"]), None).unwrap();
        let second = store.create_version("app", change_set(&["1", "2"]), None).unwrap();

        assert!(second > first);
        assert!(matches!(
            store.get(first),
            Err(FlexError::VersionNotFound { version_id }) if version_id == first.0
        ));
        assert_eq!(store.list("app").unwrap().len(), 1);
    }

    #[timeout(1000)]
    #[test]
    fn test_activate_demotes_previous() {
        let store = VersionStore::new();
        let v1 = store.create_version("app", change_set(&["1"]), None).unwrap();
        assert_eq!(store.activate(v1).unwrap(), None);

        let v2 = store.create_version("app", change_set(&["1", "2"]), None).unwrap();
        assert_eq!(store.activate(v2).unwrap(), Some(v1));

        assert_eq!(store.get_active("app").unwrap().id, v2);
        assert_eq!(store.get(v1).unwrap().version_type, VersionType::Inactive);
        assert!(store.draft("app").unwrap().is_none());

        let actives = store
            .list("app")
            .unwrap()
            .iter()
            .filter(|v| v.version_type == VersionType::Active)
            .count();
        assert_eq!(actives, 1);

        // Reactivating an inactive version
        assert_eq!(store.activate(v1).unwrap(), Some(v2));
        assert_eq!(store.get_active("app").unwrap().change_set.len(), 1);
        assert_eq!(store.activate(v1).unwrap(), None);
    }

    #[timeout(1000)]
    #[test]
    fn test_activate_unknown_version() {
        let store = VersionStore::new();
        assert_eq!(
            store.activate(VersionId(42)),
            Err(FlexError::VersionNotFound { version_id: 42 })
        );
    }

    #[timeout(1000)]
    #[test]
    fn test_references_are_independent() {
        let store = VersionStore::new();
        let a = store.create_version("app-a", change_set(&["1"]), None).unwrap();
        let b = store.create_version("app-b", change_set(&["1"]), None).unwrap();
        store.activate(a).unwrap();
        store.activate(b).unwrap();

        assert_eq!(store.get_active("app-a").unwrap().id, a);
        assert_eq!(store.get_active("app-b").unwrap().id, b);
    }

    #[timeout(1000)]
    #[test]
    fn test_discard_draft_and_list_order() {
        let store = VersionStore::new();
        let v1 = store.create_version("app", change_set(&["1"]), None).unwrap();
        store.activate(v1).unwrap();
        let v2 = store.create_version("app", change_set(&["2"]), None).unwrap();

        let ids: Vec<VersionId> = store.list("app").unwrap().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![v2, v1]);

        assert_eq!(store.discard_draft("app").unwrap(), Some(v2));
        assert_eq!(store.discard_draft("app").unwrap(), None);
        assert_eq!(store.get_active("app").unwrap().id, v1);
    }

    #[timeout(1000)]
    #[test]
    fn test_import_round_trip() {
        let store = VersionStore::new();
        let v1 = store.create_version("app", change_set(&["1"]), None).unwrap();
        store.activate(v1).unwrap();
        store.create_version("app", change_set(&["2"]), None).unwrap();
        let exported = store.list("app").unwrap();

        let json = serde_json::to_string(&exported).unwrap();
        let loaded: Vec<Version> = serde_json::from_str(&json).unwrap();

        let restored = VersionStore::new();
        restored.import("app", loaded).unwrap();
        assert_eq!(restored.list("app").unwrap(), exported);

        let next = restored.create_version("app", ChangeSet::new(), None).unwrap();
        assert!(exported.iter().all(|v| v.id < next));
    }

    #[timeout(1000)]
    #[test]
    fn test_import_rejects_two_active_versions() {
        let store = VersionStore::new();
        let version = |id: u64| Version {
            id: VersionId(id),
            reference: "app".to_string(),
            version_type: VersionType::Active,
            title: None,
            change_set: ChangeSet::new(),
        };
        let result = store.import("app", vec![version(1), version(2)]);
        assert!(matches!(result, Err(FlexError::DataCorruption(_))));
        assert!(store.list("app").unwrap().is_empty());
    }
}
