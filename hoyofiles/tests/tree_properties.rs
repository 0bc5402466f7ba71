//! Property tests for file tree construction.

use std::collections::BTreeMap;

use proptest::prelude::*;

use hoyofiles::game::{GameId, GameTarget};
use hoyofiles::integrity::Checksum;
use hoyofiles::selection::{resolve, SelectionRequest};
use hoyofiles::tree::{RemoteObjectRef, TreeBuilder};

/// Relative paths whose last segment always carries a `.pak` suffix, so a
/// file can never collide with a directory.
fn file_path() -> impl Strategy<Value = String> {
    (prop::collection::vec("[a-z]{1,4}", 0..3), "[a-z]{1,6}")
        .prop_map(|(dirs, name)| {
            let mut segments = dirs;
            segments.push(format!("{}.pak", name));
            segments.join("/")
        })
}

fn declared_files() -> impl Strategy<Value = BTreeMap<String, u64>> {
    prop::collection::btree_map(file_path(), 0u64..10_000, 1..40)
}

proptest! {
    #[test]
    fn prop_flatten_returns_declared_paths(files in declared_files()) {
        let mut builder = TreeBuilder::new(GameTarget::new(GameId::Genshin, "1.0"));
        for (path, size) in &files {
            let object = RemoteObjectRef::new(
                format!("https://cdn/{}", path),
                *size,
                Checksum::md5("00").unwrap(),
            );
            prop_assert!(builder.insert_file(path, object, None, None).unwrap());
        }
        let tree = builder.build();

        let expected: Vec<&str> = files.keys().map(String::as_str).collect();
        prop_assert_eq!(tree.flatten(), expected);
        prop_assert_eq!(tree.file_count(), files.len());
        prop_assert_eq!(tree.total_size(), files.values().sum::<u64>());
        prop_assert_eq!(tree.root().size(), tree.total_size());

        for path in files.keys() {
            prop_assert!(tree.get(path).map_or(false, |n| n.is_file()));
        }
    }

    #[test]
    fn prop_full_selection_is_sorted_and_indexed(files in declared_files()) {
        let mut builder = TreeBuilder::new(GameTarget::new(GameId::StarRail, "2.0"));
        for (path, size) in &files {
            let object = RemoteObjectRef::new(
                format!("https://cdn/{}", path),
                *size,
                Checksum::md5("00").unwrap(),
            );
            builder.insert_file(path, object, None, None).unwrap();
        }
        let set = resolve(&builder.build(), &SelectionRequest::full()).unwrap();

        prop_assert_eq!(set.len(), files.len());
        for (i, (entry, path)) in set.entries().iter().zip(files.keys()).enumerate() {
            prop_assert_eq!(entry.index, i);
            prop_assert_eq!(&entry.destination, path);
        }
    }
}
