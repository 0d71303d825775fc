//! Common Module Tests
//!
//! ## Test Scopes
//! - **Path construction**: validation at every construction site, parsing and rendering.
//! - **Path navigation**: `parent`, `last`, `is_subpath` and root edge cases.
//! - **Local listing**: scanning a local directory into relative paths.
//! - **Errors**: mapping of I/O errors and serde transparency of `FsError`.

#[cfg(test)]
mod tests {
    use crate::common::error::FsError;
    use crate::common::path::{Path, PathError};
    use crate::rpc::RpcError;
    use std::collections::HashSet;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    // ============================================================
    // CONSTRUCTION & PARSING
    // ============================================================

    #[test]
    fn test_root_is_root() {
        let root = Path::root();

        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert_eq!(p("/"), root);
    }

    #[test]
    fn test_parse_and_render_round_trip() {
        let samples: Vec<Vec<&str>> = vec![
            vec![],
            vec!["a"],
            vec!["a", "b", "c.txt"],
            vec!["dir with spaces", "ünïcödé", ".hidden"],
        ];

        for components in samples {
            let path = Path::from_components(components.clone()).unwrap();
            let rendered = path.to_string();
            let parsed: Path = rendered.parse().unwrap();

            assert_eq!(parsed, path, "round trip failed for {}", rendered);
            assert_eq!(parsed.components().collect::<Vec<_>>(), components);
        }
    }

    #[test]
    fn test_parse_drops_empty_components() {
        assert_eq!(p("//a///b/"), p("/a/b"));
    }

    #[test]
    fn test_parse_requires_leading_separator() {
        let result = "a/b".parse::<Path>();

        assert!(matches!(result, Err(PathError::MissingLeadingSeparator(_))));
    }

    #[test]
    fn test_parse_rejects_reserved_delimiter() {
        let result = "/a:b".parse::<Path>();

        assert!(matches!(result, Err(PathError::ReservedDelimiter(_))));
    }

    #[test]
    fn test_join_validates_component() {
        let root = Path::root();

        assert!(matches!(root.join(""), Err(PathError::InvalidComponent(_))));
        assert!(matches!(root.join("a/b"), Err(PathError::InvalidComponent(_))));
        assert!(matches!(root.join("a:b"), Err(PathError::InvalidComponent(_))));
        assert_eq!(root.join("a").unwrap(), p("/a"));
    }

    #[test]
    fn test_from_components_validates_every_component() {
        let result = Path::from_components(["ok", "", "also-ok"]);

        assert!(matches!(result, Err(PathError::InvalidComponent(_))));
    }

    // ============================================================
    // NAVIGATION
    // ============================================================

    #[test]
    fn test_parent_and_last() {
        assert_eq!(p("/a/b").parent().unwrap(), p("/a"));
        assert_eq!(p("/a").parent().unwrap(), Path::root());
        assert_eq!(p("/a").last().unwrap(), "a");
        assert_eq!(p("/a/b/c").last().unwrap(), "c");
    }

    #[test]
    fn test_parent_and_last_fail_on_root() {
        assert_eq!(Path::root().parent(), Err(PathError::Root("parent")));
        assert!(Path::root().last().is_err());
    }

    #[test]
    fn test_is_subpath() {
        let a = p("/a");
        let ab = p("/a/b");

        assert!(ab.is_subpath(&a));
        assert!(!a.is_subpath(&ab));
        assert!(!p("/ab").is_subpath(&a));
        assert!(!p("/x/b").is_subpath(&a));
    }

    #[test]
    fn test_is_subpath_is_reflexive_and_root_is_everywhere() {
        for path in [Path::root(), p("/a"), p("/a/b/c")] {
            assert!(path.is_subpath(&path));
            assert!(path.is_subpath(&Path::root()));
        }
    }

    #[test]
    fn test_equality_and_hash_agree() {
        let mut set = HashSet::new();
        set.insert(p("/a/b"));
        set.insert(Path::root().join("a").unwrap().join("b").unwrap());
        set.insert(p("/a"));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_iteration_yields_components_in_order() {
        let path = p("/x/y/z");
        let collected: Vec<&str> = (&path).into_iter().collect();

        assert_eq!(collected, vec!["x", "y", "z"]);
        assert_eq!(path.len(), 3);
    }

    // ============================================================
    // SERIALIZATION
    // ============================================================

    #[test]
    fn test_path_serializes_as_string() {
        let json = serde_json::to_string(&p("/a/b")).unwrap();
        assert_eq!(json, "\"/a/b\"");

        let restored: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, p("/a/b"));
    }

    #[test]
    fn test_path_deserialization_validates() {
        let result = serde_json::from_str::<Path>("\"no-leading-slash\"");
        assert!(result.is_err());

        let result = bincode::serialize("/bad:path")
            .map(|bytes| bincode::deserialize::<Path>(&bytes));
        assert!(matches!(result, Ok(Err(_))));
    }

    // ============================================================
    // LOCAL LISTING
    // ============================================================

    #[test]
    fn test_list_local_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("top.txt"), b"1").unwrap();
        std::fs::write(dir.path().join("a/b/deep.txt"), b"2").unwrap();

        let files = Path::list_local(dir.path()).unwrap();

        assert_eq!(files, vec![p("/a/b/deep.txt"), p("/top.txt")]);
    }

    #[test]
    fn test_list_local_rejects_missing_and_non_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            Path::list_local(&dir.path().join("missing")),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            Path::list_local(&file),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_to_local_appends_components() {
        let root = std::path::Path::new("/srv/data");

        assert_eq!(p("/a/b.txt").to_local(root), root.join("a").join("b.txt"));
        assert_eq!(Path::root().to_local(root), root.to_path_buf());
    }

    // ============================================================
    // ERRORS
    // ============================================================

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: FsError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, FsError::NotFound(_)));

        let err: FsError = std::io::Error::other("disk on fire").into();
        assert!(matches!(err, FsError::Io(_)));
    }

    #[test]
    fn test_fs_error_survives_bincode() {
        let errors = vec![
            FsError::not_found("/a"),
            FsError::AlreadyRegistered("storage@1".to_string()),
            FsError::Rpc(RpcError::Malformed("truncated".to_string())),
        ];

        for err in errors {
            let bytes = bincode::serialize(&err).unwrap();
            let restored: FsError = bincode::deserialize(&bytes).unwrap();

            assert_eq!(restored, err);
            assert_eq!(restored.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_transport_errors_are_distinguishable() {
        assert!(FsError::Rpc(RpcError::Malformed("x".into())).is_transport());
        assert!(!FsError::not_found("/a").is_transport());
    }
}
