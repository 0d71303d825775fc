//! Naming Module Tests
//!
//! Validates the directory tree and the naming service against fake storage servers.
//!
//! ## Test Scopes
//! - **Directory Tree**: Resolution, insertion, grafting and subtree removal.
//! - **Registry & Placement**: Registration conflicts and storage server selection.
//! - **Service Logic**: Edge cases of every service call, deletion fan-out and the
//!   concurrent creation race.
//! - **Server**: The same calls made through stubs over loopback sockets.
//!
//! Fake storage servers serve the command interface and record every call they receive.
//! Data stubs point at addresses nobody listens on, since the naming server never calls
//! them.

#[cfg(test)]
mod tests {
    use crate::common::{FsError, Path};
    use crate::config::NamingConfig;
    use crate::naming::placement::{PlacementStrategy, RandomPlacement, RoundRobinPlacement};
    use crate::naming::registry::StorageRegistry;
    use crate::naming::tree::{DirectoryTree, FileEntry};
    use crate::naming::protocol::{registration_stub, service_stub};
    use crate::naming::{NamingServer, NamingService, REGISTRATION_PORT, SERVICE_PORT};
    use crate::rpc::{Dispatch, DispatchFuture, Skeleton, Stub};
    use crate::storage::protocol::{CommandApi, CommandCall, CommandReply, StorageApi};

    use std::collections::HashSet;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn storage_stub(host: u8) -> Stub<StorageApi> {
        Stub::new(SocketAddr::from(([10, 0, 0, host], 7000))).unwrap()
    }

    fn command_stub(host: u8) -> Stub<CommandApi> {
        Stub::new(SocketAddr::from(([10, 0, 0, host], 7001))).unwrap()
    }

    // ============================================================
    // FAKE STORAGE SERVERS
    // ============================================================

    #[derive(Default)]
    struct FakeCommand {
        calls: Mutex<Vec<String>>,
        delay: Duration,
        fail_deletes: bool,
        refuse_creates: bool,
        refuse_deletes: bool,
    }

    impl FakeCommand {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Dispatch<CommandApi> for FakeCommand {
        fn dispatch(&self, call: CommandCall) -> DispatchFuture<'_, CommandApi> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                match call {
                    CommandCall::Create { file } => {
                        self.calls.lock().unwrap().push(format!("create {}", file));
                        Ok(CommandReply::Created(!self.refuse_creates))
                    }
                    CommandCall::Delete { path } => {
                        self.calls.lock().unwrap().push(format!("delete {}", path));
                        if self.fail_deletes {
                            return Err(FsError::Io("disk failure".to_string()));
                        }
                        Ok(CommandReply::Deleted(!self.refuse_deletes))
                    }
                }
            })
        }
    }

    struct FakeNode {
        skeleton: Skeleton<CommandApi, FakeCommand>,
        recorder: Arc<FakeCommand>,
        storage: Stub<StorageApi>,
        command: Stub<CommandApi>,
    }

    impl FakeNode {
        async fn start(host: u8, recorder: FakeCommand) -> Self {
            let recorder = Arc::new(recorder);
            let skeleton = Skeleton::<CommandApi, _>::with_address(
                recorder.clone(),
                "127.0.0.1:0".parse().unwrap(),
            )
            .unwrap();
            skeleton.start().await.unwrap();
            let command = Stub::for_skeleton(&skeleton).unwrap();

            Self {
                skeleton,
                recorder,
                storage: storage_stub(host),
                command,
            }
        }

        async fn register(&self, naming: &NamingService, files: &[&str]) -> Vec<Path> {
            let files = files.iter().map(|f| path(f)).collect();
            naming
                .register(self.storage, self.command, files)
                .await
                .unwrap()
        }
    }

    // ============================================================
    // DIRECTORY TREE TESTS
    // ============================================================

    #[test]
    fn test_tree_root_resolves_to_directory() {
        let tree = DirectoryTree::new();

        assert!(tree.is_directory(&Path::root()).unwrap());
        assert!(tree.list(&Path::root()).unwrap().is_empty());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_tree_resolution_failures_are_not_found() {
        let mut tree = DirectoryTree::new();
        assert!(tree.graft(&path("/a/file"), storage_stub(1)));

        // Missing component
        assert!(matches!(tree.resolve(&path("/b")), Err(FsError::NotFound(_))));
        // Descending through a file
        assert!(matches!(
            tree.resolve(&path("/a/file/below")),
            Err(FsError::NotFound(_))
        ));
        // Listing a file
        assert!(matches!(tree.list(&path("/a/file")), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_tree_list_is_sorted() {
        let mut tree = DirectoryTree::new();
        for name in ["/zeta", "/alpha", "/mid"] {
            assert!(tree.insert_directory(&path(name)).unwrap());
        }
        assert!(tree.graft(&path("/beta"), storage_stub(1)));

        assert_eq!(
            tree.list(&Path::root()).unwrap(),
            vec!["alpha", "beta", "mid", "zeta"]
        );
    }

    #[test]
    fn test_tree_insert_checks_parent_and_name() {
        let mut tree = DirectoryTree::new();
        assert!(tree.insert_directory(&path("/dir")).unwrap());

        // Name taken, by a node of either kind
        assert!(!tree.insert_directory(&path("/dir")).unwrap());
        assert!(!tree.insert_file(&path("/dir"), FileEntry::new(storage_stub(1))).unwrap());

        // Root is never created
        assert!(!tree.insert_directory(&Path::root()).unwrap());

        // Missing parent
        assert!(matches!(
            tree.insert_directory(&path("/missing/child")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_tree_graft_creates_ancestors_and_rejects_duplicates() {
        let mut tree = DirectoryTree::new();

        assert!(tree.graft(&path("/a/b/c.txt"), storage_stub(1)));
        assert!(tree.is_directory(&path("/a")).unwrap());
        assert!(tree.is_directory(&path("/a/b")).unwrap());
        assert!(!tree.is_directory(&path("/a/b/c.txt")).unwrap());

        // Existing leaf
        assert!(!tree.graft(&path("/a/b/c.txt"), storage_stub(2)));
        // Existing directory as leaf
        assert!(!tree.graft(&path("/a/b"), storage_stub(2)));
        // Descending through a file
        assert!(!tree.graft(&path("/a/b/c.txt/d"), storage_stub(2)));

        let holders = tree.holders_under(&path("/a")).unwrap();
        assert_eq!(holders, HashSet::from([storage_stub(1)]));
    }

    #[test]
    fn test_tree_remove_returns_files_and_reuses_slots() {
        let mut tree = DirectoryTree::new();
        tree.graft(&path("/d/x"), storage_stub(1));
        tree.graft(&path("/d/sub/y"), storage_stub(2));
        tree.graft(&path("/e"), storage_stub(1));
        assert_eq!(tree.len(), 5);

        let removed = tree.remove(&path("/d")).unwrap();

        assert_eq!(removed, vec![path("/d/sub/y"), path("/d/x")]);
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(&path("/d")));
        assert!(!tree.contains(&path("/d/x")));
        assert_eq!(tree.list(&Path::root()).unwrap(), vec!["e"]);

        tree.graft(&path("/f/g"), storage_stub(1));
        assert_eq!(tree.len(), 3);
        assert!(tree.contains(&path("/f/g")));
    }

    #[test]
    fn test_tree_root_cannot_be_removed() {
        let mut tree = DirectoryTree::new();

        assert!(matches!(
            tree.remove(&Path::root()),
            Err(FsError::InvalidArgument(_))
        ));
    }

    // ============================================================
    // REGISTRY & PLACEMENT TESTS
    // ============================================================

    #[test]
    fn test_registry_rejects_second_registration() {
        let mut registry = StorageRegistry::new();
        registry.register(storage_stub(1), command_stub(1)).unwrap();

        // Same command stub
        assert!(matches!(
            registry.register(storage_stub(2), command_stub(1)),
            Err(FsError::AlreadyRegistered(_))
        ));
        // Same storage stub
        assert!(matches!(
            registry.register(storage_stub(1), command_stub(2)),
            Err(FsError::AlreadyRegistered(_))
        ));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.storage_for(&command_stub(1)), Some(storage_stub(1)));
        assert_eq!(registry.command_for(&storage_stub(1)), Some(command_stub(1)));
    }

    #[test]
    fn test_round_robin_cycles_in_registration_order() {
        let placement = RoundRobinPlacement::default();
        let candidates = [command_stub(1), command_stub(2), command_stub(3)];
        let file = path("/f");

        let picks: Vec<_> = (0..6)
            .map(|_| placement.select(&file, &candidates).unwrap())
            .collect();

        assert_eq!(&picks[..3], &candidates[..]);
        assert_eq!(&picks[3..], &candidates[..]);
    }

    #[test]
    fn test_random_placement_picks_a_candidate() {
        let candidates = [command_stub(1), command_stub(2)];
        let file = path("/f");

        assert!(RandomPlacement.select(&file, &[]).is_none());
        for _ in 0..50 {
            let pick = RandomPlacement.select(&file, &candidates).unwrap();
            assert!(candidates.contains(&pick));
        }
    }

    // ============================================================
    // SERVICE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_service_root_queries_without_storage() {
        let naming = NamingService::new();

        assert!(naming.is_directory(&Path::root()).await.unwrap());
        assert!(naming.list(&Path::root()).await.unwrap().is_empty());
        assert!(!naming.create_file(&Path::root()).await.unwrap());
        assert!(!naming.create_directory(&Path::root()).await.unwrap());
        assert!(!naming.delete(&Path::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_file_without_storage_is_illegal_state() {
        let naming = NamingService::new();

        let result = naming.create_file(&path("/file")).await;

        assert!(matches!(result, Err(FsError::IllegalState(_))));
        assert!(matches!(
            naming.is_directory(&path("/file")).await,
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_file_edge_cases() {
        let naming = NamingService::new();
        let node = FakeNode::start(1, FakeCommand::default()).await;
        node.register(&naming, &["/existing"]).await;

        // Parent does not exist
        assert!(matches!(
            naming.create_file(&path("/missing/file")).await,
            Err(FsError::NotFound(_))
        ));
        // Parent is a file
        assert!(matches!(
            naming.create_file(&path("/existing/file")).await,
            Err(FsError::NotFound(_))
        ));
        // Name taken
        assert!(!naming.create_file(&path("/existing")).await.unwrap());

        assert!(node.recorder.calls().is_empty());
        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_create_file_places_on_storage_server() {
        // ARRANGE
        let naming = NamingService::with_placement(RoundRobinPlacement::default());
        let first = FakeNode::start(1, FakeCommand::default()).await;
        let second = FakeNode::start(2, FakeCommand::default()).await;
        first.register(&naming, &[]).await;
        second.register(&naming, &[]).await;
        naming.create_directory(&path("/docs")).await.unwrap();

        // ACT
        assert!(naming.create_file(&path("/docs/a.txt")).await.unwrap());
        assert!(naming.create_file(&path("/docs/b.txt")).await.unwrap());

        // ASSERT
        assert_eq!(first.recorder.calls(), vec!["create /docs/a.txt"]);
        assert_eq!(second.recorder.calls(), vec!["create /docs/b.txt"]);
        assert_eq!(
            naming.get_storage(&path("/docs/a.txt")).await.unwrap(),
            first.storage
        );
        assert_eq!(
            naming.get_storage(&path("/docs/b.txt")).await.unwrap(),
            second.storage
        );
        assert_eq!(
            naming.list(&path("/docs")).await.unwrap(),
            vec!["a.txt", "b.txt"]
        );

        first.skeleton.stop().await;
        second.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_create_file_transport_failure_leaves_tree_unmodified() {
        let naming = NamingService::new();

        // A command stub nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = Stub::<CommandApi>::new(listener.local_addr().unwrap()).unwrap();
        drop(listener);
        naming.register(storage_stub(1), dead, vec![]).await.unwrap();

        let result = naming.create_file(&path("/file")).await;

        assert!(result.unwrap_err().is_transport());
        assert!(naming.list(&Path::root()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_create_links_nothing() {
        let naming = NamingService::new();
        let node = FakeNode::start(
            1,
            FakeCommand {
                refuse_creates: true,
                ..Default::default()
            },
        )
        .await;
        node.register(&naming, &[]).await;

        assert!(!naming.create_file(&path("/file")).await.unwrap());

        assert_eq!(node.recorder.calls(), vec!["create /file"]);
        assert!(naming.list(&Path::root()).await.unwrap().is_empty());
        assert!(matches!(
            naming.get_storage(&path("/file")).await,
            Err(FsError::NotFound(_))
        ));

        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_create_file_has_one_winner() {
        let naming = Arc::new(NamingService::new());
        let node = FakeNode::start(
            1,
            FakeCommand {
                delay: Duration::from_millis(20),
                ..Default::default()
            },
        )
        .await;
        node.register(&naming, &[]).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let naming = naming.clone();
                tokio::spawn(async move { naming.create_file(&path("/race")).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(node.recorder.calls(), vec!["create /race"]);

        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_get_storage_counts_accesses() {
        let naming = NamingService::new();
        let node = FakeNode::start(1, FakeCommand::default()).await;
        node.register(&naming, &["/dir/file"]).await;

        for _ in 0..3 {
            assert_eq!(
                naming.get_storage(&path("/dir/file")).await.unwrap(),
                node.storage
            );
        }

        assert_eq!(naming.access_count(&path("/dir/file")).await.unwrap(), 3);
        assert!(matches!(
            naming.get_storage(&path("/dir")).await,
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            naming.get_storage(&path("/nothing")).await,
            Err(FsError::NotFound(_))
        ));

        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_register_reports_duplicates() {
        let naming = NamingService::new();
        let first = FakeNode::start(1, FakeCommand::default()).await;
        let second = FakeNode::start(2, FakeCommand::default()).await;

        let duplicates = first.register(&naming, &["/shared/a", "/own/b"]).await;
        assert!(duplicates.is_empty());

        let duplicates = second
            .register(&naming, &["/shared/a", "/shared/a/below", "/", "/shared/c"])
            .await;

        assert_eq!(duplicates, vec![path("/shared/a"), path("/shared/a/below")]);
        assert_eq!(
            naming.replicas(&path("/shared/a")).await.unwrap(),
            vec![first.storage]
        );
        assert_eq!(
            naming.get_storage(&path("/shared/c")).await.unwrap(),
            second.storage
        );

        first.skeleton.stop().await;
        second.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_register_counts_repeated_offer_once() {
        let naming = NamingService::new();
        let node = FakeNode::start(1, FakeCommand::default()).await;

        let duplicates = node.register(&naming, &["/a", "/dir/b", "/a", "/dir/b"]).await;

        assert!(duplicates.is_empty());
        assert_eq!(naming.replicas(&path("/a")).await.unwrap(), vec![node.storage]);
        assert_eq!(
            naming.get_storage(&path("/dir/b")).await.unwrap(),
            node.storage
        );

        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_register_twice_is_a_conflict() {
        let naming = NamingService::new();
        let node = FakeNode::start(1, FakeCommand::default()).await;
        node.register(&naming, &["/a"]).await;

        let result = naming
            .register(node.storage, node.command, vec![path("/b")])
            .await;

        assert!(matches!(result, Err(FsError::AlreadyRegistered(_))));
        assert!(matches!(
            naming.is_directory(&path("/b")).await,
            Err(FsError::NotFound(_))
        ));

        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_delete_file_contacts_its_holders_only() {
        let naming = NamingService::new();
        let first = FakeNode::start(1, FakeCommand::default()).await;
        let second = FakeNode::start(2, FakeCommand::default()).await;
        first.register(&naming, &["/a"]).await;
        second.register(&naming, &["/b"]).await;

        assert!(naming.delete(&path("/a")).await.unwrap());

        assert_eq!(first.recorder.calls(), vec!["delete /a"]);
        assert!(second.recorder.calls().is_empty());
        assert_eq!(naming.list(&Path::root()).await.unwrap(), vec!["b"]);
        assert!(matches!(
            naming.delete(&path("/a")).await,
            Err(FsError::NotFound(_))
        ));

        first.skeleton.stop().await;
        second.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_delete_directory_fans_out_once_per_node() {
        // ARRANGE
        let naming = NamingService::new();
        let first = FakeNode::start(1, FakeCommand::default()).await;
        let second = FakeNode::start(2, FakeCommand::default()).await;
        let third = FakeNode::start(3, FakeCommand::default()).await;
        first.register(&naming, &["/d/x", "/d/sub/y"]).await;
        second.register(&naming, &["/d/z", "/e/w"]).await;
        third.register(&naming, &["/e/v"]).await;

        // ACT
        assert!(naming.delete(&path("/d")).await.unwrap());

        // ASSERT
        assert_eq!(first.recorder.calls(), vec!["delete /d"]);
        assert_eq!(second.recorder.calls(), vec!["delete /d"]);
        assert!(third.recorder.calls().is_empty());

        assert_eq!(naming.list(&Path::root()).await.unwrap(), vec!["e"]);
        assert!(matches!(
            naming.access_count(&path("/d/x")).await,
            Err(FsError::NotFound(_))
        ));

        for node in [first, second, third] {
            node.skeleton.stop().await;
        }
    }

    #[tokio::test]
    async fn test_delete_empty_directory_needs_no_storage() {
        let naming = NamingService::new();
        naming.create_directory(&path("/empty")).await.unwrap();

        assert!(naming.delete(&path("/empty")).await.unwrap());
        assert!(naming.list(&Path::root()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_remote_delete_leaves_tree_untouched() {
        let naming = NamingService::new();
        let node = FakeNode::start(
            1,
            FakeCommand {
                fail_deletes: true,
                ..Default::default()
            },
        )
        .await;
        node.register(&naming, &["/keep/me"]).await;

        let result = naming.delete(&path("/keep")).await;

        assert_eq!(result, Err(FsError::Io("disk failure".to_string())));
        assert!(naming.is_directory(&path("/keep")).await.unwrap());
        assert_eq!(
            naming.replicas(&path("/keep/me")).await.unwrap(),
            vec![node.storage]
        );

        node.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_refused_remote_delete_leaves_tree_untouched() {
        // ARRANGE
        let naming = NamingService::new();
        let healthy = FakeNode::start(1, FakeCommand::default()).await;
        let refusing = FakeNode::start(
            2,
            FakeCommand {
                refuse_deletes: true,
                ..Default::default()
            },
        )
        .await;
        healthy.register(&naming, &["/d/x"]).await;
        refusing.register(&naming, &["/d/y"]).await;

        // ACT
        let result = naming.delete(&path("/d")).await;

        // ASSERT
        assert!(matches!(result, Err(FsError::IllegalState(_))));
        assert_eq!(refusing.recorder.calls(), vec!["delete /d"]);
        assert_eq!(naming.list(&path("/d")).await.unwrap(), vec!["x", "y"]);
        assert_eq!(
            naming.replicas(&path("/d/y")).await.unwrap(),
            vec![refusing.storage]
        );

        healthy.skeleton.stop().await;
        refusing.skeleton.stop().await;
    }

    #[tokio::test]
    async fn test_replica_bookkeeping() {
        let naming = NamingService::new();
        let first = FakeNode::start(1, FakeCommand::default()).await;
        let second = FakeNode::start(2, FakeCommand::default()).await;
        first.register(&naming, &["/f"]).await;
        second.register(&naming, &[]).await;
        let file = path("/f");

        // Unregistered holders are refused
        assert!(matches!(
            naming.add_replica(&file, storage_stub(9)).await,
            Err(FsError::IllegalState(_))
        ));

        assert!(naming.add_replica(&file, second.storage).await.unwrap());
        assert!(!naming.add_replica(&file, second.storage).await.unwrap());
        assert_eq!(
            naming.replicas(&file).await.unwrap(),
            vec![first.storage, second.storage]
        );

        // Removing the primary promotes the remaining holder
        assert!(naming.remove_replica(&file, &first.storage).await.unwrap());
        assert_eq!(naming.get_storage(&file).await.unwrap(), second.storage);

        // The last holder stays
        assert!(!naming.remove_replica(&file, &second.storage).await.unwrap());
        assert_eq!(naming.replicas(&file).await.unwrap(), vec![second.storage]);

        first.skeleton.stop().await;
        second.skeleton.stop().await;
    }

    // ============================================================
    // SERVER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_naming_server_over_the_wire() {
        // ARRANGE
        let server = NamingServer::new(&NamingConfig::ephemeral()).unwrap();
        server.start().await.unwrap();
        let service = server.service_stub().unwrap();
        let registration = server.registration_stub().unwrap();
        let node = FakeNode::start(1, FakeCommand::default()).await;

        // ACT
        let duplicates = registration
            .register(node.storage, node.command, vec![path("/remote/file")])
            .await
            .unwrap();

        // ASSERT
        assert!(duplicates.is_empty());
        assert!(service.is_directory(&Path::root()).await.unwrap());
        assert!(service.is_directory(&path("/remote")).await.unwrap());
        assert_eq!(service.list(&path("/remote")).await.unwrap(), vec!["file"]);
        assert_eq!(
            service.get_storage(&path("/remote/file")).await.unwrap(),
            node.storage
        );

        assert!(service.create_directory(&path("/remote/sub")).await.unwrap());
        assert!(service.create_file(&path("/remote/sub/new")).await.unwrap());
        assert_eq!(node.recorder.calls(), vec!["create /remote/sub/new"]);

        // Application errors cross the wire with their kind
        let missing = service.list(&path("/nowhere")).await.unwrap_err();
        assert!(matches!(missing, FsError::NotFound(_)));
        assert!(!missing.is_transport());

        let again = registration
            .register(node.storage, node.command, vec![])
            .await;
        assert!(matches!(again, Err(FsError::AlreadyRegistered(_))));

        assert!(service.delete(&path("/remote")).await.unwrap());
        assert!(service.list(&Path::root()).await.unwrap().is_empty());

        server.stop().await;
        node.skeleton.stop().await;

        assert!(service.is_directory(&Path::root()).await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_well_known_stubs() {
        let service = service_stub("127.0.0.1").await.unwrap();
        let registration = registration_stub("127.0.0.1").await.unwrap();

        assert_eq!(service.address().port(), SERVICE_PORT);
        assert_eq!(registration.address().port(), REGISTRATION_PORT);
        assert!(registration.address().ip().is_loopback());
    }
}
