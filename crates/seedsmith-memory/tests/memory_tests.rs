#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seedsmith_memory::*;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(HashingEmbedder::new(256)))
    }

    // ── Collection tests ───────────────────────────────────────

    #[test]
    fn test_add_assigns_sequential_ids() {
        let store = store();
        let c = store.create("component_db").unwrap();
        assert_eq!(c.add(["a", "b"]), vec![0, 1]);
        assert_eq!(c.add(vec!["c".to_string()]), vec![2]);
        assert_eq!(c.len(), 3);
        assert_eq!(c.next_id(), 3);
        assert_eq!(c.get(1).as_deref(), Some("b"));
    }

    #[test]
    fn test_query_exact_text_is_top_hit() {
        let store = store();
        let c = store.create("format_spec_db").unwrap();
        let docs = [
            r#"{"type":"USER","fields":["command","username"]}"#,
            r#"{"type":"PASS","fields":["command","password"]}"#,
            r#"{"type":"RETR","fields":["command","path"]}"#,
            "a completely unrelated note about weather",
        ];
        c.add(docs);
        for doc in docs {
            let hits = c.query(doc, 1);
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].document, doc);
        }
    }

    #[test]
    fn test_query_exact_punctuation_text_is_top_hit() {
        let store = store();
        let c = store.create("component_db").unwrap();
        c.add(["USER anonymous", "{}", "[]"]);
        let hits = c.query("{}", 1);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[0].document, "{}");
        assert_eq!(c.query("[]", 1)[0].id, 2);
    }

    #[test]
    fn test_query_ranks_nearest_first_and_caps_k() {
        let store = store();
        let c = store.create("sequence_db").unwrap();
        c.add([
            "zebra giraffe savanna",
            "USER PASS RETR QUIT",
            "USER PASS LIST QUIT",
        ]);
        let hits = c.query("USER PASS RETR", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "USER PASS RETR QUIT");
        assert!(hits[0].score >= hits[1].score);
        assert!(c.query("anything", 0).is_empty());
    }

    #[test]
    fn test_reader_sees_appends_immediately() {
        let store = store();
        let c = store.create("component_db").unwrap();
        let reader = store.reader("component_db").unwrap();
        assert!(reader.is_empty());
        c.add(["first"]);
        assert_eq!(reader.len(), 1);
        c.add(["second"]);
        assert_eq!(reader.documents(), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_collection_name_rejected() {
        let store = store();
        let _c = store.create("x").unwrap();
        assert!(store.create("x").is_err());
        assert_eq!(store.names(), vec!["x".to_string()]);
    }

    // ── Snapshot round trip ────────────────────────────────────

    #[test]
    fn test_load_dump_round_trip_and_resume_ids() {
        let store = store();
        let c = store.create("a").unwrap();
        c.add(["one", "two", "three"]);
        let snap = c.dump();
        assert_eq!(snap.ids, vec!["0", "1", "2"]);

        let fresh = store.create("b").unwrap();
        assert_eq!(fresh.load(&snap).unwrap(), 3);
        assert_eq!(fresh.dump(), snap);
        assert_eq!(fresh.add(["four"]), vec![3]);
    }

    #[test]
    fn test_load_resumes_above_sparse_max_id() {
        let store = store();
        let c = store.create("a").unwrap();
        let snap = Snapshot {
            ids: vec!["4".into(), "17".into(), "9".into()],
            documents: vec!["x".into(), "y".into(), "z".into()],
        };
        c.load(&snap).unwrap();
        assert_eq!(c.next_id(), 18);
        assert_eq!(c.add(["w"]), vec![18]);
    }

    #[test]
    fn test_load_is_idempotent_and_detects_conflicts() {
        let store = store();
        let c = store.create("a").unwrap();
        c.add(["one"]);
        let snap = c.dump();
        assert_eq!(c.load(&snap).unwrap(), 0);
        assert_eq!(c.len(), 1);

        let conflicting = Snapshot {
            ids: vec!["0".into()],
            documents: vec!["different".into()],
        };
        assert!(c.load(&conflicting).is_err());
        assert_eq!(c.get(0).as_deref(), Some("one"));
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let store = store();
        let c = store.create("a").unwrap();
        let bad_len = Snapshot {
            ids: vec!["0".into()],
            documents: vec![],
        };
        assert!(c.load(&bad_len).is_err());
        let bad_id = Snapshot {
            ids: vec!["abc".into()],
            documents: vec!["x".into()],
        };
        assert!(c.load(&bad_id).is_err());
        assert!(c.is_empty());
    }

    // ── SnapshotStore tests ────────────────────────────────────

    #[test]
    fn test_latest_revision_is_max_integer_stem() {
        let dir = tempfile::tempdir().unwrap();
        let snaps = SnapshotStore::new(dir.path());
        assert_eq!(snaps.latest_revision("sequence_db").unwrap(), None);

        for rev in [2u64, 10, 9] {
            let snap = Snapshot {
                ids: (0..rev).map(|i| i.to_string()).collect(),
                documents: (0..rev).map(|i| format!("doc {i}")).collect(),
            };
            snaps.write("sequence_db", rev, &snap).unwrap();
        }
        std::fs::write(snaps.collection_dir("sequence_db").join("notes.json"), "{}").unwrap();
        std::fs::write(snaps.collection_dir("sequence_db").join("99.txt"), "").unwrap();

        assert_eq!(snaps.revisions("sequence_db").unwrap(), vec![2, 9, 10]);
        let (rev, snap) = snaps.read_latest("sequence_db").unwrap().unwrap();
        assert_eq!(rev, 10);
        assert_eq!(snap.len(), 10);
    }

    #[test]
    fn test_snapshot_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let snaps = SnapshotStore::new(dir.path());
        let snap = Snapshot {
            ids: vec!["0".into()],
            documents: vec!["{\"1\":\"USER\"}".into()],
        };
        let path = snaps.write("sequence_db", 1, &snap).unwrap();
        assert_eq!(path.file_name().unwrap(), "1.json");
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["ids"][0], "0");
        assert_eq!(raw["documents"][0], "{\"1\":\"USER\"}");
    }

    #[test]
    fn test_persist_and_resume_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let first_run = store().with_snapshots(SnapshotStore::new(dir.path().join("run1")));
        let c = first_run.create("component_db").unwrap();
        c.add(["field a"]);
        first_run.persist(&c).unwrap();
        c.add(["field b"]);
        let path = first_run.persist(&c).unwrap().unwrap();
        assert!(path.ends_with("component_db/2.json"));

        let second_run = store();
        let resumed = second_run.create("component_db").unwrap();
        let rev = second_run
            .resume(&resumed, &SnapshotStore::new(dir.path().join("run1")))
            .unwrap();
        assert_eq!(rev, Some(2));
        assert_eq!(resumed.len(), 2);
        assert_eq!(resumed.add(["field c"]), vec![2]);
    }

    #[test]
    fn test_persist_without_snapshot_store_is_noop() {
        let store = store();
        let c = store.create("a").unwrap();
        c.add(["x"]);
        assert!(store.persist(&c).unwrap().is_none());
    }

    #[test]
    fn test_open_latest_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let c = store()
            .open_latest(&SnapshotStore::new(dir.path()), "coverage_db")
            .unwrap();
        assert!(c.is_empty());
    }
}
