use chrono::Utc;
use cosync_core::{
    BatchReport, ChangeKind, ChangeRecord, OperationOutcome, SkipReason, Stage, SyncAction,
};

#[test]
fn change_records_deserialize_from_json() {
    let json = r#"[
        {"path": "a.txt", "kind": "added"},
        {"path": "new.md", "previous_path": "old.md", "kind": "renamed"},
        {"path": "x.bin", "kind": {"other": "unmerged"}}
    ]"#;
    let records: Vec<ChangeRecord> = serde_json::from_str(json).expect("parse");
    assert_eq!(records[0], ChangeRecord::new("a.txt", ChangeKind::Added));
    assert_eq!(records[1], ChangeRecord::renamed("old.md", "new.md"));
    assert_eq!(records[2].kind, ChangeKind::Other("unmerged".into()));
}

#[test]
fn batch_report_roundtrips_through_json() {
    let report = BatchReport::new(
        Utc::now(),
        vec![
            OperationOutcome::succeeded(SyncAction::Upload {
                path: "a.txt".into(),
            }),
            OperationOutcome::succeeded(SyncAction::Skip {
                path: "x.bin".into(),
                reason: SkipReason::Unsupported,
            }),
            OperationOutcome::failed(
                SyncAction::Move {
                    from: "old.md".into(),
                    to: "new.md".into(),
                },
                Stage::Copy,
                "NoSuchKey",
            ),
        ],
    );

    let json = serde_json::to_string(&report).expect("serialize");
    let back: BatchReport = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, report);
    assert!(json.contains(r#""stage":"copy""#));
}
