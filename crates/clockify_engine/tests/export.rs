use std::fs;

use clockify_engine::{export_dataset, ExportSink, FileExportSink};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

#[test]
fn dataset_is_written_as_json_and_csv() {
    let temp = TempDir::new().unwrap();
    let sink = FileExportSink::new(temp.path()).without_timestamps();

    let files = sink
        .write_both(
            "all_projects",
            &json!([
                { "id": "p1", "name": "Website", "archived": false },
                { "id": "p2", "name": "Mobile", "clientId": "c1" }
            ]),
        )
        .unwrap();

    assert_eq!(files.json, temp.path().join("all_projects.json"));
    let json: Value = serde_json::from_str(&fs::read_to_string(&files.json).unwrap()).unwrap();
    assert_eq!(json[1]["clientId"], "c1");

    let csv = fs::read_to_string(files.csv.unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec!["archived,id,name,clientId", "false,p1,Website,", ",p2,Mobile,c1"]
    );
}

#[test]
fn scalar_dataset_has_no_csv() {
    let temp = TempDir::new().unwrap();
    let sink = FileExportSink::new(temp.path()).without_timestamps();
    let files = sink.write_both("count", &json!(42)).unwrap();
    assert!(files.json.exists());
    assert!(files.csv.is_none());
}

#[test]
fn sink_trait_writes_through_export_dataset() {
    let temp = TempDir::new().unwrap();
    let sink = FileExportSink::new(temp.path().join("Export"));
    export_dataset(&sink as &dyn ExportSink, "groups_summary", &json!({ "total_groups": 3 }));

    let names: Vec<String> = fs::read_dir(sink.dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|name| name.starts_with("groups_summary_")));
}
