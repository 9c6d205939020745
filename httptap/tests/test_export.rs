use std::io::BufRead;

use httptap::domain::{EventKind, Fd, Origin, Pid, Timestamp};
use httptap::export::JsonLinesExporter;
use httptap::probes::{CapturedEvent, EventProcessor};

fn event(pid: u32, kind: EventKind, payload: &[u8]) -> CapturedEvent {
    CapturedEvent {
        timestamp_ns: Timestamp(123_456_789),
        origin: Origin::new(pid, pid + 1, 9),
        fd: Fd(12),
        kind,
        payload: payload.to_vec(),
    }
}

#[test]
fn test_export_file_has_one_json_object_per_line() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("http.jsonl");

    let mut exporter = JsonLinesExporter::create(&path).expect("Failed to create export file");
    exporter.write_event(&event(1, EventKind::Request, b"DELETE /items/3 HTTP/1.1\r\n")).unwrap();
    exporter.write_event(&event(1, EventKind::Response, b"HTTP/1.1 204 No Content\r\n")).unwrap();
    assert_eq!(exporter.finish().unwrap(), 2);

    let file = std::fs::File::open(&path).unwrap();
    let lines: Vec<serde_json::Value> = std::io::BufReader::new(file)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).expect("Invalid JSON line"))
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["kind"], "request");
    assert_eq!(lines[0]["start_line"]["method"], "DELETE");
    assert_eq!(lines[0]["origin"]["pid"], 1);
    assert_eq!(lines[0]["origin"]["tid"], 2);
    assert_eq!(lines[0]["origin"]["cgroup_id"], 9);
    assert_eq!(lines[1]["kind"], "response");
    assert_eq!(lines[1]["start_line"]["status"], 204);
    assert_eq!(lines[1]["payload"], "HTTP/1.1 204 No Content\r\n");
}

#[test]
fn test_processor_exports_only_filtered_process() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("filtered.jsonl");

    let exporter = JsonLinesExporter::create(&path).unwrap();
    let mut processor = EventProcessor::new(false, Some(Pid(50)), Some(exporter));
    for pid in [50, 51, 50, 52] {
        processor.process_event(&event(pid, EventKind::Request, b"GET / HTTP/1.1\r\n")).unwrap();
    }
    assert_eq!(processor.counts.filtered, 2);

    let written = processor.take_exporter().unwrap().finish().unwrap();
    assert_eq!(written, 2);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.lines().all(|l| l.contains("\"pid\":50")));
}

#[test]
fn test_create_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.jsonl");
    let err = JsonLinesExporter::create(&path).err().expect("create should fail");
    assert!(err.to_string().contains("out.jsonl"));
}
