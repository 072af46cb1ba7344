use chrono::{TimeZone, Utc};
use gotrace::clock::BootClock;
use gotrace::export::JsonExporter;
use gotrace::probes::EventProcessor;
use gotrace_common::{CallEvent, ReturnEvent};

fn clock() -> BootClock {
    BootClock::from_monotonic(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 0)
}

fn call(tid: u32, ts: u64, arg: &[u8]) -> CallEvent {
    let mut event = CallEvent::zeroed();
    event.thread_id = tid;
    event.timestamp_ns = ts;
    event.length = u32::try_from(arg.len()).unwrap();
    event.payload[..arg.len()].copy_from_slice(arg);
    event
}

fn ret(tid: u32, ts: u64, value: &[u8], elapsed: Option<u64>) -> ReturnEvent {
    let mut event = ReturnEvent::zeroed();
    event.thread_id = tid;
    event.timestamp_ns = ts;
    event.payload[..value.len()].copy_from_slice(value);
    if let Some(elapsed) = elapsed {
        event.elapsed_ns = elapsed;
        event.present = 1;
    }
    event
}

#[test]
fn test_export_creates_valid_json() {
    let exporter = JsonExporter::new("/srv/app", &["main.getUserByID".to_string()]);
    let mut processor = EventProcessor::new(true, clock(), Some(exporter));

    processor.process_call_sample(&call(7, 1_000, b"user-42").to_bytes());
    processor.process_return_sample(&ret(7, 1_500, b"alice", Some(500)).to_bytes());
    processor.process_return_sample(&ret(9, 2_000, b"", None).to_bytes());

    let exporter = processor.take_exporter().expect("exporter configured");
    let mut buffer = Vec::new();
    exporter.export(&mut buffer, &processor.stats).expect("Failed to export trace");

    let json_str = String::from_utf8(buffer).expect("Invalid UTF-8");
    let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("Invalid JSON");

    assert_eq!(parsed["target"], "/srv/app");
    assert_eq!(parsed["symbols"][0], "main.getUserByID");

    let calls = parsed["calls"].as_array().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["payload"], "user-42");
    assert_eq!(calls[0]["length"], 7);
    assert_eq!(calls[0]["thread_id"], 7);
    assert_eq!(calls[0]["wall_time"], "2024-01-01T00:00:00.000001Z");

    let returns = parsed["returns"].as_array().unwrap();
    assert_eq!(returns.len(), 2);
    assert_eq!(returns[0]["payload"], "alice");
    assert_eq!(returns[0]["elapsed_ns"], 500);
    assert!(returns[1]["elapsed_ns"].is_null());

    assert_eq!(parsed["stats"]["calls"], 1);
    assert_eq!(parsed["stats"]["returns_timed"], 1);
    assert_eq!(parsed["stats"]["returns_untimed"], 1);
}

#[test]
fn test_empty_export_is_still_a_document() {
    let exporter = JsonExporter::new("/srv/app", &[]);
    assert!(exporter.is_empty());

    let mut buffer = Vec::new();
    exporter.export(&mut buffer, &gotrace::probes::TraceStats::default()).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
    assert_eq!(parsed["calls"].as_array().map(Vec::len), Some(0));
    assert_eq!(parsed["returns"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_call_payload_keeps_embedded_nul() {
    let exporter = JsonExporter::new("/srv/app", &["main.lookup".to_string()]);
    let mut processor = EventProcessor::new(true, clock(), Some(exporter));
    processor.process_call_sample(&call(3, 10, b"ab\0cd").to_bytes());

    let mut buffer = Vec::new();
    let exporter = processor.take_exporter().unwrap();
    exporter.export(&mut buffer, &processor.stats).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

    let record = &parsed["calls"][0];
    assert_eq!(record["length"], 5);
    assert_eq!(record["payload"], "ab\0cd");
    assert_eq!(record["payload"].as_str().map(str::len), Some(5));
}
