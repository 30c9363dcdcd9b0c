use fetchkit::{Headers, NetError};
use std::collections::HashMap;

#[test]
fn test_append_joins_values_case_insensitively() {
    let mut headers = Headers::try_from([("X-A", "1")]).unwrap();
    headers.append("x-a", "2").unwrap();

    assert_eq!(headers.get("X-A").as_deref(), Some("1, 2"));
    assert_eq!(headers.get("x-A").as_deref(), Some("1, 2"));
}

#[test]
fn test_iteration_preserves_creation_order() {
    let mut headers = Headers::new();
    headers.append("Host", "example.com").unwrap();
    headers.append("Connection", "keep-alive").unwrap();
    headers.append("User-Agent", "fetchkit/0.1").unwrap();
    headers.append("Accept", "*/*").unwrap();

    let names: Vec<&str> = headers.keys().collect();
    assert_eq!(names, ["Host", "Connection", "User-Agent", "Accept"]);
}

#[test]
fn test_set_keeps_position() {
    let mut headers = Headers::new();
    headers.append("A", "1").unwrap();
    headers.append("B", "2").unwrap();
    headers.append("C", "3").unwrap();

    headers.set("b", "22").unwrap();

    let pairs: Vec<(&str, String)> = headers.iter().collect();
    assert_eq!(
        pairs,
        [("A", "1".to_string()), ("B", "22".to_string()), ("C", "3".to_string())]
    );
}

#[test]
fn test_delete_then_append_moves_to_end() {
    let mut headers = Headers::new();
    headers.append("A", "1").unwrap();
    headers.append("B", "2").unwrap();

    assert!(headers.delete("a"));
    assert!(!headers.delete("a"));
    headers.append("a", "3").unwrap();

    let names: Vec<&str> = headers.keys().collect();
    assert_eq!(names, ["B", "a"]);
}

#[test]
fn test_iteration_is_restartable() {
    let headers = Headers::try_from([("X-One", "1"), ("X-Two", "2")]).unwrap();
    assert_eq!(headers.iter().count(), 2);
    assert_eq!(headers.iter().count(), 2);
}

#[test]
fn test_values_are_trimmed() {
    let mut headers = Headers::new();
    headers.append("  Accept ", "\t text/html  ").unwrap();
    assert_eq!(headers.get("accept").as_deref(), Some("text/html"));
    assert_eq!(headers.keys().next(), Some("Accept"));
}

#[test]
fn test_invalid_names_rejected() {
    let mut headers = Headers::new();
    assert_eq!(headers.append("   ", "x"), Err(NetError::EmptyHeaderName));
    assert!(matches!(
        headers.append("Bad Name", "x"),
        Err(NetError::InvalidHeaderName { .. })
    ));
    assert!(matches!(
        headers.append("X-Ok", "a\nb"),
        Err(NetError::InvalidHeaderValue { .. })
    ));
    assert!(headers.is_empty());
}

#[test]
fn test_from_map_and_pairs() {
    let map = HashMap::from([("Content-Type".to_string(), "text/plain".to_string())]);
    let headers = Headers::try_from(map).unwrap();
    assert!(headers.has("content-type"));

    let pairs = vec![
        ("Accept".to_string(), "a".to_string()),
        ("accept".to_string(), "b".to_string()),
    ];
    let headers = Headers::try_from(pairs).unwrap();
    assert_eq!(headers.get_all("ACCEPT"), ["a", "b"]);
    assert_eq!(
        headers.to_map(),
        HashMap::from([("Accept".to_string(), "a, b".to_string())])
    );
}

#[test]
fn test_many_headers() {
    let mut headers = Headers::new();
    for i in 0..200 {
        headers.append(&format!("X-Header-{i}"), i).unwrap();
    }
    assert_eq!(headers.len(), 200);
    assert_eq!(headers.get("x-header-150").as_deref(), Some("150"));
    assert_eq!(headers.keys().last(), Some("X-Header-199"));
}
