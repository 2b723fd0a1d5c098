// Payload Tests - Testing ParticipantIds and AttachmentRefs

use crate::storage::settings::{MAX_ATTACHMENTS, MAX_PARTICIPANTS};
use crate::storage::{AttachmentRefs, ParticipantIds};

#[test]
fn test_participant_ids_parse_valid() {
    let ids = ParticipantIds::parse(r#"["u1","a7"]"#);
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("u1"));
    assert!(ids.contains("a7"));
    assert_eq!(ids.iter().collect::<Vec<_>>(), vec!["u1", "a7"]);
}

#[test]
fn test_participant_ids_parse_malformed() {
    assert!(ParticipantIds::parse("u1,a7").is_empty());
    assert!(ParticipantIds::parse(r#"{"u1": true}"#).is_empty());
    assert!(ParticipantIds::parse("").is_empty());
    assert!(ParticipantIds::parse("   ").is_empty());
}

#[test]
fn test_participant_ids_skip_non_strings() {
    let ids = ParticipantIds::parse(r#"["u1", 7, null, "", "a7"]"#);
    assert_eq!(ids.iter().collect::<Vec<_>>(), vec!["u1", "a7"]);
}

#[test]
fn test_participant_ids_deduplicate_and_bound() {
    let ids = ParticipantIds::new(vec!["u1".to_string(), "u1".to_string(), "a7".to_string()]);
    assert_eq!(ids.len(), 2);

    let many: Vec<String> = (0..20).map(|i| format!("p{}", i)).collect();
    let ids = ParticipantIds::new(many);
    assert_eq!(ids.len(), MAX_PARTICIPANTS);
    assert!(ids.contains("p0"));
    assert!(!ids.contains("p19"));
}

#[test]
fn test_participant_ids_other_than() {
    let ids = ParticipantIds::parse(r#"["u1","a7"]"#);
    assert_eq!(ids.other_than("u1"), Some("a7"));
    assert_eq!(ids.other_than("a7"), Some("u1"));

    let alone = ParticipantIds::parse(r#"["u1"]"#);
    assert_eq!(alone.other_than("u1"), None);
}

#[test]
fn test_participant_ids_payload_roundtrip() {
    let ids = ParticipantIds::new(vec!["u1".to_string(), "a7".to_string()]);
    let payload = ids.to_payload();
    assert_eq!(payload, r#"["u1","a7"]"#);
    assert_eq!(ParticipantIds::parse(&payload), ids);
}

#[test]
fn test_attachment_refs_bounded() {
    let refs: Vec<String> = (0..7).map(|i| format!("file{}.jpg", i)).collect();
    let attachments = AttachmentRefs::new(refs);
    assert_eq!(attachments.len(), MAX_ATTACHMENTS);
    assert_eq!(attachments.as_slice()[0], "file0.jpg");

    let parsed = AttachmentRefs::parse(
        r#"["a.jpg","b.jpg","c.jpg","d.jpg","e.jpg","f.jpg"]"#,
    );
    assert_eq!(parsed.len(), MAX_ATTACHMENTS);
}

#[test]
fn test_attachment_refs_malformed() {
    let parsed = AttachmentRefs::parse("[\"a.jpg\"");
    assert!(parsed.is_empty());
    assert_eq!(parsed.to_payload(), "[]");
}
