// Conversation Tests - Testing Conversation records and roles

use crate::storage::{ConversationType, ParticipantIds, ParticipantRole};
use crate::tests::helpers::{agent, create_test_conversation, ts, user};

#[test]
fn test_participant_role_from_raw() {
    assert_eq!(ParticipantRole::from_raw("agent"), ParticipantRole::Agent);
    assert_eq!(ParticipantRole::from_raw(" Agency "), ParticipantRole::Agency);
    assert_eq!(ParticipantRole::from_raw("ADMIN"), ParticipantRole::Admin);
    assert_eq!(ParticipantRole::from_raw("landlord"), ParticipantRole::User);
    assert_eq!(ParticipantRole::Agency.as_str(), "agency");
}

#[test]
fn test_counterpart_roles() {
    assert_eq!(
        ParticipantRole::User.counterpart_roles(),
        vec![ParticipantRole::Agent, ParticipantRole::Agency]
    );
    assert_eq!(ParticipantRole::Agent.counterpart_roles(), vec![ParticipantRole::User]);
    assert_eq!(ParticipantRole::Agency.counterpart_roles(), vec![ParticipantRole::User]);
    assert_eq!(ParticipantRole::Admin.counterpart_roles().len(), 4);
    assert!(ParticipantRole::Agent.is_professional());
    assert!(!ParticipantRole::User.is_professional());
}

#[test]
fn test_conversation_type_from_raw() {
    assert_eq!(ConversationType::from_raw("inquiry"), ConversationType::Inquiry);
    assert_eq!(ConversationType::from_raw("support"), ConversationType::Support);
    assert_eq!(ConversationType::from_raw("chat"), ConversationType::General);
    assert_eq!(ConversationType::Inquiry.as_str(), "inquiry");
}

#[test]
fn test_new_conversation_has_zero_unread() {
    let jane = user("u1", "Jane");
    let conversation = create_test_conversation("c1", &jane, "a1", ts(2024, 3, 4, 9, 0));

    assert_eq!(conversation.unread_for("u1"), 0);
    assert_eq!(conversation.unread_for("a1"), 0);
    assert_eq!(conversation.unread.len(), 2);
    assert!(conversation.is_initiator("u1"));
    assert!(!conversation.is_initiator("a1"));
    assert_eq!(conversation.last_message_at, conversation.created_at);
}

#[test]
fn test_record_message_counts_for_everyone_but_sender() {
    let jane = user("u1", "Jane");
    let mut conversation = create_test_conversation("c1", &jane, "a1", ts(2024, 3, 4, 9, 0));

    conversation.record_message("u1", "Hello".to_string(), ts(2024, 3, 4, 9, 5));
    assert_eq!(conversation.unread_for("a1"), 1);
    assert_eq!(conversation.unread_for("u1"), 0);
    assert_eq!(conversation.last_message_preview, "Hello");
    assert_eq!(conversation.last_message_sender_id, "u1");
    assert_eq!(conversation.last_message_at, ts(2024, 3, 4, 9, 5));

    conversation.record_message("u1", "Still there?".to_string(), ts(2024, 3, 4, 9, 6));
    conversation.record_message("a1", "Yes".to_string(), ts(2024, 3, 4, 9, 7));
    assert_eq!(conversation.unread_for("a1"), 2);
    assert_eq!(conversation.unread_for("u1"), 1);
    assert_eq!(conversation.unread_for_initiator(), 1);
    assert_eq!(conversation.unread_for_other_party(), 2);
}

#[test]
fn test_mark_read_by_resets_only_viewer() {
    let john = agent("a1", "John Doe");
    let mut conversation = create_test_conversation("c1", &john, "u1", ts(2024, 3, 4, 9, 0));
    conversation.record_message("a1", "Hi".to_string(), ts(2024, 3, 4, 9, 1));
    conversation.record_message("u1", "Hello".to_string(), ts(2024, 3, 4, 9, 2));

    assert!(conversation.mark_read_by("u1"));
    assert_eq!(conversation.unread_for("u1"), 0);
    assert_eq!(conversation.unread_for("a1"), 1);

    // Already zero
    assert!(!conversation.mark_read_by("u1"));
    // Not a participant
    assert!(!conversation.mark_read_by("x9"));
}

#[test]
fn test_record_message_without_participant_list() {
    let jane = user("u1", "Jane");
    let mut conversation = create_test_conversation("c1", &jane, "a1", ts(2024, 3, 4, 9, 0));
    conversation.participant_ids = ParticipantIds::default();

    // The other party writes: the initiator is the recipient
    conversation.record_message("a1", "Is this available?".to_string(), ts(2024, 3, 4, 9, 5));
    assert_eq!(conversation.unread_for("u1"), 1);
    assert_eq!(conversation.unread_for("a1"), 0);

    // The initiator writes: recipients come from the tracked counters
    conversation.record_message("u1", "Yes".to_string(), ts(2024, 3, 4, 9, 6));
    assert_eq!(conversation.unread_for("u1"), 1);
    assert_eq!(conversation.unread_for("a1"), 1);
    assert_eq!(conversation.last_message_sender_id, "u1");
}
