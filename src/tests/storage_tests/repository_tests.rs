// Repository Tests - Testing the typed repositories and document parsing

use crate::storage::{
    AttachmentRefs, Collection, ConversationPatch, ConversationType, MessagePatch, MessageStatus,
    ParticipantRole, PropertyRef, ReplyRef,
};
use crate::tests::helpers::{
    agent, create_test_conversation, create_test_message, create_test_repos, insert_raw, ts, user,
};
use crate::Error;
use serde_json::json;

#[tokio::test]
async fn test_conversation_roundtrip() {
    let (_store, repos) = create_test_repos();
    let jane = user("u1", "Jane");
    let mut conversation = create_test_conversation("c1", &jane, "a1", ts(2024, 3, 4, 9, 0));
    conversation.kind = ConversationType::Inquiry;
    conversation.subject = Some("Viewing".to_string());
    conversation.property_ref = Some(PropertyRef {
        id: "p1".to_string(),
        title: "Sunny loft".to_string(),
    });
    conversation.record_message("u1", "Is it available?".to_string(), ts(2024, 3, 4, 9, 1));

    repos
        .conversations
        .create(&conversation)
        .await
        .expect("Failed to create conversation");

    let stored = repos
        .conversations
        .get("c1")
        .await
        .expect("Failed to get conversation")
        .expect("Conversation should exist");
    assert_eq!(stored, conversation);
}

#[tokio::test]
async fn test_message_roundtrip() {
    let (_store, repos) = create_test_repos();
    let jane = user("u1", "Jane");
    let mut message = create_test_message("m1", "c1", &jane, "Floor plan attached", ts(2024, 3, 4, 9, 0));
    message.attachment_refs = AttachmentRefs::new(vec!["plan.pdf".to_string()]);
    message.reply_to = Some(ReplyRef {
        id: "m0".to_string(),
        preview_text: "Can you send the plan?".to_string(),
        original_sender_name: "John Doe".to_string(),
    });

    repos.messages.create(&message).await.expect("Failed to create message");

    let stored = repos
        .messages
        .get("m1")
        .await
        .expect("Failed to get message")
        .expect("Message should exist");
    assert_eq!(stored, message);
}

#[tokio::test]
async fn test_list_for_participant_order_and_archive() {
    let (_store, repos) = create_test_repos();
    let jane = user("u1", "Jane");

    let mut older = create_test_conversation("c1", &jane, "a1", ts(2024, 3, 1, 9, 0));
    older.record_message("u1", "first".to_string(), ts(2024, 3, 1, 9, 0));
    let mut newer = create_test_conversation("c2", &jane, "a2", ts(2024, 3, 2, 9, 0));
    newer.record_message("u1", "second".to_string(), ts(2024, 3, 5, 9, 0));
    let mut archived = create_test_conversation("c3", &jane, "a3", ts(2024, 3, 3, 9, 0));
    archived.is_archived = true;
    let foreign = create_test_conversation("c4", &user("u9", "Other"), "a1", ts(2024, 3, 6, 9, 0));

    for conversation in [&older, &newer, &archived, &foreign] {
        repos
            .conversations
            .create(conversation)
            .await
            .expect("Failed to create conversation");
    }

    let listed = repos
        .conversations
        .list_for_participant("u1", false, 50)
        .await
        .expect("Failed to list conversations");
    let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c1"]);

    let with_archived = repos
        .conversations
        .list_for_participant("u1", true, 50)
        .await
        .expect("Failed to list conversations");
    let ids: Vec<&str> = with_archived.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c3", "c1"]);

    let limited = repos
        .conversations
        .list_for_participant("u1", true, 1)
        .await
        .expect("Failed to list conversations");
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_legacy_two_counter_layout() {
    let (store, repos) = create_test_repos();
    insert_raw(
        store.as_ref(),
        Collection::Conversations,
        json!({
            "id": "legacy",
            "initiator_id": "u1",
            "initiator_name": "Jane",
            "initiator_role": "user",
            "participant_ids": "[\"u1\",\"a1\"]",
            "type": "inquiry",
            "last_message_at": 1_709_542_800_000_i64,
            "unread_for_initiator": 2,
            "unread_for_other_party": 5,
            "is_archived": false,
            "created_at": 1_709_542_800_000_i64
        }),
    )
    .await;

    let conversation = repos
        .conversations
        .get("legacy")
        .await
        .expect("Failed to get conversation")
        .expect("Conversation should exist");
    assert_eq!(conversation.unread_for("u1"), 2);
    assert_eq!(conversation.unread_for("a1"), 5);
    assert_eq!(conversation.kind, ConversationType::Inquiry);

    // Written back in the per-participant layout
    let updated = repos
        .conversations
        .update(
            "legacy",
            ConversationPatch {
                unread: Some(conversation.unread.clone()),
                ..ConversationPatch::default()
            },
        )
        .await
        .expect("Failed to update conversation");
    assert_eq!(updated.unread_for("a1"), 5);
}

#[tokio::test]
async fn test_malformed_payloads_degrade() {
    let (store, repos) = create_test_repos();
    insert_raw(
        store.as_ref(),
        Collection::Conversations,
        json!({
            "id": "broken",
            "initiator_id": "u1",
            "initiator_role": "landlord",
            "participant_ids": "u1;a1",
            "type": "chat",
            "property_ref": "p1",
            "is_archived": false
        }),
    )
    .await;
    insert_raw(
        store.as_ref(),
        Collection::Messages,
        json!({
            "id": "m1",
            "conversation_id": "broken",
            "sender_id": "u1",
            "content": "hi",
            "attachment_refs": "not a list",
            "status": "queued",
            "created_at": 1_709_542_800_000_i64
        }),
    )
    .await;

    let conversation = repos
        .conversations
        .get("broken")
        .await
        .expect("Failed to get conversation")
        .expect("Conversation should still be readable");
    assert!(conversation.participant_ids.is_empty());
    assert_eq!(conversation.initiator_role, ParticipantRole::User);
    assert_eq!(conversation.kind, ConversationType::General);
    assert!(conversation.property_ref.is_none());

    let messages = repos
        .messages
        .list_for_conversation("broken", 50)
        .await
        .expect("Failed to list messages");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].attachment_refs.is_empty());
    assert_eq!(messages[0].status, MessageStatus::Sent);
}

#[tokio::test]
async fn test_array_payloads_accepted() {
    let (store, repos) = create_test_repos();
    insert_raw(
        store.as_ref(),
        Collection::Conversations,
        json!({
            "id": "c1",
            "initiator_id": "u1",
            "participant_ids": ["u1", "a1"],
            "is_archived": false,
            "last_message_at": 1
        }),
    )
    .await;

    let listed = repos
        .conversations
        .list_for_participant("a1", false, 10)
        .await
        .expect("Failed to list conversations");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].participant_ids.len(), 2);
}

#[tokio::test]
async fn test_unreadable_document_skipped() {
    let (store, repos) = create_test_repos();
    let jane = user("u1", "Jane");
    repos
        .messages
        .create(&create_test_message("m1", "c1", &jane, "ok", ts(2024, 3, 4, 9, 0)))
        .await
        .expect("Failed to create message");
    insert_raw(
        store.as_ref(),
        Collection::Messages,
        json!({
            "id": "m2",
            "conversation_id": "c1",
            "created_at": "yesterday"
        }),
    )
    .await;

    let messages = repos
        .messages
        .list_for_conversation("c1", 50)
        .await
        .expect("Failed to list messages");
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1"]);
}

#[tokio::test]
async fn test_messages_listed_in_creation_order() {
    let (_store, repos) = create_test_repos();
    let jane = user("u1", "Jane");
    let john = agent("a1", "John Doe");

    for message in [
        create_test_message("m3", "c1", &jane, "third", ts(2024, 3, 4, 9, 30)),
        create_test_message("m1", "c1", &john, "first", ts(2024, 3, 4, 9, 0)),
        create_test_message("m2", "c1", &jane, "second", ts(2024, 3, 4, 9, 10)),
        create_test_message("x1", "c2", &jane, "elsewhere", ts(2024, 3, 4, 9, 5)),
    ] {
        repos.messages.create(&message).await.expect("Failed to create message");
    }

    let messages = repos
        .messages
        .list_for_conversation("c1", 50)
        .await
        .expect("Failed to list messages");
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_message_update_returns_stored_record() {
    let (_store, repos) = create_test_repos();
    let jane = user("u1", "Jane");
    repos
        .messages
        .create(&create_test_message("m1", "c1", &jane, "Hi", ts(2024, 3, 4, 9, 0)))
        .await
        .expect("Failed to create message");

    let updated = repos
        .messages
        .update(
            "m1",
            MessagePatch {
                status: Some(MessageStatus::Delivered),
                ..MessagePatch::default()
            },
        )
        .await
        .expect("Failed to update message");
    assert_eq!(updated.status, MessageStatus::Delivered);
    assert_eq!(updated.content, "Hi");

    let missing = repos.messages.update("nope", MessagePatch::default()).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));
}
