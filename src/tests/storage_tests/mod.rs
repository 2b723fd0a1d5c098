// Storage Tests Module - Testing the storage module
// Tests organized by storage module functionality:
// - payload_tests: Serialized list payloads (parsing, bounds, malformed input)
// - conversation_tests: Conversation records (roles, unread bookkeeping)
// - message_tests: Message records (status, edits, tombstones, previews)
// - store_tests: SqliteStore (queries, merges, atomic batches)
// - repository_tests: Repository boundary (parsing, legacy counters, ordering)
// - settings_tests: Settings (defaults, persistence, validation)

mod payload_tests;
mod conversation_tests;
mod repository_tests;
mod settings_tests;
