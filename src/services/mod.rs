pub mod conversation_service;
pub mod encryption;
pub mod media_store;
pub mod message_service;
pub mod profile_service;
