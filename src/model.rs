pub mod conversation;
pub mod envelope;
pub mod event;
