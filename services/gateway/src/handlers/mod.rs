pub mod chat;
pub mod health;
pub mod messages;
pub mod models;
pub mod quota;
