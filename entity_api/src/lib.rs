pub use entity::{notification_type, notifications, users, Id};

pub mod error;
pub mod notification;
pub mod user;
