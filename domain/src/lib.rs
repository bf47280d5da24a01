//! This module re-exports the entity types the notification layer hands out, so
//! consumers of the `domain` crate do not need to depend on `entity_api` or
//! `entity` directly.
pub use entity_api::{notification_type, notifications, users, Id};

pub mod error;
pub mod jwt;
pub mod notification;
pub mod unit_of_work;
