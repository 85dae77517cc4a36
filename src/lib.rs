//! A chat bot that hands out single-use codes.
//!
//! Admins add codes under an item name, users receive the oldest code of an
//! item by direct message, at most once per cooldown. Stock survives restarts
//! in a JSON file; cooldowns do not.

pub mod command;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod ledger;
pub mod render;
pub mod response;
