//! Data types shared between the HTTP API and the storage layer.

pub mod account;
pub mod application;
pub mod datetime;
pub mod election;
pub mod email;
pub mod id;
pub mod notification;
pub mod vote;
