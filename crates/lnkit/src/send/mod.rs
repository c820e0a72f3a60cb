//! Sending payments

pub mod saga;
