//! Request handlers.

pub mod alerts;
pub mod cases;
pub mod links;
pub mod reports;
