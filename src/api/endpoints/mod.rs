//! API endpoint handlers.
//!
//! One module per client surface. Handlers stay thin and delegate to the
//! domain modules.

pub mod bookings;
pub mod chat;
pub mod health;
pub mod promos;
pub mod reports;
pub mod tests;
