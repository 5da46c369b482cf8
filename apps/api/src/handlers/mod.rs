// [apps/api/src/handlers/mod.rs]
pub mod automations;
pub mod connections;
pub mod events;
pub mod feedback;
