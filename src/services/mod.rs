pub mod backend;
pub mod cache;
pub mod clock;
pub mod commands;
pub mod conflict;
pub mod coordinator;
pub mod events;
pub mod lock;
pub mod resync;
pub mod retry;
pub mod standardizer;
pub mod store;
pub mod swap;
