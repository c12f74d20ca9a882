//! cadence-service: persistence and request handling around the dose engine.

pub mod error;
pub mod json_file;
pub mod memory;
pub mod service;
pub mod store;

pub use error::{ServiceError, ServiceResult};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use service::{ReminderService, TakenAck};
pub use store::{Mutation, ReminderQuery, ReminderStore, Snapshot};
