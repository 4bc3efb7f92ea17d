//! Maintenance jobs.
//!
//! Two jobs keep the store tidy:
//!
//! - [`CacheExpiryService`] purges conflict-path cache entries whose
//!   `expires_at` has passed.
//! - [`JobScheduler`] runs the sweep and the shared-employment inference pass
//!   on intervals until Ctrl-C.
//!
//! # Example
//!
//! ```rust
//! use conflict_graph::gc::CacheExpiryService;
//! use conflict_graph::storage::InMemoryGraphBackend;
//! use std::sync::Arc;
//!
//! let service = CacheExpiryService::new(Arc::new(InMemoryGraphBackend::new()));
//!
//! // Dry run to see what would be purged
//! let result = service.sweep(true).unwrap();
//! assert_eq!(result.entries_purged, 0);
//! ```

mod expiration;
mod scheduler;

pub use expiration::{CacheExpiryService, SweepResult};
pub use scheduler::{JobScheduler, SchedulerReport};
