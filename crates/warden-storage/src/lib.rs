//! Warden Storage - SQLite review queue and queue export.
//!
//! This crate provides the durable side of the review queue:
//!
//! - [`SqliteReviewQueue`], a [`ReviewRepository`](warden_core::ReviewRepository)
//!   that survives restarts and can be shared by processes on one host
//! - [`export_queue`], which writes a queue snapshot to a JSON file
//!
//! # Example
//!
//! ```no_run
//! use warden_core::{Payload, ReviewItem, ReviewRepository, Severity};
//! use warden_storage::SqliteReviewQueue;
//!
//! let queue = SqliteReviewQueue::in_memory().unwrap();
//! queue.append(ReviewItem::pending(
//!     "review_1".into(),
//!     Severity::High,
//!     "Business-critical topics detected: legal_advice",
//!     Payload::from("legal_advice"),
//! )).unwrap();
//!
//! let (path, _) = warden_storage::export_queue(&queue, std::path::Path::new("exports")).unwrap();
//! println!("{}", path.display());
//! ```

pub mod error;
pub mod export;
mod pool;
mod queue;
pub mod repository;
mod schema;

pub use error::{Result, StorageError};
pub use export::{export_queue, snapshot, QueueExport};
pub use pool::ConnectionPool;
pub use queue::SqliteReviewQueue;
pub use repository::ReviewsRepo;
