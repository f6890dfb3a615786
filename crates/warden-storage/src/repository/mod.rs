//! Database repositories for each table.

pub mod reviews;

pub use reviews::ReviewsRepo;
