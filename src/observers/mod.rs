//! Lifecycle observer subsystem.
//!
//! # Data Flow
//!
//! ```text
//! timeline::advance(record, state)
//!     → ObserverRegistry::notify(record)
//!         → every registered TimelineObserver, in registration order,
//!           synchronously on the transitioning task
//! ```
//!
//! # Design Decisions
//! - One normalized callable type: trait objects and closures both land in
//!   `Arc<dyn TimelineObserver>`
//! - Registration order is notification order (a Vec, not a map)
//! - Observers are infallible by signature; anything fallible inside an
//!   observer is the observer's own job to handle

pub mod log;
pub mod registry;

pub use log::LogObserver;
pub use registry::{ObserverRegistry, RegisterError, TimelineObserver};
