//! # Reconcile
//!
//! A small framework for idempotent state convergence.
//!
//! Every compound action follows the same contract: probe whether the
//! resource exists (read-only), decide what to do based on the declared
//! state, apply the change, and report whether anything changed. The
//! decision order is fixed and shared by every implementation, so a
//! reconciler only supplies the probe and the create/delete primitives.
//!
//! ## Core Concepts
//!
//! - **Reconcile**: the per-kind contract (probe, create, delete)
//! - **DeclaredState**: the end-state a step declares for a resource
//! - **Outcome**: what `converge` did, with `changed()` gating notifies
//!
//! ## Example
//!
//! ```
//! use reconcile::{converge, DeclaredState, Outcome, Reconcile};
//!
//! struct Marker { present: std::cell::Cell<bool>, state: DeclaredState }
//!
//! impl Reconcile for Marker {
//!     type Error = std::convert::Infallible;
//!
//!     fn kind(&self) -> &'static str { "marker" }
//!     fn name(&self) -> &str { "demo" }
//!     fn state(&self) -> &DeclaredState { &self.state }
//!     fn exists(&self) -> Result<bool, Self::Error> { Ok(self.present.get()) }
//!     fn create(&self) -> Result<(), Self::Error> { self.present.set(true); Ok(()) }
//!     fn delete(&self) -> Result<(), Self::Error> { self.present.set(false); Ok(()) }
//! }
//!
//! let marker = Marker { present: false.into(), state: DeclaredState::Present };
//! assert!(converge(&marker).unwrap().changed());
//! assert!(!converge(&marker).unwrap().changed());
//! ```

pub mod reconciler;
pub mod state;

pub use reconciler::{converge, Outcome, Reconcile};
pub use state::DeclaredState;
