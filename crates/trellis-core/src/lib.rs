//! Trellis Core
//!
//! The single contract every building block implements - [`Primitive`] -
//! together with the shared error taxonomy and the two composition
//! operators, [`Sequential`] and [`Parallel`]. Everything else in the
//! workspace depends on this crate.

mod error;
mod outcome;
mod parallel;
mod primitive;
mod sequential;

pub use error::{PrimitiveError, PrimitiveResult};
pub use outcome::Outcome;
pub use parallel::Parallel;
pub use primitive::{FnPrimitive, Primitive, SharedPrimitive, from_fn};
pub use sequential::Sequential;

pub use trellis_context::ExecutionContext;
