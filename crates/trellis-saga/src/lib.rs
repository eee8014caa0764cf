//! Trellis Saga
//!
//! Compensation support: a [`Saga`] pairs one forward primitive with a
//! compensating primitive, and a [`SagaChain`] runs a sequence of such pairs,
//! unwinding completed steps in reverse when a later one fails. Compensation
//! always runs on a detached context so an in-flight cancellation cannot
//! leave completed work un-compensated. Every forward and compensation
//! outcome can be recorded in a shared [`SagaAudit`] trail.

mod audit;
mod chain;
mod saga;

pub use audit::{SagaAction, SagaAudit, SagaAuditEntry};
pub use chain::{SagaChain, SagaStep};
pub use saga::Saga;
