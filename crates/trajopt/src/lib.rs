//! Low-thrust transfer optimizer: direct transcription of the two-body transfer
//! problem, solved by an augmented-Lagrangian back-end and verified afterwards.

pub mod request;
pub mod solve;
pub mod transcription;
pub mod verify;

pub use facade::*;

mod facade;
