//! Game solvers for the dispute challenger.
//!
//! The [fault] module holds the local model of a fault dispute game, the trace providers that
//! supply our view of the disputed execution, and the bisection solver deciding how to respond.

pub mod fault;
