//! Shared primitives for the Stencil template analyzer.

pub mod span;

pub use span::{LineIndex, Position, Span};
