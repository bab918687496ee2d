//! Direct (factorization-based) solvers for small dense systems

pub mod lu;

pub use lu::LuFactorization;
