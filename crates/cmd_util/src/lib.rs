//! Process-level helpers shared by every binary and test in the workspace:
//! environment knobs and tracing setup.
pub mod env;
