//! Data Transfer Objects
//!
//! Documents Trellis hands to other systems. The compiled artifact is the
//! only one today: it is what the external execution engine consumes.

pub mod artifact;
