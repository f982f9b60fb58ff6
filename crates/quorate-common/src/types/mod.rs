//! Core entities for Quorate

pub mod approval;
pub mod identity;
pub mod proposal;
