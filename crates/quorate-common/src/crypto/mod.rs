//! Cryptographic primitives for Quorate

pub mod ecdsa;
