//! End-to-end test support for the Engram memory engine

pub mod harness;
