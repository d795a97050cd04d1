//! Utility functions shared by the pipelines

pub mod validation;
