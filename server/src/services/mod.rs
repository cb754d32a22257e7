//! Image editing services: staging, conversion, and request orchestration.

pub mod convert;
pub mod editor;
pub mod staging;
