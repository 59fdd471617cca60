#![allow(clippy::should_implement_trait, clippy::if_same_then_else)]

pub mod stackmap;
pub mod value;
