//! Core functionality: the package graph, session planning, and the
//! producer and consumer workflows built on top of it

pub mod build_env;
pub mod builder;
pub mod bump;
pub mod deploy;
pub mod layout;
pub mod machine;
pub mod manifest;
pub mod predicate;
pub mod selector;
pub mod spec;
pub mod stage;
