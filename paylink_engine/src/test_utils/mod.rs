//! Helpers for integration tests: throw-away SQLite databases and in-memory stand-ins for the processor and the
//! messaging channel.
pub mod fakes;
pub mod prepare_env;
