//! In-process backend used by the CLI and integration tests.

pub mod dispatcher;
pub mod local;

pub use dispatcher::Dispatcher;
pub use local::LocalBackend;
