pub mod executor;

pub use executor::{ExecError, Invocation, ProcessExecutor, ProcessOutput, TokioExecutor};
