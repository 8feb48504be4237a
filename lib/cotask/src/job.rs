use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// A fault raised by a job during execution. Carries a formatted message;
/// the scheduler attaches the offending task id and routes the result to
/// the diagnostic sink, then moves on — a job fault is never fatal to the
/// scheduler.
#[derive(Debug, Clone)]
pub struct JobFault(String);

impl JobFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for JobFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A schedulable unit of work: a name (for `status()` and diagnostics,
/// since closures carry no runtime-inspectable name the way a Python
/// function has `__name__`) and the callable itself.
///
/// A job returns `Result<(), JobFault>` rather than panicking on failure:
/// idiomatic Rust error handling already gives the scheduler a contained,
/// non-unwinding way to observe and log a failed run, which is the
/// Rust-native equivalent of catching an arbitrary exception around the
/// job call.
pub struct Job<M> {
    pub name: &'static str,
    func: Box<dyn FnMut(M) -> Result<(), JobFault> + 'static>,
}

impl<M> Job<M> {
    /// Creates a named job. `name` shows up in [`crate::TaskStatus`] and in
    /// fault diagnostics.
    pub fn named(name: &'static str, func: impl FnMut(M) -> Result<(), JobFault> + 'static) -> Self {
        Self {
            name,
            func: Box::new(func),
        }
    }

    /// Creates a job with no name (`"anonymous"` in status output),
    /// mirroring the original's fallback for closures without a
    /// `__name__`.
    pub fn anonymous(func: impl FnMut(M) -> Result<(), JobFault> + 'static) -> Self {
        Self::named("anonymous", func)
    }

    pub(crate) fn call(&mut self, params: M) -> Result<(), JobFault> {
        (self.func)(params)
    }
}
