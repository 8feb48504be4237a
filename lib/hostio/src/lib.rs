//! Host capabilities injected into the scheduler: a clock, a sleep
//! primitive, a diagnostic sink, and a deferred-dispatch primitive.
//!
//! None of these are scheduling logic. They are the seam between
//! `cotask` and whatever the real platform looks like, the same role
//! `userlib` plays for the rest of its workspace: the kernel never reads
//! a hardware timer directly, it asks a `Clock`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::boxed::Box;
use core::fmt;

/// A monotonic millisecond counter. Implementations may wrap at `u32::MAX`;
/// all comparisons against a `Clock` must go through [`ticks_diff`] rather
/// than raw `<`/`>`, or a wrap will invert ordering.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Blocking millisecond sleep, used only at the scheduler main loop's
/// sleep points.
pub trait Sleep {
    fn sleep_ms(&self, ms: u32);
}

/// A diagnostic sink: accepts formatted text, never fails, never blocks
/// indefinitely. Routed through a [`Deferred`] primitive at call sites
/// that need to stay out of interrupt/fault context; see [`diag!`].
pub trait Sink {
    fn emit(&self, args: fmt::Arguments<'_>);
}

/// Enqueues a callable for execution outside the current (possibly
/// restricted) context. On a host with no such concept, implementations
/// are expected to just call `f` inline.
pub trait Deferred {
    fn defer(&self, f: Box<dyn FnOnce() + 'static>);
}

/// The full set of capabilities a scheduler needs from its host, bundled
/// into one bound so consumers only carry a single type parameter. Any
/// type implementing the four leaf traits gets this for free.
pub trait Runtime: Clock + Sleep + Sink + Deferred {}

impl<T: Clock + Sleep + Sink + Deferred> Runtime for T {}

/// Signed, wraparound-tolerant difference `a - b` between two millisecond
/// timestamps from the same [`Clock`]. This is the only arithmetic that
/// may legally compare two `Clock` readings.
pub fn ticks_diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

/// Formats `$fmt` with `$args` and routes it to `$sink`, so call sites read
/// like `diag!(sink, "task {} faulted: {}", id, e)` instead of constructing
/// `core::fmt::Arguments` by hand. There is no compile-time "logging
/// disabled" stub: the sink is always a concrete value, so a no-op sink
/// (one whose `emit` does nothing) is the equivalent knob.
#[macro_export]
macro_rules! diag {
    ($sink:expr, $($arg:tt)*) => {
        $sink.emit(core::format_args!($($arg)*))
    };
}

#[cfg(feature = "std")]
mod std_impls {
    use super::{Clock, Deferred, Sink, Sleep};
    use alloc::boxed::Box;
    use std::time::Instant;

    /// [`Clock`] backed by [`std::time::Instant`], truncated to 32 bits of
    /// milliseconds. Good enough for host testing and for any platform
    /// that can link `std`; a bare-metal target supplies its own `Clock`
    /// against a hardware timer instead.
    pub struct SystemClock {
        epoch: Instant,
    }

    impl SystemClock {
        pub fn new() -> Self {
            Self {
                epoch: Instant::now(),
            }
        }
    }

    impl Default for SystemClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for SystemClock {
        fn now_ms(&self) -> u32 {
            self.epoch.elapsed().as_millis() as u32
        }
    }

    /// [`Sleep`] backed by [`std::thread::sleep`].
    #[derive(Default)]
    pub struct ThreadSleep;

    impl Sleep for ThreadSleep {
        fn sleep_ms(&self, ms: u32) {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
        }
    }

    /// [`Sink`] that writes to stdout.
    #[derive(Default)]
    pub struct StdoutSink;

    impl Sink for StdoutSink {
        fn emit(&self, args: core::fmt::Arguments<'_>) {
            println!("{args}");
        }
    }

    /// [`Deferred`] that just calls its argument immediately. A host with
    /// no interrupt context to escape has nothing to defer past, so
    /// deferral collapses to direct invocation.
    #[derive(Default)]
    pub struct InlineDeferred;

    impl Deferred for InlineDeferred {
        fn defer(&self, f: Box<dyn FnOnce() + 'static>) {
            f();
        }
    }

    /// Bundles the four host-provided std shims into one value, so a
    /// `cotask::Scheduler` only has to name a single type parameter.
    #[derive(Default)]
    pub struct StdRuntime {
        clock: SystemClock,
        sleep: ThreadSleep,
        sink: StdoutSink,
        deferred: InlineDeferred,
    }

    impl StdRuntime {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Clock for StdRuntime {
        fn now_ms(&self) -> u32 {
            self.clock.now_ms()
        }
    }

    impl Sleep for StdRuntime {
        fn sleep_ms(&self, ms: u32) {
            self.sleep.sleep_ms(ms);
        }
    }

    impl Sink for StdRuntime {
        fn emit(&self, args: core::fmt::Arguments<'_>) {
            self.sink.emit(args);
        }
    }

    impl Deferred for StdRuntime {
        fn defer(&self, f: Box<dyn FnOnce() + 'static>) {
            self.deferred.defer(f);
        }
    }
}

#[cfg(feature = "std")]
pub use std_impls::{InlineDeferred, StdRuntime, StdoutSink, SystemClock, ThreadSleep};
