#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod runtime {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
            may::config().set_workers(4);
        });
    }
}

pub mod gate {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// One-shot latch that coroutine handlers park on
    #[derive(Clone, Default)]
    pub struct Gate(Arc<AtomicBool>);

    impl Gate {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn open(&self) {
            self.0.store(true, Ordering::Release);
        }

        pub fn is_open(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }

        /// Coroutine-friendly wait; `false` on timeout
        pub fn wait(&self, timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            while !self.is_open() {
                if Instant::now() >= deadline {
                    return false;
                }
                may::coroutine::sleep(Duration::from_millis(1));
            }
            true
        }
    }

    /// Thread-side poll until `condition` holds or `timeout` passes
    pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        condition()
    }
}

pub mod reports {
    use reactive_routing::error::SchedulingFailure;
    use reactive_routing::reporter::{ContextName, ErrorReporter};
    use std::sync::{Arc, Mutex};

    /// Error reporter that keeps everything it receives
    #[derive(Clone, Default)]
    pub struct CollectingReporter(Arc<Mutex<Vec<(String, SchedulingFailure)>>>);

    impl CollectingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reports(&self) -> Vec<(String, SchedulingFailure)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, context: &ContextName, error: &SchedulingFailure) {
            self.0.lock().unwrap().push((context.to_string(), error.clone()));
        }
    }
}
