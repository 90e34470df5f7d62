//! Test registry and sequential runner

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::E2EResult;

/// A test body: receives the harness handle and its own resolved name
pub type TestFn<C> = fn(&C, &str) -> E2EResult<()>;

/// What the runner needs from the handle it passes to tests
pub trait TestContext {
    /// Diagnostics of the last test (captured command output), cleared on read
    fn take_diagnostics(&self) -> Option<String> {
        None
    }
}

/// Registration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two tests with the same name
    #[error("test '{0}' registered twice")]
    Duplicate(String),

    /// Filter named tests that do not exist
    #[error("unknown tests: {}", .0.join(", "))]
    Unknown(Vec<String>),
}

/// A named test body
pub struct TestCase<C> {
    name: String,
    func: TestFn<C>,
}

impl<C> TestCase<C> {
    /// Test name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> Clone for TestCase<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func,
        }
    }
}

/// Ordered name-to-function mapping, built by explicit calls
pub struct TestRegistry<C> {
    cases: Vec<TestCase<C>>,
}

impl<C> Default for TestRegistry<C> {
    fn default() -> Self {
        Self { cases: Vec::new() }
    }
}

impl<C> TestRegistry<C> {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test; order of registration is order of execution
    pub fn register(&mut self, name: impl Into<String>, func: TestFn<C>) -> Result<(), RegistryError> {
        let name = name.into();
        if self.cases.iter().any(|case| case.name == name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.cases.push(TestCase { name, func });
        Ok(())
    }

    /// Builder form of [`TestRegistry::register`]
    pub fn with(mut self, name: impl Into<String>, func: TestFn<C>) -> Result<Self, RegistryError> {
        self.register(name, func)?;
        Ok(self)
    }

    /// Keep only the named tests, in registration order
    ///
    /// Fails without modifying the registry if any name is unknown.
    pub fn retain_named<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), RegistryError> {
        let wanted: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let mut unknown: Vec<String> = wanted
            .iter()
            .filter(|name| !self.cases.iter().any(|case| case.name == **name))
            .map(|name| name.to_string())
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(RegistryError::Unknown(unknown));
        }

        self.cases.retain(|case| wanted.contains(case.name.as_str()));
        Ok(())
    }

    /// Registered names, in order
    pub fn names(&self) -> Vec<&str> {
        self.cases.iter().map(|case| case.name.as_str()).collect()
    }

    /// Registered tests, in order
    pub fn cases(&self) -> &[TestCase<C>] {
        &self.cases
    }

    /// Number of registered tests
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Final status of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Returned normally
    Passed,
    /// Returned an assertion or command failure
    Failed,
    /// Returned a harness error or panicked
    Errored,
    /// Not started because the run timeout had passed
    Cancelled,
}

impl TestStatus {
    /// Fixed-width label for the report
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASS",
            TestStatus::Failed => "FAIL",
            TestStatus::Errored => "ERROR",
            TestStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Result of one registered test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    /// Test name
    pub name: String,
    /// Final status
    pub status: TestStatus,
    /// Wall-clock time spent in the test body
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Why it did not pass
    pub message: Option<String>,
    /// Captured command output, for failures
    pub output: Option<String>,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Runs registered tests one at a time, in registration order
///
/// Every registered test yields exactly one [`TestOutcome`]. Nothing a test
/// does, panicking included, stops the tests after it.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    run_timeout: Option<Duration>,
}

impl Runner {
    /// Runner without a run timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel tests that have not started once `timeout` has elapsed
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Run every test in the registry against `context`
    pub fn run<C: TestContext>(&self, registry: &TestRegistry<C>, context: &C) -> Vec<TestOutcome> {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(registry.len());

        for case in registry.cases() {
            if let Some(limit) = self.run_timeout {
                if started.elapsed() >= limit {
                    tracing::warn!(test = %case.name, "run timeout exceeded, cancelling");
                    outcomes.push(TestOutcome {
                        name: case.name.clone(),
                        status: TestStatus::Cancelled,
                        duration: Duration::ZERO,
                        message: Some(format!("run timeout of {:?} exceeded", limit)),
                        output: None,
                    });
                    continue;
                }
            }
            outcomes.push(run_one(case, context));
        }

        outcomes
    }
}

fn run_one<C: TestContext>(case: &TestCase<C>, context: &C) -> TestOutcome {
    tracing::info!(test = %case.name, "running");
    // Drop anything a previous test left behind
    let _ = context.take_diagnostics();

    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (case.func)(context, &case.name)));
    let duration = start.elapsed();

    let (status, message) = match result {
        Ok(Ok(())) => (TestStatus::Passed, None),
        Ok(Err(e)) if e.is_failure() => (TestStatus::Failed, Some(e.to_string())),
        Ok(Err(e)) => (TestStatus::Errored, Some(e.to_string())),
        Err(payload) => (
            TestStatus::Errored,
            Some(format!("panicked: {}", panic_message(payload.as_ref()))),
        ),
    };

    let output = match status {
        TestStatus::Passed => {
            let _ = context.take_diagnostics();
            None
        }
        _ => context.take_diagnostics(),
    };

    match status {
        TestStatus::Passed => tracing::info!(test = %case.name, ?duration, "passed"),
        _ => tracing::warn!(
            test = %case.name,
            ?duration,
            status = status.label(),
            message = message.as_deref().unwrap_or_default(),
            "did not pass"
        ),
    }

    TestOutcome {
        name: case.name.clone(),
        status,
        duration,
        message,
        output,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E2EError;

    struct Nothing;
    impl TestContext for Nothing {}

    fn pass(_: &Nothing, _: &str) -> E2EResult<()> {
        Ok(())
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TestRegistry::<Nothing>::new();
        registry.register("a", pass).unwrap();
        assert_eq!(
            registry.register("a", pass),
            Err(RegistryError::Duplicate("a".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_retain_named_keeps_registration_order() {
        let mut registry = TestRegistry::<Nothing>::new()
            .with("a", pass)
            .and_then(|r| r.with("b", pass))
            .and_then(|r| r.with("c", pass))
            .unwrap();

        registry.retain_named(&["c", "a"]).unwrap();
        assert_eq!(registry.names(), vec!["a", "c"]);
    }

    #[test]
    fn test_retain_named_unknown_leaves_registry_intact() {
        let mut registry = TestRegistry::<Nothing>::new().with("a", pass).unwrap();
        assert_eq!(
            registry.retain_named(&["a", "zz", "yy"]),
            Err(RegistryError::Unknown(vec!["yy".to_string(), "zz".to_string()]))
        );
        assert_eq!(registry.names(), vec!["a"]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
        let payload = panic::catch_unwind(|| std::panic::panic_any(5u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_name_is_passed_to_body() {
        fn named(_: &Nothing, name: &str) -> E2EResult<()> {
            if name == "test_named" {
                Ok(())
            } else {
                Err(E2EError::assertion(format!("got name {}", name)))
            }
        }
        let registry = TestRegistry::<Nothing>::new()
            .with("test_named", named)
            .unwrap();
        let outcomes = Runner::new().run(&registry, &Nothing);
        assert_eq!(outcomes[0].status, TestStatus::Passed);
    }
}
