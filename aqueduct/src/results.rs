//! The result tree produced by a run.

use crate::checks::CheckOutcome;
use serde::{Deserialize, Serialize};

/// One check's outcome within a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Registered check type, as written in the test definition
    pub test_type: String,
    pub result: CheckOutcome,
}

impl CheckResult {
    pub fn new(test_type: impl Into<String>, result: CheckOutcome) -> Self {
        Self {
            test_type: test_type.into(),
            result,
        }
    }

    pub fn passed(&self) -> bool {
        self.result.passed
    }
}

/// One test's query and the outcomes of its checks, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub query: String,
    pub results: Vec<CheckResult>,
}

impl TestResult {
    /// Returns true if every check passed. A test without checks passes.
    pub fn passed(&self) -> bool {
        self.results.iter().all(CheckResult::passed)
    }

    /// Returns the number of failing checks.
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }
}

/// Every test's result, in the order the tests were declared.
///
/// Serializes as a plain JSON array of `{name, query, results}` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTree(Vec<TestResult>);

impl ResultTree {
    pub fn new(tests: Vec<TestResult>) -> Self {
        Self(tests)
    }

    pub fn tests(&self) -> &[TestResult] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if every check of every test passed.
    pub fn all_passed(&self) -> bool {
        self.0.iter().all(TestResult::passed)
    }

    /// Returns `(checks run, checks failed)` across all tests.
    pub fn totals(&self) -> (usize, usize) {
        self.0.iter().fold((0, 0), |(total, failed), test| {
            (total + test.results.len(), failed + test.failures())
        })
    }
}

impl From<Vec<TestResult>> for ResultTree {
    fn from(tests: Vec<TestResult>) -> Self {
        Self(tests)
    }
}

impl<'a> IntoIterator for &'a ResultTree {
    type Item = &'a TestResult;
    type IntoIter = std::slice::Iter<'a, TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
