use super::{write_report, Reporter, ReporterOptions};
use crate::error::Result;
use crate::results::ResultTree;
use std::io::Write;

/// Plain-text report on stdout.
///
/// ```text
/// Test 'one admin':
///   Test 'row_count': FAILED
///     Details: {
///   "passed": false,
///   "actual": 2
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    options: ReporterOptions,
}

impl ConsoleReporter {
    pub const NAME: &'static str = "console";

    pub fn new(options: ReporterOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, results: &ResultTree) -> Result<String> {
        let mut output = String::new();
        for test in results {
            output.push_str(&format!("Test '{}':\n", test.name));
            for check in &test.results {
                let status = if check.passed() { "PASSED" } else { "FAILED" };
                output.push_str(&format!("  Test '{}': {status}\n", check.test_type));
                if !check.passed() {
                    let details = serde_json::to_string_pretty(&check.result)?;
                    output.push_str(&format!("    Details: {details}\n"));
                }
            }
            output.push('\n');
        }
        Ok(output)
    }
}

impl Reporter for ConsoleReporter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn generate_report(&self, results: &ResultTree) -> Result<()> {
        let rendered = self.render(results)?;
        match &self.options.output {
            Some(path) => write_report(Self::NAME, path, &rendered),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(rendered.as_bytes())?;
                stdout.flush()?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::test_support::sample_tree;

    #[test]
    fn test_render() {
        let output = ConsoleReporter::default().render(&sample_tree()).unwrap();
        let expected = "Test 'users exist':\n  Test 'not_empty': PASSED\n\n\
Test 'one admin':\n  Test 'row_count': FAILED\n    Details: {\n  \"passed\": false,\n  \"expected\": \"equals 1\",\n  \"actual\": 2\n}\n  Test 'unique': PASSED\n\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_render_keeps_non_ascii_text() {
        use crate::checks::CheckOutcome;
        use crate::results::{CheckResult, TestResult};

        let tree = ResultTree::new(vec![TestResult {
            name: "cidades".to_string(),
            query: "SELECT city FROM stores".to_string(),
            results: vec![CheckResult::new(
                "contains",
                CheckOutcome::fail().with_detail("missing", "São Paulo"),
            )],
        }]);
        let output = ConsoleReporter::default().render(&tree).unwrap();
        assert!(output.contains("\"missing\": \"São Paulo\""));
    }

    #[test]
    fn test_render_empty_tree() {
        let output = ConsoleReporter::default()
            .render(&ResultTree::default())
            .unwrap();
        assert!(output.is_empty());
    }
}
