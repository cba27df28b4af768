use super::{write_report, Reporter, ReporterOptions};
use crate::error::Result;
use crate::results::ResultTree;

/// A Markdown summary in `report.md`; failing checks include their outcome.
#[derive(Debug, Clone, Default)]
pub struct MarkdownReporter {
    options: ReporterOptions,
}

impl MarkdownReporter {
    pub const NAME: &'static str = "markdown";
    pub const DEFAULT_OUTPUT: &'static str = "report.md";

    pub fn new(options: ReporterOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, results: &ResultTree) -> Result<String> {
        let mut report = String::from("# Test Results\n\n");
        for test in results {
            report.push_str(&format!("## {}\n", test.name));
            report.push_str(&format!("**Query**: `{}`\n\n", test.query));
            for check in &test.results {
                let status = if check.passed() {
                    "✅ PASSED"
                } else {
                    "❌ FAILED"
                };
                report.push_str(&format!("- **{}**: {status}\n", check.test_type));
                if !check.passed() {
                    let outcome = serde_json::to_string(&check.result)?;
                    report.push_str(&format!("  ```\n  {outcome}\n  ```\n"));
                }
            }
            report.push('\n');
        }
        Ok(report)
    }
}

impl Reporter for MarkdownReporter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn generate_report(&self, results: &ResultTree) -> Result<()> {
        write_report(
            Self::NAME,
            self.options.output_or(Self::DEFAULT_OUTPUT),
            &self.render(results)?,
        )
    }
}
