use super::{write_report, Reporter, ReporterOptions};
use crate::error::Result;
use crate::results::ResultTree;

/// A JUnit-style XML document in `junit.xml`.
///
/// One `<testsuite>` per test and one `<testcase>` per check; failing cases
/// carry a `<failure>` whose text is the compact outcome JSON. The document is
/// written on a single line without an XML declaration.
#[derive(Debug, Clone, Default)]
pub struct JUnitReporter {
    options: ReporterOptions,
}

impl JUnitReporter {
    pub const NAME: &'static str = "junit";
    pub const DEFAULT_OUTPUT: &'static str = "junit.xml";

    pub fn new(options: ReporterOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, results: &ResultTree) -> Result<String> {
        if results.is_empty() {
            return Ok("<testsuites />".to_string());
        }

        let mut output = String::from("<testsuites>");
        for test in results {
            let suite = escape_attribute(&test.name);
            if test.results.is_empty() {
                output.push_str(&format!("<testsuite name=\"{suite}\" />"));
                continue;
            }

            output.push_str(&format!("<testsuite name=\"{suite}\">"));
            for check in &test.results {
                let case = escape_attribute(&check.test_type);
                if check.passed() {
                    output.push_str(&format!("<testcase name=\"{case}\" />"));
                } else {
                    let outcome = serde_json::to_string(&check.result)?;
                    output.push_str(&format!(
                        "<testcase name=\"{case}\"><failure message=\"Test failed\">{}</failure></testcase>",
                        escape_text(&outcome)
                    ));
                }
            }
            output.push_str("</testsuite>");
        }
        output.push_str("</testsuites>");
        Ok(output)
    }
}

impl Reporter for JUnitReporter {
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

fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            c => result.push(c),
        }
    }
    result
}

fn escape_attribute(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\n' => result.push_str("&#10;"),
            c => result.push(c),
        }
    }
    result
}
