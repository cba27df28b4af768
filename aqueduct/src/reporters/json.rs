use super::{write_report, Reporter, ReporterOptions};
use crate::error::Result;
use crate::results::ResultTree;

/// The whole result tree as indented JSON in `report.json`.
#[derive(Debug, Clone, Default)]
pub struct JsonReporter {
    options: ReporterOptions,
}

impl JsonReporter {
    pub const NAME: &'static str = "json";
    pub const DEFAULT_OUTPUT: &'static str = "report.json";

    pub fn new(options: ReporterOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, results: &ResultTree) -> Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }
}

impl Reporter for JsonReporter {
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
