/// A line pulled out of the `entries:` block that may be a chart-name header.
///
/// Headers are the only lines at the block's child indent that end in `:`
/// without opening a version record, so validity is a purely textual check.
pub struct ParsedChartName<'a> {
    line: &'a str,
}

impl<'a> ParsedChartName<'a> {
    const ENTRIES: &'static str = "entries:";

    pub fn new(line: &'a str) -> Self {
        Self { line }
    }

    pub fn valid(&self) -> bool {
        let trimmed = self.line.trim();
        trimmed.ends_with(':') && trimmed != Self::ENTRIES && !trimmed.starts_with('-')
    }

    /// The chart name itself, without the trailing colon.
    pub fn name(&self) -> &'a str {
        self.line.trim().trim_end_matches(':')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_chart_headers() {
        for line in ["ark:", "  ark:", "tomcat:", "  nested-name.v2:", "ark:  "] {
            assert!(ParsedChartName::new(line).valid(), "{line:?}");
        }
    }

    #[test]
    fn rejects_non_headers() {
        for line in [
            "entries:",
            "  entries:",
            "- ark:",
            "  - ark:",
            "ark",
            "  version: 1.0.1",
            "",
            "   ",
            "-:",
        ] {
            assert!(!ParsedChartName::new(line).valid(), "{line:?}");
        }
    }

    #[test]
    fn extracts_name() {
        assert_eq!(ParsedChartName::new("  ark:").name(), "ark");
        assert_eq!(ParsedChartName::new("tomcat:").name(), "tomcat");
    }
}
