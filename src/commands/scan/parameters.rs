use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::StepEntry;

const VALUE_OPEN: &str = r#"(?:["']|["'][^"'<>]*\s)"#;
const ROLE: &str = r"(?:polarion[-_\s]?)?(?:rte[-_\s]?)?test[-_\s]?parameter";
const ROLE_CLOSE: &str = r#"(?:["']|\s[^"'<>]*["'])"#;
const NAME: &str = r#"data-name=["']([^"'<>]+)["']"#;

/// Collects the names of test parameter elements embedded in step HTML.
pub struct ParameterExtractor {
    pattern: Regex,
}

impl ParameterExtractor {
    pub fn new() -> Result<Self> {
        let class = format!("class={VALUE_OPEN}{ROLE}{ROLE_CLOSE}");
        let source = format!(
            r"(?i)<[^<>]*?(?:{class}[^<>]*?{NAME}|{NAME}[^<>]*?{class})[^<>]*?>"
        );
        let pattern = Regex::new(&source).context("failed to compile test parameter regex")?;
        Ok(Self { pattern })
    }

    pub fn extract(&self, steps: &[StepEntry]) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for html in steps.iter().flat_map(|step| step.values().flatten()) {
            self.extract_into(html, &mut names);
        }
        names
    }

    fn extract_into(&self, html: &str, names: &mut BTreeSet<String>) {
        for captures in self.pattern.captures_iter(html) {
            let name = captures.get(1).or_else(|| captures.get(2));
            if let Some(name) = name.map(|m| m.as_str()).filter(|name| !name.is_empty()) {
                names.insert(name.to_string());
            }
        }
    }
}
