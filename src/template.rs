//! Compilation of directory naming templates into label extractors.
//!
//! A template such as `pvc-{pvc_uid}_{namespace}_{pvc_name}` describes how the
//! provisioner names volume directories. Every `{name}` placeholder becomes a
//! label and every `*` a wildcard that matches text without extracting it.
//! The resulting [`Matcher`] only accepts names that match end to end.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Placeholder `{name}` or wildcard `*`.
const TOKEN_PATTERN: &str = r"\{([a-zA-Z0-9_]+)\}|\*";

/// Label values of a matched directory, aligned with [`Matcher::label_names`].
pub type LabelSet = Vec<String>;

/// Errors raised while compiling a template. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{template}' uses placeholder '{{{label}}}' more than once")]
    DuplicateLabel { template: String, label: String },
    #[error("template '{template}' does not compile to a valid pattern: {source}")]
    InvalidPattern {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled naming template.
#[derive(Clone)]
pub struct Matcher {
    template: String,
    label_names: Vec<String>,
    regex: Regex,
}

impl Matcher {
    /// Compiles `template` into a matcher.
    ///
    /// Placeholders and wildcards both match one or more characters, lazily.
    /// Literal text between them is matched verbatim. When two placeholders are
    /// directly adjacent the first one captures a single character.
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let invalid = |source| TemplateError::InvalidPattern { template: template.to_string(), source };
        let tokens = Regex::new(TOKEN_PATTERN).map_err(invalid)?;

        let mut label_names: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut pattern = String::with_capacity(template.len() * 2 + 2);
        pattern.push('^');

        let mut last = 0;
        for caps in tokens.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            pattern.push_str(&regex::escape(&template[last..whole.start()]));
            match caps.get(1) {
                Some(name) => {
                    let name = name.as_str();
                    if !seen.insert(name) {
                        return Err(TemplateError::DuplicateLabel {
                            template: template.to_string(),
                            label: name.to_string(),
                        });
                    }
                    pattern.push_str("(?P<");
                    pattern.push_str(name);
                    pattern.push_str(">.+?)");
                    label_names.push(name.to_string());
                }
                None => pattern.push_str("(?:.+?)"),
            }
            last = whole.end();
        }
        pattern.push_str(&regex::escape(&template[last..]));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(invalid)?;

        Ok(Self { template: template.to_string(), label_names, regex })
    }

    /// Extracts the label values from `name`, or `None` if it does not match.
    pub fn extract(&self, name: &str) -> Option<LabelSet> {
        let caps = self.regex.captures(name)?;
        Some(
            self.label_names
                .iter()
                .map(|label| caps.name(label).map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    /// Label names in the order they appear in the template.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The derived pattern, mainly useful for logging.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("template", &self.template)
            .field("label_names", &self.label_names)
            .field("pattern", &self.regex.as_str())
            .finish()
    }
}
