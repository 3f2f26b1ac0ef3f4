use std::collections::HashMap;

use crate::error::ConfigError;

/// A parsed INI document: named sections of `key = value` entries.
///
/// Section names are case sensitive, keys are not.
#[derive(Debug, Default)]
pub struct Ini {
    sections: HashMap<String, HashMap<String, String>>,
}

impl Ini {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = None;

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let syntax = |msg: String| ConfigError::Syntax { line: i + 1, msg };

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| syntax(format!("bad section header {line:?}")))?;

                if sections.insert(name.to_string(), HashMap::new()).is_some() {
                    return Err(syntax(format!("duplicate section [{name}]")));
                }

                current = Some(name.to_string());
                continue;
            }

            let Some(section) = current.as_ref() else {
                return Err(syntax("entry before any section header".to_string()));
            };

            let Some(at) = line.find(['=', ':']) else {
                return Err(syntax(format!("expected `key = value`, got {line:?}")));
            };

            let key = line[..at].trim().to_lowercase();
            let value = line[at + 1..].trim().to_string();
            if key.is_empty() {
                return Err(syntax("empty key".to_string()));
            }

            let entries = sections.entry(section.clone()).or_default();
            if entries.contains_key(&key) {
                return Err(syntax(format!("duplicate key {key:?} in [{section}]")));
            }

            entries.insert(key, value);
        }

        Ok(Self { sections })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn require(&self, section: &'static str, key: &'static str) -> Result<&str, ConfigError> {
        self.get(section, key)
            .ok_or(ConfigError::MissingKey { section, key })
    }
}
