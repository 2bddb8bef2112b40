//! INI file configuration adapter.

use crate::domain::error::SimError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::fs;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
    source: String,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path.display().to_string())
    }

    pub fn from_string(content: &str) -> Result<Self, SimError> {
        Self::parse(content, "<string>".to_string())
    }

    fn parse(content: &str, source: String) -> Result<Self, SimError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| SimError::ConfigParse {
                file: source.clone(),
                reason,
            })?;
        Ok(Self { config, source })
    }

    /// Drop a trailing `; comment` or `# comment` preceded by whitespace.
    fn strip_inline_comment(value: &str) -> &str {
        let bytes = value.as_bytes();
        let cut = (1..bytes.len())
            .find(|&i| (bytes[i] == b';' || bytes[i] == b'#') && bytes[i - 1].is_ascii_whitespace())
            .unwrap_or(bytes.len());
        value[..cut].trim()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| Self::strip_inline_comment(&v).to_string())
            .filter(|v| !v.is_empty())
    }

    fn has_section(&self, section: &str) -> bool {
        let wanted = section.to_lowercase();
        self.config.sections().iter().any(|s| *s == wanted)
    }

    fn source_name(&self) -> &str {
        &self.source
    }
}
