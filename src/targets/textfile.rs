//! Textfile target driver - one host per line

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};
use crate::targets::{DiscoveredHost, Target};

/// Lines containing anything outside this alphabet are silently dropped.
static INVALID_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z\-:\._\[\]]+").unwrap());

/// Reads hosts from a text file, one per non-comment, non-blank line.
#[derive(Debug, Clone)]
pub struct TextFile {
    file: PathBuf,
}

impl TextFile {
    pub fn new(options: &InputMap) -> Result<Self> {
        let mut schema = Schema::new("textfile", options);
        let file = schema.required("file");
        let dir = schema.string("_dir", "");
        schema.finish()?;

        let expanded = shellexpand::tilde(&file);
        let mut path = PathBuf::from(expanded.as_ref());

        // Relative paths resolve against the manifest's directory.
        if path.is_relative() && !dir.is_empty() {
            path = Path::new(&dir).join(path);
        }

        if !path.exists() {
            return Err(Error::driver(
                "textfile",
                format!("file {} does not exist", path.display()),
            ));
        }

        Ok(Self { file: path })
    }
}

impl Target for TextFile {
    fn discover(&self) -> Result<Vec<DiscoveredHost>> {
        let content = std::fs::read_to_string(&self.file).map_err(|e| Error::Read {
            path: self.file.clone(),
            source: e,
        })?;

        let hosts = content
            .lines()
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with('#') && !line.starts_with("//"))
            .filter(|line| !INVALID_ENTRY.is_match(line))
            .map(|line| DiscoveredHost {
                name: line.to_string(),
                address: line.to_string(),
            })
            .collect();

        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;
    use std::io::Write;

    fn target_for(content: &str) -> (tempfile::NamedTempFile, TextFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();

        let options: InputMap = [(
            "file".to_string(),
            Value::String(file.path().to_string_lossy().into_owned()),
        )]
        .into();

        let textfile = TextFile::new(&options).unwrap();
        (file, textfile)
    }

    #[test]
    fn discovers_valid_lines() {
        let (_file, target) = target_for(
            "# comment\n// another comment\nweb-1.example.com\n\n10.0.0.5\nbad host with spaces\n[2001:db8::1]\n",
        );

        let hosts = target.discover().unwrap();
        let names: Vec<&str> = hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["web-1.example.com", "10.0.0.5", "[2001:db8::1]"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let options: InputMap = [(
            "file".to_string(),
            Value::String("/nonexistent/hosts.txt".to_string()),
        )]
        .into();
        assert!(TextFile::new(&options).is_err());
    }

    #[test]
    fn file_option_is_required() {
        assert!(TextFile::new(&InputMap::new()).is_err());
    }
}
