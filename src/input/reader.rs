use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::glossary::GlossaryEntry;
use crate::translation::PromptPreset;

const MAX_INPUT_SIZE: usize = 4 * 1024 * 1024; // 4MB, about one long chapter

pub struct InputReader;

impl InputReader {
    /// Reads chapter text from `file_path`, or from stdin when `None`.
    ///
    /// Line endings are normalized to `\n` and a leading BOM is dropped so
    /// line-sync markers line up with what the model sees.
    pub fn read(file_path: Option<&str>) -> Result<String> {
        let raw = file_path.map_or_else(Self::read_stdin, Self::read_file)?;
        Ok(normalize(&raw))
    }

    /// Loads glossary entries from a JSON array.
    pub fn read_glossary(path: &Path) -> Result<Vec<GlossaryEntry>> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse glossary file: {}", path.display()))
    }

    /// Loads a prompt preset from a TOML file.
    pub fn read_preset(path: &Path) -> Result<PromptPreset> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preset file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse preset file: {}", path.display()))
    }

    fn read_file(path: &str) -> Result<String> {
        let metadata =
            fs::metadata(path).with_context(|| format!("Failed to access file: {path}"))?;

        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > MAX_INPUT_SIZE {
            bail!(too_large(size, "file"));
        }

        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))
    }

    #[allow(clippy::significant_drop_tightening)]
    fn read_stdin() -> Result<String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 8192];
        let mut stdin = io::stdin().lock();

        loop {
            let bytes_read = stdin
                .read(&mut chunk)
                .context("Failed to read from stdin")?;
            if bytes_read == 0 {
                break;
            }

            buffer.extend_from_slice(&chunk[..bytes_read]);
            if buffer.len() > MAX_INPUT_SIZE {
                bail!(too_large(buffer.len(), "input"));
            }
        }

        String::from_utf8(buffer).context("Input is not valid UTF-8")
    }
}

#[allow(clippy::cast_precision_loss)]
fn too_large(size: usize, what: &str) -> String {
    format!(
        "Input size ({:.1} MB) exceeds maximum allowed size (4 MB).\n\n\
         Consider splitting the {what} into chapters.",
        size as f64 / 1024.0 / 1024.0
    )
}

fn normalize(text: &str) -> String {
    text.strip_prefix('\u{feff}')
        .unwrap_or(text)
        .replace("\r\n", "\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_read_file_unicode() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let content = "こんにちは世界！\n日本語テスト";
        write!(temp_file, "{content}").unwrap();

        let result = InputReader::read(Some(temp_file.path().to_str().unwrap())).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result = InputReader::read(Some("/nonexistent/path/to/file.txt"));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_normalizes_line_endings() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "\u{feff}Line 1\r\nLine 2\r\n\r\nLine 4").unwrap();

        let result = InputReader::read(Some(temp_file.path().to_str().unwrap())).unwrap();
        assert_eq!(result, "Line 1\nLine 2\n\nLine 4");
    }

    #[test]
    fn test_read_file_exceeds_max_size() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("large_file.txt");
        fs::write(&file_path, "x".repeat(MAX_INPUT_SIZE + 1)).unwrap();

        let result = InputReader::read(Some(file_path.to_str().unwrap()));
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_read_glossary_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            r#"[
                {{"original_term": "Aria", "translation": "アリア", "category": "character",
                  "aliases": ["Lady Aria"]}},
                {{"original_term": "Mithril", "translation": "ミスリル", "category": "metal"}}
            ]"#
        )
        .unwrap();

        let entries = InputReader::read_glossary(temp_file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].aliases, vec!["Lady Aria"]);
        assert!(entries[0].is_active);
        assert_eq!(entries[1].category, crate::glossary::GlossaryCategory::Other);
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn test_read_preset_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            "name = \"novel\"\n\
             prompt = \"Translate {{{{TEXT}}}} into {{{{TARGET_LANGUAGE}}}}\"\n\
             example_source = \"Hi\"\n\
             example_translation = \"やあ\"\n\
             provide_example = true\n"
        )
        .unwrap();

        let preset = InputReader::read_preset(temp_file.path()).unwrap();
        assert_eq!(preset.name, "novel");
        assert_eq!(preset.prompt, "Translate {{TEXT}} into {{TARGET_LANGUAGE}}");
        assert!(preset.provide_example);
    }
}
