//! Rendering and writing the collected samples.

use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How samples are laid out in the output file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Samples separated by a blank line, the usual CoNLL document layout.
    #[default]
    Conll,
    /// A pretty-printed JSON array of strings.
    Json,
    /// Samples joined with a comma and a newline.
    Delimited,
}

impl OutputFormat {
    /// Renders the samples into the file contents.
    pub fn render(&self, artifacts: &[String]) -> String {
        match self {
            OutputFormat::Conll => {
                artifacts
                    .iter()
                    .map(|artifact| artifact.trim_end())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            OutputFormat::Json => render_json(artifacts),
            OutputFormat::Delimited => artifacts.join(",\n"),
        }
    }

    /// Returns the usual file extension of the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Conll => "conll",
            OutputFormat::Json => "json",
            OutputFormat::Delimited => "txt",
        }
    }

    /// Returns the file written when no output path is given, a
    /// `dataset` file in the working directory.
    #[inline]
    pub fn default_path(&self) -> PathBuf {
        PathBuf::from(format!("dataset.{}", self.extension()))
    }
}

fn render_json(artifacts: &[String]) -> String {
    // Serializing a list of strings can't fail.
    serde_json::to_string_pretty(artifacts).unwrap_or_else(|err| {
        error!("failed to serialize samples: {err}");
        String::from("[]")
    })
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Conll => "conll",
            OutputFormat::Json => "json",
            OutputFormat::Delimited => "delimited",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conll" => Ok(OutputFormat::Conll),
            "json" => Ok(OutputFormat::Json),
            "delimited" => Ok(OutputFormat::Delimited),
            _ => Err(format!("unknown output format `{s}`")),
        }
    }
}

/// Writes the rendered samples to `path`, creating missing parent
/// directories.
///
/// The file is written even when there are no samples, so a failed run
/// still leaves a (possibly empty) file behind.
pub fn write_artifacts(
    path: &Path,
    format: OutputFormat,
    artifacts: &[String],
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut contents = format.render(artifacts);
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(path, contents)?;
    debug!("wrote {} samples to {}", artifacts.len(), path.display());
    Ok(())
}
