use std::fmt::{self, Display};
use std::str::FromStr;

use crate::output::OutputFormat;

/// The shape of the samples the model is asked to produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LabelingScheme {
    /// One token per line followed by its BIO tag.
    #[default]
    Conll,
    /// A JSON object with the sentence and character spans of entities.
    Spans,
}

impl LabelingScheme {
    /// Returns the built-in task prompt of the scheme.
    pub fn prompt(&self) -> &'static str {
        match self {
            LabelingScheme::Conll => include_str!("./prompts/conll.md"),
            LabelingScheme::Spans => include_str!("./prompts/spans.md"),
        }
    }

    /// Returns the output format that fits the samples of the scheme.
    pub fn default_format(&self) -> OutputFormat {
        match self {
            LabelingScheme::Conll => OutputFormat::Conll,
            LabelingScheme::Spans => OutputFormat::Delimited,
        }
    }
}

impl Display for LabelingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LabelingScheme::Conll => "conll",
            LabelingScheme::Spans => "spans",
        })
    }
}

impl FromStr for LabelingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conll" => Ok(LabelingScheme::Conll),
            "spans" => Ok(LabelingScheme::Spans),
            _ => Err(format!("unknown labeling scheme `{s}`")),
        }
    }
}
