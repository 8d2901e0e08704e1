//! Filter vocabulary built from stored PNG text.
//!
//! Most PNG text in an image catalog comes from generation tools that embed a
//! `parameters` blob: the prompt, a `Negative prompt:` line and a flat list of
//! `Label: value` settings. The settings are noise for a word filter, so a
//! [`NoisePolicy`] scrubs them before tokenizing.

use std::collections::BTreeSet;

use rayon::prelude::*;
use regex::Regex;

/// Generation-parameter labels whose `Label: value` segments are dropped.
pub const DEFAULT_LABELS: &[&str] = &[
    "ADetailer model",
    "CFG scale",
    "Clip skip",
    "Denoising strength",
    "Discard penultimate sigma",
    "ENSD",
    "Eta",
    "Face restoration",
    "Hires cfg scale",
    "Hires steps",
    "Hires upscale",
    "Hires upscaler",
    "Lora hashes",
    "Model",
    "Model hash",
    "Sampler",
    "Schedule type",
    "Seed",
    "Seed resize from",
    "Size",
    "Steps",
    "TI hashes",
    "Token merging ratio",
    "VAE",
    "VAE hash",
    "Variation seed",
    "Variation seed strength",
    "Version",
];

pub const DEFAULT_SEPARATOR: &str = "BREAK";

/// Decides what part of a stored blob is worth tokenizing.
pub trait NoisePolicy: Send + Sync {
    /// Blobs to leave out of the index entirely.
    fn is_raw_dump(&self, blob: &str) -> bool;

    /// The blob with structural noise replaced by whitespace.
    fn scrub(&self, blob: &str) -> String;
}

/// Noise rules for the `parameters` text written by Stable Diffusion front ends.
#[derive(Debug, Clone)]
pub struct ParametersPolicy {
    raw_dump: Regex,
    entry_header: Regex,
    labels: Option<Regex>,
    negative_label: Regex,
    brackets: Regex,
    weights: Regex,
    separator: Option<Regex>,
    quotes: Regex,
}

impl Default for ParametersPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().copied(), DEFAULT_SEPARATOR)
            .expect("default noise patterns are valid")
    }
}

impl ParametersPolicy {
    pub fn new<'a>(
        labels: impl IntoIterator<Item = &'a str>,
        separator: &str,
    ) -> Result<Self, regex::Error> {
        let mut labels: Vec<&str> = labels.into_iter().filter(|l| !l.trim().is_empty()).collect();
        // Longest first so "Model hash" wins over "Model".
        labels.sort_by_key(|l| std::cmp::Reverse(l.len()));
        labels.dedup();
        let alternation = labels
            .iter()
            .map(|l| regex::escape(l.trim()))
            .collect::<Vec<_>>()
            .join("|");
        let labels = if alternation.is_empty() {
            None
        } else {
            // Only at the start of a line or comma segment, so prompt terms
            // like "(fashion model:1.2)" survive.
            Some(Regex::new(&format!(
                r"(?im)(?:^|,)[ \t]*(?:{alternation})[ \t]*:[^,\n]*"
            ))?)
        };

        Ok(Self {
            // One `<tag>: [keyword=]value` line whose value has no separators:
            // a hash, a seed or a lone token.
            raw_dump: Regex::new(r"^(?:tEXt|zTXt|iTXt):[ \t]*(?:[^\s=,;]*=)?[^\s,;]*$")?,
            entry_header: Regex::new(r"(?m)^(?:tEXt|zTXt|iTXt):[ \t]*[^=\n]*=")?,
            labels,
            negative_label: Regex::new(r"(?i)\bnegative prompt[ \t]*:")?,
            brackets: Regex::new(r"[()\[\]{}<>]")?,
            weights: Regex::new(r":[ \t]*-?(?:\d+(?:\.\d*)?|\.\d+)")?,
            separator: match separator.trim() {
                "" => None,
                sep => Some(Regex::new(&format!(r"\b{}\b", regex::escape(sep)))?),
            },
            quotes: Regex::new(r#"["'`\u{201C}\u{201D}\u{2018}\u{2019}]"#)?,
        })
    }
}

impl NoisePolicy for ParametersPolicy {
    fn is_raw_dump(&self, blob: &str) -> bool {
        self.raw_dump.is_match(blob.trim())
    }

    fn scrub(&self, blob: &str) -> String {
        let mut text = self.entry_header.replace_all(blob, " ").into_owned();
        if let Some(labels) = &self.labels {
            text = labels.replace_all(&text, ",").into_owned();
        }
        for re in [&self.negative_label, &self.brackets, &self.weights]
            .into_iter()
            .chain(self.separator.as_ref())
            .chain([&self.quotes])
        {
            text = re.replace_all(&text, " ").into_owned();
        }
        text
    }
}

#[derive(Debug, Clone, Default)]
pub struct WordIndex<P = ParametersPolicy> {
    policy: P,
}

impl<P: NoisePolicy> WordIndex<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    pub fn build<I, S>(&self, blobs: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = BTreeSet::new();
        for blob in blobs {
            words.extend(self.tokens(blob.as_ref()));
        }
        words
    }

    /// Same result as [`WordIndex::build`], tokenizing blobs on the rayon pool.
    pub fn build_par<S>(&self, blobs: &[S]) -> BTreeSet<String>
    where
        S: AsRef<str> + Sync,
    {
        blobs
            .par_iter()
            .map(|b| self.tokens(b.as_ref()))
            .reduce(BTreeSet::new, |mut acc, set| {
                acc.extend(set);
                acc
            })
    }

    pub fn tokens(&self, blob: &str) -> BTreeSet<String> {
        if blob.trim().is_empty() || self.policy.is_raw_dump(blob) {
            return BTreeSet::new();
        }
        self.policy
            .scrub(blob)
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .filter_map(normalize_token)
            .collect()
    }
}

pub fn build_word_index<I, S>(blobs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    WordIndex::<ParametersPolicy>::default().build(blobs)
}

fn normalize_token(raw: &str) -> Option<String> {
    let token = raw
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let keep = token.chars().count() > 1
        && !token.chars().all(char::is_numeric)
        && token.chars().any(char::is_alphabetic);
    keep.then_some(token)
}
