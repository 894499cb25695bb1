// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Line templates and the template bank.
//!
//! A template is a recurring log-line pattern with `<*>` marking its
//! variable slots, e.g.:
//!
//! ```text
//! Receiving block <*> src: <*> dest: <*>
//! ```
//!
//! Banks are immutable for the lifetime of an archive. They are either
//! loaded from a template CSV or mined in-process (see [`miner`]).

pub mod miner;

use regex::Regex;
use rustc_hash::FxHashMap;

/// Slot marker inside a template pattern.
pub const SLOT: &str = "<*>";

/// A single line template.
#[derive(Clone, Debug)]
pub struct Template {
    /// Stable non-negative ID
    pub id: u32,

    /// Pattern string with `<*>` placeholders marking slots
    pub pattern: String,

    /// Number of slots
    pub arity: usize,

    /// Literal pattern segments between slots (`arity + 1` entries)
    literals: Vec<String>,

    /// Compiled anchored matcher
    matcher: Regex,
}

impl Template {
    /// Compiles a template pattern into an anchored matcher.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Template`] if the pattern does not compile.
    pub fn new(id: u32, pattern: &str) -> crate::Result<Self> {
        let literals: Vec<String> = pattern.split(SLOT).map(str::to_owned).collect();

        let mut rx = String::with_capacity(pattern.len() + 16);
        rx.push('^');

        for (idx, literal) in literals.iter().enumerate() {
            if idx > 0 {
                rx.push_str("(.*?)");
            }
            rx.push_str(&regex::escape(literal));
        }

        rx.push('$');

        let matcher = Regex::new(&rx)
            .map_err(|e| crate::Error::Template(format!("template {id} does not compile: {e}")))?;

        Ok(Self {
            id,
            pattern: pattern.to_owned(),
            arity: literals.len() - 1,
            literals,
            matcher,
        })
    }

    /// Tries to match a raw line, capturing its slot values.
    #[must_use]
    pub fn matches(&self, line: &str) -> Option<Vec<String>> {
        let captures = self.matcher.captures(line)?;

        Some(
            (1..=self.arity)
                .map(|idx| {
                    captures
                        .get(idx)
                        .map(|m| m.as_str().to_owned())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }

    /// Renders the original line from captured slot values.
    ///
    /// Inverse of [`Template::matches`] for any line the matcher accepts.
    #[must_use]
    pub fn render(&self, slots: &[String]) -> String {
        let mut out = String::new();

        for (idx, literal) in self.literals.iter().enumerate() {
            if idx > 0 {
                out.push_str(slots.get(idx - 1).map_or("", String::as_str));
            }
            out.push_str(literal);
        }

        out
    }
}

/// An ordered, immutable collection of templates.
///
/// Matching walks templates in insertion order; the first match wins,
/// which makes factorization deterministic for a fixed bank.
#[derive(Debug, Default)]
pub struct TemplateBank {
    templates: Vec<Template>,
    by_id: FxHashMap<u32, usize>,
}

impl TemplateBank {
    /// Builds a bank from `(id, pattern)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Template`] on duplicate IDs or patterns
    /// that do not compile.
    pub fn from_templates<S: AsRef<str>>(entries: &[(u32, S)]) -> crate::Result<Self> {
        let mut templates = Vec::with_capacity(entries.len());
        let mut by_id = FxHashMap::default();

        for (id, pattern) in entries {
            if by_id.insert(*id, templates.len()).is_some() {
                return Err(crate::Error::Template(format!("duplicate template ID {id}")));
            }
            templates.push(Template::new(*id, pattern.as_ref())?);
        }

        Ok(Self { templates, by_id })
    }

    /// Loads a bank from a template CSV file.
    ///
    /// First column is the integer event ID, second column the pattern;
    /// additional columns are ignored. A non-numeric first row is
    /// treated as a header.
    pub fn from_csv(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Template(format!("cannot read {}: {e}", path.display())))?;
        Self::from_csv_str(&text)
    }

    /// Loads a bank from template CSV text. See [`TemplateBank::from_csv`].
    pub fn from_csv_str(text: &str) -> crate::Result<Self> {
        let mut entries: Vec<(u32, String)> = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let fields = split_csv_line(line);
            let mut fields = fields.into_iter();

            let (Some(id_field), Some(pattern)) = (fields.next(), fields.next()) else {
                return Err(crate::Error::Template(format!(
                    "CSV row {} has fewer than 2 columns",
                    line_no + 1,
                )));
            };

            match id_field.trim().parse::<u32>() {
                Ok(id) => entries.push((id, pattern)),
                Err(_) if line_no == 0 => {
                    // Header row
                    continue;
                }
                Err(_) => {
                    return Err(crate::Error::Template(format!(
                        "CSV row {} has non-integer event ID {id_field:?}",
                        line_no + 1,
                    )));
                }
            }
        }

        Self::from_templates(&entries)
    }

    /// Serializes the bank back into template CSV text.
    ///
    /// Containers that must be self-describing embed this dump.
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();

        for template in &self.templates {
            out.push_str(&template.id.to_string());
            out.push(',');
            out.push_str(&quote_csv_field(&template.pattern));
            out.push('\n');
        }

        out
    }

    /// Returns the template with the given event ID.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Template> {
        self.by_id.get(&id).and_then(|idx| self.templates.get(*idx))
    }

    /// Iterates templates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if the bank holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Matches a line against the bank, first match wins.
    #[must_use]
    pub fn match_line(&self, line: &str) -> Option<(u32, Vec<String>)> {
        self.templates
            .iter()
            .find_map(|template| template.matches(line).map(|slots| (template.id, slots)))
    }
}

/// Splits one CSV line into fields, honoring double quotes with `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => {
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            c => field.push(c),
        }
    }

    fields.push(field);
    fields
}

fn quote_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}
