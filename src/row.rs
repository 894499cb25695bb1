// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::template::TemplateBank;

/// One input line in factored form.
///
/// A line either matched a template (an event carrying the template ID
/// plus its captured slot values) or passes through verbatim as unknown.
/// Rows reference templates by ID only; the bank owns the templates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Row {
    /// Line matched a template
    Event {
        /// ID of the matched template
        template_id: u32,

        /// Captured slot values, in slot order
        slots: Vec<String>,
    },

    /// Line matched no template and is stored verbatim
    Unknown {
        /// The raw line
        line: String,
    },
}

impl Row {
    /// Returns `true` if this row is an event.
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event { .. })
    }
}

/// Factors raw lines into rows, one per input line.
///
/// Each line is matched against the bank in insertion order; the first
/// match wins. Output is deterministic for identical `(lines, bank)`.
#[must_use]
pub fn parse_lines_rows(lines: &[String], bank: &TemplateBank) -> Vec<Row> {
    lines
        .iter()
        .map(|line| match bank.match_line(line) {
            Some((template_id, slots)) => Row::Event { template_id, slots },
            None => Row::Unknown { line: line.clone() },
        })
        .collect()
}

/// Factors raw lines into an event list and an unknown-line list.
///
/// Both lists preserve input order. Positional alignment is lost; use
/// [`parse_lines_rows`] when the row-mask needs to be constructed.
#[must_use]
pub fn parse_lines(
    lines: &[String],
    bank: &TemplateBank,
) -> (Vec<(u32, Vec<String>)>, Vec<String>) {
    let mut events = Vec::new();
    let mut unknown = Vec::new();

    for row in parse_lines_rows(lines, bank) {
        match row {
            Row::Event { template_id, slots } => events.push((template_id, slots)),
            Row::Unknown { line } => unknown.push(line),
        }
    }

    (events, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn bank() -> crate::Result<TemplateBank> {
        TemplateBank::from_templates(&[
            (1, "Verification succeeded for <*>"),
            (2, "PacketResponder <*> terminating"),
        ])
    }

    #[test]
    fn rows_preserve_alignment() -> crate::Result<()> {
        let lines: Vec<String> = [
            "Verification succeeded for blk_1",
            "something else entirely",
            "PacketResponder 0 terminating",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        let rows = parse_lines_rows(&lines, &bank()?);

        assert_eq!(3, rows.len());
        assert!(rows[0].is_event());
        assert!(!rows[1].is_event());
        assert!(rows[2].is_event());

        assert_eq!(
            Row::Unknown {
                line: "something else entirely".to_owned(),
            },
            rows[1],
        );

        Ok(())
    }

    #[test]
    fn split_preserves_order() -> crate::Result<()> {
        let lines: Vec<String> = [
            "unmatched A",
            "PacketResponder 2 terminating",
            "unmatched B",
            "PacketResponder 1 terminating",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        let (events, unknown) = parse_lines(&lines, &bank()?);

        assert_eq!(
            vec![
                (2, vec!["2".to_owned()]),
                (2, vec!["1".to_owned()]),
            ],
            events,
        );
        assert_eq!(vec!["unmatched A".to_owned(), "unmatched B".to_owned()], unknown);

        Ok(())
    }
}
