// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Text rendering of factory tables.
//!
//! Column widths are sized from the longest entry in each column, headers
//! included.

use crate::domain::factory_override::FactoryOverride;
use crate::domain::wrapper::UNKNOWN_TYPE_NAME;
use std::fmt::Write;

/// What [`crate::application::factory::Factory::print`] includes besides the
/// override tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintScope {
    /// Override tables only.
    Overrides,
    /// Override tables and user type names (library `tb_*` types hidden).
    #[default]
    User,
    /// Override tables and every registered type name.
    All,
}

const FOOTNOTE: &str = "(*) Types with no associated type name will be printed as <unknown>";

struct Table<'a> {
    headers: &'a [&'a str],
    /// (marker, cells)
    rows: Vec<(&'static str, Vec<String>)>,
}

impl<'a> Table<'a> {
    fn new(headers: &'a [&'a str]) -> Self {
        Self { headers, rows: Vec::new() }
    }

    fn push(&mut self, marker: &'static str, cells: Vec<String>) {
        self.rows.push((marker, cells));
    }

    fn render(&self, out: &mut String, indent: &str) {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for (_, cells) in &self.rows {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.len());
            }
        }
        let marker_width = self.rows.iter().map(|(m, _)| m.len()).max().unwrap_or(0);

        let line = |out: &mut String, marker: &str, cells: &[String]| {
            let mut text = format!("{}{:<mw$}", indent, marker, mw = marker_width);
            for (i, (cell, w)) in cells.iter().zip(&widths).enumerate() {
                if i > 0 {
                    text.push_str("  ");
                }
                let _ = write!(text, "{:<w$}", cell, w = *w);
            }
            out.push_str(text.trim_end());
            out.push('\n');
        };

        let headers: Vec<String> = self.headers.iter().map(|h| h.to_string()).collect();
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        line(out, "", &headers);
        line(out, "", &dashes);
        for (marker, cells) in &self.rows {
            line(out, marker, cells);
        }
    }
}

fn orig_name(ovr: &FactoryOverride) -> String {
    if ovr.orig_type_name.is_empty() {
        UNKNOWN_TYPE_NAME.to_string()
    } else {
        ovr.orig_type_name.clone()
    }
}

/// Render the factory configuration tables. `type_names` is `None` when the
/// registered-type listing is not requested.
pub fn render_configuration(
    inst_overrides: &[&FactoryOverride],
    type_overrides: &[FactoryOverride],
    type_names: Option<&[&str]>,
    total_types: usize,
) -> String {
    let mut out = String::from("\n#### Factory Configuration (*)\n\n");

    if inst_overrides.is_empty() {
        out.push_str("No instance overrides are registered with this factory\n");
    } else {
        let mut table = Table::new(&["Requested Type", "Override Path", "Override Type"]);
        for ovr in inst_overrides {
            table.push("", vec![orig_name(ovr), ovr.full_inst_path.clone(), ovr.ovrd_type_name.clone()]);
        }
        out.push_str("Instance Overrides:\n\n");
        table.render(&mut out, "  ");
    }
    out.push('\n');

    if type_overrides.is_empty() {
        out.push_str("No type overrides are registered with this factory\n");
    } else {
        let mut table = Table::new(&["Requested Type", "Override Type"]);
        for ovr in type_overrides {
            table.push("", vec![orig_name(ovr), ovr.ovrd_type_name.clone()]);
        }
        out.push_str("Type Overrides:\n\n");
        table.render(&mut out, "  ");
    }

    if let Some(names) = type_names {
        out.push('\n');
        let _ = writeln!(out, "All types registered with the factory: {} total", total_types);
        let mut table = Table::new(&["Type Name"]);
        for name in names {
            table.push("", vec![name.to_string()]);
        }
        table.render(&mut out, "  ");
    }

    let _ = write!(out, "\n{}\n\n####\n", FOOTNOTE);
    out
}

/// Render the result of a debug resolution pass.
pub fn render_debug(requested: &str, full_inst_path: &str, considered: &[FactoryOverride], result: &str) -> String {
    let mut out = String::from("\n#### Factory Override Information (*)\n\n");
    let _ = writeln!(
        out,
        "Given a request for an object of type '{}' with an instance\npath of '{}' the factory encountered\n",
        requested, full_inst_path
    );

    if considered.is_empty() {
        out.push_str("no relevant overrides.\n");
    } else {
        out.push_str(
            "the following relevant overrides. An 'x' next to a match indicates a\nmatch that was ignored.\n\n",
        );
        let mut table = Table::new(&["Original Type", "Instance Path", "Override Type"]);
        for ovr in considered {
            let marker = if ovr.selected { "  " } else { "x " };
            table.push(marker, vec![orig_name(ovr), ovr.full_inst_path.clone(), ovr.ovrd_type_name.clone()]);
        }
        table.render(&mut out, "  ");
    }

    let _ = write!(
        out,
        "\nResult:\n\n  The factory will produce an object of type '{}'\n\n{}\n\n####\n",
        result, FOOTNOTE
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_columns_sized_from_longest_entry() {
        let mut table = Table::new(&["A", "B"]);
        table.push("", vec!["long_entry".into(), "x".into()]);
        let mut out = String::new();
        table.render(&mut out, "  ");

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "  A           B");
        assert_eq!(lines[1], "  ----------  -");
        assert_eq!(lines[2], "  long_entry  x");
    }

    #[test]
    fn test_empty_configuration() {
        let out = render_configuration(&[], &[], None, 0);
        assert!(out.contains("No instance overrides are registered with this factory"));
        assert!(out.contains("No type overrides are registered with this factory"));
        assert!(!out.contains("All types registered"));
    }

    #[test]
    fn test_debug_without_candidates() {
        let out = render_debug("packet", "top.p", &[], "packet");
        assert!(out.contains("no relevant overrides."));
        assert!(out.contains("The factory will produce an object of type 'packet'"));
    }
}
