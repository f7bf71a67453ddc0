//! Row model and text table rendering

use netjoin_core::ProcessId;
use netjoin_namespace::Interface;
use serde::Serialize;
use std::io::{self, Write};

/// Column titles
pub const HEADER: [&str; 5] = ["PID", "Interface", "MAC", "Up", "running"];

/// One interface of one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Argument as given on the command line
    pub target: String,
    /// Process whose namespace was inspected
    pub pid: ProcessId,
    /// The interface
    #[serde(flatten)]
    pub interface: Interface,
}

impl Row {
    fn cells(&self) -> [String; 5] {
        [
            self.target.clone(),
            self.interface.name.clone(),
            self.interface
                .hardware_addr
                .as_ref()
                .map_or_else(String::new, ToString::to_string),
            self.interface.up.to_string(),
            self.interface.running.to_string(),
        ]
    }
}

/// Write `rows` as a boxed table
pub fn render<W: Write>(rows: &[Row], out: &mut W) -> io::Result<()> {
    let cells: Vec<[String; 5]> = rows.iter().map(Row::cells).collect();

    let mut widths = HEADER.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let rule = format!("+{rule}+");

    writeln!(out, "{rule}")?;
    write_line(out, &HEADER, &widths)?;
    if !cells.is_empty() {
        writeln!(out, "{rule}")?;
        for row in &cells {
            write_line(out, row, &widths)?;
        }
    }
    writeln!(out, "{rule}")
}

fn write_line<W, S>(out: &mut W, cells: &[S], widths: &[usize]) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    let mut line = String::from("|");
    for (cell, &width) in cells.iter().zip(widths) {
        line.push_str(&format!(" {:<width$} |", cell.as_ref()));
    }
    writeln!(out, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use netjoin_namespace::HardwareAddr;

    fn row(target: &str, name: &str, mac: Option<[u8; 6]>, up: bool) -> Row {
        Row {
            target: target.to_string(),
            pid: ProcessId::from_raw(1),
            interface: Interface {
                index: 1,
                name: name.to_string(),
                hardware_addr: mac.and_then(HardwareAddr::new),
                up,
                running: up,
                loopback: name == "lo",
            },
        }
    }

    fn render_string(rows: &[Row]) -> String {
        let mut out = Vec::new();
        render(rows, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_empty_table() {
        let text = render_string(&[]);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "| PID | Interface | MAC | Up | running |");
    }

    #[test]
    fn test_rows_are_aligned() {
        let text = render_string(&[
            row("1", "lo", None, true),
            row("abc123def456", "eth0", Some([0x02, 0x42, 0xac, 0x11, 0, 2]), false),
        ]);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
        assert!(lines[3].starts_with("| 1            | lo "));
        assert!(lines[4].contains("02:42:ac:11:00:02"));
        assert!(lines[4].contains("false"));
    }

    #[test]
    fn test_row_json() {
        let json = serde_json::to_value(row("1", "lo", None, true)).unwrap();

        assert_eq!(json["target"], "1");
        assert_eq!(json["pid"], 1);
        assert_eq!(json["name"], "lo");
        assert!(json["hardware_addr"].is_null());
    }
}
