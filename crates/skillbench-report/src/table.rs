//! Plain-text tables for terminal output

use std::fmt;

/// A titled grid of left-aligned cells
#[derive(Debug, Clone, Default)]
pub struct Table {
    title: Option<String>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: None,
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Short rows are padded with empty cells
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.headers.len().max(row.len()), String::new());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        (0..columns)
            .map(|i| {
                self.rows
                    .iter()
                    .chain(std::iter::once(&self.headers))
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let line = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!("{:<width$}", cell, width = width)
        })
        .collect::<Vec<_>>()
        .join(" | ");
    writeln!(f, "{}", line.trim_end())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();

        if let Some(title) = &self.title {
            writeln!(f, "{}", title)?;
        }
        write_row(f, &self.headers, &widths)?;
        let rule = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        writeln!(f, "{}", rule)?;
        for row in &self.rows {
            write_row(f, row, &widths)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_align_to_widest_cell() {
        let mut table = Table::new(["Metric", "Value"]).with_title("Summary");
        table.add_row(["Total", "10"]);
        table.add_row(["False positive rate", "n/a"]);

        let rendered = table.to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "Summary");
        assert_eq!(lines[1], "Metric              | Value");
        assert_eq!(lines[2], "--------------------+------");
        assert_eq!(lines[3], "Total               | 10");
        assert_eq!(lines[4], "False positive rate | n/a");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut table = Table::new(["a", "b", "c"]);
        table.add_row(["1"]);
        assert!(!table.is_empty());
        assert_eq!(table.to_string().lines().nth(2), Some("1 |   |"));
    }
}
