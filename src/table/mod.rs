use chrono::NaiveDate;
use std::fmt;

/// A sheet as delivered by the workbook reader: a rectangular grid of
/// strings. Blank cells are empty strings. Header labels are whatever the
/// sheet claims, not necessarily unique or non-empty.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Column labels, from the first row of the sheet.
    pub headers: Vec<String>,
    /// Data rows, one `Vec<String>` per row, each padded to `headers.len()`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = RawTable { headers, rows };
        table.square_off();
        table
    }

    /// Pad or truncate every row to the header width so the rectangular
    /// invariant holds regardless of how ragged the source sheet was.
    pub fn square_off(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            } else if row.len() > width {
                row.truncate(width);
            }
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    /// Index of the first column whose trimmed label equals `name`.
    pub fn col(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single typed value in an output table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    /// Build a cell from a raw sheet string. Empty or whitespace-only
    /// strings become `Null`; everything else stays text.
    pub fn from_raw(s: &str) -> Cell {
        if s.trim().is_empty() {
            Cell::Null
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Null, or text that trims to nothing.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Stringified form used for row keys and hashing. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// A named, immutable-once-built output table of typed cells. Every row has
/// exactly `columns.len()` cells.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Table {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Lift a raw string grid into typed cells (text or null).
    pub fn from_raw(name: impl Into<String>, raw: &RawTable) -> Self {
        let columns = raw.headers.iter().map(|h| h.trim().to_string()).collect();
        let rows = raw
            .rows
            .iter()
            .map(|row| row.iter().map(|s| Cell::from_raw(s)).collect())
            .collect();
        Table {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column named `name`.
    pub fn col(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.col(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    /// Clone out a full column of cells.
    pub fn column_cells(&self, idx: usize) -> Vec<Cell> {
        self.rows.iter().map(|r| r[idx].clone()).collect()
    }

    pub fn column_cells_by_name(&self, name: &str) -> Option<Vec<Cell>> {
        self.col(name).map(|idx| self.column_cells(idx))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Append a column; `cells.len()` must equal the current row count.
    pub fn add_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        self.columns.push(name.into());
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    /// Replace the contents of an existing column, or append it if absent.
    pub fn set_column(&mut self, name: &str, cells: Vec<Cell>) {
        match self.col(name) {
            Some(idx) => {
                debug_assert_eq!(cells.len(), self.rows.len());
                for (row, cell) in self.rows.iter_mut().zip(cells) {
                    row[idx] = cell;
                }
            }
            None => self.add_column(name, cells),
        }
    }

    /// New table with only the named columns, in the given order. Unknown
    /// names are skipped.
    pub fn select(&self, names: &[&str]) -> Table {
        let picks: Vec<usize> = names.iter().filter_map(|n| self.col(n)).collect();
        let columns = picks.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| picks.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Table {
            name: self.name.clone(),
            columns,
            rows,
        }
    }

    /// New table keeping only the rows at `indices`, in the given order.
    pub fn keep_rows(&self, indices: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Table {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_table_squares_ragged_rows() {
        let raw = RawTable::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec!["1".into()], vec!["1".into(), "2".into(), "3".into(), "4".into()]],
        );
        assert!(raw.rows.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn cell_from_raw_blank_is_null() {
        assert_eq!(Cell::from_raw("   "), Cell::Null);
        assert_eq!(Cell::from_raw("x"), Cell::Text("x".into()));
        assert!(Cell::Text("  ".into()).is_blank());
        assert!(!Cell::Text("x".into()).is_blank());
    }

    #[test]
    fn add_and_set_column() {
        let raw = RawTable::new(
            vec!["a".into()],
            vec![vec!["1".into()], vec!["2".into()]],
        );
        let mut table = Table::from_raw("t", &raw);
        table.add_column("b", vec![Cell::Int(1), Cell::Int(2)]);
        assert_eq!(table.n_cols(), 2);
        table.set_column("b", vec![Cell::Int(3), Cell::Int(4)]);
        assert_eq!(table.cell(0, 1), &Cell::Int(3));
        assert_eq!(table.n_cols(), 2);
    }

    #[test]
    fn select_keeps_order_and_skips_unknown() {
        let raw = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()]],
        );
        let table = Table::from_raw("t", &raw);
        let picked = table.select(&["b", "missing", "a"]);
        assert_eq!(picked.columns, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(picked.rows[0], vec![Cell::Text("2".into()), Cell::Text("1".into())]);
    }
}
