// src/table.rs

use crate::model::FeatureTable;
use std::io::{self, Write};

/// Write `table` as CSV: a `commit,<columns>` header, then one line per row in table order.
pub fn write_csv<W: Write>(table: &FeatureTable, mut out: W) -> io::Result<()> {
    write!(out, "commit")?;
    for column in &table.columns {
        write!(out, ",{column}")?;
    }
    writeln!(out)?;

    for row in &table.rows {
        write!(out, "{}", row.commit)?;
        for value in &row.values {
            write!(out, ",{value}")?;
        }
        writeln!(out)?;
    }
    out.flush()
}
