use csv::{
    QuoteStyle,
    Terminator,
    WriterBuilder,
};

use crate::error::Error;
use crate::partition::consts::COLUMN_COUNT;
use crate::partition::{
    PartitionRegion,
    PartitionTable,
};

const COLUMN_TITLES: &str = "# Name, Type, SubType, Offset, Size, Flags";

/// Serialize a partition table to the ESP-IDF CSV format and return the
/// content as a `String`.
///
/// Each entry of `header` becomes a `#` comment line, followed by a comment
/// naming the columns. Columns are padded so the rows line up, and blank
/// cells are kept so that offsets left empty stay "auto" for the ESP-IDF
/// tooling. Cells containing a comma, a quote or a line break are quoted.
pub(crate) fn write_csv_content(table: &PartitionTable, header: &[&str]) -> Result<String, Error> {
    let mut out = Vec::new();
    for line in header {
        out.extend_from_slice(format!("# {line}\n").as_bytes());
    }
    out.extend_from_slice(COLUMN_TITLES.as_bytes());
    out.push(b'\n');

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);

    let mut widths = [0usize; COLUMN_COUNT];
    for region in &table.regions {
        for (width, cell) in widths.iter_mut().zip(cells(region)) {
            *width = (*width).max(cell.len());
        }
    }

    for region in &table.regions {
        wtr.write_record(padded_record(region, &widths))?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidValue {
        field: "partition table",
        reason: format!("CSV output is not valid UTF-8: {}", e),
    })
}

// The padding that aligns a column goes in front of the next cell, so every
// delimiter sits right after its cell. The reader trims it away again.
fn padded_record(region: &PartitionRegion, widths: &[usize; COLUMN_COUNT]) -> Vec<String> {
    let cells = cells(region);
    let mut record = Vec::with_capacity(COLUMN_COUNT);
    record.push(cells[0].to_string());
    for column in 1..COLUMN_COUNT {
        let cell = cells[column];
        if column == COLUMN_COUNT - 1 && cell.is_empty() {
            record.push(String::new());
            continue;
        }
        let previous = cells[column - 1];
        let padding = 1 + widths[column - 1] - previous.len();
        record.push(format!("{}{}", " ".repeat(padding), cell));
    }
    record
}

fn cells(region: &PartitionRegion) -> [&str; COLUMN_COUNT] {
    [
        &region.name,
        &region.region_type,
        &region.subtype,
        &region.offset,
        &region.size,
        &region.flags,
    ]
}
