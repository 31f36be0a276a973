//! Land-cover class names from a GDAL raster attribute table.
//!
//! The table lives in the `<raster>.aux.xml` sidecar:
//!
//! ```xml
//! <PAMDataset>
//!   <PAMRasterBand band="1">
//!     <GDALRasterAttributeTable>
//!       <FieldDefn index="0"><Name>Value</Name>...</FieldDefn>
//!       <Row index="0"><F>0</F><F>Unclassified</F></Row>
//!     </GDALRasterAttributeTable>
//!   </PAMRasterBand>
//! </PAMDataset>
//! ```

use crate::error::{EngineError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scenario_common::{ClassEntry, Color};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Column holding class codes when the table has one; otherwise the row
/// index is the class code.
const VALUE_COLUMN: &str = "Value";

/// Names that are not reported as classes.
const SKIPPED_NAMES: [&str; 1] = ["Unclassified"];

/// Raster attribute table and colour table parsed from an aux.xml sidecar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    pub columns: Vec<String>,
    /// Row index and cell values, in document order.
    pub rows: Vec<(usize, Vec<String>)>,
    pub colors: Vec<Color>,
}

impl AttributeTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Path of the PAM sidecar for `raster`.
pub fn sidecar_path(raster: &Path) -> PathBuf {
    let mut name = raster.as_os_str().to_owned();
    name.push(".aux.xml");
    PathBuf::from(name)
}

/// Parse the first raster attribute table (and colour table) in a PAM document.
pub fn parse_attribute_table(xml: &str) -> Result<AttributeTable> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut table = AttributeTable::default();
    let mut found_table = false;
    let mut in_table = false;
    let mut in_field = false;
    let mut in_name = false;
    let mut in_cell = false;
    let mut in_color_table = false;
    let mut row: Option<(usize, Vec<String>)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"GDALRasterAttributeTable" if !found_table => {
                    in_table = true;
                    found_table = true;
                }
                b"FieldDefn" if in_table => in_field = true,
                b"Name" if in_field => in_name = true,
                b"Row" if in_table => {
                    let index = attribute(&e, b"index")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(table.rows.len());
                    row = Some((index, Vec::new()));
                }
                b"F" if row.is_some() => {
                    in_cell = true;
                    if let Some((_, cells)) = row.as_mut() {
                        cells.push(String::new());
                    }
                }
                b"ColorTable" if !in_table => in_color_table = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"F" => {
                    if let Some((_, cells)) = row.as_mut() {
                        cells.push(String::new());
                    }
                }
                b"Entry" if in_color_table => {
                    let channel = |key: &[u8]| {
                        attribute(&e, key)
                            .and_then(|v| v.parse::<u8>().ok())
                            .unwrap_or(0)
                    };
                    table
                        .colors
                        .push(Color::new(channel(b"c1"), channel(b"c2"), channel(b"c3")));
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_name {
                    table.columns.push(t.unescape()?.into_owned());
                } else if in_cell {
                    if let Some(cell) = row.as_mut().and_then(|(_, cells)| cells.last_mut()) {
                        cell.push_str(&t.unescape()?);
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"GDALRasterAttributeTable" => in_table = false,
                b"FieldDefn" => in_field = false,
                b"Name" => in_name = false,
                b"F" => in_cell = false,
                b"Row" => {
                    if let Some(finished) = row.take() {
                        table.rows.push(finished);
                    }
                }
                b"ColorTable" => in_color_table = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EngineError::attribute_table(format!(
                    "XML parsing error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !found_table {
        return Err(EngineError::attribute_table(
            "no GDALRasterAttributeTable element found",
        ));
    }
    Ok(table)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Class code to name and colour for every named class in `table`.
///
/// Colours come from `color_map` (the TIFF palette) when given, else from
/// the sidecar's colour table.
pub fn class_entries(
    table: &AttributeTable,
    name_column: &str,
    color_map: Option<&[Color]>,
) -> Result<BTreeMap<u16, ClassEntry>> {
    let name_index = table.column_index(name_column).ok_or_else(|| {
        EngineError::attribute_table(format!("column {name_column:?} not found"))
    })?;
    let value_index = table.column_index(VALUE_COLUMN);
    let palette = color_map.unwrap_or(table.colors.as_slice());

    let mut classes = BTreeMap::new();
    for (row_index, cells) in &table.rows {
        let name = cells.get(name_index).map(|s| s.trim()).unwrap_or_default();
        if name.is_empty() || SKIPPED_NAMES.contains(&name) {
            continue;
        }
        let code = match value_index.and_then(|i| cells.get(i)) {
            Some(value) => value.trim().parse::<u16>().map_err(|_| {
                EngineError::attribute_table(format!("row {row_index}: invalid class code {value:?}"))
            })?,
            None => u16::try_from(*row_index).map_err(|_| {
                EngineError::attribute_table(format!("row index {row_index} exceeds the class range"))
            })?,
        };
        classes.insert(
            code,
            ClassEntry {
                name: name.to_string(),
                color: palette.get(usize::from(code)).map(Color::to_hex),
            },
        );
    }
    Ok(classes)
}

/// Read class names for `raster` from its aux.xml sidecar.
pub fn read_classnames(
    raster: &Path,
    name_column: &str,
    color_map: Option<&[Color]>,
) -> Result<BTreeMap<u16, ClassEntry>> {
    let sidecar = sidecar_path(raster);
    let xml = std::fs::read_to_string(&sidecar).map_err(|e| {
        EngineError::attribute_table(format!(
            "could not load attribute table from {}: {e}",
            sidecar.display()
        ))
    })?;
    let table = parse_attribute_table(&xml)?;
    let classes = class_entries(&table, name_column, color_map)?;
    debug!(sidecar = %sidecar.display(), classes = classes.len(), "read class names");
    Ok(classes)
}
