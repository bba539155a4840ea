//! Text protocol result set decoding
//!
//! A `COM_QUERY` response is either an OK/ERR packet or:
//! column count, N column definitions, EOF, rows..., EOF.
//! Only the pieces the probe reads are decoded: column names and the
//! text value of every cell (`NULL` kept distinct from the empty string).

/// Marker byte for a NULL cell in a text row
const NULL_CELL: u8 = 0xFB;

/// Decode a length-encoded integer, returning the value and bytes consumed
pub fn read_lenenc_int(data: &[u8]) -> Option<(u64, usize)> {
    let first = *data.first()?;
    match first {
        0..=0xFA => Some((first as u64, 1)),
        0xFC if data.len() >= 3 => Some((u16::from_le_bytes([data[1], data[2]]) as u64, 3)),
        0xFD if data.len() >= 4 => Some((
            u32::from_le_bytes([data[1], data[2], data[3], 0]) as u64,
            4,
        )),
        0xFE if data.len() >= 9 => Some((
            u64::from_le_bytes([
                data[1], data[2], data[3], data[4], data[5], data[6], data[7], data[8],
            ]),
            9,
        )),
        _ => None,
    }
}

/// Decode a length-encoded byte string, returning the bytes and total consumed
pub fn read_lenenc_bytes(data: &[u8]) -> Option<(&[u8], usize)> {
    let (len, header) = read_lenenc_int(data)?;
    let len = usize::try_from(len).ok()?;
    let end = header.checked_add(len)?;
    if data.len() < end {
        return None;
    }
    Some((&data[header..end], end))
}

/// Extract the column name from a Protocol::ColumnDefinition41 payload
///
/// Layout: catalog, schema, table, org_table, name, org_name, ...
pub fn parse_column_name(payload: &[u8]) -> Option<String> {
    let mut offset = 0;
    for _ in 0..4 {
        let (_, used) = read_lenenc_bytes(&payload[offset..])?;
        offset += used;
    }
    let (name, _) = read_lenenc_bytes(&payload[offset..])?;
    Some(String::from_utf8_lossy(name).into_owned())
}

/// Decode a text protocol row with `columns` cells
pub fn parse_text_row(payload: &[u8], columns: usize) -> Option<Vec<Option<String>>> {
    let mut cells = Vec::with_capacity(columns);
    let mut offset = 0;
    for _ in 0..columns {
        let rest = payload.get(offset..)?;
        if rest.first() == Some(&NULL_CELL) {
            cells.push(None);
            offset += 1;
            continue;
        }
        let (value, used) = read_lenenc_bytes(rest)?;
        cells.push(Some(String::from_utf8_lossy(value).into_owned()));
        offset += used;
    }
    Some(cells)
}

/// A fully buffered text result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Result set for a statement that returned no columns (OK packet)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively like the server does
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn first_row(&self) -> Option<Row<'_>> {
        self.rows().next()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row { set: self, cells })
    }
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a ResultSet,
    cells: &'a [Option<String>],
}

impl<'a> Row<'a> {
    /// Cell by position; outer None if out of range, inner None for NULL
    pub fn get(&self, index: usize) -> Option<Option<&'a str>> {
        self.cells.get(index).map(|c| c.as_deref())
    }

    /// Cell by column name; outer None if the column is missing
    pub fn get_by_name(&self, name: &str) -> Option<Option<&'a str>> {
        self.set.column_index(name).and_then(|i| self.get(i))
    }

    /// String value by name, NULL and missing columns read as ""
    pub fn get_string(&self, name: &str) -> &'a str {
        self.get_by_name(name).flatten().unwrap_or("")
    }

    /// Nullable integer by name; NULL, missing and unparseable all read as None
    pub fn get_null_i64(&self, name: &str) -> Option<i64> {
        self.get_by_name(name)
            .flatten()
            .and_then(|v| v.trim().parse::<i64>().ok())
    }
}
