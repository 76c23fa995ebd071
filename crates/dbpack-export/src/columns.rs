//! Spreadsheet column identifiers.
//!
//! Columns use bijective base-26 letters with no upper bound:
//! `A..Z`, `AA..AZ`, `BA..ZZ`, `AAA..` and so on.

/// Letters for the zero-based column `index` (0 -> `A`, 26 -> `AA`).
pub fn column_name(index: u32) -> String {
    let mut n = u64::from(index) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(char::from(b'A' + rem));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Zero-based index for a column name, or `None` if it is not all `A-Z`.
pub fn column_index(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for byte in name.bytes() {
        if !byte.is_ascii_uppercase() {
            return None;
        }
        value = value * 26 + u64::from(byte - b'A' + 1);
        if value > u64::from(u32::MAX) + 1 {
            return None;
        }
    }
    u32::try_from(value - 1).ok()
}

/// A1-style reference for zero-based `row` and `col`.
pub fn cell_reference(row: u32, col: u32) -> String {
    format!("{}{}", column_name(col), u64::from(row) + 1)
}
