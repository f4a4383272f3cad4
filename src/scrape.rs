//! Marker-based extraction over the download site's HTML.
//!
//! This is deliberately not an HTML parser: the server emits one fixed page
//! layout, and the values we need always sit directly after known literal
//! markers. Plain substring search is the whole contract — a marker inside a
//! comment still matches, entities are not decoded, and a layout change on
//! the server side breaks extraction. Missing markers yield empty results,
//! never errors; callers treat "empty" as "not found".

/// Marker preceding each device codename in the device-list page.
const DEVICE_MARKER: &str = "?device=";

/// Marker preceding each downloadable build filename in a listing page.
const ROM_LINK_MARKER: &str = "get/";

/// Label preceding a build's MD5 digest.
const MD5_LABEL: &str = "md5sum: ";

/// Table-cell marker used for the size and date columns.
const CELL_MARKER: &str = "<td>";

/// Capture the text run that follows `marker`, up to (excluding) the first
/// terminator character. Returns the captured slice and the byte position
/// just after the marker, so the caller can continue scanning without
/// restarting. Runs to end-of-document when no terminator occurs.
fn capture_after<'a>(
    html: &'a str,
    from: usize,
    marker: &str,
    terminators: &[char],
) -> Option<(&'a str, usize)> {
    let at = html[from..].find(marker)? + from;
    let start = at + marker.len();
    let rest = &html[start..];
    let end = rest.find(terminators).unwrap_or(rest.len());
    Some((&rest[..end], start))
}

/// All device codenames in the device-list page, in document order.
/// Duplicates are preserved; an unmatched page yields an empty vec.
pub fn device_ids(html: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut pos = 0;
    while let Some((id, next)) = capture_after(html, pos, DEVICE_MARKER, &['"']) {
        if !id.is_empty() {
            ids.push(id.to_string());
        }
        pos = next;
    }
    ids
}

/// Up to `max` build filenames from a listing page, newest first (the
/// server pre-sorts the page; we keep document order).
pub fn latest_rom_filenames(html: &str, max: usize) -> Vec<String> {
    let mut names = Vec::new();
    let mut pos = 0;
    while names.len() < max {
        match capture_after(html, pos, ROM_LINK_MARKER, &['"']) {
            Some((name, next)) => {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
                pos = next;
            }
            None => break,
        }
    }
    names
}

/// The MD5 digest the page advertises for `filename`.
///
/// Finds the first literal occurrence of the filename, then the first
/// `md5sum: ` label after it, then the hex run up to a space or `<`.
/// `None` when the filename or the label is absent, or when the run
/// contains no hex at all.
pub fn checksum_for(html: &str, filename: &str) -> Option<String> {
    let at = html.find(filename)?;
    let (run, _) = capture_after(html, at + filename.len(), MD5_LABEL, &[' ', '<'])?;
    let hex: &str = match run.find(|c: char| !c.is_ascii_hexdigit()) {
        Some(end) => &run[..end],
        None => run,
    };
    if hex.is_empty() {
        return None;
    }
    Some(hex.to_string())
}

/// The `nth` (1-based) table cell after the first occurrence of `filename`.
/// Used for the size and date columns of the listing table.
pub fn cell_after(html: &str, filename: &str, nth: usize) -> Option<String> {
    if nth == 0 {
        return None;
    }
    let mut pos = html.find(filename)? + filename.len();
    let mut cell = None;
    for _ in 0..nth {
        let (text, next) = capture_after(html, pos, CELL_MARKER, &['<'])?;
        cell = Some(text);
        pos = next;
    }
    cell.map(|c| c.trim().to_string())
}
