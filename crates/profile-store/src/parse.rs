use tracing::warn;

use crate::ingest::UploadUnit;
use crate::schema::Record;

/// Dataset name for an uploaded file: base name with the final extension
/// stripped, lowercased. A leading dot is not an extension separator.
pub fn table_name_from_filename(file_name: &str) -> String {
    let base = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    base.to_ascii_lowercase()
}

/// Parses raw profile text into an upload unit for `file_name`.
///
/// Lines are trimmed and empty ones dropped; the first remaining line is
/// the header and is discarded. Each data line splits on whitespace into
/// at least (core, task, usaged). A line whose usaged field is not a
/// non-negative integer, or which has too few fields, is dropped with a
/// warning rather than failing the file.
pub fn parse_profile_text(file_name: &str, text: &str) -> UploadUnit {
    let table_name = table_name_from_filename(file_name);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    // Header line.
    let _ = lines.next();

    let mut data = Vec::new();
    for line in lines {
        let mut fields = line.split_whitespace();
        let (core, task, usaged) = match (fields.next(), fields.next(), fields.next()) {
            (Some(c), Some(t), Some(u)) => (c, t, u),
            _ => {
                warn!(file = %file_name, %line, "dropping line with too few fields");
                continue;
            }
        };
        let usaged: u32 = match usaged.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(file = %file_name, value = %usaged, "dropping line with unparseable usage");
                continue;
            }
        };
        data.push(Record {
            core: core.to_string(),
            task: task.to_string(),
            usaged,
        });
    }

    UploadUnit { table_name, data }
}
