//! Human-readable archive listings.

use std::io::{self, Write};

use crate::archive::Archive;

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Formats a byte count with binary units, e.g. `1.5 MiB`.
pub fn human_size(bytes: u64) -> String {
    let mut unit = 0;
    let mut divisor = 1u64;
    while unit + 1 < UNITS.len() && bytes >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", bytes as f64 / divisor as f64, UNITS[unit])
    }
}

/// Writes one tab-separated line per archive.
///
/// Without `verbose` only archives that still exist are listed, as
/// `vault name size`. With it every record is listed together with its
/// upload time, archive id and checksum, and deleted ones are marked.
pub fn write_listing<W: Write>(out: &mut W, archives: &[Archive], verbose: bool) -> io::Result<()> {
    for archive in archives {
        if !verbose {
            if archive.exists {
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    archive.vault,
                    archive.name,
                    human_size(archive.size)
                )?;
            }
            continue;
        }

        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}{}",
            archive.vault,
            archive.name,
            human_size(archive.size),
            archive.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
            archive.archive_id,
            archive.checksum,
            if archive.exists { "" } else { "\tdeleted" }
        )?;
    }
    Ok(())
}
