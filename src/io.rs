use std::fmt::Display;
use std::fs;
use std::io;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;

const ANSI_BLUE: Style = Style::new().blue();

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Create the destination directory for a write, if it doesn't exist yet.
pub fn ensure_parent(path: &Utf8Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Replace the file at `path` wholesale. The contents are staged in a
/// sibling temp file first and moved into place with a rename, so readers
/// never observe a torn write.
pub fn replace_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent(path)?;

    let staged = path.with_extension("tmp");
    fs::write(&staged, contents)?;
    fs::rename(&staged, path)?;

    Ok(())
}
