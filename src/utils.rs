use std::fs;
use std::path::Path;

// Some pretty printing codepoints
pub const DOWNLOAD_C: &str = "⬇";
pub const SKIP_C: &str = "⏭";
pub const CHECK_C: &str = "✓";
pub const WARN_C: &str = "⚠";

fn size(path: &Path) -> std::io::Result<u64> {
    let md = fs::metadata(path)?;
    if md.is_file() {
        Ok(md.len())
    } else if md.is_dir() {
        let mut total = 0;
        for entry in fs::read_dir(path)? {
            total += size(&entry?.path())?;
        }
        Ok(total)
    } else {
        // symlinks and other beasts
        Ok(0)
    }
}

fn pretty_msg_at_path(msg: &str, path: &Path) -> String {
    let at = "\x1b[1;36m@\x1b[0m"; // bold + cyan
    match size(path) {
        Ok(bytes) => {
            let size_mb = bytes as f64 / (1024.0 * 1024.0);
            let size_str = format!("\x1b[1m{size_mb:.2} MB\x1b[0m"); // bold
            format!("{msg} {at} {} ({})", path.display(), size_str)
        }
        Err(..) => format!("{msg} {at} {}", path.display()),
    }
}

pub fn pretty_println_at_path(msg: &str, path: &Path) {
    println!("{}", pretty_msg_at_path(msg, path));
}

pub fn skip_because_file_exists(skipped: &str, path: &Path) {
    let msg = format!("{SKIP_C} Skipping {skipped}: cache is fresh");
    pretty_println_at_path(&msg, path);
}

/// Seconds-resolution mtime, the unit stored in sidecar metadata.
pub fn mtime_secs(path: &Path) -> std::io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let secs = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(secs)
}
