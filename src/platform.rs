use crate::logw;
use std::path::Path;
use std::process::Command;

fn opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else if cfg!(target_os = "macos") {
        ("open", &[])
    } else {
        ("xdg-open", &[])
    }
}

pub fn open_in_viewer<P: AsRef<Path>>(path: P) {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.exists() {
        logw(format!("Nothing to open at {}", path.display()));
        return;
    }

    let (program, args) = opener();
    if let Err(err) = Command::new(program).args(args).arg(path).spawn() {
        logw(format!("Could not open {}: {}", path.display(), err));
    }
}
