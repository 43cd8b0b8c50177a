// Python launcher helpers - `python3 -m yt_dlp`
//
// Used when the yt-dlp binary is missing or the user asks for module mode.
// The interpreter can be overridden with YTDLP_PYTHON (e.g. a venv).

use std::process::Command as StdCommand;

pub const PYTHON_ENV: &str = "YTDLP_PYTHON";

/// Find Python interpreter
pub fn find_python(explicit: Option<&str>) -> String {
    if let Some(cmd) = explicit {
        return cmd.to_string();
    }

    if let Ok(custom) = std::env::var(PYTHON_ENV) {
        if !custom.trim().is_empty() {
            return custom;
        }
    }

    let candidates = ["python3", "/opt/homebrew/bin/python3", "/usr/local/bin/python3", "python"];

    for cmd in candidates {
        if let Ok(output) = StdCommand::new(cmd).arg("--version").output() {
            if output.status.success() {
                return cmd.to_string();
            }
        }
    }

    "python3".to_string()
}

/// Check if yt_dlp module is installed for `python`
pub fn has_ytdlp_module(python: &str) -> bool {
    match StdCommand::new(python)
        .args(["-c", "import yt_dlp"])
        .output()
    {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

/// Version reported by the module, if importable
pub fn module_version(python: &str) -> Option<String> {
    let output = StdCommand::new(python)
        .args(["-m", "yt_dlp", "--version"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

/// Arguments that turn `python` into a yt-dlp launcher
pub fn module_prefix() -> Vec<String> {
    vec!["-m".to_string(), "yt_dlp".to_string()]
}
