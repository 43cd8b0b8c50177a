use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::extractors::python;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
    /// yt_dlp importable from Python
    YtDlpModule,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::YtDlpModule => "python -m yt_dlp",
        }
    }

    /// Environment variable that overrides the binary location
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            ToolType::YtDlp => Some("YTDLP_PATH"),
            ToolType::Ffmpeg => Some("FFMPEG_PATH"),
            ToolType::YtDlpModule => None,
        }
    }

    fn binary_name(&self) -> &'static str {
        match self {
            ToolType::YtDlp if cfg!(windows) => "yt-dlp.exe",
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg if cfg!(windows) => "ffmpeg.exe",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::YtDlpModule => "python3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locates the external programs a job needs
pub struct ToolManager {
    bundle_dir: Option<PathBuf>,
}

impl ToolManager {
    pub fn new() -> Self {
        let bundle_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self { bundle_dir }
    }

    /// Look for bundled tools in `dir` instead of next to the executable
    pub fn with_bundle_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: Some(dir.into()),
        }
    }

    /// Best path for `tool`, or None when nothing was found
    ///
    /// Order: explicit path, environment override, bundled copy, common
    /// install locations, PATH lookup.
    pub fn resolve(&self, tool: ToolType, explicit: Option<&str>) -> Option<String> {
        if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
            return Some(path.to_string());
        }

        if let Some(var) = tool.env_var() {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return Some(path);
                }
            }
        }

        if let Some(bundled) = self.bundled_path(tool) {
            return Some(bundled.to_string_lossy().to_string());
        }

        self.detect_installed(tool)
    }

    /// `resolve`, falling back to the bare binary name so spawn errors surface later
    pub fn resolve_or_default(&self, tool: ToolType, explicit: Option<&str>) -> String {
        self.resolve(tool, explicit)
            .unwrap_or_else(|| tool.binary_name().to_string())
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let name = tool_type.as_str().to_string();

        let (path, version) = match tool_type {
            ToolType::YtDlpModule => {
                let python = python::find_python(None);
                let version = python::module_version(&python);
                (version.as_ref().map(|_| python), version)
            }
            _ => {
                let path = self.resolve(tool_type, None);
                let version = path.as_deref().and_then(|p| self.get_version(p, tool_type));
                (path, version)
            }
        };

        ToolInfo {
            name,
            tool_type,
            is_available: version.is_some(),
            version,
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::YtDlpModule),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    fn bundled_path(&self, tool: ToolType) -> Option<PathBuf> {
        let dir = self.bundle_dir.as_ref()?;
        let candidates = match tool {
            // shipped as ffmpeg/ffmpeg[.exe] next to the program
            ToolType::Ffmpeg => vec![
                dir.join("ffmpeg").join(tool.binary_name()),
                dir.join(tool.binary_name()),
            ],
            ToolType::YtDlp => vec![dir.join(tool.binary_name())],
            ToolType::YtDlpModule => Vec::new(),
        };

        candidates.into_iter().find(|p| p.is_file())
    }

    fn detect_installed(&self, tool: ToolType) -> Option<String> {
        let binary_name = tool.binary_name();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                return Some(path);
            }
        }

        // 2. Try PATH
        let finder = if cfg!(windows) { "where" } else { "which" };
        if let Ok(output) = Command::new(finder).arg(binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }

        None
    }

    fn get_version(&self, path: &str, tool_type: ToolType) -> Option<String> {
        let arg = match tool_type {
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
            _ => "--version",
        };

        match Command::new(path).arg(arg).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                let out = String::from_utf8_lossy(&output.stdout);
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let manager = ToolManager::with_bundle_dir("/nonexistent");
        assert_eq!(
            manager.resolve(ToolType::Ffmpeg, Some("/custom/ffmpeg")),
            Some("/custom/ffmpeg".to_string())
        );
    }

    #[test]
    fn test_bundled_ffmpeg_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = dir.path().join("ffmpeg").join(ToolType::Ffmpeg.binary_name());
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, b"").unwrap();

        let manager = ToolManager::with_bundle_dir(dir.path());
        assert_eq!(manager.bundled_path(ToolType::Ffmpeg), Some(bundled));
    }

    #[test]
    fn test_default_falls_back_to_name() {
        let manager = ToolManager::with_bundle_dir("/nonexistent");
        let resolved = manager.resolve_or_default(ToolType::YtDlp, None);
        assert!(resolved.ends_with("yt-dlp"));
    }
}
