//! Where settings and session exports live, resolved with `dirs`.
//!
//! | what      | Linux                              | macOS                                            | Windows                        |
//! |-----------|------------------------------------|--------------------------------------------------|--------------------------------|
//! | settings  | `~/.config/jam-session/`           | `~/Library/Application Support/jam-session/`     | `%APPDATA%\jam-session\`       |
//! | exports   | `~/.local/share/jam-session/exports/` | `~/Library/Application Support/jam-session/exports/` | `%LOCALAPPDATA%\jam-session\exports\` |

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `settings.toml` inside `config_dir`.
    pub settings_file: PathBuf,
    /// Root under which each session gets its own export directory.
    pub exports_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "jam-session";

    /// Resolve the platform directories, using `.` where the platform has
    /// none.
    pub fn new() -> Self {
        let base = |dir: Option<PathBuf>| {
            dir.unwrap_or_else(|| PathBuf::from("."))
                .join(Self::APP_NAME)
        };
        let config_dir = base(dirs::config_dir());
        let exports_dir = base(dirs::data_local_dir()).join("exports");

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            exports_dir,
        }
    }

    /// `<root>/session-YYYYMMDD-HHMMSS` for a session exported at `at`.
    pub fn session_dir(root: &Path, at: DateTime<Local>) -> PathBuf {
        root.join(format!("session-{}", at.format("%Y%m%d-%H%M%S")))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn layout_under_app_name() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with("jam-session"));
        assert!(paths.exports_dir.ends_with("jam-session/exports"));
        assert_eq!(paths.settings_file, paths.config_dir.join("settings.toml"));
    }

    #[test]
    fn session_dir_is_timestamped() {
        let at = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous local time");
        let dir = AppPaths::session_dir(Path::new("/tmp/exports"), at);
        assert_eq!(dir, PathBuf::from("/tmp/exports/session-20240309-140507"));
    }
}
