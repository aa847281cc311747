//! ABOUTME: Workflow discovery across the three priority-ordered filesystem roots
//! ABOUTME: Root overrides read from env vars, falling back to XDG/HOME defaults

use std::path::{Path, PathBuf};

use crate::steps::Source;

/// The three discovery roots, in lookup-priority order (project shadows
/// user shadows builtin).
#[derive(Debug, Clone)]
pub struct Discovery {
    pub project_dir: PathBuf,
    pub user_dir: PathBuf,
    pub builtin_dir: PathBuf,
}

impl Discovery {
    /// Build the default roots, honoring `MAVERICK_PROJECT_DIR`,
    /// `MAVERICK_USER_CONFIG_DIR`, `MAVERICK_BUILTIN_DIR` overrides
    /// (test isolation; same shape as env-var config discovery elsewhere in
    /// the stack).
    #[must_use]
    pub fn from_env() -> Self {
        let project_dir = std::env::var_os("MAVERICK_PROJECT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.maverick/workflows"));

        let user_dir = std::env::var_os("MAVERICK_USER_CONFIG_DIR")
            .map(|dir| PathBuf::from(dir).join("maverick/workflows"))
            .or_else(|| {
                std::env::var_os("XDG_CONFIG_HOME")
                    .map(|dir| PathBuf::from(dir).join("maverick/workflows"))
            })
            .or_else(|| dirs_home().map(|home| home.join(".config/maverick/workflows")))
            .unwrap_or_else(|| PathBuf::from(".config/maverick/workflows"));

        let builtin_dir = std::env::var_os("MAVERICK_BUILTIN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/share/maverick/workflows"));

        Self {
            project_dir,
            user_dir,
            builtin_dir,
        }
    }

    /// Roots in priority order, highest first.
    #[must_use]
    pub fn roots(&self) -> [(Source, &Path); 3] {
        [
            (Source::Project, self.project_dir.as_path()),
            (Source::User, self.user_dir.as_path()),
            (Source::Builtin, self.builtin_dir.as_path()),
        ]
    }

    /// Every `<root>/<name>.yaml` (or `.yml`) that exists on disk, annotated
    /// by source, in priority order.
    #[must_use]
    pub fn list(&self) -> Vec<(String, Source, PathBuf)> {
        let mut found = Vec::new();
        for (source, root) in self.roots() {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_yaml = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| ext == "yaml" || ext == "yml");
                if !is_yaml {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                found.push((stem.to_string(), source, path));
            }
        }
        found
    }

    /// First match across `project > user > builtin` for workflow `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<(Source, PathBuf)> {
        for (source, root) in self.roots() {
            for ext in ["yaml", "yml"] {
                let candidate = root.join(format!("{name}.{ext}"));
                if candidate.is_file() {
                    return Some((source, candidate));
                }
            }
        }
        None
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_shadows_user_and_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        let user = dir.path().join("user");
        let builtin = dir.path().join("builtin");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&user).unwrap();
        std::fs::create_dir_all(&builtin).unwrap();

        std::fs::write(project.join("deploy.yaml"), "project version").unwrap();
        std::fs::write(user.join("deploy.yaml"), "user version").unwrap();

        let discovery = Discovery {
            project_dir: project,
            user_dir: user,
            builtin_dir: builtin,
        };

        let (source, path) = discovery.find("deploy").unwrap();
        assert_eq!(source, Source::Project);
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "project version"
        );
    }

    #[test]
    fn list_reports_every_source_even_when_shadowed() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        let user = dir.path().join("user");
        let builtin = dir.path().join("builtin");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&user).unwrap();
        std::fs::create_dir_all(&builtin).unwrap();

        std::fs::write(project.join("deploy.yaml"), "").unwrap();
        std::fs::write(user.join("deploy.yaml"), "").unwrap();

        let discovery = Discovery {
            project_dir: project,
            user_dir: user,
            builtin_dir: builtin,
        };

        let listed = discovery.list();
        assert_eq!(listed.iter().filter(|(n, _, _)| n == "deploy").count(), 2);
    }

    #[test]
    fn missing_root_is_skipped_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = Discovery {
            project_dir: dir.path().join("nope"),
            user_dir: dir.path().join("also-nope"),
            builtin_dir: dir.path().join("still-nope"),
        };
        assert!(discovery.find("anything").is_none());
        assert!(discovery.list().is_empty());
    }
}
