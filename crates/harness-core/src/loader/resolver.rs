//! Per-module dependency resolution
//!
//! Each module gets a private search list: its own directory first, then the
//! ambient library path. A module-local copy of a shared library therefore
//! wins over whatever version the rest of the process would pick up.

use harness_config::module_extension;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyResolver {
    module_dir: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl DependencyResolver {
    /// Resolver for the module at `module_path`
    pub fn for_module(module_path: &Path) -> Self {
        let module_dir = module_path.parent().map(Path::to_path_buf);
        let mut search_paths: Vec<PathBuf> = module_dir.iter().cloned().collect();
        for path in Self::ambient_search_paths() {
            if !search_paths.contains(&path) {
                search_paths.push(path);
            }
        }
        Self {
            module_dir,
            search_paths,
        }
    }

    /// Resolver over an explicit search list, with no module directory
    pub fn with_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            module_dir: None,
            search_paths,
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn module_dir(&self) -> Option<&Path> {
        self.module_dir.as_deref()
    }

    /// A link-time dependency name that exists verbatim in the module directory
    pub fn resolve_local(&self, needed: &str) -> Option<PathBuf> {
        let dir = self.module_dir.as_ref()?;
        if Path::new(needed).components().count() != 1 {
            return None;
        }
        let candidate = dir.join(needed);
        candidate.is_file().then_some(candidate)
    }

    /// The process-wide library path, then the platform's standard locations
    ///
    /// - Linux: `LD_LIBRARY_PATH`, /usr/local/lib, /usr/lib, /lib (and lib64)
    /// - macOS: `DYLD_LIBRARY_PATH`, /usr/local/lib, /usr/lib, /opt/homebrew/lib
    /// - Windows: `PATH`, System32
    pub fn ambient_search_paths() -> Vec<PathBuf> {
        let variable = if cfg!(target_os = "windows") {
            "PATH"
        } else if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        };

        let mut paths: Vec<PathBuf> = std::env::var_os(variable)
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        paths.retain(|p| !p.as_os_str().is_empty());

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/lib"));
            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            if let Ok(system_root) = std::env::var("SystemRoot") {
                paths.push(PathBuf::from(format!("{}\\System32", system_root)));
            }
        }

        paths
    }

    /// File names tried for a dependency, in priority order
    ///
    /// The bare name comes first so that `libfoo.so.1` or `foo.dll` can be
    /// declared verbatim; then the platform conventions `lib{name}.{ext}` and
    /// `{name}.{ext}`.
    pub fn candidate_names(name: &str) -> Vec<String> {
        let ext = module_extension();
        let mut names = vec![name.to_string()];
        let prefixes: &[&str] = if cfg!(target_os = "windows") {
            &["", "lib"]
        } else {
            &["lib", ""]
        };
        for prefix in prefixes {
            let candidate = format!("{}{}.{}", prefix, name, ext);
            if !names.contains(&candidate) {
                names.push(candidate);
            }
        }
        names
    }

    /// First existing file for `name` across the search list
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() {
            return direct.is_file().then(|| direct.to_path_buf());
        }

        let names = Self::candidate_names(name);
        self.search_paths.iter().find_map(|dir| {
            names
                .iter()
                .map(|candidate| dir.join(candidate))
                .find(|path| path.is_file())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_module_directory_comes_first() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("Math.Tests.so");

        let resolver = DependencyResolver::for_module(&module);

        assert_eq!(resolver.search_paths()[0], dir.path());
        assert!(resolver.search_paths().len() > 1);
    }

    #[test]
    fn test_resolve_local_only_looks_in_module_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("libcodec.so.2"), b"").unwrap();
        let resolver = DependencyResolver::for_module(&dir.path().join("Codec.Tests.so"));

        assert_eq!(resolver.module_dir(), Some(dir.path()));
        assert_eq!(
            resolver.resolve_local("libcodec.so.2"),
            Some(dir.path().join("libcodec.so.2"))
        );
        assert_eq!(resolver.resolve_local("libc.so.6"), None);
        assert_eq!(resolver.resolve_local("../libcodec.so.2"), None);
        assert_eq!(
            DependencyResolver::with_paths(vec![dir.path().to_path_buf()]).resolve_local("libcodec.so.2"),
            None
        );
    }

    #[test]
    fn test_candidate_names_start_with_bare_name() {
        let names = DependencyResolver::candidate_names("fixtures");
        assert_eq!(names[0], "fixtures");
        assert!(names.contains(&format!("libfixtures.{}", module_extension())));
        assert!(names.contains(&format!("fixtures.{}", module_extension())));
    }

    #[test]
    fn test_module_local_copy_wins() {
        let local = TempDir::new().unwrap();
        let ambient = TempDir::new().unwrap();
        let file = format!("libshared.{}", module_extension());
        fs::write(local.path().join(&file), b"").unwrap();
        fs::write(ambient.path().join(&file), b"").unwrap();

        let resolver = DependencyResolver::with_paths(vec![
            local.path().to_path_buf(),
            ambient.path().to_path_buf(),
        ]);

        assert_eq!(resolver.resolve("shared"), Some(local.path().join(&file)));
    }

    #[test]
    fn test_falls_back_to_later_paths() {
        let local = TempDir::new().unwrap();
        let ambient = TempDir::new().unwrap();
        fs::write(ambient.path().join("vendor.bin"), b"").unwrap();

        let resolver = DependencyResolver::with_paths(vec![
            local.path().to_path_buf(),
            ambient.path().to_path_buf(),
        ]);

        assert_eq!(resolver.resolve("vendor.bin"), Some(ambient.path().join("vendor.bin")));
        assert_eq!(resolver.resolve("missing"), None);
    }

    #[test]
    fn test_absolute_name_is_used_directly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exact.bin");
        fs::write(&path, b"").unwrap();

        let resolver = DependencyResolver::with_paths(Vec::new());

        assert_eq!(resolver.resolve(path.to_str().unwrap()), Some(path.clone()));
        assert_eq!(resolver.resolve(dir.path().join("nope.bin").to_str().unwrap()), None);
    }
}
