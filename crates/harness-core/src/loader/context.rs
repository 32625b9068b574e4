use super::linked::LinkedNames;
use super::{DependencyResolver, LoadError, TestModule};
use harness_abi::{ConstructorFn, DestructorFn, ManifestFn, TestFn, MANIFEST_SYMBOL};
use libloading::Library;
use serde::Deserialize;
use std::collections::HashSet;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// One loaded test module and the dependencies opened on its behalf
///
/// Link-time dependencies found in the module's directory are opened before
/// the module, so the dynamic linker binds the module-local copies. Dependencies
/// listed in the manifest are opened after it and kept mapped for the run.
/// Owned by exactly one runner for the duration of a run. Dropping it closes
/// the module first, then its dependencies newest-first.
///
/// # Safety
///
/// Loading a module runs its initialization code in this process. The caller
/// must trust the modules it points the harness at.
pub struct IsolationContext {
    path: PathBuf,
    manifest: String,
    library: Option<Library>,
    dependencies: Vec<Library>,
}

/// The one manifest field needed before discovery
#[derive(Deserialize, Default)]
struct DeclaredDependencies {
    #[serde(default)]
    dependencies: Vec<String>,
}

impl IsolationContext {
    /// Load the module at `path`, resolving its dependencies with `resolver`
    pub fn load(path: &Path, resolver: &DependencyResolver) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let mut dependencies = Vec::new();
        for linked in plan_local_links(path, resolver) {
            debug!(module = %path.display(), dependency = %linked.display(), "Preloading module-local library");
            let dependency = unsafe { open_local(&linked) }.map_err(|e| LoadError::LoadFailed {
                path: linked.clone(),
                reason: e.to_string(),
            })?;
            dependencies.push(dependency);
        }

        let library = unsafe { open_local(path) }.map_err(|e| LoadError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let manifest = read_manifest(path, &library)?;

        let mut context = Self {
            path: path.to_path_buf(),
            manifest,
            library: Some(library),
            dependencies,
        };

        let declared: DeclaredDependencies =
            serde_json::from_str(&context.manifest).unwrap_or_default();
        for name in declared.dependencies {
            let resolved = resolver
                .resolve(&name)
                .ok_or_else(|| LoadError::DependencyNotFound {
                    path: path.to_path_buf(),
                    dependency: name.clone(),
                    searched: resolver.search_paths().len(),
                })?;
            debug!(module = %path.display(), dependency = %resolved.display(), "Opening module dependency");

            let dependency = unsafe { open_local(&resolved) }.map_err(|e| LoadError::LoadFailed {
                path: resolved.clone(),
                reason: e.to_string(),
            })?;
            context.dependencies.push(dependency);
        }

        Ok(context)
    }

    /// Load with the default per-module resolver
    pub fn load_default(path: &Path) -> Result<Self, LoadError> {
        Self::load(path, &DependencyResolver::for_module(path))
    }

    /// Number of dependencies opened for this module
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Keep the module mapped for the rest of the process
    ///
    /// Used when a body abandoned on timeout may still be executing module code.
    pub fn leak(self) {
        std::mem::forget(self);
    }

    fn symbol<T: Copy>(&self, symbol: &str) -> Result<T, LoadError> {
        let not_found = || LoadError::SymbolNotFound {
            path: self.path.clone(),
            symbol: symbol.to_string(),
        };
        let library = self.library.as_ref().ok_or_else(not_found)?;
        unsafe {
            library
                .get::<T>(symbol.as_bytes())
                .map(|s| *s)
                .map_err(|_| not_found())
        }
    }
}

impl TestModule for IsolationContext {
    fn path(&self) -> &Path {
        &self.path
    }

    fn manifest_json(&self) -> &str {
        &self.manifest
    }

    fn test_entry(&self, symbol: &str) -> Result<TestFn, LoadError> {
        self.symbol::<TestFn>(symbol)
    }

    fn constructor(&self, symbol: &str) -> Result<ConstructorFn, LoadError> {
        self.symbol::<ConstructorFn>(symbol)
    }

    fn destructor(&self, symbol: &str) -> Result<DestructorFn, LoadError> {
        self.symbol::<DestructorFn>(symbol)
    }
}

impl Drop for IsolationContext {
    fn drop(&mut self) {
        trace!(module = %self.path.display(), "Unloading test module");
        drop(self.library.take());
        while let Some(dependency) = self.dependencies.pop() {
            drop(dependency);
        }
    }
}

impl std::fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationContext")
            .field("path", &self.path)
            .field("dependencies", &self.dependencies.len())
            .finish()
    }
}

/// Module-local libraries the module links against, dependencies first
///
/// Walks `DT_NEEDED` entries transitively, following only names that exist in
/// the module directory. The linker reuses a preloaded object for a needed name
/// only when the object's `DT_SONAME` equals that name.
fn plan_local_links(path: &Path, resolver: &DependencyResolver) -> Vec<PathBuf> {
    fn visit(
        file: &Path,
        resolver: &DependencyResolver,
        seen: &mut HashSet<PathBuf>,
        plan: &mut Vec<PathBuf>,
    ) {
        for needed in LinkedNames::read(file).needed {
            let Some(local) = resolver.resolve_local(&needed) else {
                continue;
            };
            if !seen.insert(local.clone()) {
                continue;
            }
            visit(&local, resolver, seen, plan);

            let soname = LinkedNames::read(&local).soname;
            if soname.as_deref() != Some(needed.as_str()) {
                warn!(
                    dependency = %local.display(),
                    soname = soname.as_deref().unwrap_or("<none>"),
                    "Module-local library has no matching SONAME; the linker may load another copy"
                );
            }
            plan.push(local);
        }
    }

    let mut seen = HashSet::from([path.to_path_buf()]);
    let mut plan = Vec::new();
    visit(path, resolver, &mut seen, &mut plan);
    plan
}

fn read_manifest(path: &Path, library: &Library) -> Result<String, LoadError> {
    let manifest_fn = unsafe { library.get::<ManifestFn>(MANIFEST_SYMBOL.as_bytes()) }
        .map(|s| *s)
        .map_err(|_| LoadError::SymbolNotFound {
            path: path.to_path_buf(),
            symbol: MANIFEST_SYMBOL.to_string(),
        })?;

    let raw = unsafe { manifest_fn() };
    if raw.is_null() {
        return Err(LoadError::InvalidManifest {
            path: path.to_path_buf(),
            reason: "manifest function returned null".to_string(),
        });
    }

    unsafe { CStr::from_ptr(raw) }
        .to_str()
        .map(str::to_string)
        .map_err(|e| LoadError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Open a library without exporting its symbols to the rest of the process
#[cfg(unix)]
unsafe fn open_local(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
    UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL).map(Library::from)
}

/// Open a library, searching its own directory for its link-time dependencies
#[cfg(windows)]
unsafe fn open_local(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::windows::{Library as WindowsLibrary, LOAD_WITH_ALTERED_SEARCH_PATH};
    WindowsLibrary::load_with_flags(path, LOAD_WITH_ALTERED_SEARCH_PATH).map(Library::from)
}
