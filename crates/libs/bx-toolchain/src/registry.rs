//! One shared toolchain per runtime family and tool path.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use tracing::info;

use crate::{
    runtime::{RuntimeFamily, RuntimeVariant},
    toolchain::Toolchain,
};

type ToolchainKey = (RuntimeFamily, Option<PathBuf>);

/// Owned by the orchestration layer; hands out the same [`Toolchain`] for
/// every runtime with the same family and tool path.
#[derive(Debug)]
pub struct ToolchainRegistry {
    library_paths: Vec<PathBuf>,
    toolchains: Mutex<HashMap<ToolchainKey, Arc<Toolchain>>>,
}

impl ToolchainRegistry {
    /// `library_paths` are searched for referenced libraries by the compiler
    /// toolchains this registry creates.
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        Self {
            library_paths,
            toolchains: Mutex::new(HashMap::new()),
        }
    }

    fn key(runtime: &RuntimeVariant) -> ToolchainKey {
        (runtime.family(), runtime.custom_path().map(PathBuf::from))
    }

    fn create(&self, runtime: &RuntimeVariant) -> Toolchain {
        match runtime {
            RuntimeVariant::StandardManaged(_) => Toolchain::standard(self.library_paths.clone()),
            RuntimeVariant::AlternateJit(jit) => {
                Toolchain::alternate_jit(jit, self.library_paths.clone())
            }
            RuntimeVariant::EditorAutomated(editor) => Toolchain::editor(editor),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ToolchainKey, Arc<Toolchain>>> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.toolchains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Use `toolchain` for every runtime with `runtime`'s family and path.
    pub fn register(&self, runtime: &RuntimeVariant, toolchain: Toolchain) -> Arc<Toolchain> {
        let toolchain = Arc::new(toolchain);
        self.lock().insert(Self::key(runtime), Arc::clone(&toolchain));
        toolchain
    }

    pub fn get(&self, runtime: &RuntimeVariant) -> Option<Arc<Toolchain>> {
        self.lock().get(&Self::key(runtime)).cloned()
    }

    pub fn get_or_create(&self, runtime: &RuntimeVariant) -> Arc<Toolchain> {
        let mut toolchains = self.lock();
        Arc::clone(toolchains.entry(Self::key(runtime)).or_insert_with(|| {
            let toolchain = self.create(runtime);
            info!("Created toolchain {} for {runtime}", toolchain.name());
            Arc::new(toolchain)
        }))
    }

    /// Toolchain used for cases without a runtime; its validator reports them.
    pub fn default_toolchain(&self) -> Arc<Toolchain> {
        let mut toolchains = self.lock();
        Arc::clone(
            toolchains
                .entry((RuntimeFamily::StandardManaged, None))
                .or_insert_with(|| Arc::new(Toolchain::standard(self.library_paths.clone()))),
        )
    }

    /// Toolchain responsible for a case's runtime, if it has one.
    pub fn for_runtime(&self, runtime: Option<&RuntimeVariant>) -> Arc<Toolchain> {
        match runtime {
            Some(runtime) => self.get_or_create(runtime),
            None => self.default_toolchain(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolchainRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use bx_config::CodegenBackend;

    use super::*;
    use crate::{
        case::BenchmarkCase,
        runtime::{EditorRuntime, JitRuntime, ManagedRuntime},
        version::ToolVersion,
    };

    fn jit(path: Option<&str>, backend: CodegenBackend) -> RuntimeVariant {
        RuntimeVariant::AlternateJit(JitRuntime {
            name: String::from("alt"),
            custom_path: path.map(PathBuf::from),
            backend,
        })
    }

    #[test]
    fn one_toolchain_per_family_and_path() {
        let registry = ToolchainRegistry::default();
        let a = registry.get_or_create(&jit(Some("/opt/a/rustc"), CodegenBackend::Llvm));
        let a_cranelift = registry.get_or_create(&jit(Some("/opt/a/rustc"), CodegenBackend::Cranelift));
        let b = registry.get_or_create(&jit(Some("/opt/b/rustc"), CodegenBackend::Llvm));
        let host = registry.get_or_create(&RuntimeVariant::StandardManaged(ManagedRuntime::host()));

        assert!(Arc::ptr_eq(&a, &a_cranelift));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&host, &registry.default_toolchain()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn editors_with_different_versions_share_a_toolchain() {
        let editor = |version| {
            RuntimeVariant::EditorAutomated(EditorRuntime::with_version(
                "engine",
                "/opt/editor/Editor",
                None,
                None,
                version,
            ))
        };
        let registry = ToolchainRegistry::default();
        let first = registry.get_or_create(&editor(ToolVersion::new(2021, 3, 10, 1)));
        let second = registry.get_or_create(&editor(ToolVersion::new(2022, 1, 0, 0)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.family(), RuntimeFamily::EditorAutomated);
    }

    #[test]
    fn registered_toolchains_are_returned() {
        let registry = ToolchainRegistry::default();
        let runtime = jit(None, CodegenBackend::Llvm);
        assert!(registry.get(&runtime).is_none());

        let injected = registry.register(&runtime, Toolchain::standard(Vec::new()));
        assert!(Arc::ptr_eq(&injected, &registry.get_or_create(&runtime)));
    }

    #[test]
    fn cases_without_runtime_fail_default_validation() {
        let registry = ToolchainRegistry::default();
        let case = BenchmarkCase::new("a", "1");
        let toolchain = registry.for_runtime(case.job.runtime.as_ref());
        let errors: Vec<_> = toolchain.validate(&case).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_critical);
    }
}
