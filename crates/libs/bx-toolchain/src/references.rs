//! Library references handed to the compiler service.
//!
//! A generated program links against the libraries its cases name, the
//! packages its job asks for, and the toolchain's framework libraries. When a
//! compile fails only because a library was not passed in, the missing name is
//! scraped from the diagnostic text (see [`missing_reference_name`]) and
//! resolved through a [`ReferenceResolver`].

use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, OnceLock},
};

use tracing::{debug, warn};

use crate::compiler::Diagnostic;

/// Libraries every program implicitly links against.
const FRAMEWORK_CRATES: [&str; 3] = ["std", "core", "alloc"];

const VERSION_KEY: &str = "Version=";

/// Name and optional version of a library.
///
/// The display form is `name, Version=x.y.z`, which is also what
/// [`LibraryIdentity::parse`] accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryIdentity {
    pub name: String,
    pub version: Option<String>,
}

impl LibraryIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Parse a display name such as `fastmath, Version=1.2.0, Culture=neutral`.
    /// Attributes other than the version are ignored.
    pub fn parse(display_name: &str) -> Self {
        let mut parts = display_name.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default().to_string();
        let version = parts
            .find_map(|part| part.strip_prefix(VERSION_KEY))
            .map(str::to_string);
        Self { name, version }
    }

    /// The identifier the library is linked under in generated source.
    pub fn crate_name(&self) -> String {
        self.name.replace('-', "_")
    }
}

impl fmt::Display for LibraryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}, {VERSION_KEY}{version}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Shipped with the compiler itself.
    Framework,
    /// Located on disk and passed to the compiler explicitly.
    Library,
}

/// A located library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub identity: LibraryIdentity,
    pub path: PathBuf,
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn library(identity: LibraryIdentity, path: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            path: path.into(),
            kind: ReferenceKind::Library,
        }
    }

    pub fn framework(identity: LibraryIdentity, path: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            path: path.into(),
            kind: ReferenceKind::Framework,
        }
    }
}

/// Drop references whose identity was already seen, keeping the first one.
pub fn dedup_references<I>(references: I) -> Vec<Reference>
where
    I: IntoIterator<Item = Reference>,
{
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter(|reference| seen.insert(reference.identity.clone()))
        .collect()
}

static FRAMEWORK_REFERENCES: OnceLock<Arc<[Reference]>> = OnceLock::new();

/// Framework libraries of the host toolchain.
///
/// Computed on first use from `rustc --print sysroot` and kept for the life of
/// the process. The value is read-only; builders that need a different set
/// take an override instead of touching this cache.
pub fn framework_references() -> Arc<[Reference]> {
    FRAMEWORK_REFERENCES
        .get_or_init(|| discover_framework_references().into())
        .clone()
}

fn rustc_output(args: &[&str]) -> Option<String> {
    let output = Command::new("rustc").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn discover_framework_references() -> Vec<Reference> {
    let Some(sysroot) = rustc_output(&["--print", "sysroot"]) else {
        warn!("Could not locate the rustc sysroot, framework references are empty");
        return Vec::new();
    };
    let Some(host) = rustc_output(&["-vV"]).and_then(|info| {
        info.lines()
            .find_map(|line| line.strip_prefix("host: "))
            .map(str::to_string)
    }) else {
        warn!("Could not determine the rustc host triple, framework references are empty");
        return Vec::new();
    };

    let lib_dir = Path::new(&sysroot)
        .join("lib")
        .join("rustlib")
        .join(host)
        .join("lib");
    let references: Vec<Reference> = FRAMEWORK_CRATES
        .iter()
        .filter_map(|name| {
            find_rlib(&lib_dir, name)
                .map(|path| Reference::framework(LibraryIdentity::new(*name), path))
        })
        .collect();
    debug!(
        "Found {} framework references in {}",
        references.len(),
        lib_dir.display()
    );
    references
}

/// Find `lib<name>.rlib` or `lib<name>-<hash>.rlib` in `dir`. When several
/// hashed builds exist the lexicographically first one wins, so repeated
/// lookups agree.
fn find_rlib(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = format!("lib{name}.rlib");
    let hashed = format!("lib{name}-");
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|file| file.to_str())
                .is_some_and(|file| {
                    file == exact || (file.starts_with(&hashed) && file.ends_with(".rlib"))
                })
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Locates libraries by identity.
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, identity: &LibraryIdentity) -> Option<Reference>;
}

/// Resolves libraries from a list of directories holding compiled `.rlib`s,
/// such as `target/release/deps`.
#[derive(Debug, Clone, Default)]
pub struct SearchPathResolver {
    directories: Vec<PathBuf>,
}

impl SearchPathResolver {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }
}

impl ReferenceResolver for SearchPathResolver {
    fn resolve(&self, identity: &LibraryIdentity) -> Option<Reference> {
        let name = identity.crate_name();
        self.directories
            .iter()
            .find_map(|dir| find_rlib(dir, &name))
            .map(|path| Reference::library(identity.clone(), path))
    }
}

/// How a compiler phrases "this library was not referenced".
///
/// The diagnostic code, the phrase before the library name and the quoting
/// around it are all load-bearing. They belong to one compiler version; when
/// the compiler changes its wording this value is what changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingReferenceContract {
    pub code: &'static str,
    pub phrase: &'static str,
    pub quote: char,
    /// When set, the name is the one quoted segment containing this token.
    pub token: Option<&'static str>,
}

impl MissingReferenceContract {
    /// `error[E0463]: can't find crate for `name``
    pub const fn rustc() -> Self {
        Self {
            code: "E0463",
            phrase: "can't find crate for",
            quote: '`',
            token: None,
        }
    }

    /// Compilers that print a single-quoted, version-qualified display name,
    /// e.g. `... must add a reference to library 'name, Version=1.0.0'`.
    pub const fn qualified(code: &'static str, phrase: &'static str) -> Self {
        Self {
            code,
            phrase,
            quote: '\'',
            token: Some(VERSION_KEY),
        }
    }
}

/// Extract the missing library's display name from a diagnostic, if the
/// diagnostic is a missing-reference error under `contract`.
pub fn missing_reference_name<'a>(
    diagnostic: &'a Diagnostic,
    contract: &MissingReferenceContract,
) -> Option<&'a str> {
    if diagnostic.code.as_deref() != Some(contract.code) {
        return None;
    }
    let (_, tail) = diagnostic.message.split_once(contract.phrase)?;
    // Odd segments are the quoted ones
    let mut quoted = tail.split(contract.quote).skip(1).step_by(2);
    let name = match contract.token {
        Some(token) => {
            let mut matching = quoted.filter(|segment| segment.contains(token));
            let first = matching.next()?;
            if matching.next().is_some() {
                return None;
            }
            first
        }
        None => quoted.next()?,
    };
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}
