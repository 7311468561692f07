//! Scan configuration and environment resolution.
//!
//! Two halves:
//! - the static scan lists (headers to parse, exported-type whitelist,
//!   cached dependency include templates) and the inclusion predicate
//!   compiled from them;
//! - toolchain discovery (flag, then environment variable, then a shell-out
//!   probe) plus dependency-cache and header-list resolution. Everything in
//!   this half fails fast: a knob that no source can provide is a fatal
//!   configuration error raised before any header is parsed.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// ------------------------------ Scan lists -------------------------------- //

/// Headers scanned per run, relative to the C++ client root. A trailing `*`
/// expands to every `.hxx` file with that prefix.
pub const FILE_LIST: &[&str] = &[
    "couchbase/retry_reason.hxx",
    "core/json_string.hxx",
    "core/columnar/query_options.hxx",
    "core/columnar/query_result.hxx",
    "core/columnar/error.hxx",
    "core/columnar/error_codes.hxx",
];

/// Fully-qualified names exported into the output document; `*` is a
/// wildcard.
pub const TYPE_LIST: &[&str] = &[
    "couchbase::retry_reason",
    "couchbase::core::json_string",
    "couchbase::core::columnar::query_options",
    "couchbase::core::columnar::query_scan_consistency",
    "couchbase::core::columnar::query_metadata",
    "couchbase::core::columnar::query_warning",
    "couchbase::core::columnar::query_metrics",
    "couchbase::core::columnar::query_error_properties",
    "couchbase::core::columnar::errc",
];

/// Include-path templates per cached third-party dependency. `{cache}` is the
/// cache root, `{hash}` the content-hash directory resolved at startup.
pub const DEPS_INCLUDE_PATHS: &[(&str, &[&str])] = &[
    ("asio", &["-I{cache}/asio/{hash}/asio/asio/include"]),
    ("fmt", &["-I{cache}/fmt/{hash}/fmt/include"]),
    ("gsl", &["-I{cache}/gsl/{hash}/gsl/include"]),
    (
        "json",
        &[
            "-I{cache}/json/{hash}/json/include",
            "-I{cache}/json/{hash}/json/external/PEGTL/include",
        ],
    ),
];

/// Namespace prefix of project-defined types; anything else is foreign.
pub const PROJECT_NS_PREFIX: &str = "couchbase::";

/// Marker the AST layer embeds in qualified names of anonymous structs.
pub const UNNAMED_STRUCT_DELIM: &str = "::(unnamed struct";

/// Loose marker for anonymous types inside canonical spellings.
pub const UNNAMED_MARKER: &str = "unnamed";

/// Suffix of type aliases that request legacy-durability struct synthesis.
pub const LEGACY_DURABILITY_SUFFIX: &str = "_with_legacy_durability";

/// Internal marker types never exported, whatever the whitelist says.
const NAME_DENYLIST: &[&str] = &["is_compound_operation", "replica_context"];

/// Serialization/formatting companion headers; never primary type sources.
const EXCLUDED_HEADER_SUFFIXES: &[&str] = &["_json.hxx", "_fmt.hxx"];

// -------------------------------- Errors ---------------------------------- //

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing LLVM version (flag, CN_LLVM_VERSION, or `llvm-config --version`)")]
    MissingLlvmVersion,
    #[error("missing LLVM include directory (flag, CN_LLVM_INCLUDE, or `llvm-config --includedir`)")]
    MissingLlvmIncludeDir,
    #[error("missing LLVM lib directory (flag, CN_LLVM_LIB, or `llvm-config --libdir`)")]
    MissingLlvmLibDir,
    #[error("missing system headers path (flag, CN_SYS_HEADERS, or `xcrun --show-sdk-path`)")]
    MissingSystemHeaders,
    #[error("no dependency cache hash directory under {0}")]
    MissingHashDir(PathBuf),
    #[error("wildcard only supported at end of file path: {0}")]
    WildcardNotTrailing(String),
    #[error("failed to list headers for {pattern}: {source}")]
    HeaderGlob {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("invalid type pattern {pattern}: {source}")]
    TypePattern {
        pattern: String,
        source: regex::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// --------------------------- Inclusion predicate --------------------------- //

/// The whitelist compiled to anchored regexes, once at startup.
#[derive(Debug)]
pub struct ScanConfig {
    patterns: Vec<Regex>,
}

impl ScanConfig {
    pub fn from_type_list(types: &[&str]) -> Result<Self, ConfigError> {
        let mut patterns = Vec::with_capacity(types.len());
        for ty in types {
            // `*` widens to (.*); the extra trailing (.*) lets members nested
            // inside a listed type match as well
            let source = format!("^{}(.*)$", ty.replace('*', "(.*)"));
            let re = Regex::new(&source).map_err(|source| ConfigError::TypePattern {
                pattern: (*ty).to_string(),
                source,
            })?;
            patterns.push(re);
        }
        Ok(Self { patterns })
    }

    pub fn standard() -> Result<Self, ConfigError> {
        Self::from_type_list(TYPE_LIST)
    }

    /// Whether a fully-qualified declaration name is exported.
    pub fn is_included(&self, name: &str) -> bool {
        if NAME_DENYLIST.iter().any(|deny| name.contains(deny)) {
            return false;
        }
        self.patterns.iter().any(|re| re.is_match(name))
    }

    /// The alias path additionally requires the legacy-durability suffix.
    pub fn is_included_alias(&self, name: &str) -> bool {
        name.contains(LEGACY_DURABILITY_SUFFIX) && self.is_included(name)
    }
}

// ------------------------------- Toolchain --------------------------------- //

/// Resolved compiler toolchain knobs. Each one falls back flag → environment
/// variable → discovery command; a knob with no source at all is fatal.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub version: String,
    pub includedir: String,
    pub libdir: String,
    pub system_headers: String,
}

impl Toolchain {
    pub fn resolve(
        version: Option<String>,
        includedir: Option<String>,
        libdir: Option<String>,
        system_headers: Option<String>,
    ) -> Result<Self, ConfigError> {
        let version = version
            .or_else(|| env_non_empty("CN_LLVM_VERSION"))
            .or_else(|| sh_capture("llvm-config --version"))
            .ok_or(ConfigError::MissingLlvmVersion)?;
        let includedir = includedir
            .or_else(|| env_non_empty("CN_LLVM_INCLUDE"))
            .or_else(|| sh_capture("llvm-config --includedir"))
            .ok_or(ConfigError::MissingLlvmIncludeDir)?;
        let libdir = libdir
            .or_else(|| env_non_empty("CN_LLVM_LIB"))
            .or_else(|| sh_capture("llvm-config --libdir"))
            .ok_or(ConfigError::MissingLlvmLibDir)?;
        let system_headers = system_headers
            .or_else(|| env_non_empty("CN_SYS_HEADERS"))
            .or_else(system_headers_fallback)
            .ok_or(ConfigError::MissingSystemHeaders)?;
        Ok(Self { version, includedir, libdir, system_headers })
    }

    /// Full `-I` flag set for one parse: project root, toolchain headers,
    /// system headers, plus every cached dependency.
    pub fn include_args(
        &self,
        client_root: &Path,
        cache_root: &Path,
    ) -> Result<Vec<String>, ConfigError> {
        let major: String = self.version.chars().take(2).collect();
        let mut args = vec![
            "-I/opt/homebrew/opt/llvm/include/c++/v1".to_string(),
            format!("-I{}/", client_root.display()),
            format!(
                "-I/opt/homebrew/Cellar/llvm/{}/lib/clang/{}/include",
                self.version, major
            ),
            format!("-I{}/usr/include", self.system_headers),
        ];
        let cache = cache_root.to_string_lossy();
        for (dep, templates) in DEPS_INCLUDE_PATHS {
            let hash = find_cache_hash_dir(&cache_root.join(dep))?;
            for template in *templates {
                args.push(template.replace("{cache}", &cache).replace("{hash}", &hash));
            }
        }
        Ok(args)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Run a discovery command through the shell and return trimmed stdout.
/// Missing binary, non-zero exit, or anything on stderr all yield `None` so
/// the caller falls through to the next source.
fn sh_capture(command: &str) -> Option<String> {
    let output = Command::new("sh").arg("-c").arg(command).output().ok()?;
    if !output.status.success() {
        return None;
    }
    if !String::from_utf8_lossy(&output.stderr).trim().is_empty() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() { None } else { Some(stdout) }
}

fn system_headers_fallback() -> Option<String> {
    if cfg!(target_os = "macos") {
        sh_capture("xcrun --show-sdk-path")
    } else {
        None
    }
}

// ---------------------------- Dependency cache ----------------------------- //

static CACHE_HASH_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-z]{40}$").unwrap());

/// Locate the content-hash directory the dependency cache keeps under
/// `<cache>/<dep>/`. Scans in sorted order so resolution is deterministic.
pub fn find_cache_hash_dir(dep_dir: &Path) -> Result<String, ConfigError> {
    let mut names: Vec<String> = std::fs::read_dir(dep_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
        .into_iter()
        .find(|name| CACHE_HASH_DIR.is_match(name))
        .ok_or_else(|| ConfigError::MissingHashDir(dep_dir.to_path_buf()))
}

// ------------------------------ Header listing ----------------------------- //

/// Expand the configured header list against the client root: literal paths
/// pass through, a trailing `*` lists matching `.hxx` files. Companion
/// headers are filtered out afterwards.
pub fn expand_file_list(client_root: &Path, files: &[&str]) -> Result<Vec<PathBuf>, ConfigError> {
    let mut out = Vec::new();
    for entry in files {
        if let Some(base) = entry.strip_suffix('*') {
            if base.contains('*') {
                return Err(ConfigError::WildcardNotTrailing((*entry).to_string()));
            }
            let pattern = format!("{}/{}*.hxx", client_root.display(), base);
            let paths = glob::glob(&pattern).map_err(|source| ConfigError::HeaderGlob {
                pattern: pattern.clone(),
                source,
            })?;
            for path in paths {
                match path {
                    Ok(p) => out.push(p),
                    Err(e) => return Err(ConfigError::Io(e.into_error())),
                }
            }
        } else if entry.contains('*') {
            return Err(ConfigError::WildcardNotTrailing((*entry).to_string()));
        } else {
            out.push(client_root.join(entry));
        }
    }
    Ok(filter_headers(out))
}

/// Drop `_json.hxx` / `_fmt.hxx` companions.
pub fn filter_headers(headers: Vec<PathBuf>) -> Vec<PathBuf> {
    headers
        .into_iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            !EXCLUDED_HEADER_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        })
        .collect()
}

// -------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_entries_full_match_with_open_tail() {
        let scan = ScanConfig::standard().unwrap();
        assert!(scan.is_included("couchbase::retry_reason"));
        assert!(scan.is_included("couchbase::core::columnar::query_options"));
        // the open tail admits members nested inside a listed type
        assert!(scan.is_included("couchbase::core::columnar::query_options::raw_value"));
        // but never a different prefix
        assert!(!scan.is_included("couchbase::core::columnar::query_result"));
        assert!(!scan.is_included("asio::io_context"));
    }

    #[test]
    fn wildcard_entries_expand_mid_name() {
        let scan = ScanConfig::from_type_list(&["couchbase::core::ops::*_request"]).unwrap();
        assert!(scan.is_included("couchbase::core::ops::get_request"));
        assert!(scan.is_included("couchbase::core::ops::upsert_request"));
        assert!(!scan.is_included("couchbase::core::ops::get_response"));
    }

    #[test]
    fn denylist_beats_whitelist() {
        let scan = ScanConfig::from_type_list(&["couchbase::core::*"]).unwrap();
        assert!(!scan.is_included("couchbase::core::is_compound_operation"));
        assert!(!scan.is_included("couchbase::core::lookup_in_replica_context"));
    }

    #[test]
    fn alias_inclusion_requires_durability_suffix() {
        let scan = ScanConfig::from_type_list(&["couchbase::core::ops::*"]).unwrap();
        assert!(!scan.is_included_alias("couchbase::core::ops::upsert_request"));
        assert!(scan.is_included_alias("couchbase::core::ops::upsert_request_with_legacy_durability"));
    }

    #[test]
    fn companion_headers_are_filtered() {
        let headers = vec![
            PathBuf::from("core/columnar/query_options.hxx"),
            PathBuf::from("core/columnar/query_options_json.hxx"),
            PathBuf::from("core/columnar/error_fmt.hxx"),
        ];
        let kept = filter_headers(headers);
        assert_eq!(kept, vec![PathBuf::from("core/columnar/query_options.hxx")]);
    }

    #[test]
    fn non_trailing_wildcard_is_rejected() {
        let err = expand_file_list(Path::new("/nowhere"), &["core/*/query.hxx"]).unwrap_err();
        assert!(matches!(err, ConfigError::WildcardNotTrailing(_)));
    }

    #[test]
    fn hash_dir_resolution_wants_forty_hex_chars() {
        let base = std::env::temp_dir().join(format!("opgen-cache-test-{}", std::process::id()));
        let dep = base.join("fmt");
        let hash = "0123456789abcdef0123456789abcdef01234567";
        std::fs::create_dir_all(dep.join(hash)).unwrap();
        std::fs::create_dir_all(dep.join("not-a-hash")).unwrap();

        assert_eq!(find_cache_hash_dir(&dep).unwrap(), hash);

        let empty = base.join("asio");
        std::fs::create_dir_all(&empty).unwrap();
        assert!(matches!(
            find_cache_hash_dir(&empty),
            Err(ConfigError::MissingHashDir(_))
        ));

        std::fs::remove_dir_all(&base).unwrap();
    }
}
