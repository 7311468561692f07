//! CLI: resolve the toolchain, parse each configured header, walk the trees,
//! write `bindings.json`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;

use crate::clang;
use crate::config::{self, ScanConfig, Toolchain};
use crate::diag::Diagnostics;
use crate::walker::{Mode, Walker};

const OUTPUT_FILE: &str = "bindings.json";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// scan whitelisted C++ headers and emit struct/enum shape descriptions for
/// the binding generator
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// LLVM version; falls back to CN_LLVM_VERSION, then `llvm-config --version`
    #[arg(short = 'v', long = "version")]
    llvm_version: Option<String>,

    /// LLVM include directory; falls back to CN_LLVM_INCLUDE, then `llvm-config --includedir`
    #[arg(short = 'i', long = "includedir")]
    llvm_includedir: Option<String>,

    /// LLVM lib directory; falls back to CN_LLVM_LIB, then `llvm-config --libdir`
    #[arg(short = 'l', long = "libdir")]
    llvm_libdir: Option<String>,

    /// system headers root; falls back to CN_SYS_HEADERS, then `xcrun --show-sdk-path`
    #[arg(short = 's', long = "system-headers")]
    system_headers: Option<String>,

    /// C++ client checkout the configured headers are resolved against
    #[arg(long, default_value = "deps/couchbase-cxx-client")]
    client_root: PathBuf,

    /// dependency cache holding asio/fmt/gsl/json checkouts
    #[arg(long, default_value = "deps/couchbase-cxx-cache")]
    cache_root: PathBuf,

    /// fail on dropped duplicate structs and unresolved legacy-durability aliases
    #[arg(long)]
    strict: bool,

    /// print resolved include paths and clang's own verbose output
    #[arg(long)]
    verbose: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        // configuration errors are fatal before any header is parsed
        let toolchain = Toolchain::resolve(
            self.llvm_version.clone(),
            self.llvm_includedir.clone(),
            self.llvm_libdir.clone(),
            self.system_headers.clone(),
        )?;
        if self.verbose {
            eprintln!("using libdir={}", toolchain.libdir);
            eprintln!("using includedir={}", toolchain.includedir);
        }

        let include_args = toolchain.include_args(&self.client_root, &self.cache_root)?;
        if self.verbose {
            eprintln!("include paths={include_args:?}");
        }

        let headers = config::expand_file_list(&self.client_root, config::FILE_LIST)?;
        let scan = ScanConfig::standard()?;
        let mode = if self.strict { Mode::Strict } else { Mode::Lenient };

        let mut walker = Walker::new(&scan, mode);
        let mut diag = Diagnostics::new();
        for header in &headers {
            println!("processing {}", header.display());
            let parsed = clang::parse_header(header, &include_args, self.verbose)?;
            // compiler diagnostics are surfaced but never halt the walk
            for line in &parsed.diagnostics {
                eprintln!("{line}");
            }
            let main_file = header.to_string_lossy();
            walker.walk_header(&parsed.root, &main_file, &mut diag);
            diag.drain_print();
        }

        if diag.errors_seen() > 0 {
            bail!("strict mode: {} declaration(s) would have been silently dropped", diag.errors_seen());
        }

        let document = walker.into_document();
        let json = serde_json::to_string(&document)
            .context("failed to serialize the output document")?;
        std::fs::write(OUTPUT_FILE, &json)
            .with_context(|| format!("failed to write {OUTPUT_FILE}"))?;
        println!(
            "{} {} ({} structs, {} enums)",
            "wrote".green(),
            OUTPUT_FILE,
            document.op_structs.len(),
            document.op_enums.len()
        );
        Ok(())
    }
}
