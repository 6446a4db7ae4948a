use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are policed; vendored or reference trees are skipped.
const SOURCE_ROOTS: [&str; 3] = ["pack", "src", "tests"];

// Collects every matching line of one file so the build error lists all of them at once.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    rule: &'static str,
    skip_doc_comments: bool,
}

impl ViolationCollector {
    fn new(file_path: &Path, rule: &'static str, skip_doc_comments: bool) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            rule,
            skip_doc_comments,
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} violations of '{}' in {}:\n",
            self.violations.len(),
            self.rule,
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.skip_doc_comments && is_doc_comment(line_text) {
            return Ok(true);
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn is_doc_comment(line: &str) -> bool {
    line.trim_start().starts_with("///") || line.trim_start().starts_with("//!")
}

fn source_files() -> impl Iterator<Item = PathBuf> {
    SOURCE_ROOTS.into_iter().flat_map(|root| {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(pattern: &str, rule: &'static str, skip_doc_comments: bool) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();

    for path in source_files() {
        let mut collector = ViolationCollector::new(&path, rule, skip_doc_comments);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let checks: [(&str, &'static str, bool); 3] = [
        // Underscore-prefixed bindings hide unused values instead of removing them.
        (r"\b(_[a-zA-Z0-9_]+)\b", "no underscore-prefixed identifiers", false),
        // Dead code is removed, never silenced.
        (
            r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
            "no #[allow(dead_code)]",
            false,
        ),
        // Comments describe the code as it is, not its edit history.
        (
            r"(//|/\*).*\b(FIXED|FIX|CHANGED|MODIFIED|UPDATED)\b",
            "no edit-history comments",
            true,
        ),
    ];

    for (pattern, rule, skip_doc_comments) in checks {
        if let Err(e) = scan(pattern, rule, skip_doc_comments) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
