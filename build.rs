use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's Rust sources. Nothing outside them is scanned.
const SOURCE_ROOTS: [&str; 3] = ["src", "tests", "benches"];

// Words that must never appear in comments.
const FORBIDDEN_COMMENT_WORDS: &str =
    "FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE";

/// The kind of policy violation a collector looks for.
#[derive(Clone, Copy)]
enum Policy {
    UnderscoreBinding,
    ForbiddenCommentWord,
    StarsInComment,
    UppercaseComment,
    AllowDeadCode,
}

impl Policy {
    fn pattern(self) -> String {
        match self {
            Policy::UnderscoreBinding => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Policy::ForbiddenCommentWord => {
                format!(r"(//|/\*|///).*(?:{FORBIDDEN_COMMENT_WORDS})")
            }
            Policy::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Policy::UppercaseComment => r"(//|/\*|///).*".to_string(),
            Policy::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn explanation(self) -> &'static str {
        match self {
            Policy::UnderscoreBinding => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            Policy::ForbiddenCommentWord => {
                "Comments must not carry edit-history markers such as FIX, NEW or UPDATE."
            }
            Policy::StarsInComment => "The '**' pattern is only allowed in doc comments.",
            Policy::UppercaseComment => {
                "Comments where every alphabetic character is uppercase are not allowed."
            }
            Policy::AllowDeadCode => {
                "#[allow(dead_code)] is not allowed. Use the code or remove it."
            }
        }
    }
}

// Collects matching lines for one file and one policy, filtering false positives.
struct ViolationCollector {
    policy: Policy,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl ViolationCollector {
    fn new(policy: Policy, file_path: &Path) -> Self {
        Self {
            policy,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn is_violation(&self, line_text: &str) -> bool {
        let trimmed = line_text.trim_start();
        match self.policy {
            Policy::UnderscoreBinding => {
                let is_comment = trimmed.starts_with("//") || line_text.contains("/*");
                // Matches between quotes belong to string literals.
                let in_string = line_text
                    .split('"')
                    .enumerate()
                    .any(|(i, part)| i % 2 == 1 && part.contains('_'));
                !is_comment && !in_string
            }
            Policy::ForbiddenCommentWord | Policy::AllowDeadCode => true,
            Policy::StarsInComment => !trimmed.starts_with("///"),
            Policy::UppercaseComment => {
                let Some(comment_text) = comment_text(line_text) else {
                    return false;
                };
                let mut letters = comment_text.chars().filter(|c| c.is_alphabetic()).peekable();
                letters.peek().is_some() && letters.all(|c| c.is_uppercase())
            }
        }
    }

    fn into_error_message(self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut message = format!(
            "\nERROR: {} policy violation(s) in {}:\n",
            self.violations.len(),
            self.file_path.display()
        );
        for violation in &self.violations {
            message.push_str(&format!("   {violation}\n"));
        }
        message.push_str(&format!("\n{}\n", self.policy.explanation()));
        Some(message)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

/// The text of a line comment, without its `//`, `///` or `/* */` delimiters.
fn comment_text(line_text: &str) -> Option<&str> {
    let trimmed = line_text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        Some(rest.trim())
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        Some(rest.trim())
    } else if let Some(start) = line_text.find("/*") {
        let rest = &line_text[start + 2..];
        Some(rest.find("*/").map_or(rest, |end| &rest[..end]).trim())
    } else {
        None
    }
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(policy: Policy, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&policy.pattern())?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = ViolationCollector::new(policy, path);
        searcher.search_path(&matcher, path, &mut collector)?;
        if let Some(message) = collector.into_error_message() {
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let files = source_files();
    let policies = [
        Policy::UnderscoreBinding,
        Policy::ForbiddenCommentWord,
        Policy::StarsInComment,
        Policy::UppercaseComment,
        Policy::AllowDeadCode,
    ];
    for policy in policies {
        if let Err(e) = scan(policy, &files) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
