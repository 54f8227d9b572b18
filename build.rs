use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Source trees the lint gate covers. Everything else (target/, vendored data,
// reference material) is left alone.
const SOURCE_ROOTS: [&str; 3] = ["loci", "cli", "tests"];

// Words that describe edit history rather than code.
const FORBIDDEN_COMMENT_WORDS: &str =
    "FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE";

// One lint: a line regex plus a predicate that decides whether a matching line is
// really a violation.
struct Rule {
    name: &'static str,
    pattern: String,
    is_violation: fn(&str) -> bool,
    advice: &'static str,
}

// Collects every violating line of a single file for one rule.
struct RuleCollector<'r> {
    rule: &'r Rule,
    violations: Vec<String>,
    file_path: PathBuf,
}

impl<'r> RuleCollector<'r> {
    fn new(rule: &'r Rule, file_path: &Path) -> Self {
        Self {
            rule,
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.name,
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.advice));

        Some(error_msg)
    }
}

impl Sink for RuleCollector<'_> {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if (self.rule.is_violation)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }

        // Keep searching the rest of the file.
        Ok(true)
    }
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("//") || line.contains("/*")
}

fn is_doc_comment(line: &str) -> bool {
    line.trim_start().starts_with("///") || line.trim_start().starts_with("//!")
}

// Underscore-prefixed names only count in code, not in comments or string literals.
fn underscore_in_code(line: &str) -> bool {
    if line.trim_start().starts_with("//") {
        return false;
    }
    let in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !in_string
}

fn comment_with_forbidden_word(line: &str) -> bool {
    is_comment(line)
}

fn stars_outside_doc_comment(line: &str) -> bool {
    is_comment(line) && !is_doc_comment(line)
}

fn all_caps_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    let comment_text = if let Some(rest) = trimmed.strip_prefix("///") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        rest
    } else if let Some(idx) = line.find("/*") {
        let rest = &line[idx + 2..];
        rest.find("*/").map_or(rest, |end| &rest[..end])
    } else {
        return false;
    };

    let mut letters = comment_text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
}

fn any_match(line: &str) -> bool {
    !line.is_empty()
}

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "underscore-prefixed variables",
            pattern: r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            is_violation: underscore_in_code,
            advice: "Underscore-prefixed variable names are not allowed. Use the variable or remove it.",
        },
        Rule {
            name: "forbidden comment words",
            pattern: format!(r"(//|/\*).*(?:{FORBIDDEN_COMMENT_WORDS})"),
            is_violation: comment_with_forbidden_word,
            advice: "Comments must describe the code, not its edit history.",
        },
        Rule {
            name: "'**' in regular comments",
            pattern: r"(//|/\*).*\*\*".to_string(),
            is_violation: stars_outside_doc_comment,
            advice: "The '**' pattern is only allowed in doc comments.",
        },
        Rule {
            name: "all-uppercase comments",
            pattern: r"(//|/\*).*".to_string(),
            is_violation: all_caps_comment,
            advice: "Comments where every letter is uppercase are not allowed.",
        },
        Rule {
            name: "#[allow(dead_code)] attributes",
            pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
            is_violation: any_match,
            advice: "Use the code or remove it; #[allow(dead_code)] is not allowed.",
        },
    ]
}

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan_sources() -> Result<(), Box<dyn Error>> {
    let sources = rust_sources();
    let mut searcher = Searcher::new();

    for rule in rules() {
        let matcher = RegexMatcher::new_line_matcher(&rule.pattern)?;
        for path in &sources {
            let mut collector = RuleCollector::new(&rule, path);
            searcher.search_path(&matcher, path, &mut collector)?;
            if let Some(error_message) = collector.check_and_get_error_message() {
                return Err(error_message.into());
            }
        }
    }

    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    if let Err(e) = scan_sources() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
