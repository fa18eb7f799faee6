//! File discovery with shell-glob include/exclude filtering.

use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;

/// Extensions indexed when no include patterns are given.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    "*.py", "*.js", "*.ts", "*.tsx", "*.jsx", "*.java", "*.cpp", "*.c", "*.h", "*.hpp", "*.cs",
    "*.php", "*.rb", "*.go", "*.rs", "*.swift", "*.kt", "*.scala", "*.r", "*.sql", "*.sh",
    "*.bash", "*.zsh", "*.yaml", "*.yml", "*.json", "*.xml", "*.html", "*.css", "*.scss",
    "*.sass", "*.md", "*.txt", "*.tex", "*.vue", "*.dart", "*.lua", "*.perl", "*.pl",
];

/// Always-on exclusions, appended to any caller-supplied patterns.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules/**",
    ".git/**",
    ".vscode/**",
    ".idea/**",
    "__pycache__/**",
    "*.pyc",
    "*.pyo",
    "*.pyd",
    ".pytest_cache/**",
    "venv/**",
    "env/**",
    ".env/**",
    "build/**",
    "dist/**",
    "target/**",
    "*.min.js",
    "*.min.css",
    ".next/**",
    ".nuxt/**",
    "coverage/**",
    ".coverage",
    "*.log",
    "*.tmp",
    "*.temp",
    ".DS_Store",
    "Thumbs.db",
];

/// Walk `root` and return the files matching the include patterns minus
/// the exclusions. Exclusion wins over inclusion; each pattern is tried
/// against both the root-relative path and the bare file name. Results
/// are sorted for deterministic batching.
#[must_use]
pub fn discover_files(root: &Path, includes: &[String], excludes: &[String]) -> Vec<PathBuf> {
    let include_patterns = compile(includes);
    let exclude_patterns = compile(excludes);

    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .build();

    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if matches_any(&exclude_patterns, &rel_str, &name) {
            continue;
        }
        if matches_any(&include_patterns, &rel_str, &name) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files
}

fn compile(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "skipping invalid glob pattern");
                None
            }
        })
        .collect()
}

fn matches_any(patterns: &[Pattern], rel_path: &str, file_name: &str) -> bool {
    patterns
        .iter()
        .any(|p| p.matches(rel_path) || p.matches(file_name))
}
