use std::path::Path;

use async_trait::async_trait;
use coderadar_core::{ComponentType, Document, DocumentMetadata, DEFAULT_EXCLUDE_DIRS};
use regex::Regex;

use crate::error::ScannerError;
use crate::traits::{ScanOptions, ScanResult, ScanStats, Scanner};

struct LanguageRule {
    extensions: &'static [&'static str],
    language: &'static str,
    patterns: &'static [(&'static str, ComponentType)],
}

/// Per-language naive single-line component patterns. A real `Scanner`
/// would use a proper parser (tree-sitter or similar); this reference
/// implementation trades precision for zero extra dependencies.
const LANGUAGE_RULES: &[LanguageRule] = &[
    LanguageRule {
        extensions: &["ts", "tsx", "js", "jsx"],
        language: "typescript",
        patterns: &[
            (r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)", ComponentType::Function),
            (r"^\s*(?:export\s+)?class\s+(\w+)", ComponentType::Class),
            (r"^\s*(?:export\s+)?interface\s+(\w+)", ComponentType::Interface),
            (r"^\s*(?:export\s+)?type\s+(\w+)\s*=", ComponentType::Type),
        ],
    },
    LanguageRule {
        extensions: &["py"],
        language: "python",
        patterns: &[
            (r"^\s*def\s+(\w+)", ComponentType::Function),
            (r"^\s*class\s+(\w+)", ComponentType::Class),
        ],
    },
    LanguageRule {
        extensions: &["go"],
        language: "go",
        patterns: &[
            (r"^\s*func\s+(?:\([^)]*\)\s+)?(\w+)", ComponentType::Function),
            (r"^\s*type\s+(\w+)\s+struct", ComponentType::Class),
            (r"^\s*type\s+(\w+)\s+interface", ComponentType::Interface),
        ],
    },
    LanguageRule {
        extensions: &["rs"],
        language: "rust",
        patterns: &[
            (r"^\s*(?:pub\s+)?fn\s+(\w+)", ComponentType::Function),
            (r"^\s*(?:pub\s+)?struct\s+(\w+)", ComponentType::Class),
            (r"^\s*(?:pub\s+)?trait\s+(\w+)", ComponentType::Interface),
            (r"^\s*(?:pub\s+)?type\s+(\w+)\s*=", ComponentType::Type),
        ],
    },
];

fn language_for_extension(ext: &str) -> Option<(&'static str, &'static [(&'static str, ComponentType)])> {
    LANGUAGE_RULES
        .iter()
        .find(|rule| rule.extensions.contains(&ext))
        .map(|rule| (rule.language, rule.patterns))
}

/// Extracts functions/classes/interfaces/types via per-language regexes,
/// and emits one whole-file `Doc` component for markdown.
pub struct RegexScanner;

impl RegexScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_file(&self, repo_root: &Path, relpath: &str) -> Result<Vec<Document>, ScannerError> {
        let full_path = repo_root.join(relpath);
        let contents = std::fs::read_to_string(&full_path).map_err(|e| ScannerError::Io {
            path: relpath.to_string(),
            source: e,
        })?;

        if relpath.ends_with(".md") || relpath.ends_with(".mdx") {
            return Ok(vec![self.build_doc_document(relpath, &contents)]);
        }

        let ext = Path::new(relpath).extension().and_then(|e| e.to_str()).unwrap_or("");
        let Some((language, patterns)) = language_for_extension(ext) else {
            return Ok(Vec::new());
        };

        let compiled: Vec<(Regex, ComponentType)> = patterns
            .iter()
            .map(|(pattern, ctype)| {
                (
                    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid reference scanner pattern {pattern}: {e}")),
                    *ctype,
                )
            })
            .collect();

        let lines: Vec<&str> = contents.lines().collect();
        let mut documents = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            for (re, ctype) in &compiled {
                if let Some(caps) = re.captures(line) {
                    let Some(name) = caps.get(1) else { continue };
                    let start_line = idx + 1;
                    let end_line = find_block_end(&lines, idx);
                    documents.push(self.build_component_document(
                        relpath,
                        language,
                        *ctype,
                        name.as_str(),
                        start_line,
                        end_line,
                        &lines,
                    ));
                }
            }
        }
        Ok(documents)
    }

    fn build_doc_document(&self, relpath: &str, contents: &str) -> Document {
        let line_count = contents.lines().count().max(1);
        let name = Path::new(relpath).file_stem().and_then(|s| s.to_str()).unwrap_or(relpath).to_string();
        Document {
            id: Document::make_id(relpath, &name, 1),
            language: "markdown".to_string(),
            metadata: DocumentMetadata {
                file: relpath.to_string(),
                path: relpath.to_string(),
                component_type: ComponentType::Doc,
                name,
                start_line: 1,
                end_line: line_count,
                signature: None,
                snippet: None,
                imports: None,
                exported: None,
                docstring: None,
                extra: Default::default(),
            },
            text: contents.to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_component_document(
        &self,
        relpath: &str,
        language: &str,
        component_type: ComponentType,
        name: &str,
        start_line: usize,
        end_line: usize,
        lines: &[&str],
    ) -> Document {
        let snippet: String = lines[start_line - 1..end_line].join("\n");
        Document {
            id: Document::make_id(relpath, name, start_line),
            language: language.to_string(),
            metadata: DocumentMetadata {
                file: relpath.to_string(),
                path: relpath.to_string(),
                component_type,
                name: name.to_string(),
                start_line,
                end_line,
                signature: Some(lines[start_line - 1].trim().to_string()),
                snippet: Some(snippet.clone()),
                imports: None,
                exported: None,
                docstring: None,
                extra: Default::default(),
            },
            text: snippet,
        }
    }
}

impl Default for RegexScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Naive block-end heuristic: scan forward until brace/indent balance
/// returns to the starting level, or end of file. Reference-grade only.
fn find_block_end(lines: &[&str], start_idx: usize) -> usize {
    let mut depth: i32 = 0;
    let mut seen_open = false;
    for (offset, line) in lines[start_idx..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            return start_idx + offset + 1;
        }
        if !seen_open && offset > 0 && line.trim().is_empty() {
            return start_idx + offset;
        }
    }
    lines.len()
}

#[async_trait]
impl Scanner for RegexScanner {
    async fn scan(&self, options: ScanOptions) -> Result<ScanResult, ScannerError> {
        let relpaths = if let Some(include) = &options.include {
            include.clone()
        } else {
            discover_files(&options.repo_root, options.exclude.as_deref())?
        };

        let mut documents = Vec::new();
        let mut files_scanned = 0usize;
        for relpath in &relpaths {
            let docs = self.scan_file(&options.repo_root, relpath)?;
            documents.extend(docs);
            files_scanned += 1;
        }

        Ok(ScanResult {
            documents,
            stats: ScanStats { files_scanned },
        })
    }
}

fn discover_files(repo_root: &Path, exclude: Option<&[String]>) -> Result<Vec<String>, ScannerError> {
    let mut exclude_dirs: std::collections::HashSet<String> =
        DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect();
    if let Some(exclude) = exclude {
        exclude_dirs.extend(exclude.iter().cloned());
    }

    let mut out = Vec::new();
    let walker = ignore::WalkBuilder::new(repo_root)
        .follow_links(true)
        .git_ignore(true)
        .filter_entry(move |entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !exclude_dirs.contains(name))
                .unwrap_or(true)
        })
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| ScannerError::Io {
            path: repo_root.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let Some(file_type) = entry.file_type() else { continue };
        if !file_type.is_file() {
            continue;
        }
        let relpath = entry
            .path()
            .strip_prefix(repo_root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        out.push(relpath);
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, relpath: &str, contents: &str) {
        let full = dir.join(relpath);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn scans_a_single_typescript_function() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "a.ts",
            "export function greet(name: string): string {\n  return `Hello, ${name}`;\n}\n",
        );
        let scanner = RegexScanner::new();
        let result = scanner
            .scan(ScanOptions {
                repo_root: dir.path().to_path_buf(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.stats.files_scanned, 1);
        assert_eq!(result.documents.len(), 1);
        let doc = &result.documents[0];
        assert_eq!(doc.metadata.name, "greet");
        assert_eq!(doc.metadata.component_type, ComponentType::Function);
        assert_eq!(doc.language, "typescript");
    }

    #[tokio::test]
    async fn markdown_produces_one_doc_component() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "README.md", "# Title\n\nSome text.\n");
        let scanner = RegexScanner::new();
        let result = scanner
            .scan(ScanOptions { repo_root: dir.path().to_path_buf(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].metadata.component_type, ComponentType::Doc);
    }

    #[tokio::test]
    async fn unrecognized_extension_yields_zero_documents() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "data.bin", "not code");
        let scanner = RegexScanner::new();
        let result = scanner
            .scan(ScanOptions { repo_root: dir.path().to_path_buf(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(result.stats.files_scanned, 1);
        assert!(result.documents.is_empty());
    }

    #[tokio::test]
    async fn include_restricts_scan_to_named_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "function a() {}\n");
        write_file(dir.path(), "b.ts", "function b() {}\n");
        let scanner = RegexScanner::new();
        let result = scanner
            .scan(ScanOptions {
                repo_root: dir.path().to_path_buf(),
                include: Some(vec!["a.ts".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.stats.files_scanned, 1);
        assert_eq!(result.documents[0].metadata.name, "a");
    }
}
