use std::collections::HashMap;
use std::path::Path;

use crate::document::Document;
use crate::state::{AggregateStats, FileContribution, LanguageStats, PackageStats};

/// Known package-manifest filenames used to derive a document's package
/// root: the nearest ancestor directory containing one of these, or the
/// repository root as fallback.
const PACKAGE_MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "go.mod",
    "pyproject.toml",
    "setup.py",
];

/// Given a repo-relative file path and the set of directories known to
/// contain a package manifest, find the nearest ancestor package root.
pub fn resolve_package_root(relpath: &str, manifest_dirs: &[String]) -> String {
    let mut best: Option<&str> = None;
    let file_dir = Path::new(relpath).parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
    for dir in manifest_dirs {
        if file_dir == *dir || file_dir.starts_with(&format!("{dir}/")) || dir.is_empty() {
            match best {
                Some(b) if dir.len() <= b.len() => {}
                _ => best = Some(dir.as_str()),
            }
        }
    }
    best.unwrap_or("").to_string()
}

/// Scans a workspace root for package manifests and returns their
/// containing directories (repo-relative, `""` for the root itself),
/// longest (most specific) first so `resolve_package_root` can prefer the
/// nearest ancestor.
pub fn discover_package_roots(repo_root: &Path) -> Vec<String> {
    let mut roots = Vec::new();
    for entry in ignore::WalkBuilder::new(repo_root)
        .follow_links(true)
        .git_ignore(true)
        .build()
        .flatten()
    {
        let Some(file_type) = entry.file_type() else { continue };
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else { continue };
        if PACKAGE_MANIFESTS.contains(&name) {
            let dir = entry
                .path()
                .parent()
                .unwrap_or(repo_root)
                .strip_prefix(repo_root)
                .unwrap_or_else(|_| Path::new(""))
                .to_string_lossy()
                .to_string();
            roots.push(dir);
        }
    }
    roots.push(String::new());
    roots.sort_by_key(|b| std::cmp::Reverse(b.len()));
    roots.dedup();
    roots
}

/// Accumulates per-file, per-language, per-component-type, per-package
/// counters from a document stream. A fresh instance is created for each
/// full index or each incremental scan.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: AggregateStats,
    files_seen_per_language: HashMap<String, std::collections::HashSet<String>>,
    /// Per-file contribution, built up as documents for that file arrive, so
    /// callers can persist it onto `FileMetadata` for later subtraction.
    contributions: HashMap<String, FileContribution>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one document, attributing it to `relpath`'s running contribution
    /// and to `package_root` (looked up by the caller via
    /// `resolve_package_root`).
    pub fn accumulate(&mut self, doc: &Document, package_root: &str) {
        let lang = doc.language.clone();
        let relpath = doc.metadata.file.clone();
        let ctype = doc.metadata.component_type.as_str().to_string();
        let lines = doc.metadata.end_line.saturating_sub(doc.metadata.start_line) + 1;

        let first_time_file_for_lang = self
            .files_seen_per_language
            .entry(lang.clone())
            .or_default()
            .insert(relpath.clone());

        let lang_entry = self.stats.by_language.entry(lang.clone()).or_default();
        if first_time_file_for_lang {
            lang_entry.files += 1;
        }
        lang_entry.components += 1;
        lang_entry.lines += lines;

        *self.stats.by_component_type.entry(ctype.clone()).or_insert(0) += 1;

        let pkg = self.stats.by_package.entry(package_root.to_string()).or_insert_with(|| PackageStats {
            name: package_root.to_string(),
            path: package_root.to_string(),
            files: 0,
            components: 0,
            languages: HashMap::new(),
        });
        pkg.components += 1;
        *pkg.languages.entry(lang.clone()).or_insert(0) += 1;

        let contribution = self.contributions.entry(relpath).or_insert_with(|| FileContribution {
            language: lang.clone(),
            component_counts: HashMap::new(),
            package_root: package_root.to_string(),
            lines: 0,
        });
        *contribution.component_counts.entry(ctype).or_insert(0) += 1;
        contribution.lines += lines;

        self.stats.total_documents += 1;
    }

    /// Registers a file with zero parsed documents so `by_package.files`
    /// still counts it even though no document contributed to it.
    pub fn note_empty_file(&mut self, relpath: &str, language: &str, package_root: &str) {
        self.files_seen_per_language
            .entry(language.to_string())
            .or_default()
            .insert(relpath.to_string());
        self.stats.by_language.entry(language.to_string()).or_default().files += 1;
        self.contributions.entry(relpath.to_string()).or_insert_with(|| FileContribution {
            language: language.to_string(),
            component_counts: HashMap::new(),
            package_root: package_root.to_string(),
            lines: 0,
        });
    }

    fn finalize_package_file_counts(&mut self) {
        let mut per_package_files: HashMap<String, std::collections::HashSet<String>> = HashMap::new();
        for (relpath, contribution) in &self.contributions {
            per_package_files
                .entry(contribution.package_root.clone())
                .or_default()
                .insert(relpath.clone());
        }
        for (pkg, files) in per_package_files {
            if let Some(entry) = self.stats.by_package.get_mut(&pkg) {
                entry.files = files.len();
            }
        }
    }

    /// Consume the aggregator, returning the finished `AggregateStats` and
    /// the per-file contributions to persist onto `FileMetadata`.
    pub fn finish(mut self) -> (AggregateStats, HashMap<String, FileContribution>) {
        self.finalize_package_file_counts();
        (self.stats, self.contributions)
    }
}

/// Clamp a counter decrement so it cannot underflow. A negative result
/// means an invariant was violated upstream; clamp and warn rather than
/// panic.
fn sub_clamped(counter: &mut usize, amount: usize, warnings: &mut Vec<String>, what: &str) {
    if amount > *counter {
        warnings.push(format!("{what} would go negative (had {}, subtracting {}); clamped to 0", counter, amount));
        *counter = 0;
    } else {
        *counter -= amount;
    }
}

fn subtract_contribution(stats: &mut AggregateStats, contribution: &FileContribution, warnings: &mut Vec<String>) {
    if let Some(lang) = stats.by_language.get_mut(&contribution.language) {
        sub_clamped(&mut lang.files, 1, warnings, &format!("by_language[{}].files", contribution.language));
        let component_total: usize = contribution.component_counts.values().sum();
        sub_clamped(&mut lang.components, component_total, warnings, &format!("by_language[{}].components", contribution.language));
        sub_clamped(&mut lang.lines, contribution.lines, warnings, &format!("by_language[{}].lines", contribution.language));
    }
    for (ctype, count) in &contribution.component_counts {
        if let Some(entry) = stats.by_component_type.get_mut(ctype) {
            sub_clamped(entry, *count, warnings, &format!("by_component_type[{ctype}]"));
        }
    }
    if let Some(pkg) = stats.by_package.get_mut(&contribution.package_root) {
        sub_clamped(&mut pkg.files, 1, warnings, &format!("by_package[{}].files", contribution.package_root));
        let component_total: usize = contribution.component_counts.values().sum();
        sub_clamped(&mut pkg.components, component_total, warnings, &format!("by_package[{}].components", contribution.package_root));
        if let Some(lang_count) = pkg.languages.get_mut(&contribution.language) {
            sub_clamped(lang_count, 1, warnings, &format!("by_package[{}].languages[{}]", contribution.package_root, contribution.language));
        }
    }
}

fn add_aggregate(into: &mut AggregateStats, from: &AggregateStats) {
    for (lang, stats) in &from.by_language {
        let entry = into.by_language.entry(lang.clone()).or_default();
        entry.files += stats.files;
        entry.components += stats.components;
        entry.lines += stats.lines;
    }
    for (ctype, count) in &from.by_component_type {
        *into.by_component_type.entry(ctype.clone()).or_insert(0) += count;
    }
    for (pkg, stats) in &from.by_package {
        let entry = into.by_package.entry(pkg.clone()).or_insert_with(|| PackageStats {
            name: stats.name.clone(),
            path: stats.path.clone(),
            files: 0,
            components: 0,
            languages: HashMap::new(),
        });
        entry.files += stats.files;
        entry.components += stats.components;
        for (lang, count) in &stats.languages {
            *entry.languages.entry(lang.clone()).or_insert(0) += count;
        }
    }
    into.total_documents += from.total_documents;
}

/// Pure merge of prior aggregate stats with an incremental scan's stats.
/// `deleted_files` and `changed_files` carry the prior `FileContribution`
/// for each file (read from the state being replaced, by the caller) so
/// this function never touches I/O.
pub fn merge_stats(
    current: &AggregateStats,
    deleted_files: &[FileContribution],
    changed_files: &[FileContribution],
    incremental: &AggregateStats,
) -> (AggregateStats, Vec<String>) {
    let mut result = current.clone();
    let mut warnings = Vec::new();

    for contribution in deleted_files.iter().chain(changed_files.iter()) {
        subtract_contribution(&mut result, contribution, &mut warnings);
        result.total_documents = result.total_documents.saturating_sub(contribution.component_counts.values().sum());
    }

    add_aggregate(&mut result, incremental);

    result.by_language.retain(|_, v| v.files > 0 || v.components > 0 || v.lines > 0);
    result.by_component_type.retain(|_, v| *v > 0);
    result.by_package.retain(|_, v| v.files > 0 || v.components > 0);

    (result, warnings)
}
