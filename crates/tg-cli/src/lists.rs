use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tg_compiler::{compile_with_stats, CompileStats};
use tg_core::snapshot;
use tg_core::{EngineConfig, Matcher, RuleSet};

/// A compiled list with the numbers `compile` reports.
#[derive(Debug)]
pub struct CompiledList {
    pub rules: RuleSet,
    pub stats: CompileStats,
    pub total_ms: f64,
}

fn read_list(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

/// Compile several lists as one, so rule ids run across all of them.
pub fn compile_concatenated(inputs: &[String], verbose: bool) -> Result<CompiledList, String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut contents = Vec::with_capacity(inputs.len());
    for (list_id, path) in inputs.iter().enumerate() {
        let content = read_list(path)?;
        if verbose {
            println!("  [{}] {} - {} lines", list_id, file_name(path), content.lines().count());
        }
        contents.push(content);
    }

    let (rules, stats) = compile_with_stats(contents.iter().flat_map(|content| content.lines()));

    Ok(CompiledList {
        rules,
        stats,
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    })
}

/// Compile one list per input, each written as `<output_dir>/<stem>.json`.
pub fn compile_split(inputs: &[String], output_dir: &Path, verbose: bool) -> Result<Vec<(PathBuf, CompiledList)>, String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let mut results = Vec::with_capacity(inputs.len());
    for path in inputs {
        let start = Instant::now();
        let content = read_list(path)?;
        let (rules, stats) = compile_with_stats(content.lines());

        let stem = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rules".to_string());
        let output = output_dir.join(format!("{stem}.json"));
        write_snapshot(&output, &rules)?;

        if verbose {
            println!("  {} - {} lines, {} rules", file_name(path), stats.lines, stats.accepted);
        }

        results.push((
            output,
            CompiledList { rules, stats, total_ms: start.elapsed().as_secs_f64() * 1000.0 },
        ));
    }

    Ok(results)
}

pub fn write_snapshot(path: &Path, rules: &RuleSet) -> Result<(), String> {
    snapshot::save_to_path(path, rules)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

pub fn read_snapshot(path: &Path) -> Result<RuleSet, String> {
    snapshot::load_from_path(path)
        .map_err(|e| format!("Invalid snapshot '{}': {}", path.display(), e))
}

pub fn load_matcher(path: &Path, config: &EngineConfig) -> Result<Matcher, String> {
    Ok(Matcher::with_config(read_snapshot(path)?, config))
}
