//! TrackGate CLI
//!
//! CLI tool for compiling filter lists and querying compiled rule sets.

mod lists;
mod request;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

use tg_core::{Classification, EngineConfig, ListMatcher, ListRole, RuleKind};

use lists::{compile_concatenated, compile_split, load_matcher, read_snapshot, write_snapshot};
use request::{evaluate_all, parse_requests, Request};

#[derive(Parser)]
#[command(name = "tg-cli")]
#[command(about = "TrackGate filter list compiler and matcher")]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enforce positive type options such as $script
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists into a rule snapshot
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output snapshot file (a directory with --split)
        #[arg(short, long, default_value = "rules.json")]
        output: String,

        /// Write one snapshot per input list
        #[arg(long)]
        split: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decide whether a single request is blocked
    Check {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(long)]
        url: String,

        /// Requesting domain
        #[arg(long)]
        domain: Option<String>,

        /// Resource type (script, image, xmlhttprequest, ...)
        #[arg(long = "type")]
        resource_type: Option<String>,

        #[arg(long)]
        third_party: bool,

        #[arg(long)]
        popup: bool,

        /// Page URL; implies --domain and third-party status
        #[arg(long)]
        page: Option<String>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// List element hiding selectors for a domain
    Selectors {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(long)]
        domain: Option<String>,

        /// Drop selectors disabled by #@# exceptions
        #[arg(long)]
        visible: bool,
    },

    /// Evaluate JSON-lines requests in parallel
    Batch {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Requests, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads (overrides the config file)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Label requests as tracker, ad or safe
    Classify {
        /// Tracking list snapshot
        #[arg(long)]
        tracking: Option<PathBuf>,

        /// Advertising list snapshot
        #[arg(long)]
        ads: Option<PathBuf>,

        /// Request URLs
        #[arg(long, required = true)]
        url: Vec<String>,

        /// Page that issued the requests
        #[arg(long)]
        page: Option<String>,
    },

    /// Dump snapshot info
    Info {
        /// Snapshot file to inspect
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref(), cli.strict).and_then(|config| match cli.command {
        Commands::Compile {
            input,
            output,
            split,
            verbose,
        } => cmd_compile(&input, &output, split, verbose),
        Commands::Check {
            snapshot,
            url,
            domain,
            resource_type,
            third_party,
            popup,
            page,
            json,
        } => {
            let request = Request {
                url,
                domain,
                resource_type,
                third_party: (third_party || page.is_none()).then_some(third_party),
                popup,
                page,
            };
            cmd_check(&snapshot, &request, &config, json)
        }
        Commands::Selectors {
            snapshot,
            domain,
            visible,
        } => cmd_selectors(&snapshot, domain.as_deref(), visible, &config),
        Commands::Batch {
            snapshot,
            input,
            output,
            workers,
        } => cmd_batch(&snapshot, &input, output.as_deref(), workers, &config),
        Commands::Classify {
            tracking,
            ads,
            url,
            page,
        } => cmd_classify(tracking.as_deref(), ads.as_deref(), &url, page, &config),
        Commands::Info { snapshot } => cmd_info(&snapshot),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Config file values, with command line flags on top.
fn load_config(path: Option<&Path>, strict: bool) -> Result<EngineConfig, String> {
    let mut config = match path {
        Some(path) => EngineConfig::from_path(path)
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e))?,
        None => EngineConfig::default(),
    };
    if strict {
        config.strict_type_options = true;
    }
    Ok(config)
}

fn cmd_compile(inputs: &[String], output: &str, split: bool, verbose: bool) -> Result<(), String> {
    if split {
        let results = compile_split(inputs, Path::new(output), verbose)?;
        println!("Compiled {} filter lists into '{}'", results.len(), output);
        for (path, compiled) in &results {
            println!(
                "  {}: {} rules ({} dropped, {:.1}ms)",
                path.display(),
                compiled.stats.accepted,
                compiled.stats.dropped,
                compiled.total_ms
            );
        }
        return Ok(());
    }

    let compiled = compile_concatenated(inputs, verbose)?;
    let output_path = Path::new(output);
    write_snapshot(output_path, &compiled.rules)?;

    // Generated snapshot must load back cleanly
    read_snapshot(output_path)?;

    let rules = &compiled.rules;
    println!("Compiled {} filter lists to '{}'", inputs.len(), output);
    println!("  Lines:    {} ({} blank or comment)", compiled.stats.lines, compiled.stats.skipped);
    println!("  Rules:    {} accepted, {} dropped", compiled.stats.accepted, compiled.stats.dropped);
    println!(
        "  Kinds:    {} blocking, {} exception, {} element hiding, {} element hiding exception",
        rules.blocking().len(),
        rules.exceptions().len(),
        rules.element_hiding().len(),
        rules.element_hiding_exceptions().len()
    );
    println!("  Time:     {:.1}ms", compiled.total_ms);

    Ok(())
}

fn cmd_check(snapshot: &Path, request: &Request, config: &EngineConfig, json: bool) -> Result<(), String> {
    let matcher = load_matcher(snapshot, config)?;
    let decision = matcher.should_block(&request.url, &request.context());

    if json {
        let text = serde_json::to_string_pretty(&decision).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    let raw = |id: u32| matcher.rule(id).map(|rule| rule.raw.as_str()).unwrap_or("?");
    match (decision.rule_id, decision.exception_id) {
        (Some(id), _) => println!("BLOCKED  rule {}: {}", id, raw(id)),
        (None, Some(id)) => println!("ALLOWED  exception {}: {}", id, raw(id)),
        (None, None) => println!("ALLOWED  no rule matched"),
    }

    Ok(())
}

fn cmd_selectors(snapshot: &Path, domain: Option<&str>, visible: bool, config: &EngineConfig) -> Result<(), String> {
    let matcher = load_matcher(snapshot, config)?;
    let selectors = if visible {
        matcher.visible_selectors(domain)
    } else {
        matcher.get_element_hiding_selectors(domain)
    };

    for selector in &selectors {
        println!("{selector}");
    }
    log::info!("{} selectors for {}", selectors.len(), domain.unwrap_or("<any>"));

    Ok(())
}

fn cmd_batch(
    snapshot: &Path,
    input: &Path,
    output: Option<&Path>,
    workers: Option<usize>,
    config: &EngineConfig,
) -> Result<(), String> {
    let workers = workers.unwrap_or(config.workers);
    if workers == 0 {
        return Err("--workers must be at least 1".to_string());
    }

    let matcher = load_matcher(snapshot, config)?;
    let text = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    let requests = parse_requests(&text)?;

    let lines = evaluate_all(&matcher, &requests, workers)?;
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }

    match output {
        Some(path) => fs::write(path, body)
            .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?,
        None => print!("{body}"),
    }
    log::info!("evaluated {} requests on {} workers", requests.len(), workers);

    Ok(())
}

#[derive(Serialize)]
struct ClassifiedUrl<'a> {
    url: &'a str,
    #[serde(flatten)]
    classification: Classification,
}

fn cmd_classify(
    tracking: Option<&Path>,
    ads: Option<&Path>,
    urls: &[String],
    page: Option<String>,
    config: &EngineConfig,
) -> Result<(), String> {
    let mut lists = ListMatcher::new();
    if let Some(path) = tracking {
        lists.push("tracking", ListRole::Tracking, load_matcher(path, config)?);
    }
    if let Some(path) = ads {
        lists.push("ads", ListRole::Advertising, load_matcher(path, config)?);
    }
    if lists.is_empty() {
        return Err("Give at least one of --tracking or --ads".to_string());
    }

    for url in urls {
        let request = Request {
            url: url.clone(),
            page: page.clone(),
            ..Request::default()
        };
        let classification = lists.classify(url, &request.context());
        let line = serde_json::to_string(&ClassifiedUrl { url, classification })
            .map_err(|e| e.to_string())?;
        println!("{line}");
    }

    Ok(())
}

fn cmd_info(snapshot: &Path) -> Result<(), String> {
    let bytes = fs::metadata(snapshot)
        .map_err(|e| format!("Failed to read '{}': {}", snapshot.display(), e))?
        .len();
    let rules = read_snapshot(snapshot)?;

    println!("Snapshot: {}", snapshot.display());
    println!("  Format:      {} v{}", tg_core::snapshot::SNAPSHOT_FORMAT, tg_core::snapshot::SNAPSHOT_VERSION);
    println!("  Total size:  {} bytes ({:.1} KB)", bytes, bytes as f64 / 1024.0);
    println!();

    println!("Rules:");
    println!("  Count:       {}", rules.len());
    for kind in [
        RuleKind::Blocking,
        RuleKind::Exception,
        RuleKind::ElementHiding,
        RuleKind::ElementHidingException,
    ] {
        let partition = rules.partition(kind);
        let scoped = partition.iter().filter(|r| !r.domain_scope.is_unrestricted()).count();
        println!("  {:<26} {:>6} ({} domain scoped)", kind.as_str(), partition.len(), scoped);
    }

    let with_options = rules
        .blocking()
        .iter()
        .chain(rules.exceptions())
        .filter(|r| !r.options.is_empty())
        .count();
    println!("  Network rules with options: {}", with_options);

    Ok(())
}
