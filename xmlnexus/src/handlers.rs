use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;
use xmlnexus_core::analyze::analyze_page;
use xmlnexus_core::data::Database;
use xmlnexus_core::scan::{
    ScanOptions, execute_content_scan, execute_scan, generate_scan_report,
};
use xmlnexus_core::stream::{EventSink, StreamEvent, write_ndjson};

// Helper functions shared by the scan and parse handlers

/// Read a local sitemap document, rejecting empty files up front.
pub fn load_content_from_file(path: &PathBuf) -> Result<String, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    if content.trim().is_empty() {
        return Err(format!("No content found in {}", path.display()));
    }

    Ok(content)
}

/// Expand `~` in a user-supplied database location.
pub fn resolve_db_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    PathBuf::from(expanded.as_ref())
}

fn ndjson_sink() -> EventSink {
    Arc::new(|event| {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        if write_ndjson(&mut lock, &event).is_err() {
            std::process::exit(1);
        }
    })
}

fn spinner_sink(spinner: ProgressBar) -> EventSink {
    let discovered = AtomicUsize::new(0);
    Arc::new(move |event| match event {
        StreamEvent::Node { .. } => {
            let count = discovered.fetch_add(1, Ordering::Relaxed) + 1;
            spinner.set_message(format!("Discovered {} nodes...", count));
        }
        StreamEvent::Info { message } => spinner.set_message(message),
        StreamEvent::Error { error } => spinner.println(format!("{} {}", "!".yellow(), error)),
        StreamEvent::Complete { .. } => {}
    })
}

fn scan_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn emit_report(report: &str, output: Option<&PathBuf>) {
    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, report) {
                eprintln!("{} Failed to write report to {}: {}", "✗".red(), path.display(), e);
                std::process::exit(1);
            }
            println!("{} Report saved to {}", "✓".green(), path.display());
        }
        None => print!("{}", report),
    }
}

pub async fn handle_scan(args: &ArgMatches) {
    let url = args.get_one::<String>("url").unwrap().clone();
    let options = ScanOptions {
        url: url.clone(),
        max_depth: *args.get_one::<usize>("max-depth").unwrap(),
        max_urls: *args.get_one::<usize>("max-urls").unwrap(),
        concurrency: *args.get_one::<usize>("concurrency").unwrap(),
        timeout_secs: *args.get_one::<u64>("timeout").unwrap(),
    };
    let ndjson = args.get_flag("ndjson");
    let no_save = args.get_flag("no-save");
    let output = args.get_one::<PathBuf>("output");

    let spinner = if ndjson { None } else { Some(scan_spinner()) };
    let sink = match &spinner {
        Some(spinner) => spinner_sink(spinner.clone()),
        None => ndjson_sink(),
    };

    let outcome = execute_scan(options, sink).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    match outcome {
        Ok(outcome) => {
            if !ndjson {
                println!("\n{} Scan complete!\n", "✓".green());
                emit_report(&generate_scan_report(&outcome.result), output);
            }

            if !no_save {
                let db_path = resolve_db_path(args.get_one::<String>("db").unwrap());
                if let Some(parent) = db_path.parent() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        eprintln!("{} Failed to create {}: {}", "✗".red(), parent.display(), e);
                        return;
                    }
                }
                let sitemap_url = outcome.roots.first().cloned().unwrap_or_default();
                debug!("Recording scan of {} in {}", url, db_path.display());
                let saved = Database::new(&db_path)
                    .and_then(|db| db.upsert_site(&url, &sitemap_url, &outcome.result));
                if let Err(e) = saved {
                    eprintln!("{} Failed to record scan history: {}", "✗".red(), e);
                }
            }
        }
        Err(e) => {
            if !ndjson {
                eprintln!("{} {}", "✗".red(), e);
            }
            std::process::exit(1);
        }
    }
}

pub async fn handle_parse(args: &ArgMatches) {
    let file = args.get_one::<PathBuf>("file").unwrap();
    let base = args.get_one::<String>("base").unwrap();
    let ndjson = args.get_flag("ndjson");

    let content = match load_content_from_file(file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    let spinner = if ndjson { None } else { Some(scan_spinner()) };
    let sink = match &spinner {
        Some(spinner) => spinner_sink(spinner.clone()),
        None => ndjson_sink(),
    };

    let result = execute_content_scan(&content, ScanOptions::for_url(base), sink).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    match result {
        Ok(result) => {
            if !ndjson {
                println!("\n{} Parse complete!\n", "✓".green());
                emit_report(&generate_scan_report(&result), None);
            }
        }
        Err(e) => {
            if !ndjson {
                eprintln!("{} {}", "✗".red(), e);
            }
            std::process::exit(1);
        }
    }
}

pub async fn handle_analyze(args: &ArgMatches) {
    let url = args.get_one::<Url>("url").unwrap();

    match analyze_page(url.as_str()).await {
        Ok(metadata) => {
            let json = serde_json::to_string_pretty(&metadata)
                .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e));
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}

pub fn handle_history_list(args: &ArgMatches) {
    let limit = *args.get_one::<usize>("limit").unwrap();
    let db_path = resolve_db_path(args.get_one::<String>("db").unwrap());

    if !Database::exists(&db_path) {
        println!("No scan history yet.");
        return;
    }

    let sites = Database::new(&db_path).and_then(|db| db.recent_sites(limit));
    match sites {
        Ok(sites) if sites.is_empty() => println!("No scan history yet."),
        Ok(sites) => {
            for site in sites {
                let status = if site.status == "ok" {
                    "✓".green()
                } else {
                    "✗".red()
                };
                println!(
                    "{} {} {} pages, {} sitemaps, {} errors {}",
                    status,
                    site.site_url.bright_white(),
                    site.pages,
                    site.sitemaps,
                    site.errors,
                    site.scanned_at.dimmed()
                );
            }
        }
        Err(e) => {
            eprintln!("{} Failed to read scan history: {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}

pub fn handle_history_clear(args: &ArgMatches) {
    let db_path = resolve_db_path(args.get_one::<String>("db").unwrap());

    if !Database::exists(&db_path) {
        println!("No scan history yet.");
        return;
    }

    match Database::new(&db_path).and_then(|db| db.clear()) {
        Ok(deleted) => println!("{} Removed {} record(s).", "✓".green(), deleted),
        Err(e) => {
            eprintln!("{} Failed to clear scan history: {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}
