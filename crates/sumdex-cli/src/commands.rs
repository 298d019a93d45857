use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use sumdex_digest::Sha256Digester;
use sumdex_lookup::{CentralLookup, LocalLookup};
use sumdex_scan::{PathMode, ScanConfig, Scanner};
use sumdex_store::{SqliteCatalog, SqliteCentral};
use sumdex_sync::{RsyncFetcher, SyncEngine};

use crate::cli::*;
use crate::config::Config;

pub fn run_command(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Scan(args) => cmd_scan(args, config, format),
        Command::Digest(args) => cmd_digest(args, config, format),
        Command::Path(args) => cmd_path(args, config, format),
        Command::Find(args) => cmd_find(args, config, format),
        Command::Namespace(args) => match args.action {
            NamespaceAction::Register { name, locator } => {
                cmd_register(&name, &locator, config, format)
            }
            NamespaceAction::Sync { names } => cmd_sync(&names, config, format),
            NamespaceAction::List => cmd_list(config, format),
        },
    }
}

fn open_catalog(config: &Config) -> anyhow::Result<Arc<SqliteCatalog>> {
    let catalog = SqliteCatalog::open(&config.catalog)
        .with_context(|| format!("opening catalog {}", config.catalog.display()))?;
    Ok(Arc::new(catalog))
}

fn open_catalog_read_only(config: &Config) -> anyhow::Result<Arc<SqliteCatalog>> {
    let catalog = SqliteCatalog::open_read_only(&config.catalog)
        .with_context(|| format!("opening catalog {}", config.catalog.display()))?;
    Ok(Arc::new(catalog))
}

fn open_central(config: &Config) -> anyhow::Result<Arc<SqliteCentral>> {
    let central = SqliteCentral::open(&config.central)
        .with_context(|| format!("opening central store {}", config.central.display()))?;
    Ok(Arc::new(central))
}

fn open_central_read_only(config: &Config) -> anyhow::Result<Arc<SqliteCentral>> {
    let central = SqliteCentral::open_read_only(&config.central)
        .with_context(|| format!("opening central store {}", config.central.display()))?;
    Ok(Arc::new(central))
}

fn sync_engine(config: &Config) -> anyhow::Result<SyncEngine> {
    Ok(SyncEngine::new(
        open_central(config)?,
        Arc::new(RsyncFetcher::new(config.rsync.clone())),
        Arc::new(Sha256Digester),
    ))
}

/// Print one line per item: its `Display` form, or a JSON object.
fn print_lines<T: Display + Serialize>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for item in items {
        match format {
            OutputFormat::Text => writeln!(out, "{item}")?,
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(item)?)?,
        }
    }
    Ok(())
}

fn cmd_scan(args: ScanArgs, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let mode = PathMode::from_abs_flag(args.abs_mode || config.abs_mode);
    let scanner = Scanner::new(
        open_catalog(config)?,
        Arc::new(Sha256Digester),
        ScanConfig::new(mode, config.reserved_name()),
    );
    let report = scanner.scan_all(&args.roots).context("scan failed")?;
    match format {
        OutputFormat::Text => eprintln!("{} {}", "✓".green().bold(), report),
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
    }
    Ok(())
}

fn cmd_digest(args: LookupArgs, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    if args.central {
        let lookup = CentralLookup::new(open_central_read_only(config)?, Arc::new(Sha256Digester));
        print_lines(&lookup.by_digest_prefixes(&args.prefixes)?, format)
    } else {
        let lookup = LocalLookup::new(open_catalog_read_only(config)?, Arc::new(Sha256Digester));
        print_lines(&lookup.by_digest_prefixes(&args.prefixes)?, format)
    }
}

fn cmd_path(args: LookupArgs, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    if args.central {
        let lookup = CentralLookup::new(open_central_read_only(config)?, Arc::new(Sha256Digester));
        print_lines(&lookup.by_path_prefixes(&args.prefixes)?, format)
    } else {
        let lookup = LocalLookup::new(open_catalog_read_only(config)?, Arc::new(Sha256Digester));
        print_lines(&lookup.by_path_prefixes(&args.prefixes)?, format)
    }
}

fn cmd_find(args: FindArgs, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    if args.central {
        let lookup = CentralLookup::new(open_central_read_only(config)?, Arc::new(Sha256Digester));
        print_lines(&lookup.by_files(&args.files)?, format)
    } else {
        let lookup = LocalLookup::new(open_catalog_read_only(config)?, Arc::new(Sha256Digester));
        print_lines(&lookup.by_files(&args.files)?, format)
    }
}

#[derive(Serialize)]
struct SyncLine<'a, T: Serialize> {
    namespace: &'a str,
    result: T,
}

fn cmd_register(
    name: &str,
    locator: &str,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let engine = sync_engine(config)?;
    let outcome = engine
        .register_and_sync(name, locator)
        .with_context(|| format!("registering namespace {name}"))?;
    match format {
        OutputFormat::Text => eprintln!("{} {} {}", "✓".green().bold(), name.bold(), outcome),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&SyncLine {
                namespace: name,
                result: outcome
            })?
        ),
    }
    Ok(())
}

fn cmd_sync(names: &[String], config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let engine = sync_engine(config)?;
    let mut failed = 0usize;
    for name in names {
        match engine.sync(name) {
            Ok(outcome) => match format {
                OutputFormat::Text => {
                    eprintln!("{} {} {}", "✓".green().bold(), name.bold(), outcome)
                }
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string(&SyncLine {
                        namespace: name,
                        result: outcome
                    })?
                ),
            },
            Err(e) => {
                failed += 1;
                eprintln!("{} {} {}", "✗".red().bold(), name.bold(), e);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} namespaces failed to sync", names.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct NamespaceLine<'a> {
    name: &'a str,
    status: &'a str,
    locator: &'a str,
}

impl Display for NamespaceLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.name, self.status, self.locator)
    }
}

fn cmd_list(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let namespaces = sync_engine(config)?.list()?;
    let lines: Vec<NamespaceLine<'_>> = namespaces
        .iter()
        .map(|ns| NamespaceLine {
            name: &ns.name,
            status: ns.status.as_str(),
            locator: &ns.source_locator,
        })
        .collect();
    print_lines(&lines, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use clap::Parser;
    use sumdex_store::{CatalogStore, CentralStore};

    fn config_in(dir: &Path) -> Config {
        Config {
            catalog: dir.join("sumdex.db"),
            central: dir.join("central.db"),
            ..Config::default()
        }
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sumdex").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn scan_writes_catalog_next_to_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("a.txt"), "hi").unwrap();
        let config = config_in(dir.path());

        run_command(parse(&["scan", tree.to_str().unwrap()]), &config).unwrap();
        let catalog = SqliteCatalog::open_read_only(&config.catalog).unwrap();
        assert!(catalog.find_by_path("a.txt").unwrap().is_some());

        run_command(parse(&["digest", "8f4343"]), &config).unwrap();
        run_command(parse(&["--format", "json", "path", "a"]), &config).unwrap();
    }

    #[test]
    fn lookup_without_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = run_command(parse(&["digest", "00"]), &config).unwrap_err();
        assert!(format!("{err:#}").contains("opening catalog"));
    }

    #[test]
    fn central_lookup_does_not_create_a_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = run_command(parse(&["path", "-C", "docs/"]), &config).unwrap_err();
        assert!(format!("{err:#}").contains("opening central store"));
        assert!(!config.central.exists());

        sync_engine(&config).unwrap().register("h1", "h1:/db").unwrap();
        run_command(parse(&["digest", "--central", "8f"]), &config).unwrap();
    }

    #[test]
    fn sync_continues_past_failures_and_reports_them() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let engine = sync_engine(&config).unwrap();
        engine.register("known", "nowhere:/x.db").unwrap();
        drop(engine);

        let err = run_command(
            parse(&["--format", "json", "namespace", "sync", "missing", "known"]),
            &Config {
                rsync: "sumdex-no-such-rsync-binary".into(),
                ..config.clone()
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "2 of 2 namespaces failed to sync");

        let central = SqliteCentral::open(&config.central).unwrap();
        assert!(central.find_namespace("known").unwrap().unwrap().is_new());
    }

    #[test]
    fn list_prints_registered_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        sync_engine(&config).unwrap().register("h1", "h1:/db").unwrap();
        run_command(parse(&["namespace", "list"]), &config).unwrap();
        let line = NamespaceLine {
            name: "h1",
            status: "new",
            locator: "h1:/db",
        };
        assert_eq!(line.to_string(), "h1\tnew\th1:/db");
    }
}
