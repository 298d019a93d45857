//! Scan a tree into a catalog file, look it up locally, then merge the
//! catalog into a central store and look it up there.

use std::fs;
use std::sync::Arc;

use sumdex_digest::Sha256Digester;
use sumdex_lookup::{CentralLookup, LocalLookup};
use sumdex_scan::{PathMode, ScanConfig, Scanner};
use sumdex_store::{CatalogStore, SqliteCatalog, SqliteCentral};
use sumdex_sync::{LocalCopyFetcher, MergeOutcome, SyncEngine};

const HI: &str = "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4";
const BYE: &str = "b49f425a7e1f9cff3856329ada223f2f9d368f15a00cf48df16ca95986137fe8";

#[test]
fn scan_then_lookup_by_digest_prefix() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hi").unwrap();
    fs::write(dir.path().join("b.txt"), "bye").unwrap();

    let catalog = Arc::new(SqliteCatalog::open(dir.path().join("sumdex.db")).unwrap());
    let scanner = Scanner::new(
        catalog.clone(),
        Arc::new(Sha256Digester),
        ScanConfig::new(PathMode::Relative, "sumdex.db"),
    );
    let report = scanner.scan(dir.path()).unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(catalog.count().unwrap(), 2);

    let a = catalog.find_by_path("a.txt").unwrap().unwrap();
    let b = catalog.find_by_path("b.txt").unwrap().unwrap();
    assert_eq!(a.digest.unwrap().to_hex(), HI);
    assert_eq!(b.digest.unwrap().to_hex(), BYE);

    let lookup = LocalLookup::new(catalog.clone(), Arc::new(Sha256Digester));
    let hits = lookup.by_digest_prefixes(&[&HI[..12]]).unwrap();
    let lines: Vec<_> = hits.iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec![format!("{HI}\ta.txt")]);

    // A second scan over the unchanged tree writes nothing.
    let again = scanner.scan(dir.path()).unwrap();
    assert_eq!(again.mutations(), 0);
    assert_eq!(again.unchanged, 2);
}

#[test]
fn scanned_catalog_merges_into_central_store() {
    let host = tempfile::tempdir().unwrap();
    let tree = host.path().join("tree");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("a.txt"), "hi").unwrap();
    fs::write(tree.join("b.txt"), "bye").unwrap();
    let catalog_path = host.path().join("sumdex.db");

    {
        let catalog = Arc::new(SqliteCatalog::open(&catalog_path).unwrap());
        Scanner::new(catalog, Arc::new(Sha256Digester), ScanConfig::default())
            .scan(&tree)
            .unwrap();
    }

    let central_dir = tempfile::tempdir().unwrap();
    let central = Arc::new(SqliteCentral::open(central_dir.path().join("central.db")).unwrap());
    let engine = SyncEngine::new(
        central.clone(),
        Arc::new(LocalCopyFetcher),
        Arc::new(Sha256Digester),
    );

    let outcome = engine
        .register_and_sync("laptop", catalog_path.to_str().unwrap())
        .unwrap();
    assert_eq!(outcome.writes(), 2);
    assert_eq!(engine.sync("laptop").unwrap(), MergeOutcome::Unchanged);

    let candidate = central_dir.path().join("found.txt");
    fs::write(&candidate, "bye").unwrap();
    let lookup = CentralLookup::new(central, Arc::new(Sha256Digester));
    let hits = lookup.by_files(&[candidate]).unwrap();
    let lines: Vec<_> = hits.iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec![format!("{BYE}\tlaptop\tb.txt")]);
}
