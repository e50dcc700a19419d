//! store-compare: fault-instance store snapshot diff
//!
//! Usage:
//!   store-compare <file1> <file2>         # compare two store snapshots
//!   store-compare <file1> <file2> -q      # quiet: exit 0 if same, 1 if different
//!   store-compare <file1> <file2> --json  # machine-readable diff on stdout
//!
//! Compares instances by identity key (location/object/aux) and reports
//! appeared, vanished, and changed instances (notification flag or
//! occurrence count). Point it at a live store file and its most recent
//! `_deprecated_at_` archive to see what the last run changed.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::process;

use serde::Serialize;

/// One store record, keyed by its identity fields. The remaining fields
/// (templates aside) are compared, not keyed.
#[derive(Debug, Clone, Serialize)]
struct Record {
    flag: String,
    last_summary: String,
    occurrences: usize,
}

type Store = BTreeMap<String, Record>;

fn load_store(path: &str) -> Store {
    let contents = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("store-compare: cannot read {}: {}", path, e);
        process::exit(2);
    });
    let mut store = Store::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() != 8 {
            eprintln!(
                "store-compare: {}:{}: expected 8 ';' fields, got {}",
                path,
                idx + 1,
                fields.len()
            );
            process::exit(2);
        }
        let key = format!("{}/{}/{}", fields[0], fields[1], fields[2]);
        let occurrences = fields[7].split(',').filter(|e| !e.is_empty()).count();
        store.insert(
            key,
            Record {
                flag: fields[5].to_string(),
                last_summary: fields[6].to_string(),
                occurrences,
            },
        );
    }
    store
}

#[derive(Debug, Serialize)]
struct Changed {
    key: String,
    before: Record,
    after: Record,
}

#[derive(Debug, Default, Serialize)]
struct Diff {
    vanished: Vec<String>,
    appeared: Vec<String>,
    changed: Vec<Changed>,
}

fn compare(a: &Store, b: &Store) -> Diff {
    let mut diff = Diff::default();
    let all_keys: std::collections::BTreeSet<_> = a.keys().chain(b.keys()).cloned().collect();

    for key in all_keys {
        match (a.get(&key), b.get(&key)) {
            (Some(_), None) => diff.vanished.push(key),
            (None, Some(_)) => diff.appeared.push(key),
            (Some(ra), Some(rb)) => {
                if ra.flag != rb.flag
                    || ra.last_summary != rb.last_summary
                    || ra.occurrences != rb.occurrences
                {
                    diff.changed.push(Changed {
                        key,
                        before: ra.clone(),
                        after: rb.clone(),
                    });
                }
            }
            (None, None) => unreachable!(),
        }
    }
    diff
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let quiet = args.iter().any(|a| a == "-q" || a == "--quiet");
    let json = args.iter().any(|a| a == "--json");
    let files: Vec<_> = args.iter().filter(|a| !a.starts_with('-')).skip(1).collect();

    if files.len() != 2 {
        eprintln!("Usage: store-compare <file1> <file2> [-q|--quiet] [--json]");
        eprintln!("  -q      Quiet: only exit code (0=same, 1=different)");
        eprintln!("  --json  Print the diff as JSON");
        process::exit(2);
    }

    let store_a = load_store(files[0]);
    let store_b = load_store(files[1]);
    let diff = compare(&store_a, &store_b);

    let has_diff =
        !diff.vanished.is_empty() || !diff.appeared.is_empty() || !diff.changed.is_empty();

    if quiet {
        process::exit(if has_diff { 1 } else { 0 });
    }

    if json {
        match serde_json::to_string_pretty(&diff) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("store-compare: cannot serialize diff: {}", e);
                process::exit(2);
            }
        }
        process::exit(if has_diff { 1 } else { 0 });
    }

    if !has_diff {
        println!("No differences.");
        process::exit(0);
    }

    for key in &diff.vanished {
        println!("- {}", key);
    }
    for key in &diff.appeared {
        println!("+ {}", key);
    }
    for c in &diff.changed {
        println!(
            "~ {}: {} {} occ -> {} {} occ",
            c.key, c.before.flag, c.before.occurrences, c.after.flag, c.after.occurrences
        );
    }

    process::exit(1);
}
