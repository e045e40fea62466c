//! Migration discovery from a directory of SQL files.
//!
//! Two naming conventions are understood, one per directory:
//!
//! - edges: `<digits>_<from>_<up|down>_<to>.sql`, one file per edge. Files
//!   are ordered by name, so the numeric prefix decides which revision is
//!   `HEAD`. Revision names in edge files must not contain an `up` or `down`
//!   segment of their own (`0001_set_up_people_up_rev2.sql` could split in two
//!   places), so such names are rejected.
//! - linear: `YYYY_MM_DD_HH_MM_SS_<name>[.up|.down].sql`, one revision per
//!   name. A plain or `.up` file holds the upgrade, a `.down` file the
//!   downgrade. Revisions are ordered by name.

use crate::script::SqlScript;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use trek_core::{Direction, Migration, Migrations, Operation, Result, RevisionSpec, TrekError};

static LINEAR_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>\d{4}_\d{2}_\d{2}_\d{2}_\d{2}_\d{2}_\w+?)(?:\.(?P<kind>up|down))?\.sql$")
        .expect("valid linear file pattern")
});

static EDGE_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+_(?P<from>\w+?)_(?P<direction>up|down)_(?P<to>\w+)\.sql$")
        .expect("valid edge file pattern")
});

/// What a single file name declares.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Edge {
        from: String,
        to: String,
        direction: Direction,
    },
    Linear {
        id: String,
        direction: Direction,
    },
}

fn classify(file_name: &str) -> Option<Entry> {
    if let Some(caps) = LINEAR_FILE.captures(file_name) {
        let direction = match caps.name("kind").map(|m| m.as_str()) {
            Some("down") => Direction::Down,
            _ => Direction::Up,
        };
        return Some(Entry::Linear {
            id: caps["id"].to_string(),
            direction,
        });
    }
    EDGE_FILE.captures(file_name).map(|caps| Entry::Edge {
        from: caps["from"].to_string(),
        to: caps["to"].to_string(),
        direction: if &caps["direction"] == "down" {
            Direction::Down
        } else {
            Direction::Up
        },
    })
}

/// Whether an edge file name carries more than one direction segment.
fn has_ambiguous_direction(file_name: &str) -> bool {
    let stem = file_name.strip_suffix(".sql").unwrap_or(file_name);
    stem.split('_')
        .skip(1)
        .filter(|segment| matches!(*segment, "up" | "down"))
        .count()
        > 1
}

/// `.sql` files directly inside `dir`, sorted by file name.
fn sql_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, path));
    }
    files.sort();
    Ok(files)
}

/// Build the edge collection from the SQL files in `dir`.
///
/// Every body is read up front; an unreadable file fails discovery.
pub fn collect_migrations<C>(dir: impl AsRef<Path>) -> Result<Migrations<C>>
where
    C: Send + ?Sized,
    SqlScript: Operation<C>,
{
    let dir = dir.as_ref();
    let mut edges = Vec::new();
    let mut linear: BTreeMap<String, RevisionSpec<C>> = BTreeMap::new();

    for (name, path) in sql_files(dir)? {
        let entry = classify(&name).ok_or_else(|| {
            TrekError::discovery(format!(
                "Invalid migration file name {name:?}: expected \
                 <digits>_<from>_<up|down>_<to>.sql or YYYY_MM_DD_HH_MM_SS_<name>[.up|.down].sql"
            ))
        })?;
        if matches!(entry, Entry::Edge { .. }) && has_ambiguous_direction(&name) {
            return Err(TrekError::discovery(format!(
                "Ambiguous migration file name {name:?}: revision names must not \
                 contain an up or down segment"
            )));
        }
        let script: Arc<dyn Operation<C>> = Arc::new(SqlScript::load(&path)?);
        match entry {
            Entry::Edge {
                from,
                to,
                direction,
            } => edges.push(Migration::new(from, to, direction, script)),
            Entry::Linear { id, direction } => {
                let spec = linear
                    .entry(id.clone())
                    .or_insert_with(|| RevisionSpec::new(id));
                let slot = match direction {
                    Direction::Up => &mut spec.upgrade,
                    Direction::Down => &mut spec.downgrade,
                };
                if slot.is_some() {
                    return Err(TrekError::discovery(format!(
                        "Revision {} has more than one {} file",
                        spec.id,
                        direction.verb()
                    )));
                }
                *slot = Some(script);
            }
        }
    }

    if !edges.is_empty() && !linear.is_empty() {
        return Err(TrekError::discovery(format!(
            "{} mixes edge files and linear revision files",
            dir.display()
        )));
    }

    let migrations = if linear.is_empty() {
        edges.into_iter().collect()
    } else {
        Migrations::from_linear(linear.into_values())
    };

    let listing: Vec<String> = migrations.iter().map(ToString::to_string).collect();
    debug!(
        dir = %dir.display(),
        edges = migrations.len(),
        "Collected migrations: {}",
        listing.join(", ")
    );
    Ok(migrations)
}
