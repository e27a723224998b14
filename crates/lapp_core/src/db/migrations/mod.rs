//! Schema steps for the study store.
//!
//! Steps are numbered from 1 with no gaps; a database stamped with version
//! `n` has run exactly the first `n` steps. One upgrade run is one
//! transaction.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Tables this step introduces.
    creates: &'static [&'static str],
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "hierarchy",
        sql: include_str!("0001_hierarchy.sql"),
        creates: &["languages", "units", "items"],
    },
    SchemaStep {
        version: 2,
        name: "exercise_links",
        sql: include_str!("0002_exercise_links.sql"),
        creates: &["exercise_links"],
    },
];

/// Schema version written by this build.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

/// Names of the steps a database at `version` still has to run.
pub fn pending_steps(version: u32) -> Vec<&'static str> {
    STEPS
        .iter()
        .filter(|step| step.version > version)
        .map(|step| step.name)
        .collect()
}

/// Reads the schema version stamped on a connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the study schema up to [`latest_version`] and checks that the
/// hierarchy tables exist afterwards.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = current_user_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    if found < supported {
        let tx = conn.transaction()?;
        for step in STEPS.iter().filter(|step| step.version > found) {
            run_step(&tx, step)?;
        }
        tx.commit()?;
        info!("event=db_migrate module=db status=ok from_version={found} to_version={supported}");
    }

    verify_tables(conn, supported)
}

fn run_step(tx: &Transaction<'_>, step: &SchemaStep) -> DbResult<()> {
    let outcome = tx
        .execute_batch(step.sql)
        .and_then(|()| tx.pragma_update(None, "user_version", step.version));
    outcome.map_err(|source| {
        error!(
            "event=db_migrate module=db status=error version={} step={} error={source}",
            step.version, step.name
        );
        DbError::MigrationFailed {
            version: step.version,
            step: step.name,
            source,
        }
    })
}

fn verify_tables(conn: &Connection, version: u32) -> DbResult<()> {
    let mut stmt =
        conn.prepare("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);")?;
    let mut missing = Vec::new();
    for table in STEPS.iter().flat_map(|step| step.creates.iter().copied()) {
        if !stmt.query_row([table], |row| row.get::<_, bool>(0))? {
            missing.push(table);
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DbError::MissingTables {
            version,
            tables: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{latest_version, pending_steps, STEPS};

    #[test]
    fn steps_are_numbered_without_gaps() {
        for (index, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn pending_steps_follow_the_stamped_version() {
        assert_eq!(pending_steps(0), vec!["hierarchy", "exercise_links"]);
        assert_eq!(pending_steps(1), vec!["exercise_links"]);
        assert!(pending_steps(latest_version()).is_empty());
    }
}
