use crate::config::MachineSeedFile;
use anyhow::Result;
use fleetmon_storage::MetricStore;
use std::collections::HashSet;

/// Register machines from a JSON seed file, skipping URLs that are
/// already known.
pub fn seed_machines(store: &dyn MetricStore, seed_path: &str) -> Result<()> {
    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: MachineSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let existing_urls: HashSet<String> = store
        .list_machines()?
        .into_iter()
        .map(|m| m.url)
        .collect();

    let mut created = 0u32;
    let mut skipped = 0u32;

    for machine in &seed.machines {
        if existing_urls.contains(&machine.url) {
            tracing::warn!(name = %machine.name, url = %machine.url, "Machine already registered, skipping");
            skipped += 1;
            continue;
        }

        match store.insert_machine(&machine.name, &machine.url) {
            Ok(inserted) => {
                tracing::info!(name = %inserted.name, id = %inserted.id, "Machine registered");
                created += 1;
            }
            Err(e) => {
                tracing::error!(name = %machine.name, error = %e, "Failed to register machine");
            }
        }
    }

    tracing::info!(created, skipped, "init-machines completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmon_storage::engine::SqliteMetricStore;
    use tempfile::TempDir;

    #[test]
    fn seeds_machines_and_skips_known_urls() {
        fleetmon_common::id::init(1, 1);
        let dir = TempDir::new().unwrap();
        let store = SqliteMetricStore::open(&dir.path().join("fleetmon.db")).unwrap();
        store
            .insert_machine("web-01", "http://web-01/metrics")
            .unwrap();

        let seed_path = dir.path().join("machines.json");
        std::fs::write(
            &seed_path,
            r#"{"machines": [
                {"name": "web-01", "url": "http://web-01/metrics"},
                {"name": "db-01", "url": "http://db-01/metrics"}
            ]}"#,
        )
        .unwrap();

        seed_machines(&store, seed_path.to_str().unwrap()).unwrap();

        let machines = store.list_machines().unwrap();
        assert_eq!(machines.len(), 2);
    }

    #[test]
    fn unreadable_seed_file_is_an_error() {
        fleetmon_common::id::init(1, 1);
        let dir = TempDir::new().unwrap();
        let store = SqliteMetricStore::open(&dir.path().join("fleetmon.db")).unwrap();

        assert!(seed_machines(&store, "/nonexistent/machines.json").is_err());
    }
}
