//! The tables a solve reads, built once and shared by reference.

use crate::{
    config::{SolveConfig, TableConfig},
    error::TableError,
    move_table::MoveTable,
    orchestrator::{Algorithm, Orchestrator},
    persistence,
    phase::PhaseKind,
    pruning::{PatternDatabase, PatternDbKind, PatternDbSpec},
    start, success,
};
use cube_core::Coord;
use fxhash::FxHashMap;
use log::{debug, info, warn};
use std::{collections::BTreeSet, path::Path, thread::available_parallelism, time::Instant};

/// Move tables and pattern databases, keyed by what they index. Immutable
/// once built, so any number of solves may share one repository across
/// threads.
#[derive(Debug, Default)]
pub struct TableRepository {
    move_tables: FxHashMap<Coord, MoveTable>,
    pattern_dbs: FxHashMap<PatternDbKind, PatternDatabase>,
}

impl TableRepository {
    /// Starts a builder that keeps every table in memory. Use
    /// [`TableRepositoryBuilder::with_config`] to cache tables on disk.
    #[must_use]
    pub fn builder() -> TableRepositoryBuilder {
        TableRepositoryBuilder {
            config: TableConfig::in_memory(),
            coords: BTreeSet::new(),
            specs: Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Fails with [`TableError::Missing`] if the table was not built.
    pub fn move_table(&self, coord: Coord) -> Result<&MoveTable, TableError> {
        self.move_tables
            .get(&coord)
            .ok_or_else(|| TableError::Missing(MoveTable::name_of(coord)))
    }

    /// # Errors
    ///
    /// Fails with [`TableError::Missing`] if the database was not built.
    pub fn pattern_db(&self, kind: PatternDbKind) -> Result<&PatternDatabase, TableError> {
        self.pattern_dbs
            .get(&kind)
            .ok_or_else(|| TableError::Missing(kind.name().to_owned()))
    }

    pub fn move_tables(&self) -> impl Iterator<Item = &MoveTable> {
        self.move_tables.values()
    }

    pub fn pattern_dbs(&self) -> impl Iterator<Item = &PatternDatabase> {
        self.pattern_dbs.values()
    }
}

#[derive(Debug, Clone)]
pub struct TableRepositoryBuilder {
    config: TableConfig,
    coords: BTreeSet<Coord>,
    specs: Vec<PatternDbSpec>,
}

impl TableRepositoryBuilder {
    #[must_use]
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_move_table(mut self, coord: Coord) -> Self {
        self.coords.insert(coord);
        self
    }

    /// Adds a database with a custom cap. A later spec of the same kind
    /// replaces an earlier one.
    #[must_use]
    pub fn with_pattern_db_spec(mut self, spec: PatternDbSpec) -> Self {
        self.coords.extend(spec.coords());
        self.specs.retain(|existing| existing.kind != spec.kind);
        self.specs.push(spec);
        self
    }

    #[must_use]
    pub fn with_pattern_db(self, kind: PatternDbKind) -> Self {
        if self.specs.iter().any(|spec| spec.kind == kind) {
            return self;
        }
        self.with_pattern_db_spec(kind.spec())
    }

    #[must_use]
    pub fn with_pattern_dbs(self, kinds: impl IntoIterator<Item = PatternDbKind>) -> Self {
        kinds.into_iter().fold(self, Self::with_pattern_db)
    }

    /// Everything `kind` reads when searched with `heuristics`.
    #[must_use]
    pub fn with_phase(mut self, kind: PhaseKind, heuristics: &[PatternDbKind]) -> Self {
        self.coords.extend(kind.coords());
        self.with_pattern_dbs(heuristics.iter().copied())
    }

    /// Everything `algorithm` reads under `config`, including its fallback.
    #[must_use]
    pub fn with_algorithm(self, algorithm: Algorithm, config: &SolveConfig) -> Self {
        algorithm
            .required_phases(config)
            .into_iter()
            .fold(self, |builder, (kind, heuristics)| {
                builder.with_phase(kind, &heuristics)
            })
    }

    fn threads(&self) -> usize {
        self.config
            .threads
            .unwrap_or_else(|| match available_parallelism() {
                Ok(threads) => threads.get(),
                Err(err) => {
                    warn!("Failed to get available parallelism; defaulting to 1: {err}");
                    1
                }
            })
            .max(1)
    }

    /// Loads every requested table from the cache, generating and caching
    /// whatever is absent or does not match.
    ///
    /// # Errors
    ///
    /// Fails only when a table cannot be generated. Cache problems are
    /// logged and worked around.
    pub fn build(self) -> Result<TableRepository, TableError> {
        let dir = self.config.resolved_cache_dir();
        let dir = dir.as_deref();
        let threads = self.threads();
        info!(
            start!("Preparing {} move table(s) and {} pattern database(s)..."),
            self.coords.len(),
            self.specs.len()
        );
        let start = Instant::now();

        let mut repository = TableRepository::default();
        for &coord in &self.coords {
            let table = load_or_generate(
                dir,
                &MoveTable::name_of(coord),
                |dir| persistence::load_move_table(dir, coord),
                || Ok(MoveTable::generate(coord)),
                persistence::save_move_table,
            )?;
            repository.move_tables.insert(coord, table);
        }

        for spec in &self.specs {
            let db = load_or_generate(
                dir,
                spec.name(),
                |dir| persistence::load_pattern_db(dir, spec),
                || {
                    let secondary = spec
                        .secondary
                        .map(|coord| repository.move_table(coord))
                        .transpose()?;
                    PatternDatabase::generate(
                        *spec,
                        repository.move_table(spec.primary)?,
                        secondary,
                        threads,
                    )
                },
                persistence::save_pattern_db,
            )?;
            repository.pattern_dbs.insert(spec.kind, db);
        }

        info!(
            success!("Tables ready in {:.3}s"),
            start.elapsed().as_secs_f64()
        );
        Ok(repository)
    }
}

fn load_or_generate<T>(
    dir: Option<&Path>,
    name: &str,
    load: impl FnOnce(&Path) -> Result<Option<T>, TableError>,
    generate: impl FnOnce() -> Result<T, TableError>,
    save: impl FnOnce(&Path, &T) -> Result<(), TableError>,
) -> Result<T, TableError> {
    if let Some(dir) = dir {
        match load(dir) {
            Ok(Some(table)) => {
                debug!("Loaded `{name}` from {}", dir.display());
                return Ok(table);
            }
            Ok(None) => debug!("`{name}` is not cached yet"),
            Err(err @ TableError::LoadMismatch { .. }) => {
                warn!("{err}; regenerating it");
            }
            Err(err) => warn!("Could not read cached `{name}`: {err}; regenerating it"),
        }
    }

    let table = generate()?;
    if let Some(dir) = dir {
        if let Err(err) = save(dir, &table) {
            warn!("Could not cache `{name}` in {}: {err}", dir.display());
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_repository_is_shareable() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<TableRepository>();
    }

    #[test]
    fn test_builder_collects_coordinates() {
        let builder = TableRepository::builder()
            .with_pattern_db(PatternDbKind::FlipSlice)
            .with_phase(PhaseKind::SolveDomino, &[]);
        assert_eq!(
            builder.coords.iter().copied().collect::<Vec<_>>(),
            vec![
                Coord::EdgeFlip,
                Coord::SliceCombination,
                Coord::CornerPermutation,
                Coord::UdEdgePermutation,
                Coord::SlicePermutation,
            ]
        );
        assert_eq!(builder.specs.len(), 1);
    }

    #[test]
    fn test_custom_cap_replaces_default() {
        let builder = TableRepository::builder()
            .with_pattern_db(PatternDbKind::DominoSlice)
            .with_pattern_db_spec(PatternDbKind::DominoSlice.spec().with_cap(2))
            .with_pattern_db(PatternDbKind::DominoSlice);
        assert_eq!(builder.specs.len(), 1);
        assert_eq!(builder.specs[0].cap, 2);
    }

    #[test]
    fn test_missing_tables_are_reported() {
        let tables = TableRepository::builder().build().unwrap();
        assert!(matches!(
            tables.move_table(Coord::EdgeFlip),
            Err(TableError::Missing(name)) if name == "move_edge_flip"
        ));
        assert!(matches!(
            tables.pattern_db(PatternDbKind::Corners),
            Err(TableError::Missing(_))
        ));
    }

    #[test_log::test]
    fn test_mismatched_cache_is_regenerated() {
        let dir = std::env::temp_dir().join(format!("cubesearch-tables-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let config = TableConfig {
            cache_dir: Some(dir.clone()),
            use_cache: true,
            threads: Some(1),
        };

        // Cache a capped database under the default database's name.
        let capped = TableRepository::builder()
            .with_config(config.clone())
            .with_pattern_db_spec(PatternDbKind::DominoSlice.spec().with_cap(2))
            .build()
            .unwrap();
        let capped = capped.pattern_db(PatternDbKind::DominoSlice).unwrap().clone();
        assert_eq!(capped.max_depth(), 2);

        let rebuilt = TableRepository::builder()
            .with_config(config.clone())
            .with_pattern_db(PatternDbKind::DominoSlice)
            .build()
            .unwrap();
        let rebuilt = rebuilt.pattern_db(PatternDbKind::DominoSlice).unwrap();
        assert!(rebuilt.max_depth() > 2);

        // The regenerated table replaced the stale file.
        let reloaded = persistence::load_pattern_db(&dir, rebuilt.spec())
            .unwrap()
            .unwrap();
        assert_eq!(&reloaded, rebuilt);
        fs::remove_dir_all(dir).unwrap();
    }
}
