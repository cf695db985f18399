use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Connection, Pool, Row, Sqlite, SqlitePool};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"--[^\n]*\n").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" *([(),]) *").unwrap());
static QUOTED_IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(\w+)""#).unwrap());

#[derive(Debug)]
pub struct TableInfo {
    pub sql: String,
}

#[derive(Debug)]
pub struct IndexInfo {
    pub sql: String,
}

#[derive(Debug)]
pub struct ColumnInfo {
    pub name: String,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create pristine schema: {0}")]
    PristineSchema(sqlx::Error),

    #[error("{0}")]
    Refused(String),

    #[error("Foreign key violations after migration: {0:?}")]
    ForeignKeyViolations(Vec<String>),
}

pub struct DeclarativeMigrator {
    pool: Pool<Sqlite>,
    target_schema: String,
    allow_deletions: bool,
    schema_changes_made: u32,
}

impl DeclarativeMigrator {
    pub fn new(pool: Pool<Sqlite>, target_schema: &str, allow_deletions: bool) -> Self {
        Self {
            pool,
            target_schema: target_schema.to_string(),
            allow_deletions,
            schema_changes_made: 0,
        }
    }

    async fn pristine_pool(&self) -> Result<SqlitePool, MigrationError> {
        let pristine_pool = SqlitePool::connect("sqlite::memory:").await?;
        if !self.target_schema.trim().is_empty() {
            sqlx::raw_sql(&self.target_schema)
                .execute(&pristine_pool)
                .await
                .map_err(MigrationError::PristineSchema)?;
        }
        Ok(pristine_pool)
    }

    #[instrument(skip(self))]
    pub async fn get_changes(self) -> Result<ChangesNeeded, MigrationError> {
        let pristine_pool = self.pristine_pool().await?;
        let mut tx = self.pool.begin().await?;

        let changes = self.analyze_changes(&mut tx, &pristine_pool).await?;
        tx.rollback().await?;

        Ok(changes)
    }

    #[instrument(skip(self))]
    pub async fn migrate(&mut self) -> Result<bool, MigrationError> {
        info!("Starting declarative database migration");

        let pristine_pool = self.pristine_pool().await?;

        // Rebuilding a table drops it, and with foreign keys on that drop runs
        // the ON DELETE actions of every referencing table. The pragma is a
        // no-op inside a transaction, so it is set on the connection first.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;

        let result = self.migrate_on(&mut conn, &pristine_pool).await;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await?;

        let changed = result?;

        if changed {
            info!("Running VACUUM after migration");
            sqlx::query("VACUUM").execute(&mut *conn).await?;
        }

        Ok(changed)
    }

    async fn migrate_on(
        &mut self,
        conn: &mut sqlx::SqliteConnection,
        pristine_pool: &SqlitePool,
    ) -> Result<bool, MigrationError> {
        let mut tx = Connection::begin(conn).await?;

        let changes_needed = self.analyze_changes(&mut tx, pristine_pool).await?;

        if !changes_needed.has_any_changes() {
            tx.commit().await?;
            info!("No schema changes needed");
            return Ok(false);
        }

        let migration_result = self
            .apply_changes(&mut tx, pristine_pool, changes_needed)
            .await;

        let migration_result = match migration_result {
            Ok(()) => self.check_foreign_keys(&mut tx).await,
            Err(e) => Err(e),
        };

        match migration_result {
            Ok(()) => {
                tx.commit().await?;
                info!(
                    "Migration completed. Schema changes made: {}",
                    self.schema_changes_made
                );
                Ok(self.schema_changes_made > 0)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn check_foreign_keys(
        &self,
        tx: &mut sqlx::Transaction<'_, Sqlite>,
    ) -> Result<(), MigrationError> {
        let rows = sqlx::query("PRAGMA foreign_key_check")
            .fetch_all(&mut **tx)
            .await?;

        if rows.is_empty() {
            return Ok(());
        }

        let violations: Vec<String> = rows
            .iter()
            .map(|row| {
                let table: String = row.get(0);
                let rowid: Option<i64> = row.get(1);
                let parent: String = row.get(2);
                format!("{}(rowid {:?}) -> {}", table, rowid, parent)
            })
            .collect();

        warn!(?violations, "Migration left dangling foreign keys");
        Err(MigrationError::ForeignKeyViolations(violations))
    }

    #[instrument(skip(self, tx, pristine_pool))]
    async fn apply_changes(
        &mut self,
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        pristine_pool: &SqlitePool,
        changes: ChangesNeeded,
    ) -> Result<(), MigrationError> {
        // New tables, then rebuilt tables, then deletions
        let target_tables = self.get_tables(pristine_pool).await?;
        for table_name in &changes.new_tables {
            if let Some(table_info) = target_tables.get(table_name) {
                self.execute_schema_change(
                    &format!("Create new table {}", table_name),
                    &table_info.sql,
                    &mut **tx,
                )
                .await?;
            }
        }

        for table in &changes.modified_tables {
            if !table.removed_columns.is_empty() && !self.allow_deletions {
                return Err(MigrationError::Refused(format!(
                    "Migration requires deleting columns {:?} from table {}, but allow_deletions=false. Set allow_deletions=true to permit this.",
                    table.removed_columns, table.name
                )));
            }

            if let Some(target_table) = target_tables.get(&table.name) {
                self.migrate_table(tx, &table.name, target_table, pristine_pool)
                    .await?;
            }
        }

        if !changes.removed_tables.is_empty() {
            if !self.allow_deletions {
                return Err(MigrationError::Refused(format!(
                    "Migration requires deleting tables {:?}, but allow_deletions=false. Set allow_deletions=true to permit this.",
                    changes.removed_tables
                )));
            }

            for table_name in &changes.removed_tables {
                let drop_sql = format!("DROP TABLE {}", table_name);
                self.execute_schema_change(
                    &format!("Drop table {}", table_name),
                    &drop_sql,
                    &mut **tx,
                )
                .await?;
            }
        }

        let current_indices = self.get_indices(&mut **tx).await?;
        let target_indices = self.get_indices(pristine_pool).await?;

        let indices_to_remove: Vec<_> = current_indices
            .keys()
            .filter(|name| !target_indices.contains_key(*name))
            .collect();

        if !indices_to_remove.is_empty() && !self.allow_deletions {
            return Err(MigrationError::Refused(format!(
                "Migration requires deleting indices {:?}, but allow_deletions=false. Set allow_deletions=true to permit this.",
                indices_to_remove
            )));
        }

        self.migrate_indices(tx, &current_indices, &target_indices)
            .await?;

        if changes.pragma_changes {
            let target_user_version = sqlx::query("PRAGMA user_version")
                .fetch_one(pristine_pool)
                .await?
                .get::<i64, _>(0);

            let pragma_sql = format!("PRAGMA user_version = {}", target_user_version);
            self.execute_schema_change(
                &format!("Set user_version to {}", target_user_version),
                &pragma_sql,
                &mut **tx,
            )
            .await?;
        }

        Ok(())
    }

    #[instrument(skip(self, tx, target_table, pristine_pool))]
    async fn migrate_table(
        &mut self,
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        table_name: &str,
        target_table: &TableInfo,
        pristine_pool: &SqlitePool,
    ) -> Result<(), MigrationError> {
        info!("Migrating table: {}", table_name);

        let temp_name = format!("{}_migration_new", table_name);
        let temp_sql = target_table.sql.replacen(
            &format!("CREATE TABLE {}", table_name),
            &format!("CREATE TABLE {}", temp_name),
            1,
        );

        self.execute_schema_change(
            &format!("Create temporary table for {}", table_name),
            &temp_sql,
            &mut **tx,
        )
        .await?;

        let current_columns = self.get_table_columns(&mut **tx, table_name).await?;
        let target_columns = self.get_table_columns(pristine_pool, table_name).await?;

        let current_col_names: HashSet<_> = current_columns.iter().map(|c| &c.name).collect();
        let target_col_names: HashSet<_> = target_columns.iter().map(|c| &c.name).collect();

        let removed_columns: Vec<_> = current_col_names.difference(&target_col_names).collect();
        if !removed_columns.is_empty() && !self.allow_deletions {
            return Err(MigrationError::Refused(format!(
                "Refusing to remove columns {:?} from table {}. Set allow_deletions=true to permit this.",
                removed_columns, table_name
            )));
        }

        let common_columns: Vec<_> = current_col_names.intersection(&target_col_names).collect();
        if !common_columns.is_empty() {
            let columns_str = common_columns
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let copy_sql = format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                temp_name, columns_str, columns_str, table_name
            );

            self.execute_schema_change(
                &format!("Copy data to new {}", table_name),
                &copy_sql,
                &mut **tx,
            )
            .await?;
        }

        let drop_sql = format!("DROP TABLE {}", table_name);
        self.execute_schema_change(
            &format!("Drop old table {}", table_name),
            &drop_sql,
            &mut **tx,
        )
        .await?;

        let rename_sql = format!("ALTER TABLE {} RENAME TO {}", temp_name, table_name);
        self.execute_schema_change(
            &format!("Rename new table to {}", table_name),
            &rename_sql,
            &mut **tx,
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self, tx))]
    async fn migrate_indices(
        &mut self,
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        current_indices: &HashMap<String, IndexInfo>,
        target_indices: &HashMap<String, IndexInfo>,
    ) -> Result<(), MigrationError> {
        for index_name in current_indices.keys() {
            if !target_indices.contains_key(index_name) {
                let drop_sql = format!("DROP INDEX {}", index_name);
                self.execute_schema_change(
                    &format!("Drop obsolete index {}", index_name),
                    &drop_sql,
                    &mut **tx,
                )
                .await?;
            }
        }

        for (index_name, target_index) in target_indices {
            match current_indices.get(index_name) {
                Some(current_index)
                    if normalize_sql(&current_index.sql) == normalize_sql(&target_index.sql) => {}
                Some(_) => {
                    let drop_sql = format!("DROP INDEX {}", index_name);
                    self.execute_schema_change(
                        &format!("Drop changed index {}", index_name),
                        &drop_sql,
                        &mut **tx,
                    )
                    .await?;

                    self.execute_schema_change(
                        &format!("Recreate index {}", index_name),
                        &target_index.sql,
                        &mut **tx,
                    )
                    .await?;
                }
                None => {
                    self.execute_schema_change(
                        &format!("Create new index {}", index_name),
                        &target_index.sql,
                        &mut **tx,
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    #[instrument(skip(self, executor))]
    async fn execute_schema_change(
        &mut self,
        description: &str,
        sql: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<(), MigrationError> {
        info!("Database migration: {} with SQL:\n{}", description, sql);
        sqlx::query(sql).execute(executor).await?;
        self.schema_changes_made += 1;
        Ok(())
    }

    async fn get_tables(
        &self,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<HashMap<String, TableInfo>, MigrationError> {
        let rows = sqlx::query(
            "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name != 'sqlite_sequence'",
        )
        .fetch_all(executor)
        .await?;

        let mut tables = HashMap::new();
        for row in rows {
            let name: String = row.get(0);
            let sql: String = row.get(1);
            tables.insert(name, TableInfo { sql });
        }
        Ok(tables)
    }

    async fn get_indices(
        &self,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<HashMap<String, IndexInfo>, MigrationError> {
        let rows = sqlx::query(
            "SELECT name, sql FROM sqlite_master WHERE type = 'index' AND sql IS NOT NULL",
        )
        .fetch_all(executor)
        .await?;

        let mut indices = HashMap::new();
        for row in rows {
            let name: String = row.get(0);
            let sql: String = row.get(1);
            indices.insert(name, IndexInfo { sql });
        }
        Ok(indices)
    }

    async fn get_table_columns(
        &self,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        table_name: &str,
    ) -> Result<Vec<ColumnInfo>, MigrationError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(executor)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ColumnInfo { name: row.get(1) })
            .collect())
    }

    #[instrument(skip_all)]
    async fn analyze_changes(
        &self,
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        pristine_pool: &SqlitePool,
    ) -> Result<ChangesNeeded, MigrationError> {
        let mut changes = ChangesNeeded::default();

        let current_tables = self.get_tables(&mut **tx).await?;
        let target_tables = self.get_tables(pristine_pool).await?;

        let current_table_names: HashSet<_> = current_tables.keys().collect();
        let target_table_names: HashSet<_> = target_tables.keys().collect();

        changes.new_tables = target_table_names
            .difference(&current_table_names)
            .map(|s| s.to_string())
            .collect();

        changes.removed_tables = current_table_names
            .difference(&target_table_names)
            .map(|s| s.to_string())
            .collect();

        for table_name in current_table_names.intersection(&target_table_names) {
            let current_sql = normalize_sql(&current_tables[*table_name].sql);
            let target_sql = normalize_sql(&target_tables[*table_name].sql);
            if current_sql == target_sql {
                continue;
            }

            let current_columns = self.get_table_columns(&mut **tx, table_name).await?;
            let target_columns = self.get_table_columns(pristine_pool, table_name).await?;

            let current_col_names: HashSet<_> = current_columns.iter().map(|c| &c.name).collect();
            let target_col_names: HashSet<_> = target_columns.iter().map(|c| &c.name).collect();

            changes.modified_tables.push(ModifiedTable {
                name: table_name.to_string(),
                removed_columns: current_col_names
                    .difference(&target_col_names)
                    .map(|s| s.to_string())
                    .collect(),
                new_columns: target_col_names
                    .difference(&current_col_names)
                    .map(|s| s.to_string())
                    .collect(),
            });
        }

        let current_indices = self.get_indices(&mut **tx).await?;
        let target_indices = self.get_indices(pristine_pool).await?;

        let current_index_names: HashSet<_> = current_indices.keys().collect();
        let target_index_names: HashSet<_> = target_indices.keys().collect();

        changes.new_indices = target_index_names
            .difference(&current_index_names)
            .map(|s| s.to_string())
            .collect();

        changes.removed_indices = current_index_names
            .difference(&target_index_names)
            .map(|s| s.to_string())
            .collect();

        for index_name in current_index_names.intersection(&target_index_names) {
            let current_sql = normalize_sql(&current_indices[*index_name].sql);
            let target_sql = normalize_sql(&target_indices[*index_name].sql);
            if current_sql != target_sql {
                changes.modified_indices.push(index_name.to_string());
            }
        }

        let current_user_version = sqlx::query("PRAGMA user_version")
            .fetch_one(&mut **tx)
            .await?
            .get::<i64, _>(0);
        let target_user_version = sqlx::query("PRAGMA user_version")
            .fetch_one(pristine_pool)
            .await?
            .get::<i64, _>(0);

        changes.pragma_changes = current_user_version != target_user_version;

        if !self.allow_deletions {
            for table in &changes.modified_tables {
                if !table.removed_columns.is_empty() {
                    return Err(MigrationError::Refused(format!(
                        "Refusing to remove columns {:?} from table {}. Set allow_deletions=true to permit this.",
                        table.removed_columns, table.name
                    )));
                }
            }

            if !changes.removed_tables.is_empty() {
                return Err(MigrationError::Refused(format!(
                    "Refusing to delete tables: {:?}. Set allow_deletions=true to permit this.",
                    changes.removed_tables
                )));
            }
        }

        Ok(changes)
    }
}

pub fn normalize_sql(sql: &str) -> String {
    let sql = COMMENT_RE.replace_all(sql, "");
    let sql = WHITESPACE_RE.replace_all(&sql, " ");
    let sql = PUNCTUATION_RE.replace_all(&sql, "$1");
    let sql = QUOTED_IDENT_RE.replace_all(&sql, "$1");

    sql.trim().to_string()
}

#[instrument(skip(pool, target_schema))]
pub async fn migrate_database_declaratively(
    pool: Pool<Sqlite>,
    target_schema: &str,
    allow_deletions: bool,
) -> Result<bool, MigrationError> {
    let mut migrator = DeclarativeMigrator::new(pool, target_schema, allow_deletions);
    migrator.migrate().await
}

/// Computes the difference between the live database and `target_schema`
/// without touching the database. Deletions are reported, not refused.
#[instrument(skip(pool, target_schema))]
pub async fn get_schema_changes(
    pool: Pool<Sqlite>,
    target_schema: &str,
) -> Result<ChangesNeeded, MigrationError> {
    let migrator = DeclarativeMigrator::new(pool, target_schema, true);
    migrator.get_changes().await
}

#[derive(Default, Debug)]
pub struct ChangesNeeded {
    pub new_tables: Vec<String>,
    pub removed_tables: Vec<String>,
    pub modified_tables: Vec<ModifiedTable>,
    pub new_indices: Vec<String>,
    pub removed_indices: Vec<String>,
    pub modified_indices: Vec<String>,
    pub pragma_changes: bool,
}

#[derive(Default, Debug, Hash, Eq, PartialEq)]
pub struct ModifiedTable {
    pub name: String,
    pub removed_columns: Vec<String>,
    pub new_columns: Vec<String>,
}

impl ChangesNeeded {
    pub fn has_any_changes(&self) -> bool {
        !self.new_tables.is_empty()
            || !self.removed_tables.is_empty()
            || !self.modified_tables.is_empty()
            || !self.new_indices.is_empty()
            || !self.removed_indices.is_empty()
            || !self.modified_indices.is_empty()
            || self.pragma_changes
    }

    pub fn is_destructive(&self) -> bool {
        !self.removed_tables.is_empty()
            || !self.removed_indices.is_empty()
            || self
                .modified_tables
                .iter()
                .any(|table| !table.removed_columns.is_empty())
    }
}

pub fn read_schema_file_to_string(path: &Path) -> Result<String, MigrationError> {
    let schema = fs::read_to_string(path)?;
    Ok(schema)
}
