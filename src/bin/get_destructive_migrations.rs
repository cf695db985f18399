use std::path::Path;

use anyhow::Context;
use sqlx::SqlitePool;
use thrivepath::database::{
    ChangesNeeded, get_schema_changes, get_schema_string, read_schema_file_to_string,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let changes = get_changes().await?;

    if !changes.is_destructive() {
        print_string_vec(&changes.new_tables, "    Table added:");
        print_string_vec(&changes.new_indices, "    Index added:");
        for table in &changes.modified_tables {
            let table_prefix = format!("    Column added to table {}:", table.name);
            print_string_vec(&table.new_columns, &table_prefix);
        }

        println!("Changes passed the check ✓");
        return Ok(());
    }

    println!("Destructive changes detected:");
    print_string_vec(&changes.removed_tables, "    Table removed:");
    print_string_vec(&changes.removed_indices, "    Index removed:");

    for table in &changes.modified_tables {
        let table_prefix = format!("    Column removed from table {}:", table.name);
        print_string_vec(&table.removed_columns, &table_prefix);
    }

    std::process::exit(1);
}

fn print_string_vec(vec: &[String], prefix: &str) {
    for string in vec {
        println!("{} {}", prefix, string)
    }
}

async fn get_changes() -> anyhow::Result<ChangesNeeded> {
    // Without SCHEMA_PATH the compiled-in schema is the target.
    let schema = match std::env::var("SCHEMA_PATH") {
        Ok(path) => read_schema_file_to_string(Path::new(&path))?,
        Err(_) => get_schema_string(),
    };

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = SqlitePool::connect(&database_url)
        .await
        .context("Failed to connect to SQLite database")?;

    Ok(get_schema_changes(pool, &schema).await?)
}
