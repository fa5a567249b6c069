//! Schema introspection

use rusqlite::Connection;

use super::DbError;

/// Render every user table as `Table <name>: <col> <type>, ...`, one per line
///
/// Tables come out in whatever order `sqlite_master` reports them; internal
/// `sqlite_*` tables are skipped.
pub fn describe_schema(conn: &Connection) -> Result<String, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns_stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
    let mut lines = Vec::with_capacity(tables.len());
    for table in tables {
        let columns: Vec<String> = columns_stmt
            .query_map([&table], |row| {
                let name: String = row.get(0)?;
                let data_type: String = row.get(1)?;
                Ok(format!("{} {}", name, data_type))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        lines.push(format!("Table {}: {}", table, columns.join(", ")));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_contains_table_and_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();

        let schema = describe_schema(&conn).unwrap();
        assert_eq!(schema, "Table users: id INTEGER, name TEXT");
    }

    #[test]
    fn test_one_line_per_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE customers (id INTEGER PRIMARY KEY, email VARCHAR(255) NOT NULL);
            CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, customer_id INTEGER, total DECIMAL(10,2));
            CREATE TABLE "order items" (order_id INTEGER, sku TEXT);
            "#,
        )
        .unwrap();

        let schema = describe_schema(&conn).unwrap();
        let lines: Vec<&str> = schema.lines().collect();

        // AUTOINCREMENT creates sqlite_sequence, which must not show up
        assert_eq!(lines.len(), 3);
        assert!(lines.contains(&"Table customers: id INTEGER, email VARCHAR(255)"));
        assert!(lines.contains(&"Table orders: id INTEGER, customer_id INTEGER, total DECIMAL(10,2)"));
        assert!(lines.contains(&"Table order items: order_id INTEGER, sku TEXT"));
        assert!(!schema.contains("sqlite_sequence"));
    }

    #[test]
    fn test_views_are_not_listed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER, name TEXT); CREATE VIEW names AS SELECT name FROM users;",
        )
        .unwrap();

        let schema = describe_schema(&conn).unwrap();
        assert_eq!(schema.lines().count(), 1);
    }

    #[test]
    fn test_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(describe_schema(&conn).unwrap(), "");
    }
}
