use anyhow::Result;
use libsql::{Builder, Connection};
use std::path::Path;

use crate::model::{Bookmark, BookmarkPatch, NewBookmark};

const SYSTEM_MIGRATIONS: &[(&str, &str)] = &[(
    "system/000_migrations_table.sql",
    include_str!("migrations/system/000_migrations_table.sql"),
)];

const MIGRATIONS: &[(&str, &str)] =
    &[("001_bookmarks.sql", include_str!("migrations/001_bookmarks.sql"))];

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    /// Opens (or creates) the database at `path` and brings the schema up
    /// to date. `":memory:"` works too, which is what the tests use.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Builder::new_local(path.as_ref()).build().await?;
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database { conn })
    }

    fn row_to_bookmark(row: &libsql::Row) -> Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            description: row.get::<Option<String>>(3)?.unwrap_or_default(),
            rating: row.get(4)?,
        })
    }

    pub async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let query = r#"
            SELECT id, title, url, description, rating
            FROM bookmarks
            ORDER BY id
        "#;

        let mut rows = self.conn.query(query, ()).await?;
        let mut bookmarks = vec![];

        while let Some(row) = rows.next().await? {
            bookmarks.push(Self::row_to_bookmark(&row)?);
        }

        Ok(bookmarks)
    }

    pub async fn get_bookmark(&self, id: i64) -> Result<Option<Bookmark>> {
        let query = r#"
            SELECT id, title, url, description, rating
            FROM bookmarks WHERE id = ?
        "#;

        let mut rows = self.conn.query(query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_bookmark(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn insert_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
        let query = r#"
            INSERT INTO bookmarks (title, url, description, rating)
            VALUES (?, ?, ?, ?)
            RETURNING id, title, url, description, rating
        "#;

        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![
                    bookmark.title.as_str(),
                    bookmark.url.as_str(),
                    bookmark.description.as_str(),
                    bookmark.rating
                ],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Self::row_to_bookmark(&row)?)
        } else {
            anyhow::bail!("Failed to create bookmark")
        }
    }

    /// Applies only the fields present in the patch. Returns false when no
    /// row matched `id`.
    pub async fn update_bookmark(&self, id: i64, patch: &BookmarkPatch) -> Result<bool> {
        let mut assignments: Vec<&str> = vec![];
        let mut params: Vec<libsql::Value> = vec![];

        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            params.push(title.as_str().into());
        }
        if let Some(url) = &patch.url {
            assignments.push("url = ?");
            params.push(url.as_str().into());
        }
        if let Some(description) = &patch.description {
            assignments.push("description = ?");
            params.push(description.as_str().into());
        }
        if let Some(rating) = patch.rating {
            assignments.push("rating = ?");
            params.push(rating.into());
        }

        if assignments.is_empty() {
            // Nothing to apply; report whether the row exists at all.
            return Ok(self.get_bookmark(id).await?.is_some());
        }

        let query = format!("UPDATE bookmarks SET {} WHERE id = ?", assignments.join(", "));
        params.push(id.into());

        let changed = self.conn.execute(&query, params).await?;
        Ok(changed > 0)
    }

    /// Removes the row. Returns false when no row matched `id`.
    pub async fn delete_bookmark(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM bookmarks WHERE id = ?", libsql::params![id])
            .await?;
        Ok(changed > 0)
    }
}
