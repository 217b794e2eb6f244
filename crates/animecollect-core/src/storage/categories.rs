use rusqlite::params;
use tracing::debug;

use super::Storage;
use crate::error::CollectError;
use crate::validate;

/// Longest tag stored for a title.
const MAX_CATEGORY_LEN: usize = 100;

impl Storage {
    // ── Categories ──────────────────────────────────────────────

    /// Attach tags to a title. Blank and already-present tags are skipped.
    /// Returns how many new tags were stored.
    pub fn add_categories<S: AsRef<str>>(
        &self,
        anime_id: &str,
        categories: &[S],
    ) -> Result<usize, CollectError> {
        validate::catalog_id(anime_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO categories (anime_id, category) VALUES (?1, ?2)",
            )?;
            for category in categories {
                let category = validate::sanitize_truncated(category.as_ref(), MAX_CATEGORY_LEN);
                if category.is_empty() {
                    continue;
                }
                added += stmt.execute(params![anime_id, category])?;
            }
        }
        tx.commit()?;

        debug!(anime_id = %anime_id, added, "Stored categories");
        Ok(added)
    }

    /// Tags of a title, alphabetically.
    pub fn list_categories(&self, anime_id: &str) -> Result<Vec<String>, CollectError> {
        let mut stmt = self.conn.prepare(
            "SELECT category FROM categories WHERE anime_id = ?1 ORDER BY category COLLATE NOCASE",
        )?;
        let rows = stmt
            .query_map(params![anime_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dedupes_and_skips_blank() {
        let db = Storage::open_memory().unwrap();
        let added = db
            .add_categories("anime-1", &["Fantasy", " ", "Adventure", "Fantasy"])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(
            db.add_categories("anime-1", &["Adventure"]).unwrap(),
            0
        );
        assert_eq!(
            db.list_categories("anime-1").unwrap(),
            vec!["Adventure".to_string(), "Fantasy".to_string()]
        );
    }

    #[test]
    fn test_categories_are_scoped_per_title() {
        let db = Storage::open_memory().unwrap();
        db.add_categories("anime-1", &["Drama"]).unwrap();
        assert!(db.list_categories("anime-2").unwrap().is_empty());
    }
}
