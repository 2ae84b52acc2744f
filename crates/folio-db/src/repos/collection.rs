//! Collection repository.

use folio_core::entities::Collection;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, parse_datetime};

const SELECT_COLS: &str = "id, name, created_at";

fn row_to_collection(row: &libsql::Row) -> Result<Collection, DatabaseError> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_datetime(&row.get::<String>(2)?)?,
    })
}

pub struct CollectionRepo<'a> {
    conn: &'a libsql::Connection,
}

impl<'a> CollectionRepo<'a> {
    pub(crate) const fn new(conn: &'a libsql::Connection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, collection: &Collection) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!("INSERT INTO collections ({SELECT_COLS}) VALUES (?1, ?2, ?3)"),
                libsql::params![
                    collection.id.as_str(),
                    collection.name.as_str(),
                    format_datetime(&collection.created_at)
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find(&self, id: &str) -> Result<Option<Collection>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM collections WHERE id = ?1"),
                [id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_collection(&row)).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Collection>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM collections ORDER BY created_at, rowid"),
                (),
            )
            .await?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next().await? {
            collections.push(row_to_collection(&row)?);
        }
        Ok(collections)
    }

    /// Delete a collection and, through cascading keys, everything it owns.
    ///
    /// Returns `false` if no such collection existed.
    pub async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute("DELETE FROM collections WHERE id = ?1", [id])
            .await?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::helpers::{seed_collection, test_db};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn insert_find_list_delete() {
        let db = test_db().await;
        let repos = db.repos();
        let people = seed_collection(&repos, "people").await.unwrap();
        let places = seed_collection(&repos, "places").await.unwrap();

        let found = repos.collections().find(&people.id).await.unwrap();
        assert_eq!(found, Some(people.clone()));

        let names: Vec<_> = repos
            .collections()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["people", "places"]);

        assert!(repos.collections().delete(&places.id).await.unwrap());
        assert!(!repos.collections().delete(&places.id).await.unwrap());
        assert!(repos.collections().find(&places.id).await.unwrap().is_none());
    }
}
