use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::repo_types::{NewVideo, Video, VideoChanges, VideoListQuery, VideoWithOwner, VIDEO_COLUMNS};
use crate::db::DbResult;
use crate::users::repo_types::profile_columns;

#[async_trait]
pub trait VideoRepo: Send + Sync {
    async fn create(&self, new: NewVideo) -> DbResult<Video>;

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<VideoWithOwner>>;

    async fn update(&self, id: Uuid, changes: VideoChanges) -> DbResult<Option<Video>>;

    /// Flip `is_published` in one statement.
    async fn toggle_published(&self, id: Uuid) -> DbResult<Option<Video>>;

    async fn delete(&self, id: Uuid) -> DbResult<bool>;

    /// One page of matching videos plus the total number of matches.
    async fn list(&self, query: &VideoListQuery) -> DbResult<(Vec<VideoWithOwner>, i64)>;

    /// Every video of `owner`, newest first.
    async fn list_by_owner(&self, owner: Uuid) -> DbResult<Vec<VideoWithOwner>>;
}

#[derive(Clone)]
pub struct PgVideoRepo {
    db: PgPool,
}

impl PgVideoRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &'a VideoListQuery) {
    qb.push(" WHERE TRUE");
    if let Some(pattern) = query.like_pattern() {
        qb.push(" AND (v.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR v.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(owner) = query.owner {
        qb.push(" AND v.owner_id = ").push_bind(owner);
    }
}

#[async_trait]
impl VideoRepo for PgVideoRepo {
    async fn create(&self, new: NewVideo) -> DbResult<Video> {
        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            INSERT INTO videos AS v (title, description, video_url, video_public_id,
                                     thumbnail_url, thumbnail_public_id, duration, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.video_url)
        .bind(&new.video_public_id)
        .bind(&new.thumbnail_url)
        .bind(&new.thumbnail_public_id)
        .bind(new.duration)
        .bind(new.owner_id)
        .fetch_one(&self.db)
        .await?;
        Ok(video)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<VideoWithOwner>> {
        let row = sqlx::query_as::<_, VideoWithOwner>(&format!(
            r#"
            SELECT {}, {}
            FROM videos v
            JOIN users o ON o.id = v.owner_id
            WHERE v.id = $1
            "#,
            VIDEO_COLUMNS,
            profile_columns("o")
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: VideoChanges) -> DbResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            UPDATE videos AS v
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   thumbnail_url = COALESCE($4, thumbnail_url),
                   thumbnail_public_id = COALESCE($5, thumbnail_public_id),
                   updated_at = now()
             WHERE v.id = $1
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.thumbnail_url)
        .bind(changes.thumbnail_public_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(video)
    }

    async fn toggle_published(&self, id: Uuid) -> DbResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            UPDATE videos AS v
               SET is_published = NOT is_published, updated_at = now()
             WHERE v.id = $1
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(video)
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }

    async fn list(&self, query: &VideoListQuery) -> DbResult<(Vec<VideoWithOwner>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM videos v");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let offset = query
            .offset()
            .ok_or_else(|| anyhow::anyhow!("page {} out of range", query.page))?;
        let mut page = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, {} FROM videos v JOIN users o ON o.id = v.owner_id",
            VIDEO_COLUMNS,
            profile_columns("o")
        ));
        push_filters(&mut page, query);
        page.push(" ORDER BY ")
            .push(query.order_by())
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let docs = page
            .build_query_as::<VideoWithOwner>()
            .fetch_all(&self.db)
            .await?;

        Ok((docs, total))
    }

    async fn list_by_owner(&self, owner: Uuid) -> DbResult<Vec<VideoWithOwner>> {
        let rows = sqlx::query_as::<_, VideoWithOwner>(&format!(
            r#"
            SELECT {}, {}
            FROM videos v
            JOIN users o ON o.id = v.owner_id
            WHERE v.owner_id = $1
            ORDER BY v.created_at DESC, v.id DESC
            "#,
            VIDEO_COLUMNS,
            profile_columns("o")
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
