use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{CommentView, PostView, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;

use super::super::PostgresRepositories;
use super::super::types::{FeedCommentRow, FeedPostRow, LikeRow, PostRow};
use super::super::util::map_sqlx_error;
use super::PostScope;

const FEED_SELECT: &str = "SELECT p.id, p.text, p.image, p.created_at, \
        u.id AS author_id, u.user_name AS author_user_name, u.profile_pic AS author_profile_pic \
     FROM posts p INNER JOIN users u ON u.id = p.author_id WHERE 1=1";

fn push_scope<'q>(qb: &mut QueryBuilder<'q, Postgres>, scope: PostScope) {
    match scope {
        PostScope::All => {}
        PostScope::FollowedBy(viewer) => {
            qb.push(" AND p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ");
            qb.push_bind(viewer);
            qb.push(")");
        }
        PostScope::ByAuthor(author) => {
            qb.push(" AND p.author_id = ");
            qb.push_bind(author);
        }
        PostScope::LikedBy(viewer) => {
            qb.push(" AND p.id IN (SELECT post_id FROM post_likes WHERE user_id = ");
            qb.push_bind(viewer);
            qb.push(")");
        }
    }
}

impl PostgresRepositories {
    /// Composite feed read: one page of posts (newest first), the matching
    /// total count for page metadata, then likes and comments for exactly
    /// the page's posts.
    async fn fetch_post_page(
        &self,
        scope: PostScope,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(FEED_SELECT);
        push_scope(&mut qb, scope);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);

        let rows: Vec<FeedPostRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE 1=1");
        push_scope(&mut count_qb, scope);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let items = self.assemble_views(rows).await?;
        Ok(Page::new(items, page, total.max(0) as u64))
    }

    async fn assemble_views(&self, rows: Vec<FeedPostRow>) -> Result<Vec<PostView>, RepoError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let like_rows: Vec<LikeRow> = sqlx::query_as(
            "SELECT post_id, user_id FROM post_likes \
             WHERE post_id = ANY($1) ORDER BY created_at",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let comment_rows: Vec<FeedCommentRow> = sqlx::query_as(
            "SELECT c.id, c.post_id, c.text, c.created_at, \
                    u.id AS author_id, u.user_name AS author_user_name, \
                    u.profile_pic AS author_profile_pic \
             FROM comments c INNER JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ANY($1) ORDER BY c.created_at",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut likes: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for like in like_rows {
            likes.entry(like.post_id).or_default().push(like.user_id);
        }

        let mut comments: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
        for row in comment_rows {
            let (post_id, view) = row.into_view();
            comments.entry(post_id).or_default().push(view);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let author = row.author_card();
                PostView {
                    id: row.id,
                    author,
                    text: row.text,
                    image: row.image,
                    likes: likes.remove(&row.id).unwrap_or_default(),
                    comments: comments.remove(&row.id).unwrap_or_default(),
                    created_at: row.created_at,
                }
            })
            .collect())
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(&self, page: PageRequest) -> Result<Page<PostView>, RepoError> {
        self.fetch_post_page(PostScope::All, page).await
    }

    async fn list_following_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.fetch_post_page(PostScope::FollowedBy(viewer), page)
            .await
    }

    async fn list_posts_by_author(
        &self,
        author: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.fetch_post_page(PostScope::ByAuthor(author), page).await
    }

    async fn list_liked_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.fetch_post_page(PostScope::LikedBy(viewer), page).await
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostView>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(FEED_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);

        let row: Option<FeedPostRow> = qb
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(self.assemble_views(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_post_record(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row: Option<PostRow> = sqlx::query_as(
            "SELECT id, author_id, text, image, created_at, updated_at \
             FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }

    async fn is_liked_by(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM post_likes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
