//! Post write paths: create, delete, comment, like.
//!
//! Each operation runs its mutation first (the repository wraps the primary
//! write and any notification fan-out in one transaction), evicts the
//! affected cache families only after the mutation committed, and replies
//! with the representation re-read from storage so the response reflects
//! exactly what is now persisted. A failed mutation evicts nothing: the
//! cache was never wrong about a write that did not happen.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CreateCommentParams, CreatePostParams, PostView, PostsRepo, PostsWriteRepo, RepoError,
    UsersRepo,
};
use crate::cache::{CacheInvalidator, Mutation};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("post not found")]
    NotFound,
    #[error("author not found")]
    AuthorNotFound,
    #[error("only the author may delete a post")]
    NotAuthor,
    #[error("validation failed: {0}")]
    Validation(String),
}

impl PostError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub text: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LikeOutcome {
    pub post: PostView,
    pub liked: bool,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    users: Arc<dyn UsersRepo>,
    invalidator: CacheInvalidator,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        users: Arc<dyn UsersRepo>,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            reader,
            writer,
            users,
            invalidator,
        }
    }

    pub async fn create_post(
        &self,
        author: Uuid,
        command: CreatePostCommand,
    ) -> Result<PostView, PostError> {
        let text = normalize(command.text);
        let image = normalize(command.image);
        if text.is_none() && image.is_none() {
            return Err(PostError::validation("post needs text or an image"));
        }
        if self.users.find_by_id(author).await?.is_none() {
            return Err(PostError::AuthorNotFound);
        }

        let record = self
            .writer
            .create_post(CreatePostParams {
                author_id: author,
                text,
                image,
            })
            .await?;

        self.invalidator.apply(Mutation::PostWritten {
            author,
            post: record.id,
        });

        self.reload(record.id).await
    }

    pub async fn delete_post(&self, actor: Uuid, post_id: Uuid) -> Result<(), PostError> {
        let record = self
            .reader
            .find_post_record(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        if record.author_id != actor {
            return Err(PostError::NotAuthor);
        }

        self.writer.delete_post(post_id).await?;

        self.invalidator.apply(Mutation::PostWritten {
            author: record.author_id,
            post: post_id,
        });

        Ok(())
    }

    pub async fn comment(
        &self,
        actor: Uuid,
        post_id: Uuid,
        text: String,
    ) -> Result<PostView, PostError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(PostError::validation("comment text is required"));
        }

        let record = self
            .reader
            .find_post_record(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        self.writer
            .add_comment(CreateCommentParams {
                post_id,
                author_id: actor,
                text,
            })
            .await?;

        self.invalidator.apply(Mutation::PostEngaged {
            author: record.author_id,
            post: post_id,
        });

        self.reload(post_id).await
    }

    /// Like when not yet liked, unlike otherwise.
    pub async fn toggle_like(&self, actor: Uuid, post_id: Uuid) -> Result<LikeOutcome, PostError> {
        let record = self
            .reader
            .find_post_record(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        let liked = if self.reader.is_liked_by(post_id, actor).await? {
            self.writer.unlike_post(post_id, actor).await?;
            false
        } else {
            self.writer.like_post(post_id, actor).await?;
            true
        };

        self.invalidator.apply(Mutation::PostEngaged {
            author: record.author_id,
            post: post_id,
        });

        let post = self.reload(post_id).await?;
        Ok(LikeOutcome { post, liked })
    }

    /// Fresh representation after a write; the post vanishing between the
    /// commit and this read is a conflict, not a missing route.
    async fn reload(&self, post_id: Uuid) -> Result<PostView, PostError> {
        self.reader
            .find_post(post_id)
            .await?
            .ok_or(PostError::NotFound)
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
