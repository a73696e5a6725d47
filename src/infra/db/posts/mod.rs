mod read;
mod write;

use uuid::Uuid;

/// Which slice of the posts table a feed query covers.
#[derive(Debug, Clone, Copy)]
pub(super) enum PostScope {
    All,
    FollowedBy(Uuid),
    ByAuthor(Uuid),
    LikedBy(Uuid),
}
