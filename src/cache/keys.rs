//! Cache key derivation.
//!
//! Every cached read derives its key here, and every invalidating write
//! derives its prefixes here, so the two can never drift apart. A key always
//! starts with the prefix of the resource class it belongs to: evicting a
//! class is a prefix match, no lookup of concrete keys required.

use uuid::Uuid;

use crate::application::pagination::PageRequest;

/// Prefix shared by every page of the global feed.
pub const ALL_POSTS_PREFIX: &str = "posts_all";
/// Prefix shared by every viewer's following feed.
pub const FOLLOWING_PREFIX: &str = "posts_following";
/// Prefix shared by every user's suggested-users list.
pub const SUGGESTED_PREFIX: &str = "suggested_users";
/// Prefix shared by every single-post view.
pub const POST_DETAIL_PREFIX: &str = "post_detail";

pub fn all_posts_key(page: PageRequest) -> String {
    format!("{ALL_POSTS_PREFIX}_p{}_l{}", page.page(), page.limit())
}

pub fn following_posts_key(viewer: Uuid, page: PageRequest) -> String {
    format!(
        "{FOLLOWING_PREFIX}_{viewer}_p{}_l{}",
        page.page(),
        page.limit()
    )
}

pub fn author_posts_key(author: Uuid, page: PageRequest) -> String {
    format!(
        "{}_p{}_l{}",
        author_posts_prefix(author),
        page.page(),
        page.limit()
    )
}

pub fn author_posts_prefix(author: Uuid) -> String {
    format!("posts_user_{author}")
}

pub fn profile_key(subject: Uuid) -> String {
    format!("user_profile_{subject}")
}

pub fn suggested_users_key(viewer: Uuid) -> String {
    format!("{SUGGESTED_PREFIX}_{viewer}")
}

pub fn post_detail_key(post: Uuid) -> String {
    format!("{POST_DETAIL_PREFIX}_{post}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u32, limit: u32) -> PageRequest {
        PageRequest::new(Some(page), Some(limit))
    }

    #[test]
    fn identical_requests_derive_identical_keys() {
        let viewer = Uuid::new_v4();
        assert_eq!(
            following_posts_key(viewer, page(2, 10)),
            following_posts_key(viewer, page(2, 10)),
        );
        assert_ne!(
            following_posts_key(viewer, page(2, 10)),
            following_posts_key(viewer, page(3, 10)),
        );
    }

    #[test]
    fn keys_start_with_their_class_prefix() {
        let id = Uuid::new_v4();
        assert!(all_posts_key(page(1, 10)).starts_with(ALL_POSTS_PREFIX));
        assert!(following_posts_key(id, page(1, 10)).starts_with(FOLLOWING_PREFIX));
        assert!(author_posts_key(id, page(1, 10)).starts_with(&author_posts_prefix(id)));
        assert!(suggested_users_key(id).starts_with(SUGGESTED_PREFIX));
        assert!(post_detail_key(id).starts_with(POST_DETAIL_PREFIX));
    }

    #[test]
    fn author_scoped_prefixes_do_not_overlap() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // Uuid display form has a fixed width, so one author's prefix can
        // never be a prefix of another author's keys.
        assert!(!author_posts_key(b, page(1, 10)).starts_with(&author_posts_prefix(a)));
        assert!(!profile_key(b).starts_with(&profile_key(a)));
    }

    #[test]
    fn pagination_coordinates_are_encoded() {
        assert!(all_posts_key(page(3, 25)).ends_with("_p3_l25"));
    }
}
