//! Behavioural tests for the cache/write contract, run against in-memory
//! repositories: reads must be byte-identical with and without the cache,
//! committed writes must be visible immediately, and failed writes must
//! leave the cache untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use corvid::application::feed::FeedService;
use corvid::application::pagination::{Page, PageRequest};
use corvid::application::posts::{CreatePostCommand, PostService};
use corvid::application::profiles::ProfileService;
use corvid::application::repos::{
    CommentView, CreateCommentParams, CreatePostParams, CreateUserParams, PostView, PostsRepo,
    PostsWriteRepo, RepoError, UpdateProfileParams, UserCard, UserProfile, UsersRepo,
    UsersWriteRepo,
};
use corvid::cache::{CacheConfig, CacheInvalidator, CacheStore, keys};
use corvid::domain::entities::{CommentRecord, PostRecord, UserRecord};

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
struct InMemoryBackend {
    users: Mutex<HashMap<Uuid, UserRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    likes: Mutex<HashSet<(Uuid, Uuid)>>,
    follows: Mutex<HashSet<(Uuid, Uuid)>>,
    fail_writes: AtomicBool,
    feed_reads: AtomicUsize,
}

impl InMemoryBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn seed_user(&self, name: &str) -> UserRecord {
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            user_name: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: vec![0; 32],
            password_salt: "salt".to_string(),
            bio: None,
            link: None,
            profile_pic: None,
            cover_pic: None,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    fn seed_post(&self, author: &UserRecord, text: &str) -> PostRecord {
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: author.id,
            text: Some(text.to_string()),
            image: None,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn feed_reads(&self) -> usize {
        self.feed_reads.load(Ordering::SeqCst)
    }

    fn card(&self, id: Uuid) -> UserCard {
        let users = self.users.lock().unwrap();
        let user = users.get(&id).expect("author exists");
        UserCard {
            id: user.id,
            user_name: user.user_name.clone(),
            profile_pic: user.profile_pic.clone(),
        }
    }

    fn view(&self, post: &PostRecord) -> PostView {
        let likes = self.likes.lock().unwrap();
        let mut likers: Vec<Uuid> = likes
            .iter()
            .filter(|(post_id, _)| *post_id == post.id)
            .map(|(_, user_id)| *user_id)
            .collect();
        likers.sort();
        PostView {
            id: post.id,
            author: self.card(post.author_id),
            text: post.text.clone(),
            image: post.image.clone(),
            likes: likers,
            comments: Vec::<CommentView>::new(),
            created_at: post.created_at,
        }
    }

    fn page_of(&self, records: Vec<PostRecord>, page: PageRequest) -> Page<PostView> {
        let total = records.len() as u64;
        let items = records
            .into_iter()
            .rev() // newest first: seeded in insertion order
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|record| self.view(&record))
            .collect();
        Page::new(items, page, total)
    }

    fn write_guard(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepoError::from_persistence("storage offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PostsRepo for InMemoryBackend {
    async fn list_posts(&self, page: PageRequest) -> Result<Page<PostView>, RepoError> {
        self.feed_reads.fetch_add(1, Ordering::SeqCst);
        let records = self.posts.lock().unwrap().clone();
        Ok(self.page_of(records, page))
    }

    async fn list_following_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.feed_reads.fetch_add(1, Ordering::SeqCst);
        let followed: HashSet<Uuid> = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|(follower, _)| *follower == viewer)
            .map(|(_, followee)| *followee)
            .collect();
        let records: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| followed.contains(&post.author_id))
            .cloned()
            .collect();
        Ok(self.page_of(records, page))
    }

    async fn list_posts_by_author(
        &self,
        author: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.feed_reads.fetch_add(1, Ordering::SeqCst);
        let records: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.author_id == author)
            .cloned()
            .collect();
        Ok(self.page_of(records, page))
    }

    async fn list_liked_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.feed_reads.fetch_add(1, Ordering::SeqCst);
        let liked: HashSet<Uuid> = self
            .likes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, user)| *user == viewer)
            .map(|(post, _)| *post)
            .collect();
        let records: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| liked.contains(&post.id))
            .cloned()
            .collect();
        Ok(self.page_of(records, page))
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostView>, RepoError> {
        self.feed_reads.fetch_add(1, Ordering::SeqCst);
        let record = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.id == id)
            .cloned();
        Ok(record.map(|record| self.view(&record)))
    }

    async fn find_post_record(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.id == id)
            .cloned())
    }

    async fn is_liked_by(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.likes.lock().unwrap().contains(&(post_id, user_id)))
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryBackend {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.write_guard()?;
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            text: params.text,
            image: params.image,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_guard()?;
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|post| post.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn add_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.write_guard()?;
        Ok(CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.write_guard()?;
        self.likes.lock().unwrap().insert((post_id, user_id));
        Ok(())
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.write_guard()?;
        self.likes.lock().unwrap().remove(&(post_id, user_id));
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for InMemoryBackend {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn load_profile(&self, id: Uuid) -> Result<Option<UserProfile>, RepoError> {
        let user = match self.users.lock().unwrap().get(&id).cloned() {
            Some(user) => user,
            None => return Ok(None),
        };
        let follows = self.follows.lock().unwrap();
        let followers_count = follows.iter().filter(|(_, to)| *to == id).count() as u64;
        let following_count = follows.iter().filter(|(from, _)| *from == id).count() as u64;
        Ok(Some(UserProfile {
            user,
            followers_count,
            following_count,
        }))
    }

    async fn suggested_users(&self, viewer: Uuid, limit: u32) -> Result<Vec<UserCard>, RepoError> {
        let follows = self.follows.lock().unwrap();
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|user| user.id != viewer && !follows.contains(&(viewer, user.id)))
            .take(limit as usize)
            .map(|user| UserCard {
                id: user.id,
                user_name: user.user_name.clone(),
                profile_pic: user.profile_pic.clone(),
            })
            .collect())
    }

    async fn list_followers(&self, id: Uuid) -> Result<Vec<UserCard>, RepoError> {
        let follower_ids: Vec<Uuid> = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, to)| *to == id)
            .map(|(from, _)| *from)
            .collect();
        Ok(follower_ids.into_iter().map(|id| self.card(id)).collect())
    }

    async fn list_following(&self, id: Uuid) -> Result<Vec<UserCard>, RepoError> {
        let followee_ids: Vec<Uuid> = self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|(from, _)| *from == id)
            .map(|(_, to)| *to)
            .collect();
        Ok(followee_ids.into_iter().map(|id| self.card(id)).collect())
    }

    async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool, RepoError> {
        Ok(self.follows.lock().unwrap().contains(&(follower, followee)))
    }
}

#[async_trait]
impl UsersWriteRepo for InMemoryBackend {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        self.write_guard()?;
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            user_name: params.user_name,
            email: params.email,
            password_hash: params.password_hash,
            password_salt: params.password_salt,
            bio: None,
            link: None,
            profile_pic: None,
            cover_pic: None,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        self.write_guard()?;
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        user.user_name = params.user_name;
        user.email = params.email;
        user.bio = params.bio;
        user.link = params.link;
        user.profile_pic = params.profile_pic;
        user.cover_pic = params.cover_pic;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: Vec<u8>,
        password_salt: String,
    ) -> Result<(), RepoError> {
        self.write_guard()?;
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash;
        user.password_salt = password_salt;
        Ok(())
    }

    async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<(), RepoError> {
        self.write_guard()?;
        self.follows.lock().unwrap().insert((follower, followee));
        Ok(())
    }

    async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<(), RepoError> {
        self.write_guard()?;
        self.follows.lock().unwrap().remove(&(follower, followee));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    backend: Arc<InMemoryBackend>,
    store: Arc<CacheStore>,
    feed: FeedService,
    posts: PostService,
    profiles: ProfileService,
}

fn harness_with_config(config: CacheConfig) -> Harness {
    let backend = InMemoryBackend::new();
    let store = Arc::new(CacheStore::new(&config));
    let invalidator = CacheInvalidator::new(&config, store.clone());

    let feed = FeedService::new(
        backend.clone(),
        backend.clone(),
        store.clone(),
        config.clone(),
    );
    let posts = PostService::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        invalidator.clone(),
    );
    let profiles = ProfileService::new(
        backend.clone(),
        backend.clone(),
        store.clone(),
        config.clone(),
        invalidator,
    );

    Harness {
        backend,
        store,
        feed,
        posts,
        profiles,
    }
}

fn harness() -> Harness {
    harness_with_config(CacheConfig::default())
}

fn page() -> PageRequest {
    PageRequest::default()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn repeated_feed_reads_hit_the_cache() {
    let h = harness();
    let author = h.backend.seed_user("ada");
    h.backend.seed_post(&author, "first");

    let first = h.feed.all_posts(page()).await.expect("first read");
    let second = h.feed.all_posts(page()).await.expect("second read");

    assert_eq!(first, second);
    // Only the miss touched the backend; the hit skipped it entirely.
    assert_eq!(h.backend.feed_reads(), 1);
}

#[tokio::test]
async fn disabling_the_cache_changes_latency_not_content() {
    let enabled = harness();
    let disabled = harness_with_config(CacheConfig {
        enabled: false,
        ..Default::default()
    });

    for h in [&enabled, &disabled] {
        let author = h.backend.seed_user("ada");
        h.backend.seed_post(&author, "hello feed");
    }

    let warm = enabled.feed.all_posts(page()).await.expect("read");
    let warm_again = enabled.feed.all_posts(page()).await.expect("read");
    let cold = disabled.feed.all_posts(page()).await.expect("read");
    let cold_again = disabled.feed.all_posts(page()).await.expect("read");

    // Same response body either way; only the backend traffic differs.
    assert_eq!(warm["items"][0]["text"], cold["items"][0]["text"]);
    assert_eq!(warm["totalItems"], cold["totalItems"]);
    assert_eq!(warm, warm_again);
    assert_eq!(cold, cold_again);
    assert_eq!(enabled.backend.feed_reads(), 1);
    assert_eq!(disabled.backend.feed_reads(), 2);
}

#[tokio::test]
async fn failed_mutation_leaves_the_cache_intact() {
    let h = harness();
    let author = h.backend.seed_user("ada");
    h.backend.seed_post(&author, "before failure");

    let cached = h.feed.all_posts(page()).await.expect("warm cache");
    assert_eq!(h.backend.feed_reads(), 1);

    h.backend.fail_writes(true);
    let result = h
        .posts
        .create_post(
            author.id,
            CreatePostCommand {
                text: Some("doomed".to_string()),
                image: None,
            },
        )
        .await;
    assert!(result.is_err());

    // The write never committed, so nothing was evicted: the next read is
    // still served from cache and matches the pre-failure payload.
    let after = h.feed.all_posts(page()).await.expect("read after failure");
    assert_eq!(cached, after);
    assert_eq!(h.backend.feed_reads(), 1);
}

#[tokio::test]
async fn creating_a_post_evicts_feeds_but_not_the_author_profile() {
    let h = harness();
    let author = h.backend.seed_user("ada");
    h.backend.seed_post(&author, "existing");

    // Warm the global feed, the author feed and the author profile.
    h.feed.all_posts(page()).await.expect("warm all");
    h.feed
        .author_posts(author.id, page())
        .await
        .expect("warm author feed");
    h.profiles.profile(author.id).await.expect("warm profile");

    assert!(h.store.get(&keys::all_posts_key(page())).is_some());
    assert!(h.store.get(&keys::author_posts_key(author.id, page())).is_some());
    assert!(h.store.get(&keys::profile_key(author.id)).is_some());

    h.posts
        .create_post(
            author.id,
            CreatePostCommand {
                text: Some("fresh".to_string()),
                image: None,
            },
        )
        .await
        .expect("create");

    // Feed families are gone, the profile (unaffected by a post) is not.
    assert!(h.store.get(&keys::all_posts_key(page())).is_none());
    assert!(h.store.get(&keys::author_posts_key(author.id, page())).is_none());
    assert!(h.store.get(&keys::profile_key(author.id)).is_some());

    // And the re-read feed contains the new post.
    let fresh = h.feed.all_posts(page()).await.expect("fresh feed");
    assert_eq!(fresh["items"][0]["text"], "fresh");
}

#[tokio::test]
async fn a_like_is_visible_on_the_next_detail_read() {
    let h = harness();
    let author = h.backend.seed_user("ada");
    let fan = h.backend.seed_user("lin");
    let post = h.backend.seed_post(&author, "like me");

    // Warm the detail view with zero likes.
    let before = h
        .feed
        .post_detail(post.id)
        .await
        .expect("read")
        .expect("post exists");
    assert_eq!(before["likes"].as_array().expect("likes array").len(), 0);

    let outcome = h.posts.toggle_like(fan.id, post.id).await.expect("like");
    assert!(outcome.liked);

    // The like path evicted the detail key before returning, so the very
    // next read reflects the new like instead of the stale cached body.
    let after = h
        .feed
        .post_detail(post.id)
        .await
        .expect("read")
        .expect("post exists");
    assert_eq!(
        after["likes"],
        serde_json::json!([fan.id.to_string()])
    );

    // Toggling again removes the like.
    let outcome = h.posts.toggle_like(fan.id, post.id).await.expect("unlike");
    assert!(!outcome.liked);
    let reverted = h
        .feed
        .post_detail(post.id)
        .await
        .expect("read")
        .expect("post exists");
    assert_eq!(reverted["likes"].as_array().expect("likes array").len(), 0);
}

#[tokio::test]
async fn following_a_user_refreshes_the_following_feed() {
    let h = harness();
    let viewer = h.backend.seed_user("lin");
    let author = h.backend.seed_user("ada");
    h.backend.seed_post(&author, "from ada");

    // Warm: viewer follows nobody, feed is empty.
    let empty = h
        .feed
        .following_posts(viewer.id, page())
        .await
        .expect("read");
    assert_eq!(empty["totalItems"], 0);

    h.profiles
        .toggle_follow(viewer.id, author.id)
        .await
        .expect("follow");

    // The follow evicted the whole following-feed family, so the next read
    // sees ada's post instead of the cached empty page.
    let after = h
        .feed
        .following_posts(viewer.id, page())
        .await
        .expect("read");
    assert_eq!(after["totalItems"], 1);
    assert_eq!(after["items"][0]["text"], "from ada");
}

#[tokio::test]
async fn profile_update_refreshes_embedded_author_cards() {
    let h = harness();
    let author = h.backend.seed_user("ada");
    h.backend.seed_post(&author, "hello");

    let before = h.feed.all_posts(page()).await.expect("read");
    assert_eq!(before["items"][0]["author"]["userName"], "ada");

    h.profiles
        .update_profile(
            author.id,
            corvid::application::profiles::UpdateProfileCommand {
                user_name: Some("ada.l".to_string()),
                email: None,
                bio: None,
                link: None,
                profile_pic: None,
                cover_pic: None,
            },
        )
        .await
        .expect("update");

    let after = h.feed.all_posts(page()).await.expect("read");
    assert_eq!(after["items"][0]["author"]["userName"], "ada.l");
}
