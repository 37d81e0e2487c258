//! In-memory doubles for the repositories and the object store.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::config::{AppConfig, JwtConfig, StorageConfig, UploadConfig};
use crate::db::{DbError, DbResult};
use crate::media::{MediaOrchestrator, TempUpload};
use crate::state::AppState;
use crate::storage::StorageClient;
use crate::subscriptions::repo_types::SubscriptionEntry;
use crate::subscriptions::SubscriptionRepo;
use crate::tweets::repo_types::{Tweet, TweetWithOwner};
use crate::tweets::TweetRepo;
use crate::users::repo_types::{ChannelProfile, NewUser, PublicProfile, User};
use crate::users::UserRepo;
use crate::videos::repo_types::{
    NewVideo, SortField, SortOrder, Video, VideoChanges, VideoListQuery, VideoWithOwner,
};
use crate::videos::VideoRepo;

#[derive(Debug, Clone)]
struct SubscriptionRow {
    id: Uuid,
    subscriber: Uuid,
    channel: Uuid,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    videos: Vec<Video>,
    tweets: Vec<Tweet>,
    subscriptions: Vec<SubscriptionRow>,
}

/// All four repositories over one mutex-guarded set of tables. Every write
/// stamps a strictly increasing time so ordering assertions are stable.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    epoch: OffsetDateTime,
    ticks: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            epoch: OffsetDateTime::now_utc(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl MemoryStore {
    fn now(&self) -> OffsetDateTime {
        let tick = self.ticks.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.epoch + Duration::milliseconds(tick)
    }

    pub fn subscription_rows(&self, subscriber: Uuid, channel: Uuid) -> usize {
        let t = self.tables.lock().unwrap();
        t.subscriptions
            .iter()
            .filter(|s| s.subscriber == subscriber && s.channel == channel)
            .count()
    }
}

fn profile_of(t: &Tables, id: Uuid) -> Option<PublicProfile> {
    t.users.iter().find(|u| u.id == id).map(PublicProfile::from)
}

fn with_owner(t: &Tables, video: &Video) -> Option<VideoWithOwner> {
    Some(VideoWithOwner {
        video: video.clone(),
        owner: profile_of(t, video.owner_id)?,
    })
}

fn email_taken(t: &Tables, email: &str, except: Option<Uuid>) -> bool {
    t.users
        .iter()
        .any(|u| u.email == email && Some(u.id) != except)
}

fn compare(a: &Video, b: &Video, field: SortField) -> Ordering {
    let by_field = match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => a.title.cmp(&b.title),
        SortField::Duration => a.duration.partial_cmp(&b.duration).unwrap_or(Ordering::Equal),
    };
    by_field.then(a.id.cmp(&b.id))
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> DbResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        let found = t
            .users
            .iter()
            .find(|u| u.username == username)
            .or_else(|| t.users.iter().find(|u| u.email == email));
        Ok(found.cloned())
    }

    async fn create(&self, new: NewUser) -> DbResult<User> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.username == new.username) {
            return Err(DbError::Conflict("username"));
        }
        if email_taken(&t, &new.email, None) {
            return Err(DbError::Conflict("email"));
        }
        let user = User {
            id: new.id,
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            password_hash: new.password_hash,
            avatar_url: new.avatar_url,
            avatar_public_id: new.avatar_public_id,
            cover_image_url: new.cover_image_url,
            cover_image_public_id: new.cover_image_public_id,
            watch_history: Vec::new(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> DbResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.refresh_token = token.map(str::to_string);
        }
        Ok(())
    }

    async fn rotate_refresh_token(&self, id: Uuid, expected: &str, next: &str) -> DbResult<bool> {
        let mut t = self.tables.lock().unwrap();
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) if u.refresh_token.as_deref() == Some(expected) => {
                u.refresh_token = Some(next.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> DbResult<()> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.password_hash = hash.to_string();
            u.updated_at = now;
        }
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<Option<User>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        if let Some(email) = email {
            if email_taken(&t, email, Some(id)) {
                return Err(DbError::Conflict("email"));
            }
        }
        let Some(u) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = full_name {
            u.full_name = name.to_string();
        }
        if let Some(email) = email {
            u.email = email.to_string();
        }
        u.updated_at = now;
        Ok(Some(u.clone()))
    }

    async fn set_avatar(&self, id: Uuid, url: &str, public_id: &str) -> DbResult<Option<User>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.avatar_url = url.to_string();
            u.avatar_public_id = public_id.to_string();
            u.updated_at = now;
            u.clone()
        }))
    }

    async fn set_cover_image(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> DbResult<Option<User>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.cover_image_url = Some(url.to_string());
            u.cover_image_public_id = Some(public_id.to_string());
            u.updated_at = now;
            u.clone()
        }))
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> DbResult<Option<ChannelProfile>> {
        let t = self.tables.lock().unwrap();
        let Some(u) = t.users.iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        let subscribers = t.subscriptions.iter().filter(|s| s.channel == u.id);
        Ok(Some(ChannelProfile {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            avatar: u.avatar_url.clone(),
            cover_image: u.cover_image_url.clone(),
            subscribers_count: subscribers.clone().count() as i64,
            channels_subscribed_to_count: t
                .subscriptions
                .iter()
                .filter(|s| s.subscriber == u.id)
                .count() as i64,
            is_subscribed: subscribers.clone().any(|s| s.subscriber == viewer),
        }))
    }

    async fn watch_history(&self, id: Uuid) -> DbResult<Vec<VideoWithOwner>> {
        let t = self.tables.lock().unwrap();
        let Some(u) = t.users.iter().find(|u| u.id == id) else {
            return Ok(Vec::new());
        };
        Ok(u.watch_history
            .iter()
            .filter_map(|vid| t.videos.iter().find(|v| v.id == *vid))
            .filter_map(|v| with_owner(&t, v))
            .collect())
    }

    async fn record_watch(&self, id: Uuid, video_id: Uuid) -> DbResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.watch_history.retain(|v| *v != video_id);
            u.watch_history.push(video_id);
        }
        Ok(())
    }
}

#[async_trait]
impl VideoRepo for MemoryStore {
    async fn create(&self, new: NewVideo) -> DbResult<Video> {
        let now = self.now();
        let video = Video {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            video_url: new.video_url,
            video_public_id: new.video_public_id,
            thumbnail_url: new.thumbnail_url,
            thumbnail_public_id: new.thumbnail_public_id,
            duration: new.duration,
            is_published: true,
            owner_id: new.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().videos.push(video.clone());
        Ok(video)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<VideoWithOwner>> {
        let t = self.tables.lock().unwrap();
        Ok(t.videos
            .iter()
            .find(|v| v.id == id)
            .and_then(|v| with_owner(&t, v)))
    }

    async fn update(&self, id: Uuid, changes: VideoChanges) -> DbResult<Option<Video>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        Ok(t.videos.iter_mut().find(|v| v.id == id).map(|v| {
            if let Some(title) = changes.title {
                v.title = title;
            }
            if let Some(description) = changes.description {
                v.description = description;
            }
            if let Some(url) = changes.thumbnail_url {
                v.thumbnail_url = url;
            }
            if let Some(public_id) = changes.thumbnail_public_id {
                v.thumbnail_public_id = public_id;
            }
            v.updated_at = now;
            v.clone()
        }))
    }

    async fn toggle_published(&self, id: Uuid) -> DbResult<Option<Video>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        Ok(t.videos.iter_mut().find(|v| v.id == id).map(|v| {
            v.is_published = !v.is_published;
            v.updated_at = now;
            v.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.videos.len();
        t.videos.retain(|v| v.id != id);
        Ok(t.videos.len() != before)
    }

    async fn list(&self, query: &VideoListQuery) -> DbResult<(Vec<VideoWithOwner>, i64)> {
        let t = self.tables.lock().unwrap();
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<&Video> = t
            .videos
            .iter()
            .filter(|v| query.owner.map_or(true, |o| v.owner_id == o))
            .filter(|v| {
                needle.as_deref().map_or(true, |n| {
                    v.title.to_lowercase().contains(n) || v.description.to_lowercase().contains(n)
                })
            })
            .collect();
        matched.sort_by(|a, b| {
            let ord = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matched.len() as i64;
        let docs = matched
            .into_iter()
            .skip(query.offset().map_or(usize::MAX, |o| o as usize))
            .take(query.limit as usize)
            .filter_map(|v| with_owner(&t, v))
            .collect();
        Ok((docs, total))
    }

    async fn list_by_owner(&self, owner: Uuid) -> DbResult<Vec<VideoWithOwner>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<VideoWithOwner> = t
            .videos
            .iter()
            .filter(|v| v.owner_id == owner)
            .filter_map(|v| with_owner(&t, v))
            .collect();
        rows.sort_by(|a, b| compare(&b.video, &a.video, SortField::CreatedAt));
        Ok(rows)
    }
}

#[async_trait]
impl TweetRepo for MemoryStore {
    async fn create(&self, owner: Uuid, content: &str) -> DbResult<Tweet> {
        let now = self.now();
        let tweet = Tweet {
            id: Uuid::new_v4(),
            content: content.to_string(),
            owner_id: owner,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().tweets.push(tweet.clone());
        Ok(tweet)
    }

    async fn update_content(&self, id: Uuid, content: &str) -> DbResult<Option<Tweet>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        Ok(t.tweets.iter_mut().find(|tw| tw.id == id).map(|tw| {
            tw.content = content.to_string();
            tw.updated_at = now;
            tw.clone()
        }))
    }

    async fn list_by_owner(&self, owner: Uuid) -> DbResult<Vec<TweetWithOwner>> {
        let t = self.tables.lock().unwrap();
        let Some(profile) = profile_of(&t, owner) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<TweetWithOwner> = t
            .tweets
            .iter()
            .filter(|tw| tw.owner_id == owner)
            .map(|tw| TweetWithOwner {
                tweet: tw.clone(),
                owner: profile.clone(),
            })
            .collect();
        rows.sort_by(|a, b| b.tweet.created_at.cmp(&a.tweet.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl SubscriptionRepo for MemoryStore {
    async fn insert_if_absent(&self, subscriber: Uuid, channel: Uuid) -> DbResult<Option<Uuid>> {
        let now = self.now();
        let mut t = self.tables.lock().unwrap();
        if t
            .subscriptions
            .iter()
            .any(|s| s.subscriber == subscriber && s.channel == channel)
        {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        t.subscriptions.push(SubscriptionRow {
            id,
            subscriber,
            channel,
            created_at: now,
        });
        Ok(Some(id))
    }

    async fn delete(&self, subscriber: Uuid, channel: Uuid) -> DbResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.subscriptions.len();
        t.subscriptions
            .retain(|s| !(s.subscriber == subscriber && s.channel == channel));
        Ok(t.subscriptions.len() != before)
    }

    async fn channel_subscribers(&self, channel: Uuid) -> DbResult<Vec<SubscriptionEntry>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<&SubscriptionRow> =
            t.subscriptions.iter().filter(|s| s.channel == channel).collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        Ok(rows
            .into_iter()
            .filter_map(|s| {
                Some(SubscriptionEntry {
                    profile: profile_of(&t, s.subscriber)?,
                    subscribed_at: s.created_at,
                })
            })
            .collect())
    }

    async fn subscribed_channels(&self, subscriber: Uuid) -> DbResult<Vec<SubscriptionEntry>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<&SubscriptionRow> = t
            .subscriptions
            .iter()
            .filter(|s| s.subscriber == subscriber)
            .collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        Ok(rows
            .into_iter()
            .filter_map(|s| {
                Some(SubscriptionEntry {
                    profile: profile_of(&t, s.channel)?,
                    subscribed_at: s.created_at,
                })
            })
            .collect())
    }
}

/// Object store double that keeps keys in a set and fails on request.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashSet<String>>,
    fail_all_puts: AtomicBool,
    // puts still allowed before every further one fails
    puts_left: Mutex<Option<usize>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FakeStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn seed(&self, key: &str) {
        self.objects.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_all_puts.store(fail, AtomicOrdering::SeqCst);
    }

    /// Let `n` more puts through, then fail the rest.
    pub fn fail_puts_after(&self, n: usize) {
        *self.puts_left.lock().unwrap() = Some(n);
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        if self.fail_all_puts.load(AtomicOrdering::SeqCst) {
            anyhow::bail!("put rejected");
        }
        {
            let mut left = self.puts_left.lock().unwrap();
            match left.as_mut() {
                Some(0) => anyhow::bail!("put rejected"),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.objects.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        if self.failing_deletes.lock().unwrap().contains(key) {
            anyhow::bail!("delete rejected for {}", key);
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/media/{}", key)
    }
}

pub fn test_config(tmp_dir: PathBuf) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        storage: StorageConfig {
            endpoint: "https://cdn.test".into(),
            bucket: "media".into(),
            access_key: "test".into(),
            secret_key: "test".into(),
            region: "us-east-1".into(),
            public_url: "https://cdn.test/media".into(),
        },
        upload: UploadConfig {
            tmp_dir,
            max_body_bytes: 1024 * 1024,
        },
        cookie_secure: false,
    }
}

/// Application state plus handles on its doubles.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<FakeStorage>,
    tmp: tempfile::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let storage = Arc::new(FakeStorage::default());
        let state = AppState {
            config: Arc::new(test_config(tmp.path().to_path_buf())),
            media: MediaOrchestrator::new(storage.clone()),
            users: store.clone(),
            videos: store.clone(),
            tweets: store.clone(),
            subscriptions: store.clone(),
        };
        Self {
            state,
            store,
            storage,
            tmp,
        }
    }

    pub fn tmp_dir(&self) -> &Path {
        self.tmp.path()
    }

    pub fn tmp_is_empty(&self) -> bool {
        std::fs::read_dir(self.tmp.path()).unwrap().next().is_none()
    }

    /// A user whose avatar already sits in the fake store.
    pub async fn seed_user(&self, username: &str, password: &str) -> User {
        let id = Uuid::new_v4();
        let avatar_key = format!("{}/avatar.png", id);
        self.storage.seed(&avatar_key);
        let new = NewUser {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: username.to_uppercase(),
            password_hash: hash_password(password).unwrap(),
            avatar_url: self.storage.public_url(&avatar_key),
            avatar_public_id: avatar_key,
            cover_image_url: None,
            cover_image_public_id: None,
        };
        UserRepo::create(self.store.as_ref(), new).await.unwrap()
    }

    /// A published video whose two assets already sit in the fake store.
    pub async fn seed_video(&self, owner: Uuid, title: &str, description: &str) -> Video {
        let video_key = format!("{}/{}.mp4", owner, Uuid::new_v4());
        let thumb_key = format!("{}/{}.png", owner, Uuid::new_v4());
        self.storage.seed(&video_key);
        self.storage.seed(&thumb_key);
        let new = NewVideo {
            title: title.to_string(),
            description: description.to_string(),
            video_url: self.storage.public_url(&video_key),
            video_public_id: video_key,
            thumbnail_url: self.storage.public_url(&thumb_key),
            thumbnail_public_id: thumb_key,
            duration: 12.5,
            owner_id: owner,
        };
        VideoRepo::create(self.store.as_ref(), new).await.unwrap()
    }
}

/// Write a small file into `dir` the way a multipart read would.
pub async fn spool(dir: &Path, name: &str, content_type: &str) -> TempUpload {
    let path = dir.join(format!("{}-{}", Uuid::new_v4(), name));
    let body = b"not really media";
    tokio::fs::write(&path, body).await.unwrap();
    TempUpload {
        path,
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        size: body.len() as u64,
    }
}
