// src/api.rs

//! Public surface consumed by the file-system driver.
//!
//! Listing calls are synchronous reads of the current sealed snapshot;
//! `refresh` runs a full crawl-and-reconcile cycle on the single writer
//! path; `open_file_content` resolves a file's download locator lazily on
//! first access and streams the bytes.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, Config, Course, DownloadInfo, Entity, EntityId, FileEntry, Snapshot};
use crate::pipeline::reconcile;
use crate::services::auth::{Authenticator, Session};
use crate::services::crawl::{Crawler, LivePortal, PortalAccess};
use crate::services::fetch::{PageFetcher, create_client};
use crate::services::parse::{self, PageKind, ParsedPage};
use crate::store::SnapshotStore;

/// Summary of one refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// Courses in the new snapshot
    pub courses: usize,
    /// Total entities in the new snapshot
    pub entities: usize,
    /// Change events emitted by the reconcile pass
    pub events: usize,
    /// Whether any subtree failed to refresh
    pub partial: bool,
}

/// Handle to one portal account's synchronized view.
pub struct StudIp {
    config: Config,
    auth: Arc<Authenticator>,
    fetcher: PageFetcher,
    store: SnapshotStore,
    /// Serializes refresh cycles: reconcile must diff against the
    /// snapshot its commit will replace.
    refresh_lock: Mutex<()>,
    /// Lazily resolved download locators, keyed by file id
    resolved: RwLock<HashMap<EntityId, DownloadInfo>>,
}

impl StudIp {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = create_client(&config.crawler)?;
        let auth = Arc::new(Authenticator::new(
            client.clone(),
            config.portal.clone(),
            &config.crawler,
        ));
        let fetcher = PageFetcher::new(client, &config.crawler);
        Ok(Self {
            config,
            auth,
            fetcher,
            store: SnapshotStore::new(),
            refresh_lock: Mutex::new(()),
            resolved: RwLock::new(HashMap::new()),
        })
    }

    /// Log in to the portal. Must succeed before the first refresh.
    pub async fn login(&self, user_name: &str, password: &str) -> Result<Session> {
        self.auth.login(user_name, password).await
    }

    /// The current session, if logged in.
    pub async fn session(&self) -> Option<Session> {
        self.auth.session().await
    }

    /// Crawl the portal and publish the reconciled snapshot.
    ///
    /// Emits change events to subscribers before the snapshot swap. A
    /// partial crawl still publishes; a fatally failed crawl publishes
    /// nothing and leaves the previous snapshot in place.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let portal = Arc::new(LivePortal::new(self.fetcher.clone(), self.auth.clone()));
        self.refresh_with(portal).await
    }

    /// Refresh through an explicit portal access, the testing seam.
    pub async fn refresh_with<P: PortalAccess>(&self, portal: Arc<P>) -> Result<RefreshOutcome> {
        let _writer = self.refresh_lock.lock().await;
        let crawler = Crawler::new(portal, &self.config);
        let next = crawler.crawl().await?;

        let previous = self.store.current();
        let (next, events) = reconcile(&previous, next);
        let outcome = RefreshOutcome {
            courses: next.course_ids().len(),
            entities: next.len(),
            events: events.len(),
            partial: next.is_partial(),
        };
        self.store.commit(next, events);
        Ok(outcome)
    }

    /// Seed the store with a previously persisted snapshot, without
    /// emitting events. Used to diff across process restarts.
    pub async fn restore(&self, snapshot: Snapshot) {
        let _writer = self.refresh_lock.lock().await;
        self.store.commit(snapshot, Vec::new());
    }

    /// The current sealed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// All known courses in listing order.
    pub fn list_courses(&self) -> Vec<Course> {
        self.store.current().courses().cloned().collect()
    }

    /// Children of an entity in listing order.
    ///
    /// A course's single child is its root folder; files have none.
    pub fn list_children(&self, id: &EntityId) -> Result<Vec<Entity>> {
        let snapshot = self.store.current();
        let parent = snapshot
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        Ok(parent
            .child_ids()
            .iter()
            .filter_map(|child| snapshot.get(child).cloned())
            .collect())
    }

    /// Metadata of a file, including its download locator once resolved.
    pub async fn get_file_metadata(&self, id: &EntityId) -> Result<FileEntry> {
        let snapshot = self.store.current();
        let Some(Entity::File(file)) = snapshot.get(id) else {
            return Err(AppError::NotFound(id.to_string()));
        };
        let mut file = file.clone();
        if file.download.is_none() {
            file.download = self.resolved.read().await.get(id).cloned();
        }
        Ok(file)
    }

    /// Open a file's content as a byte stream.
    ///
    /// Resolves the download locator on first access by fetching the
    /// file's detail page; the tree crawl never does this eagerly.
    pub async fn open_file_content(
        &self,
        id: &EntityId,
    ) -> Result<impl Stream<Item = Result<Bytes>> + use<>> {
        let file = self.get_file_metadata(id).await?;
        let download = self.resolve_download(&file).await?;
        let url = Url::parse(&download.url)?;

        let observed = self.auth.session().await;
        match self.fetcher.download(&url).await {
            Err(error) if error.is_auth_challenge() => {
                self.auth.ensure_valid(observed.as_ref()).await?;
                self.fetcher.download(&url).await
            }
            other => other,
        }
    }

    /// Subscribe to change events of future refreshes.
    ///
    /// The stream starts "now"; a subscriber that lags behind must
    /// re-list instead of replaying missed events.
    pub fn subscribe_changes(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.store.subscribe()
    }

    async fn resolve_download(&self, file: &FileEntry) -> Result<DownloadInfo> {
        if let Some(download) = &file.download {
            return Ok(download.clone());
        }
        if let Some(download) = self.resolved.read().await.get(&file.id) {
            return Ok(download.clone());
        }

        let url = self.config.portal.studip_url(&format!(
            "/studip/dispatch.php/file/details/{}?cid={}",
            file.id, file.course
        ))?;
        // Session captured before the request so an already-performed
        // renewal is reused instead of logging in again.
        let observed = self.auth.session().await;
        let page = match self.fetcher.fetch(&url).await {
            Err(error) if error.is_auth_challenge() => {
                self.auth.ensure_valid(observed.as_ref()).await?;
                self.fetcher.fetch(&url).await?
            }
            other => other?,
        };
        let ParsedPage::FileDetails(details) = parse::parse(&page, PageKind::FileDetails)? else {
            return Err(AppError::crawl("file details", "unexpected page variant"));
        };

        let download = DownloadInfo {
            url: details.download_url,
            size: details.size.or(file.size),
        };
        self.resolved
            .write()
            .await
            .insert(file.id.clone(), download.clone());
        Ok(download)
    }
}
