// src/services/crawl.rs

//! Course/folder/file traversal.
//!
//! Breadth-first crawl starting from the course list: every course's
//! root folder is listed, every discovered subfolder is enqueued for its
//! own listing, pagination cursors are followed in order within one
//! folder. Sibling listings run concurrently up to the configured bound.
//!
//! A failed folder subtree is recorded against the snapshot instead of
//! aborting the crawl, so a partial result still publishes and the
//! reconcile pass can suppress spurious removals.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Entity, EntityId, FileEntry, Folder, PortalConfig, Snapshot, SnapshotBuilder};
use crate::services::auth::{Authenticator, Session};
use crate::services::fetch::PageFetcher;
use crate::services::parse::{self, PageContent, PageKind, ParsedPage};

/// Access to the portal: page fetching plus session renewal.
///
/// The seam between the crawl algorithm and the live HTTP stack; tests
/// substitute a scripted in-memory portal.
#[async_trait]
pub trait PortalAccess: Send + Sync {
    /// The session the next fetch will run under, if any.
    async fn session(&self) -> Option<Session>;

    /// Fetch one page with the current session.
    async fn fetch(&self, url: &Url) -> Result<PageContent>;

    /// Renew the session after an auth challenge.
    ///
    /// `challenged` is the session the failing fetch ran under; if the
    /// stored session is already newer, no fresh login is performed.
    async fn renew_session(&self, challenged: Option<&Session>) -> Result<()>;
}

/// Production portal access: bounded fetcher plus authenticator over the
/// same cookie-carrying client.
pub struct LivePortal {
    fetcher: PageFetcher,
    auth: Arc<Authenticator>,
}

impl LivePortal {
    pub fn new(fetcher: PageFetcher, auth: Arc<Authenticator>) -> Self {
        Self { fetcher, auth }
    }
}

#[async_trait]
impl PortalAccess for LivePortal {
    async fn session(&self) -> Option<Session> {
        self.auth.session().await
    }

    async fn fetch(&self, url: &Url) -> Result<PageContent> {
        self.fetcher.fetch(url).await
    }

    async fn renew_session(&self, challenged: Option<&Session>) -> Result<()> {
        self.auth.ensure_valid(challenged).await?;
        Ok(())
    }
}

/// One unit of traversal work: list a folder (or a course's root).
#[derive(Debug, Clone)]
enum Job {
    CourseRoot {
        course: EntityId,
    },
    Folder {
        course: EntityId,
        folder: EntityId,
        /// Modification marker from the row that discovered this folder
        changed: Option<DateTime<Utc>>,
    },
}

impl Job {
    fn url(&self, portal: &PortalConfig) -> Result<Url> {
        match self {
            Job::CourseRoot { course } => portal.studip_url(&format!(
                "/studip/dispatch.php/course/files/index?cid={course}"
            )),
            Job::Folder { course, folder, .. } => portal.studip_url(&format!(
                "/studip/dispatch.php/course/files/index/{folder}?cid={course}"
            )),
        }
    }

    fn course(&self) -> &EntityId {
        match self {
            Job::CourseRoot { course } | Job::Folder { course, .. } => course,
        }
    }

    /// Root of the subtree this job refreshes, for failure bookkeeping.
    fn subtree_root(&self) -> EntityId {
        match self {
            Job::CourseRoot { course } => course.clone(),
            Job::Folder { folder, .. } => folder.clone(),
        }
    }

    fn context(&self) -> String {
        match self {
            Job::CourseRoot { course } => format!("root folder listing of course {course}"),
            Job::Folder { course, folder, .. } => {
                format!("folder listing {folder} of course {course}")
            }
        }
    }
}

/// Result of listing one folder across all its pages.
struct FolderOutcome {
    folder: Folder,
    files: Vec<FileEntry>,
    /// Discovered subfolders as entity stubs, in listing order
    subfolders: Vec<Folder>,
}

/// Orchestrates the concurrent traversal of the portal's file hierarchy.
pub struct Crawler<P> {
    portal: Arc<P>,
    portal_config: PortalConfig,
    max_concurrent: usize,
}

impl<P: PortalAccess> Crawler<P> {
    pub fn new(portal: Arc<P>, config: &Config) -> Self {
        Self {
            portal,
            portal_config: config.portal.clone(),
            max_concurrent: config.crawler.max_concurrent.max(1),
        }
    }

    /// Crawl the whole hierarchy into a sealed snapshot.
    ///
    /// Only an unusable course list is fatal; folder subtree failures are
    /// recorded in the snapshot and leave the rest of the crawl intact.
    /// Dropping the returned future cancels the crawl without publishing
    /// anything.
    pub async fn crawl(&self) -> Result<Snapshot> {
        let course_list_url = self
            .portal_config
            .studip_url("/studip/dispatch.php/my_courses")?;
        let page = self.fetch_checked(&course_list_url).await?;
        let parsed = parse::parse_filtered(
            &page,
            PageKind::CourseList,
            self.portal_config.semester.as_deref(),
        )?;
        let ParsedPage::CourseList(courses) = parsed else {
            return Err(AppError::crawl("course list", "unexpected page variant"));
        };
        log::info!("crawling {} courses", courses.len());

        let mut builder = SnapshotBuilder::new();
        let mut queue: VecDeque<Job> = VecDeque::new();
        let mut scheduled: HashSet<EntityId> = HashSet::new();

        for course in courses {
            scheduled.insert(course.id.clone());
            queue.push_back(Job::CourseRoot {
                course: course.id.clone(),
            });
            builder.add_course(course);
        }

        let mut in_flight = FuturesUnordered::new();
        loop {
            while in_flight.len() < self.max_concurrent {
                let Some(job) = queue.pop_front() else { break };
                in_flight.push(async move {
                    let result = self.list_folder(&job).await;
                    (job, result)
                });
            }

            let Some((job, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(outcome) => {
                    if let Job::CourseRoot { course } = &job {
                        builder.set_course_root(course, outcome.folder.id.clone());
                    }
                    for file in outcome.files {
                        builder.insert(Entity::File(file));
                    }
                    for stub in outcome.subfolders {
                        // Duplicate discovery (same folder linked twice) is
                        // listed only once; the stub must not clobber a
                        // folder whose own listing already merged.
                        if scheduled.insert(stub.id.clone()) {
                            queue.push_back(Job::Folder {
                                course: job.course().clone(),
                                folder: stub.id.clone(),
                                changed: stub.changed,
                            });
                            builder.insert(Entity::Folder(stub));
                        }
                    }
                    builder.insert(Entity::Folder(outcome.folder));
                }
                Err(error) => {
                    log::warn!("subtree failed, {}: {error}", job.context());
                    builder.record_failure(job.subtree_root(), job.context(), error);
                }
            }
        }

        let snapshot = builder.seal();
        if snapshot.is_partial() {
            log::warn!(
                "crawl finished partial: {} subtree(s) failed",
                snapshot.failed_subtrees.len()
            );
        } else {
            log::info!("crawl finished with {} entities", snapshot.len());
        }
        Ok(snapshot)
    }

    /// List one folder, following pagination cursors in order.
    async fn list_folder(&self, job: &Job) -> Result<FolderOutcome> {
        let course = job.course().clone();
        let marker = match job {
            Job::Folder { changed, .. } => *changed,
            Job::CourseRoot { .. } => None,
        };

        let mut next_url = Some(job.url(&self.portal_config)?);
        let mut folder: Option<Folder> = None;
        let mut files = Vec::new();
        let mut subfolders = Vec::new();
        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut visited_pages: HashSet<String> = HashSet::new();

        while let Some(url) = next_url.take() {
            // A next link pointing at a fetched page would loop forever.
            if !visited_pages.insert(url.to_string()) {
                return Err(AppError::crawl(
                    job.context(),
                    format!("pagination cycles back to {url}"),
                ));
            }
            let page = self.fetch_checked(&url).await?;
            let ParsedPage::FolderListing(listing) = parse::parse(&page, PageKind::FolderListing)?
            else {
                return Err(AppError::crawl(job.context(), "unexpected page variant"));
            };

            let folder = folder.get_or_insert_with(|| Folder {
                id: listing.folder_id.clone(),
                course: course.clone(),
                parent: listing.parent.clone(),
                name: listing.folder_name.clone(),
                children: Vec::new(),
                changed: marker,
            });

            for entry in listing.entries {
                // Pages of one listing may overlap at the boundary.
                if !seen.insert(entry.id.clone()) {
                    continue;
                }
                folder.children.push(entry.id.clone());
                if entry.is_folder {
                    subfolders.push(Folder {
                        id: entry.id,
                        course: course.clone(),
                        parent: Some(folder.id.clone()),
                        name: entry.name,
                        children: Vec::new(),
                        changed: entry.changed,
                    });
                } else {
                    files.push(FileEntry {
                        id: entry.id,
                        course: course.clone(),
                        parent: folder.id.clone(),
                        name: entry.name,
                        author: entry.author,
                        size: entry.size,
                        changed: entry.changed,
                        download: None,
                    });
                }
            }

            next_url = listing
                .next_page
                .as_deref()
                .map(Url::parse)
                .transpose()?;
        }

        let folder =
            folder.ok_or_else(|| AppError::crawl(job.context(), "listing yielded no pages"))?;
        Ok(FolderOutcome {
            folder,
            files,
            subfolders,
        })
    }

    /// Fetch a page, transparently renewing the session on one challenge.
    ///
    /// The session is captured before the request: if another task
    /// renewed it while this fetch was in flight, the renewal below
    /// deduplicates instead of logging in again.
    async fn fetch_checked(&self, url: &Url) -> Result<PageContent> {
        let observed = self.portal.session().await;
        match self.portal.fetch(url).await {
            Err(error) if error.is_auth_challenge() => {
                log::info!("session challenged at {url}, renewing");
                self.portal.renew_session(observed.as_ref()).await?;
                self.portal.fetch(url).await
            }
            other => other,
        }
    }
}
