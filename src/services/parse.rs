// src/services/parse.rs

//! Page parsing service.
//!
//! Translates rendered portal pages into structured records. Every page
//! is parsed against the closed set of expected shapes in [`PageKind`];
//! a structural mismatch is a typed [`AppError::Parse`], never an empty
//! best-effort result, so the reconcile pass cannot confuse "page broke"
//! with "folder is empty".

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Course, EntityId};
use crate::utils::url::{derived_id, extract_file_id, extract_folder_id, query_field, resolve_url};

/// Date formats used by the portal's listing tables.
const DATE_FORMATS: [&str; 2] = ["%d.%m.%Y %H:%M:%S", "%d/%m/%y %H:%M:%S"];

/// A fetched page: final URL plus body markup.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: Url,
    pub body: String,
}

impl PageContent {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }
}

/// The expected shape of a page about to be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    CourseList,
    FolderListing,
    FileDetails,
}

impl PageKind {
    fn tag(self) -> &'static str {
        match self {
            PageKind::CourseList => "course-list",
            PageKind::FolderListing => "folder-listing",
            PageKind::FileDetails => "file-details",
        }
    }
}

/// One row of a folder listing, folder or file.
#[derive(Debug, Clone)]
pub struct ChildRow {
    pub id: EntityId,
    pub name: String,
    pub is_folder: bool,
    pub size: Option<u64>,
    pub author: Option<String>,
    pub changed: Option<DateTime<Utc>>,
}

/// A parsed folder listing page.
#[derive(Debug, Clone)]
pub struct FolderListing {
    /// The listed folder's own id, from the documents table
    pub folder_id: EntityId,
    /// Folder display name, from the breadcrumb trail
    pub folder_name: String,
    /// Parent folder id; `None` when this is a course root
    pub parent: Option<EntityId>,
    /// Child rows in listing order
    pub entries: Vec<ChildRow>,
    /// Absolute URL of the next page of this listing, if paginated
    pub next_page: Option<String>,
}

/// A parsed file detail page.
#[derive(Debug, Clone)]
pub struct FileDetails {
    /// Absolute download URL
    pub download_url: String,
    /// Size in bytes if the dialog reports one
    pub size: Option<u64>,
}

/// Structured result of parsing one page.
#[derive(Debug, Clone)]
pub enum ParsedPage {
    CourseList(Vec<Course>),
    FolderListing(FolderListing),
    FileDetails(FileDetails),
}

/// Parse a page according to its expected kind.
pub fn parse(page: &PageContent, kind: PageKind) -> Result<ParsedPage> {
    parse_filtered(page, kind, None)
}

/// Parse a page, restricting course lists to one semester tag.
pub fn parse_filtered(
    page: &PageContent,
    kind: PageKind,
    semester: Option<&str>,
) -> Result<ParsedPage> {
    match kind {
        PageKind::CourseList => Ok(ParsedPage::CourseList(parse_course_list(page, semester)?)),
        PageKind::FolderListing => Ok(ParsedPage::FolderListing(parse_folder_listing(page)?)),
        PageKind::FileDetails => Ok(ParsedPage::FileDetails(parse_file_details(page)?)),
    }
}

// --- Login flow ---

/// Extract the SSO post target from the portal's login redirect page.
pub fn parse_login_form(page: &PageContent) -> Result<String> {
    let document = Html::parse_document(&page.body);
    let form_sel = selector("form[action]")?;
    document
        .select(&form_sel)
        .filter_map(|form| form.value().attr("action"))
        .map(str::to_string)
        .next()
        .ok_or_else(|| AppError::parse("login-form", page.url.as_str(), "no login form found"))
}

/// Extract the SAML relay fields from the identity provider's response page.
///
/// A `p.form-error` element marks rejected credentials and is surfaced
/// verbatim so the caller can report why the login failed.
pub fn parse_saml_form(page: &PageContent) -> Result<Vec<(String, String)>> {
    let document = Html::parse_document(&page.body);

    let error_sel = selector("p.form-error")?;
    if let Some(error) = document.select(&error_sel).next() {
        let text: String = error.text().collect();
        return Err(AppError::auth(format!(
            "identity provider rejected login: {}",
            compact(&text)
        )));
    }

    let input_sel = selector("input[name][value]")?;
    let mut fields = Vec::new();
    for input in document.select(&input_sel) {
        let name = input.value().attr("name").unwrap_or_default();
        if name == "RelayState" || name == "SAMLResponse" {
            let value = input.value().attr("value").unwrap_or_default();
            fields.push((name.to_string(), value.to_string()));
        }
    }

    if fields.iter().any(|(name, _)| name == "SAMLResponse") {
        Ok(fields)
    } else {
        Err(AppError::parse(
            "saml-form",
            page.url.as_str(),
            "response page carries no SAMLResponse field",
        ))
    }
}

// --- Course list ---

fn course_name_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(.*?)\s*\(\s*([^)]+)\s*\)\s*$").expect("static regex"))
}

fn duplicate_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)^
            (?P<type>(Plenarü|Tutorü|Ü)bung(en)?|Tutorium|Praktikum
             |(Obers|Haupts|S)eminar|Lectures?|Exercises?)
            (\s+(f[oü]r|on|zu[rm]?|i[nm]|auf))?
            \s+(?P<name>.+)",
        )
        .expect("static regex")
    })
}

fn parse_course_list(page: &PageContent, semester: Option<&str>) -> Result<Vec<Course>> {
    let document = Html::parse_document(&page.body);

    let seminars_sel = selector("div#my_seminars")?;
    let caption_sel = selector("caption")?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;
    let a_sel = selector("a")?;

    let groups: Vec<ElementRef> = document.select(&seminars_sel).collect();
    if groups.is_empty() {
        return Err(AppError::parse(
            PageKind::CourseList.tag(),
            page.url.as_str(),
            "no course groups on my-courses page",
        ));
    }

    let mut courses = Vec::new();
    let mut skipped_semesters = Vec::new();

    for group in groups {
        let semester_name = group
            .select(&caption_sel)
            .next()
            .map(|caption| compact(&caption.text().collect::<String>()))
            .unwrap_or_default();

        if let Some(wanted) = semester {
            if semester_name != wanted {
                skipped_semesters.push(semester_name);
                continue;
            }
        }

        for tr in group.select(&tr_sel) {
            if tr.value().attr("class").is_some() {
                continue;
            }

            // A bare number cell precedes the title link in the same row.
            let mut current_number: Option<String> = None;
            for td in tr.select(&td_sel) {
                let text = compact(&td.text().collect::<String>());
                if td.value().attrs.is_empty()
                    && !td.children().any(|c| c.value().is_element())
                    && !text.is_empty()
                {
                    current_number = Some(text);
                    continue;
                }

                let Some(link) = td.select(&a_sel).next() else {
                    continue;
                };
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let Some(id) = query_field(&page.url.join(href)?.to_string(), "auswahl") else {
                    continue;
                };

                let full_name = compact(&link.text().collect::<String>());
                let (name, course_type) = split_course_title(&full_name);
                courses.push(Course {
                    id: EntityId::new(id.trim()),
                    name,
                    course_type,
                    number: current_number.clone(),
                    semester: semester_name.clone(),
                    root_folder: None,
                });
                break;
            }
        }
    }

    if courses.is_empty() && !skipped_semesters.is_empty() {
        return Err(AppError::parse(
            PageKind::CourseList.tag(),
            page.url.as_str(),
            format!(
                "only found courses for {} while looking for {}",
                skipped_semesters.join(", "),
                semester.unwrap_or("?")
            ),
        ));
    }

    Ok(courses)
}

/// Split a course title of the form `Name (Type)`, unwrapping titles whose
/// name itself starts with a type word ("Übung zur X").
fn split_course_title(full_name: &str) -> (String, Option<String>) {
    let Some(caps) = course_name_type_re().captures(full_name) else {
        return (full_name.to_string(), None);
    };
    let raw_name = caps[1].to_string();
    let mut course_type = caps[2].to_string();

    let name = match duplicate_type_re().captures(&raw_name) {
        Some(dup) => {
            course_type = dup["type"].to_string();
            dup["name"].to_string()
        }
        None => raw_name,
    };
    (name, Some(course_type))
}

// --- Folder listing ---

fn parse_folder_listing(page: &PageContent) -> Result<FolderListing> {
    let kind = PageKind::FolderListing.tag();
    let url = page.url.as_str();
    let document = Html::parse_document(&page.body);

    let table_sel = selector("table.documents")?;
    let Some(table) = document.select(&table_sel).next() else {
        // Surface the portal's own message box when present; a missing
        // documents table otherwise means the page shape changed.
        let message_sel = selector("div.messagebox")?;
        let detail = document
            .select(&message_sel)
            .next()
            .map(|mb| compact(&mb.text().collect::<String>()))
            .unwrap_or_else(|| "no documents table".to_string());
        return Err(AppError::parse(kind, url, detail));
    };

    let folder_id = table
        .value()
        .attr("data-folder_id")
        .ok_or_else(|| AppError::parse(kind, url, "documents table without data-folder_id"))?;

    let crumb_sel = selector("caption div.caption-container a")?;
    let crumbs: Vec<(Option<String>, String)> = table
        .select(&crumb_sel)
        .map(|a| {
            let id = a.value().attr("href").and_then(extract_folder_id);
            let name = compact(&a.text().collect::<String>());
            (id, name)
        })
        .collect();
    if crumbs.is_empty() {
        return Err(AppError::parse(kind, url, "listing without breadcrumb trail"));
    }

    let folder_name = crumbs.last().map(|(_, name)| name.clone()).unwrap_or_default();
    let parent = if crumbs.len() > 1 {
        crumbs[crumbs.len() - 2].0.clone().map(EntityId::new)
    } else {
        None
    };

    let tbody_sel = selector("tbody.subfolders, tbody.files")?;
    let tr_sel = selector("tr")?;
    let mut entries = Vec::new();
    for tbody in table.select(&tbody_sel) {
        let is_folder = tbody
            .value()
            .attr("class")
            .is_some_and(|class| class.split_whitespace().any(|c| c == "subfolders"));

        for tr in tbody.select(&tr_sel) {
            let trid = tr.value().attr("id").unwrap_or_default();
            if !trid.starts_with("row_folder_") && !trid.starts_with("fileref_") {
                continue;
            }
            entries.push(parse_child_row(&tr, is_folder, kind, &page.url)?);
        }
    }

    let next_sel = selector("div.pagination a.next[href]")?;
    let next_page = document
        .select(&next_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page.url.join(href).ok())
        .map(|u| u.to_string());

    Ok(FolderListing {
        folder_id: EntityId::new(folder_id),
        folder_name,
        parent,
        entries,
        next_page,
    })
}

fn parse_child_row(
    tr: &ElementRef,
    is_folder: bool,
    kind: &'static str,
    page_url: &Url,
) -> Result<ChildRow> {
    let url = page_url.as_str();
    let td_sel = selector("td")?;
    let checkbox_sel = selector("input.document-checkbox")?;
    let link_sel = selector("a[href]")?;

    let tds: Vec<ElementRef> = tr.select(&td_sel).collect();
    if tds.len() < 6 {
        return Err(AppError::parse(
            kind,
            url,
            format!("listing row with {} cells, expected 6", tds.len()),
        ));
    }

    let id = match tds[0]
        .select(&checkbox_sel)
        .next()
        .and_then(|input| input.value().attr("value"))
    {
        Some(id) => id.to_string(),
        // Read-only rows render without a checkbox; fall back to the
        // title link's id, hashing the link when it carries none.
        None => {
            let href = tds[2]
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(|| {
                    AppError::parse(kind, url, "listing row without id checkbox or link")
                })?;
            let absolute = resolve_url(page_url, href);
            extract_folder_id(&absolute)
                .or_else(|| extract_file_id(&absolute))
                .unwrap_or_else(|| derived_id(&absolute))
        }
    };

    let name = compact(&tds[2].text().collect::<String>());
    if name.is_empty() {
        return Err(AppError::parse(kind, url, "listing row without a name"));
    }

    let size = tds[3]
        .value()
        .attr("data-sort-value")
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|bytes| u64::try_from(bytes).ok());

    let author = Some(compact(&tds[4].text().collect::<String>())).filter(|a| !a.is_empty());

    let changed = tds[5]
        .value()
        .attr("title")
        .map(|raw| parse_date(raw).map_err(|e| AppError::parse(kind, url, e)))
        .transpose()?;

    Ok(ChildRow {
        id: EntityId::new(id),
        name,
        is_folder,
        size,
        author,
        changed,
    })
}

// --- File details ---

fn parse_file_details(page: &PageContent) -> Result<FileDetails> {
    let kind = PageKind::FileDetails.tag();
    let document = Html::parse_document(&page.body);

    let link_sel = selector(r#"a[href*="sendfile.php"]"#)?;
    let download_url = document
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| page.url.join(href).map(|u| u.to_string()))
        .next()
        .transpose()?
        .ok_or_else(|| {
            AppError::parse(kind, page.url.as_str(), "detail page without download link")
        })?;

    let size_sel = selector("[data-sort-value]")?;
    let size = document
        .select(&size_sel)
        .filter_map(|el| el.value().attr("data-sort-value"))
        .filter_map(|raw| raw.parse::<i64>().ok())
        .find_map(|bytes| u64::try_from(bytes).ok());

    Ok(FileDetails { download_url, size })
}

// --- Shared helpers ---

/// Parse a listing timestamp, trying the portal's known formats.
fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    for format in DATE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("unrecognized date '{raw}'"))
}

/// Collapse all runs of whitespace into single spaces.
fn compact(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::selector(css, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> PageContent {
        PageContent::new(Url::parse(url).unwrap(), body)
    }

    const COURSE_LIST: &str = r#"
        <html><body>
        <div id="my_seminars">
          <table>
            <caption> WS 25/26 </caption>
            <tr class="header"><td>ignored</td></tr>
            <tr>
              <td>5200</td>
              <td><a href="/studip/seminar_main.php?auswahl=aaa111">Algorithmen und Datenstrukturen (Vorlesung)</a></td>
            </tr>
            <tr>
              <td><a href="/studip/seminar_main.php?auswahl=bbb222">Übung zur Analysis (Übung)</a></td>
            </tr>
          </table>
        </div>
        <div id="my_seminars">
          <table>
            <caption>SS 25</caption>
            <tr>
              <td><a href="/studip/seminar_main.php?auswahl=ccc333">Altes Seminar (Seminar)</a></td>
            </tr>
          </table>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_course_list() {
        let page = page("https://x.edu/studip/dispatch.php/my_courses", COURSE_LIST);
        let ParsedPage::CourseList(courses) = parse(&page, PageKind::CourseList).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(courses.len(), 3);

        assert_eq!(courses[0].id.as_str(), "aaa111");
        assert_eq!(courses[0].name, "Algorithmen und Datenstrukturen");
        assert_eq!(courses[0].course_type.as_deref(), Some("Vorlesung"));
        assert_eq!(courses[0].number.as_deref(), Some("5200"));
        assert_eq!(courses[0].semester, "WS 25/26");

        // duplicated type word is stripped from the name
        assert_eq!(courses[1].name, "Analysis");
        assert_eq!(courses[1].course_type.as_deref(), Some("Übung"));

        assert_eq!(courses[2].semester, "SS 25");
    }

    #[test]
    fn test_parse_course_list_semester_filter() {
        let page = page("https://x.edu/studip/dispatch.php/my_courses", COURSE_LIST);
        let ParsedPage::CourseList(courses) =
            parse_filtered(&page, PageKind::CourseList, Some("SS 25")).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id.as_str(), "ccc333");
    }

    #[test]
    fn test_parse_course_list_wrong_semester_is_error() {
        let page = page("https://x.edu/studip/dispatch.php/my_courses", COURSE_LIST);
        let result = parse_filtered(&page, PageKind::CourseList, Some("WS 99/00"));
        assert!(matches!(result, Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_parse_course_list_structural_mismatch() {
        let page = page("https://x.edu/studip/dispatch.php/my_courses", "<html></html>");
        let result = parse(&page, PageKind::CourseList);
        assert!(matches!(
            result,
            Err(AppError::Parse {
                kind: "course-list",
                ..
            })
        ));
    }

    fn listing_row(trid: &str, id: &str, name: &str, size: i64, date: &str) -> String {
        format!(
            r#"<tr id="{trid}">
                <td><input class="document-checkbox" type="checkbox" value="{id}"></td>
                <td><img src="icon.svg"></td>
                <td><a href="x">{name}</a></td>
                <td data-sort-value="{size}">{size}</td>
                <td>Jane Doe</td>
                <td title="{date}">vor 3 Tagen</td>
            </tr>"#
        )
    }

    fn listing_page(folder_id: &str, crumbs: &str, bodies: &str, pagination: &str) -> String {
        format!(
            r#"<html><body>
            <table class="documents" data-folder_id="{folder_id}">
              <caption><div class="caption-container">{crumbs}</div></caption>
              {bodies}
            </table>
            {pagination}
            </body></html>"#
        )
    }

    #[test]
    fn test_parse_folder_listing() {
        let crumbs = r#"
            <a href="/studip/dispatch.php/course/files/index/rootf?cid=c1">Hauptordner</a>
            <a href="/studip/dispatch.php/course/files/index/subf?cid=c1">Blätter</a>
        "#;
        let bodies = format!(
            r#"<tbody class="subfolders">{}</tbody>
               <tbody class="files">{}{}</tbody>"#,
            listing_row("row_folder_x", "subsub", "Lösungen", -1, "01.02.2026 10:00:00"),
            listing_row("fileref_1", "fa", "blatt01.pdf", 52341, "01.02.2026 11:30:00"),
            listing_row("fileref_2", "fb", "blatt02.pdf", 61002, "02/02/26 09:15:00"),
        );
        let pagination = r#"<div class="pagination">
            <a class="next" href="/studip/dispatch.php/course/files/index/subf?cid=c1&page=2">»</a>
        </div>"#;
        let html = listing_page("subf", crumbs, &bodies, pagination);
        let page = page(
            "https://x.edu/studip/dispatch.php/course/files/index/subf?cid=c1",
            &html,
        );

        let ParsedPage::FolderListing(listing) = parse(&page, PageKind::FolderListing).unwrap()
        else {
            panic!("wrong variant");
        };

        assert_eq!(listing.folder_id.as_str(), "subf");
        assert_eq!(listing.folder_name, "Blätter");
        assert_eq!(listing.parent.as_ref().unwrap().as_str(), "rootf");
        assert_eq!(listing.entries.len(), 3);

        let sub = &listing.entries[0];
        assert!(sub.is_folder);
        assert_eq!(sub.id.as_str(), "subsub");
        assert_eq!(sub.size, None, "negative sort value means unknown size");

        let file = &listing.entries[1];
        assert!(!file.is_folder);
        assert_eq!(file.size, Some(52341));
        assert_eq!(file.author.as_deref(), Some("Jane Doe"));
        assert!(file.changed.is_some());

        // both portal date formats are accepted
        assert!(listing.entries[2].changed.is_some());

        assert_eq!(
            listing.next_page.as_deref(),
            Some("https://x.edu/studip/dispatch.php/course/files/index/subf?cid=c1&page=2")
        );
    }

    #[test]
    fn test_parse_root_folder_has_no_parent() {
        let crumbs =
            r#"<a href="/studip/dispatch.php/course/files/index/rootf?cid=c1">Hauptordner</a>"#;
        let html = listing_page("rootf", crumbs, r#"<tbody class="files"></tbody>"#, "");
        let page = page(
            "https://x.edu/studip/dispatch.php/course/files/index?cid=c1",
            &html,
        );

        let ParsedPage::FolderListing(listing) = parse(&page, PageKind::FolderListing).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(listing.folder_id.as_str(), "rootf");
        assert!(listing.parent.is_none());
        assert!(listing.entries.is_empty());
        assert!(listing.next_page.is_none());
    }

    #[test]
    fn test_row_without_checkbox_takes_id_from_link() {
        let crumbs =
            r#"<a href="/studip/dispatch.php/course/files/index/rootf?cid=c1">Hauptordner</a>"#;
        let bodies = r#"<tbody class="subfolders">
            <tr id="row_folder_ro">
                <td></td>
                <td><img src="icon.svg"></td>
                <td><a href="/studip/dispatch.php/course/files/index/0a1b2c?cid=c1">Geschützt</a></td>
                <td data-sort-value="-1"></td>
                <td></td>
                <td title="01.02.2026 10:00:00">recent</td>
            </tr>
        </tbody>
        <tbody class="files">
            <tr id="fileref_x">
                <td></td>
                <td><img src="icon.svg"></td>
                <td><a href="/studip/sendfile.php?file_id=weird">readme.txt</a></td>
                <td data-sort-value="12"></td>
                <td></td>
                <td title="01.02.2026 10:00:00">recent</td>
            </tr>
        </tbody>"#;
        let html = listing_page("rootf", crumbs, bodies, "");
        let page = page(
            "https://x.edu/studip/dispatch.php/course/files/index?cid=c1",
            &html,
        );

        let ParsedPage::FolderListing(listing) = parse(&page, PageKind::FolderListing).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(listing.entries[0].id.as_str(), "0a1b2c");
        // a link without a recognizable id hashes to a stable identifier
        assert_eq!(listing.entries[1].id.as_str().len(), 32);
    }

    #[test]
    fn test_missing_documents_table_is_parse_error() {
        let html = r#"<html><body>
            <div class="messagebox">Sie haben keinen Zugriff auf diesen Bereich.</div>
        </body></html>"#;
        let page = page(
            "https://x.edu/studip/dispatch.php/course/files/index?cid=c1",
            html,
        );
        let err = parse(&page, PageKind::FolderListing).unwrap_err();
        match err {
            AppError::Parse { kind, url, message } => {
                assert_eq!(kind, "folder-listing");
                assert!(url.contains("cid=c1"));
                assert!(message.contains("keinen Zugriff"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_file_details() {
        let html = r#"<html><body><div class="dialog">
            <span data-sort-value="52341">51,1 kB</span>
            <a href="/studip/sendfile.php?force_download=1&type=0&file_id=fa&file_name=blatt01.pdf">Download</a>
        </div></body></html>"#;
        let page = page(
            "https://x.edu/studip/dispatch.php/file/details/fa?cid=c1",
            html,
        );

        let ParsedPage::FileDetails(details) = parse(&page, PageKind::FileDetails).unwrap() else {
            panic!("wrong variant");
        };
        assert!(details.download_url.contains("sendfile.php"));
        assert!(details.download_url.starts_with("https://x.edu/"));
        assert_eq!(details.size, Some(52341));
    }

    #[test]
    fn test_file_details_without_link_is_parse_error() {
        let page = page(
            "https://x.edu/studip/dispatch.php/file/details/fa?cid=c1",
            "<html><body>nothing here</body></html>",
        );
        assert!(matches!(
            parse(&page, PageKind::FileDetails),
            Err(AppError::Parse {
                kind: "file-details",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_login_form() {
        let page = page(
            "https://x.edu/studip/index.php?again=yes&sso=shib",
            r#"<form method="post" action="/idp/profile/SAML2/Redirect/SSO?execution=e1s1"></form>"#,
        );
        assert_eq!(
            parse_login_form(&page).unwrap(),
            "/idp/profile/SAML2/Redirect/SSO?execution=e1s1"
        );
    }

    #[test]
    fn test_parse_saml_form() {
        let page = page(
            "https://sso.x.edu/idp/profile/SAML2/Redirect/SSO",
            r#"<form>
                <input type="hidden" name="RelayState" value="rs"/>
                <input type="hidden" name="SAMLResponse" value="b64"/>
                <input type="hidden" name="ignored" value="x"/>
            </form>"#,
        );
        let fields = parse_saml_form(&page).unwrap();
        assert_eq!(
            fields,
            vec![
                ("RelayState".to_string(), "rs".to_string()),
                ("SAMLResponse".to_string(), "b64".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_saml_form_error_is_auth_error() {
        let page = page(
            "https://sso.x.edu/idp/profile/SAML2/Redirect/SSO",
            r#"<p class="form-error">  Incorrect user name or password.  </p>"#,
        );
        match parse_saml_form(&page).unwrap_err() {
            AppError::Auth(message) => assert!(message.contains("Incorrect user name")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("31.12.2025 23:59:59").is_ok());
        assert!(parse_date("31/12/25 23:59:59").is_ok());
        assert!(parse_date("2025-12-31").is_err());
    }
}
