use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::helpers::{
    attr_as_absolute_url, attr_as_relative_url, element_text, generate_uid, html_to_text,
    image_src, parse_date_safe, require_src, select_first, select_first_or_err, select_last,
    selector, to_absolute_url, to_relative_url,
};
use crate::models::{
    FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter, MangaPage,
    MangaSource, MangaTag, SortOrder, RATING_UNKNOWN,
};
use crate::parser::{ConfigKey, MangaParser};
use crate::source_utils::{browser_headers, user_agent_headers, WebClient};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Url;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;

pub const DEFAULT_DOMAIN: &str = "merlintoon.com";

const SOURCE: MangaSource = MangaSource::MerlinToon;
const PAGE_SIZE: usize = 45;
const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// The search endpoint and the genre filter reject requests without a desktop browser UA
const SPOOFED_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:144.0) Gecko/20100101 Firefox/144.0";

const LISTING_BLOCK: &str = "div.manga-block > div ~ div > div";
const LISTING_LINK: &str = "div div.uk-overflow-hidden a";
const LISTING_TITLE: &str = "div.uk-overflow-hidden a";
const CHAPTER_ROW: &str = "div.chapter-item";

/// (filter key, title shown on detail pages). The site has more genres;
/// only these are offered as filters and recognised on detail pages.
const GENRES: &[(&str, &str)] = &[
    ("Aksiyon", "aksiyon"),
    ("Fantastik", "fantastik"),
    ("Dram", "dram"),
    ("Macera", "macera"),
];

pub fn genre_tags() -> Vec<MangaTag> {
    GENRES
        .iter()
        .map(|(key, title)| MangaTag {
            key: key.to_string(),
            title: title.to_string(),
            source: SOURCE,
        })
        .collect()
}

/// MerlinToon (merlintoon.com), a Turkish WordPress webtoon site
pub struct MerlinToon {
    client: Arc<dyn WebClient>,
    domain: String,
    user_agent: Option<String>,
}

impl MerlinToon {
    pub fn new(client: Arc<dyn WebClient>, config: &SourceConfig) -> Self {
        Self {
            client,
            domain: config.domain_or(DEFAULT_DOMAIN).to_string(),
            user_agent: config.user_agent().map(str::to_string),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn default_headers(&self) -> HeaderMap {
        user_agent_headers(self.user_agent.as_deref())
    }

    fn spoofed_headers(&self) -> HeaderMap {
        browser_headers(SPOOFED_USER_AGENT, &format!("https://{}/", self.domain))
    }

    async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<String> {
        log::debug!("MerlinToon: GET {}", url);
        self.client.get_text(url, &headers).await
    }

    async fn search(&self, query: &str) -> Result<Vec<Manga>> {
        let url = format!("https://{}/wp-json/initlise/v1/search?term={}", self.domain, query);
        let body = self.fetch(&url, self.spoofed_headers()).await?;
        parse_search_results(&body)
    }

    fn genre_listing_url(&self, page: u32, tag: &MangaTag) -> String {
        let mut url = format!("https://{}/gelismis-seri-filtreleme/", self.domain);
        if page > 1 {
            url.push_str(&format!("page/{}/", page));
        }
        url.push_str(&format!("?genre[]={}&type=&status=&sort=updated", tag.key));
        url
    }

    fn catalog_url(&self, page: u32) -> String {
        let mut url = format!("https://{}/seri/", self.domain);
        if page > 1 {
            url.push_str(&format!("page/{}/", page));
        }
        url
    }
}

#[async_trait]
impl MangaParser for MerlinToon {
    fn source(&self) -> MangaSource {
        SOURCE
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn config_keys(&self) -> Vec<ConfigKey> {
        vec![ConfigKey::Domain { default: DEFAULT_DOMAIN }, ConfigKey::UserAgent]
    }

    fn available_sort_orders(&self) -> HashSet<SortOrder> {
        HashSet::from([SortOrder::Updated])
    }

    fn filter_capabilities(&self) -> FilterCapabilities {
        FilterCapabilities {
            search: true,
            ..Default::default()
        }
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            available_tags: genre_tags().into_iter().collect(),
        })
    }

    async fn list_page(
        &self,
        page: u32,
        _order: SortOrder,
        filter: &MangaListFilter,
    ) -> Result<Vec<Manga>> {
        if let Some(query) = filter.search_query() {
            // The search endpoint has no pagination
            if page > 1 {
                return Ok(Vec::new());
            }
            return self.search(query).await;
        }

        let list = match filter.tags.len() {
            0 => {
                let url = self.catalog_url(page);
                let body = self.fetch(&url, self.default_headers()).await?;
                parse_manga_list(&body, &url)?
            }
            1 => {
                let Some(tag) = filter.tags.iter().next() else {
                    return Ok(Vec::new());
                };
                let url = self.genre_listing_url(page, tag);
                let body = self.fetch(&url, self.spoofed_headers()).await?;
                parse_manga_list(&body, &url)?
            }
            n => {
                // TODO: the filter form accepts several genre[] values; check whether it ANDs or ORs them
                log::debug!("MerlinToon: {} genres selected, only one is supported", n);
                Vec::new()
            }
        };
        log::debug!("MerlinToon: page {} returned {} entries", page, list.len());
        Ok(list)
    }

    async fn details(&self, manga: &Manga) -> Result<Manga> {
        let manga_url = to_absolute_url(&manga.url, &self.domain);
        let body = self.fetch(&manga_url, self.default_headers()).await?;
        let detail = parse_detail_page(&body, &manga_url)?;

        let mut chapters = detail.chapters;
        let mut page = 1u32;
        loop {
            page += 1;
            let url = format!("{}/bolum/page/{}/", manga_url, page);
            let fetched = self
                .fetch(&url, self.default_headers())
                .await
                .and_then(|body| parse_chapter_page(&body, &url, chapters.len()));
            match chapter_page_step(fetched) {
                ControlFlow::Continue(rows) => chapters.extend(rows),
                ControlFlow::Break(rows) => {
                    chapters.extend(rows);
                    break;
                }
            }
        }
        log::debug!("MerlinToon: {} chapters for {}", chapters.len(), manga.url);

        chapters.reverse();
        Ok(Manga {
            description: detail.description,
            cover_url: detail.cover_url.or_else(|| manga.cover_url.clone()),
            tags: detail.tags,
            chapters: Some(chapters),
            ..manga.clone()
        })
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let url = to_absolute_url(&chapter.url, &self.domain);
        let body = self.fetch(&url, self.default_headers()).await?;
        parse_pages(&body, &url, &self.domain)
    }

    fn page_url(&self, page: &MangaPage) -> String {
        to_absolute_url(&page.url, &self.domain)
    }
}

/// Decide whether chapter pagination goes on after fetching one more page.
///
/// Any error, or a page without chapter rows, ends the list. `Break` carries
/// the rows read before a row that could not be parsed.
pub fn chapter_page_step(
    fetched: Result<ChapterBatch>,
) -> ControlFlow<Vec<MangaChapter>, Vec<MangaChapter>> {
    match fetched {
        Ok(ChapterBatch { rows, failure: Some(e) }) => {
            log::debug!("MerlinToon: chapter row failed ({}) after {} rows, stopping", e, rows.len());
            ControlFlow::Break(rows)
        }
        Ok(ChapterBatch { rows, failure: None }) if rows.is_empty() => {
            log::debug!("MerlinToon: empty chapter page, stopping");
            ControlFlow::Break(rows)
        }
        Ok(ChapterBatch { rows, failure: None }) => ControlFlow::Continue(rows),
        Err(e) => {
            log::debug!("MerlinToon: chapter page failed ({}), stopping", e);
            ControlFlow::Break(Vec::new())
        }
    }
}

fn listing_manga(url: String, public_url: String, title: String, cover_url: Option<String>) -> Manga {
    Manga {
        id: generate_uid(SOURCE, &url),
        url,
        public_url,
        title,
        alt_titles: HashSet::new(),
        cover_url,
        tags: HashSet::new(),
        description: None,
        state: None,
        authors: HashSet::new(),
        rating: RATING_UNKNOWN,
        content_rating: SOURCE.content_rating(),
        source: SOURCE,
        chapters: None,
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumb: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Map the JSON array returned by the search endpoint.
///
/// The `url` field is used verbatim as both the canonical and public URL.
pub fn parse_search_results(body: &str) -> Result<Vec<Manga>> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)?;
    Ok(hits
        .into_iter()
        .map(|hit| {
            let url = hit.url.unwrap_or_default();
            let cover = hit.thumb.filter(|t| !t.trim().is_empty());
            let title = html_to_text(hit.title.as_deref().unwrap_or_default());
            listing_manga(url.clone(), url, title, cover)
        })
        .collect())
}

/// Entries from a catalog or genre listing page fetched from `page_url`
pub fn parse_manga_list(html: &str, page_url: &str) -> Result<Vec<Manga>> {
    let base = Url::parse(page_url)?;
    let doc = Html::parse_document(html);
    let block_selector = selector(LISTING_BLOCK)?;

    doc.select(&block_selector)
        .map(|block| -> Result<Manga> {
            let a = select_first_or_err(block, LISTING_LINK)?;
            let href = attr_as_relative_url(a, "href", &base)?;
            let public_url = attr_as_absolute_url(a, "href", &base)?;
            // Blocks repeat the title link; the last one carries the clean title
            let title = select_last(block, LISTING_TITLE)?
                .map(element_text)
                .unwrap_or_default();
            let cover = select_first(block, "img")?.and_then(|img| image_src(img, &base));
            Ok(listing_manga(href, public_url, title, cover))
        })
        .collect()
}

#[derive(Debug)]
struct DetailPage {
    tags: HashSet<MangaTag>,
    description: Option<String>,
    cover_url: Option<String>,
    chapters: Vec<MangaChapter>,
}

fn parse_detail_page(html: &str, page_url: &str) -> Result<DetailPage> {
    let base = Url::parse(page_url)?;
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let by_title: HashMap<String, MangaTag> = genre_tags()
        .into_iter()
        .map(|tag| (tag.title.clone(), tag))
        .collect();
    let tags = root
        .select(&selector("div#genre-tags a")?)
        .filter_map(|a| by_title.get(&element_text(a)).cloned())
        .collect();

    let description = select_first(root, "div#manga-description p")?
        .map(|p| p.inner_html().trim().to_string());
    let cover_url = select_first(root, "a.story-cover img")?.and_then(|img| image_src(img, &base));

    Ok(DetailPage {
        tags,
        description,
        cover_url,
        chapters: chapter_rows(&doc, &base, 0)?.into_result()?,
    })
}

fn parse_chapter_page(html: &str, page_url: &str, offset: usize) -> Result<ChapterBatch> {
    let base = Url::parse(page_url)?;
    let doc = Html::parse_document(html);
    chapter_rows(&doc, &base, offset)
}

/// Rows read from one chapter-list page, in document order
#[derive(Debug)]
pub struct ChapterBatch {
    pub rows: Vec<MangaChapter>,
    /// Set when a row could not be read; `rows` then holds the rows before it
    pub failure: Option<SourceError>,
}

impl ChapterBatch {
    fn into_result(self) -> Result<Vec<MangaChapter>> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.rows),
        }
    }
}

/// Chapter rows numbered from `offset + 1`, stopping at the first unreadable row
fn chapter_rows(doc: &Html, base: &Url, offset: usize) -> Result<ChapterBatch> {
    let row_selector = selector(CHAPTER_ROW)?;
    let mut rows = Vec::new();
    for row in doc.select(&row_selector) {
        match chapter_row(row, base, offset + rows.len() + 1) {
            Ok(chapter) => rows.push(chapter),
            Err(e) => return Ok(ChapterBatch { rows, failure: Some(e) }),
        }
    }
    Ok(ChapterBatch { rows, failure: None })
}

fn chapter_row(row: ElementRef<'_>, base: &Url, number: usize) -> Result<MangaChapter> {
    let a = select_first_or_err(row, "a")?;
    let href = attr_as_relative_url(a, "href", base)?;
    let time = select_first_or_err(row, "time")?;
    let upload_date = time
        .value()
        .attr("datetime")
        .and_then(|value| parse_date_safe(value, DATE_FORMAT));
    Ok(MangaChapter {
        id: generate_uid(SOURCE, &href),
        title: select_first(row, "h3")?.map(element_text),
        number: number as f32,
        volume: 0,
        url: href,
        scanlator: None,
        upload_date,
        branch: None,
        source: SOURCE,
    })
}

/// Reader images, in page order, with URLs relative to `domain` where possible
pub fn parse_pages(html: &str, page_url: &str, domain: &str) -> Result<Vec<MangaPage>> {
    let base = Url::parse(page_url)?;
    let doc = Html::parse_document(html);

    let image_selector = selector("div#chapter-content img")?;
    doc.select(&image_selector)
        .map(|img| -> Result<MangaPage> {
            let url = to_relative_url(&require_src(img, &base)?, domain);
            Ok(MangaPage {
                id: generate_uid(SOURCE, &url),
                url,
                preview: None,
                source: SOURCE,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const LISTING: &str = r#"
        <html><body>
        <div class="manga-block">
          <div><h2>Son Güncellemeler</h2></div>
          <div>
            <div>
              <a href="/seri/kilic-ustasi/"><img data-src="/wp-content/uploads/kilic.webp"></a>
              <div><div class="uk-overflow-hidden"><a href="/seri/kilic-ustasi/">Kılıç</a></div></div>
              <div class="uk-overflow-hidden"><a href="/seri/kilic-ustasi/">  Kılıç   Ustası </a></div>
            </div>
            <div>
              <div><div class="uk-overflow-hidden"><a href="https://merlintoon.com/seri/gece-avcisi/">Gece Avcısı</a></div></div>
            </div>
          </div>
        </div>
        </body></html>"#;

    fn chapter(number: f32) -> MangaChapter {
        MangaChapter {
            id: number as i64,
            title: None,
            number,
            volume: 0,
            url: format!("/seri/x/bolum-{}/", number),
            scanlator: None,
            upload_date: None,
            branch: None,
            source: SOURCE,
        }
    }

    #[test]
    fn test_parse_manga_list() {
        let list = parse_manga_list(LISTING, "https://merlintoon.com/seri/").unwrap();
        assert_eq!(list.len(), 2);

        assert_eq!(list[0].url, "/seri/kilic-ustasi/");
        assert_eq!(list[0].public_url, "https://merlintoon.com/seri/kilic-ustasi/");
        assert_eq!(list[0].title, "Kılıç Ustası");
        assert_eq!(
            list[0].cover_url.as_deref(),
            Some("https://merlintoon.com/wp-content/uploads/kilic.webp")
        );
        assert_eq!(list[0].id, generate_uid(SOURCE, "/seri/kilic-ustasi/"));
        assert_eq!(list[0].rating, RATING_UNKNOWN);
        assert!(list[0].chapters.is_none());

        assert_eq!(list[1].url, "/seri/gece-avcisi/");
        assert_eq!(list[1].title, "Gece Avcısı");
        assert_eq!(list[1].cover_url, None);
    }

    #[test]
    fn test_listing_block_without_link_fails() {
        let html = r#"<div class="manga-block"><div></div><div><div><p>reklam</p></div></div></div>"#;
        let result = parse_manga_list(html, "https://merlintoon.com/seri/");
        assert!(matches!(result, Err(SourceError::MissingElement(_))));
    }

    #[test]
    fn test_parse_search_results() {
        let body = r#"[
            {"url": "https://merlintoon.com/seri/kilic-ustasi/", "thumb": "https://merlintoon.com/k.webp", "title": "K&#305;l&#305;&ccedil; <b>Ustas&#305;</b>"},
            {"url": "https://merlintoon.com/seri/gece-avcisi/", "thumb": "  ", "title": "Gece Avcısı"},
            {"url": "https://merlintoon.com/seri/bos/"}
        ]"#;
        let list = parse_search_results(body).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].title, "Kılıç Ustası");
        assert_eq!(list[0].url, "https://merlintoon.com/seri/kilic-ustasi/");
        assert_eq!(list[0].public_url, list[0].url);
        assert_eq!(list[0].cover_url.as_deref(), Some("https://merlintoon.com/k.webp"));
        assert_eq!(list[1].cover_url, None);
        assert_eq!(list[2].title, "");
        assert_eq!(list[2].id, generate_uid(SOURCE, "https://merlintoon.com/seri/bos/"));
    }

    #[test]
    fn test_search_results_must_be_array() {
        assert!(matches!(parse_search_results(r#"{"error": 1}"#), Err(SourceError::Json(_))));
    }

    #[test]
    fn test_parse_detail_page() {
        let html = r#"
            <a class="story-cover" href="/seri/x"><img src="/covers/big.webp"></a>
            <div id="genre-tags"><a>aksiyon</a><a>Romantik</a><a>macera</a></div>
            <div id="manga-description"><p>Bir <em>kılıç</em> ustası.</p></div>
            <div class="chapter-item"><a href="/seri/x/bolum-2/"><h3>Bölüm 2</h3></a><time datetime="05/01/2024 10:00:00"></time></div>
            <div class="chapter-item"><a href="/seri/x/bolum-1/"><h3>Bölüm 1</h3></a><time datetime="dün"></time></div>
        "#;
        let page = parse_detail_page(html, "https://merlintoon.com/seri/x").unwrap();

        let keys: HashSet<&str> = page.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, HashSet::from(["Aksiyon", "Macera"]));
        assert_eq!(page.description.as_deref(), Some("Bir <em>kılıç</em> ustası."));
        assert_eq!(page.cover_url.as_deref(), Some("https://merlintoon.com/covers/big.webp"));

        assert_eq!(page.chapters.len(), 2);
        assert_eq!(page.chapters[0].number, 1.0);
        assert_eq!(page.chapters[0].title.as_deref(), Some("Bölüm 2"));
        assert_eq!(page.chapters[0].url, "/seri/x/bolum-2/");
        assert_eq!(
            page.chapters[0].upload_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap())
        );
        assert_eq!(page.chapters[1].number, 2.0);
        assert_eq!(page.chapters[1].upload_date, None);
    }

    #[test]
    fn test_chapter_row_requires_time() {
        let html = r#"<div class="chapter-item"><a href="/seri/x/bolum-1/">1</a></div>"#;
        let batch = parse_chapter_page(html, "https://merlintoon.com/seri/x/bolum/page/2/", 0).unwrap();
        assert!(batch.rows.is_empty());
        assert!(matches!(batch.failure, Some(SourceError::MissingElement(_))));
    }

    #[test]
    fn test_chapter_numbers_continue_from_offset() {
        let html = r#"<div class="chapter-item"><a href="/seri/x/bolum-1/"></a><time datetime=""></time></div>"#;
        let rows = parse_chapter_page(html, "https://merlintoon.com/seri/x/bolum/page/3/", 40)
            .unwrap()
            .rows;
        assert_eq!(rows[0].number, 41.0);
        assert_eq!(rows[0].title, None);
    }

    #[test]
    fn test_chapter_page_step() {
        let full = ChapterBatch { rows: vec![chapter(1.0)], failure: None };
        assert!(matches!(chapter_page_step(Ok(full)), ControlFlow::Continue(v) if v.len() == 1));
        let empty = ChapterBatch { rows: Vec::new(), failure: None };
        assert_eq!(chapter_page_step(Ok(empty)), ControlFlow::Break(Vec::new()));
        let failed = Err(SourceError::Status { status: 404, url: "https://merlintoon.com/x".into() });
        assert_eq!(chapter_page_step(failed), ControlFlow::Break(Vec::new()));
    }

    #[test]
    fn test_rows_before_broken_row_are_kept() {
        let html = r#"
            <div class="chapter-item"><a href="/seri/x/bolum-5/"><h3>Bölüm 5</h3></a><time datetime="05/01/2024 10:00:00"></time></div>
            <div class="chapter-item"><a href="/seri/x/bolum-4/"><h3>Bölüm 4</h3></a></div>
            <div class="chapter-item"><a href="/seri/x/bolum-3/"><h3>Bölüm 3</h3></a><time datetime=""></time></div>
        "#;
        let fetched = parse_chapter_page(html, "https://merlintoon.com/seri/x/bolum/page/2/", 7);
        match chapter_page_step(fetched) {
            ControlFlow::Break(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].url, "/seri/x/bolum-5/");
                assert_eq!(rows[0].number, 8.0);
            }
            ControlFlow::Continue(_) => panic!("a broken row must end pagination"),
        }
    }

    #[test]
    fn test_broken_row_on_detail_page_fails() {
        let html = r#"
            <div class="chapter-item"><a href="/seri/x/bolum-2/"></a><time datetime=""></time></div>
            <div class="chapter-item"><h3>Bölüm 1</h3><time datetime=""></time></div>
        "#;
        let result = parse_detail_page(html, "https://merlintoon.com/seri/x");
        assert!(matches!(result, Err(SourceError::MissingElement(_))));
    }

    #[test]
    fn test_parse_pages() {
        let html = r#"
            <div id="chapter-content">
              <img src="https://merlintoon.com/wp-content/uploads/1.jpg">
              <img data-src="https://cdn.merlintoon.com/2.jpg">
            </div>
            <img src="/banner.jpg">
        "#;
        let pages = parse_pages(html, "https://merlintoon.com/seri/x/bolum-1/", "merlintoon.com").unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url, "/wp-content/uploads/1.jpg");
        assert_eq!(pages[0].id, generate_uid(SOURCE, "/wp-content/uploads/1.jpg"));
        assert_eq!(pages[1].url, "https://cdn.merlintoon.com/2.jpg");
    }

    #[test]
    fn test_page_image_without_source_fails() {
        let html = r#"<div id="chapter-content"><img alt="1"></div>"#;
        let result = parse_pages(html, "https://merlintoon.com/seri/x/bolum-1/", "merlintoon.com");
        assert!(matches!(result, Err(SourceError::MissingAttribute { .. })));
    }

    #[test]
    fn test_genre_tags_table() {
        let tags = genre_tags();
        assert_eq!(tags.len(), 4);
        assert!(tags.iter().all(|t| t.title == t.key.to_lowercase()));
    }
}
