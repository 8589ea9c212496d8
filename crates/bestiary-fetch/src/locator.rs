//! Choice of a representative photo on an animal's page.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::backoff::{retry, Backoff};
use crate::config::AcquireConfig;
use crate::session::Session;

static INFOBOX_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.infobox img").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Decorative words, matched as whole tokens of the lowercased file name.
static DECORATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:^|[^a-z])(?:",
        r"flag_of|icons?|disambig[a-z]*|placeholder|no[_-]?image|question_book",
        r"|commons-logo|wik[a-z]*-logo|edit-clear|ambox|padlock|lock|status_iucn",
        r"|spacer|blank|pixels?|red_pencil|symbol_(?:support|oppose)",
        r")(?:[^a-z]|$)",
    ))
    .unwrap()
});

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

#[derive(Debug, Clone)]
pub struct ImageLocator {
    min_dimension: u32,
    retries: u32,
    backoff: Backoff,
}

impl From<&AcquireConfig> for ImageLocator {
    fn from(config: &AcquireConfig) -> Self {
        Self {
            min_dimension: config.min_image_dimension,
            retries: config.retries(),
            backoff: config.backoff(),
        }
    }
}

impl ImageLocator {
    /// Fetches the page and returns the URL of its first non decorative image.
    ///
    /// `None` means no photo is available, either because the page has no suitable
    /// image or because it could not be fetched.
    pub async fn locate<S, R>(&self, session: &S, page_url: &str, rng: &mut R) -> Option<String>
    where
        S: Session,
        R: Rng + Send,
    {
        let base = match Url::parse(page_url) {
            Ok(base) => base,
            Err(e) => {
                log::warn!("Invalid page URL {page_url}: {e}");
                return None;
            }
        };

        let (page, attempts) = retry(self.retries, &self.backoff, rng, || {
            session.fetch_page(page_url)
        })
        .await;
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Couldn't fetch {page_url} after {attempts} attempt(s): {e}");
                return None;
            }
        };

        let candidate = first_candidate(&page, &base, self.min_dimension);
        match &candidate {
            Some(url) => log::debug!("Picked {url} for {page_url}"),
            None => log::info!("No photo candidate on {page_url}"),
        }
        candidate.map(String::from)
    }
}

/// Infobox images come first, then every image of the document, in document order.
pub fn first_candidate(html: &str, base: &Url, min_dimension: u32) -> Option<Url> {
    let document = Html::parse_document(html);
    let found = document
        .select(&INFOBOX_IMG)
        .chain(document.select(&IMG))
        .find_map(|img| candidate(img, base, min_dimension));
    found
}

fn candidate(img: ElementRef, base: &Url, min_dimension: u32) -> Option<Url> {
    let elem = img.value();
    let src = elem.attr("src")?.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    let undersized = ["width", "height"].iter().any(|attr| {
        elem.attr(attr)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<u32>().ok())
            .map_or(false, |v| v < min_dimension)
    });
    if undersized {
        return None;
    }

    let url = base.join(src).ok()?;
    if is_decorative(&url) {
        log::debug!("Ignoring decorative image {url}");
        return None;
    }
    Some(url)
}

/// Whether the file name looks like an icon, a logo or a maintenance glyph.
pub fn is_decorative(url: &Url) -> bool {
    let file = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_lowercase();
    DECORATIVE.is_match(&file)
}

/// File extension under which an image is saved, `jpg` unless the URL says otherwise.
pub fn image_extension(url: &str) -> &'static str {
    let file = Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments()?.next_back().map(str::to_lowercase))
        .unwrap_or_default();
    file.rsplit_once('.')
        .and_then(|(_, ext)| EXTENSIONS.iter().find(|&&known| known == ext))
        .copied()
        .unwrap_or("jpg")
}
