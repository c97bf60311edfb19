//! Parsing of bucket listing pages.
//!
//! The data archive is an S3 bucket browsed with delimiter listings
//! (`?prefix=...&delimiter=/`). Each page is a `ListBucketResult` XML
//! document: `<CommonPrefixes><Prefix>` entries are sub-directories,
//! `<Contents><Key>` entries are files. Only those few elements matter here,
//! so they are picked out with regexes rather than a full XML parser.

use rangescope_catalog::DateRange;
use regex::Regex;

/// How precise the dates embedded in archive file names are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGranularity {
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM`
    Month,
}

impl DateGranularity {
    /// Daily archives carry full dates; every other frequency is monthly.
    pub fn for_frequency(frequency: &str) -> Self {
        if frequency == "daily" {
            DateGranularity::Day
        } else {
            DateGranularity::Month
        }
    }
}

/// One listing, possibly assembled from several pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub prefixes: Vec<String>,
    pub keys: Vec<String>,
    /// Where the next page starts when the listing was truncated.
    pub next_marker: Option<String>,
}

pub struct ListingParser {
    bucket_url: Regex,
    prefix: Regex,
    key: Regex,
    truncated: Regex,
    next_marker: Regex,
    day: Regex,
    month: Regex,
}

impl ListingParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bucket_url: Regex::new(r"BUCKET_URL\s*=\s*'([^']+)'")?,
            prefix: Regex::new(r"<Prefix>(.*?)</Prefix>")?,
            key: Regex::new(r"<Key>(.*?)</Key>")?,
            truncated: Regex::new(r"<IsTruncated>\s*true\s*</IsTruncated>")?,
            next_marker: Regex::new(r"<NextMarker>(.*?)</NextMarker>")?,
            day: Regex::new(r"\d{4}-\d{2}-\d{2}")?,
            month: Regex::new(r"\d{4}-\d{2}")?,
        })
    }

    /// The bucket endpoint announced by the archive's index page.
    pub fn bucket_url(&self, html: &str) -> Option<String> {
        self.bucket_url
            .captures(html)
            .map(|caps| caps[1].trim().to_string())
    }

    pub fn parse_page(&self, xml: &str) -> ListingPage {
        let prefixes = captures(&self.prefix, xml);
        let keys = captures(&self.key, xml);
        let next_marker = if self.truncated.is_match(xml) {
            self.next_marker
                .captures(xml)
                .map(|caps| caps[1].to_string())
                .or_else(|| last_entry(&prefixes, &keys))
        } else {
            None
        };
        ListingPage {
            prefixes,
            keys,
            next_marker,
        }
    }

    /// Earliest and latest date found in `keys`. `None` when no key carries
    /// a date at the given granularity.
    pub fn date_range<'a, I>(&self, keys: I, granularity: DateGranularity) -> Option<DateRange>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pattern = match granularity {
            DateGranularity::Day => &self.day,
            DateGranularity::Month => &self.month,
        };
        let mut dates = keys
            .into_iter()
            .filter_map(|key| pattern.find(key))
            .map(|found| found.as_str());
        let first = dates.next()?;
        let (from, to) = dates.fold((first, first), |(lo, hi), date| (lo.min(date), hi.max(date)));
        Some(DateRange::new(from, to))
    }
}

/// Names of the direct sub-directories of `parent`, in listing order.
///
/// The listing echoes its own prefix as a `<Prefix>` element; that and
/// anything not directly below `parent` is ignored.
pub fn child_names(prefixes: &[String], parent: &str) -> Vec<String> {
    prefixes
        .iter()
        .filter_map(|prefix| prefix.strip_prefix(parent)?.strip_suffix('/'))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .map(str::to_string)
        .collect()
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// S3 only sends `NextMarker` for delimiter listings; fall back to the
/// lexically last entry of the page otherwise.
fn last_entry(prefixes: &[String], keys: &[String]) -> Option<String> {
    let prefix = prefixes.iter().skip(1).max();
    let key = keys.iter().max();
    prefix.max(key).cloned()
}
