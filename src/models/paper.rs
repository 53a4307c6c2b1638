//! Paper record model shared by every source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Title used when a source omits one
pub const UNKNOWN_TITLE: &str = "unknown title";
/// Authors used when a source omits them
pub const UNKNOWN_AUTHORS: &str = "unknown authors";
/// Year used when a source omits it
pub const UNKNOWN_YEAR: &str = "unknown year";

/// The academic source a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Arxiv,
    SciHub,
    GoogleScholar,
    IeeeXplore,
    PubMed,
    SemanticScholar,
    Google,
}

impl SourceType {
    /// Every source, in display order
    pub const ALL: [SourceType; 7] = [
        SourceType::Arxiv,
        SourceType::SciHub,
        SourceType::GoogleScholar,
        SourceType::IeeeXplore,
        SourceType::PubMed,
        SourceType::SemanticScholar,
        SourceType::Google,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arXiv",
            SourceType::SciHub => "Sci-Hub",
            SourceType::GoogleScholar => "Google Scholar",
            SourceType::IeeeXplore => "IEEE Xplore",
            SourceType::PubMed => "PubMed",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::Google => "Google",
        }
    }

    /// Returns the source identifier used on the command line and in config
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::SciHub => "sci_hub",
            SourceType::GoogleScholar => "google_scholar",
            SourceType::IeeeXplore => "ieee_xplore",
            SourceType::PubMed => "pubmed",
            SourceType::SemanticScholar => "semantic",
            SourceType::Google => "google",
        }
    }

    /// Look a source up by id, display name or a loose spelling of either.
    ///
    /// Case, spaces, dashes and underscores are ignored, so `"Google Scholar"`,
    /// `"google-scholar"` and `"google_scholar"` all resolve to the same source.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }

        Self::ALL.into_iter().find(|source| {
            normalize(source.id()) == wanted
                || normalize(source.name()) == wanted
                || source.aliases().contains(&wanted.as_str())
        })
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            SourceType::IeeeXplore => &["ieee"],
            SourceType::SemanticScholar => &["semanticscholar", "s2"],
            SourceType::GoogleScholar => &["scholar"],
            _ => &[],
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a record represents to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A real search hit
    #[default]
    Paper,
    /// A synthetic record explaining a failure or condition (CAPTCHA, rate limit, ...)
    Notice,
    /// A link to an alternate search engine offered alongside other results
    Alternate,
}

/// Identifiers attached to a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    /// Stable key for display and de-duplication, never used for retrieval
    pub opaque_id: String,
}

/// Compute the stable hex digest used for `opaque_id`
pub fn opaque_id(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// A normalized search result from any source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,

    /// Comma-joined author names
    pub authors: String,

    pub year: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    pub source: SourceType,

    #[serde(default)]
    pub kind: RecordKind,

    /// Canonical landing page
    pub primary_url: String,

    /// Direct PDF location, when known at search time
    pub pdf_url: Option<String>,

    pub identifier: Identifier,

    /// Source-specific metadata (citations, venue, categories, mirror, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl PaperRecord {
    /// Whether this is a synthetic informational record
    pub fn is_notice(&self) -> bool {
        self.kind == RecordKind::Notice
    }

    /// Whether this is an alternate search engine link
    pub fn is_alternate(&self) -> bool {
        self.kind == RecordKind::Alternate
    }

    /// Whether this is a real search hit
    pub fn is_paper(&self) -> bool {
        self.kind == RecordKind::Paper
    }

    pub fn doi(&self) -> Option<&str> {
        self.identifier.doi.as_deref()
    }

    pub fn arxiv_id(&self) -> Option<&str> {
        self.identifier.arxiv_id.as_deref()
    }

    /// Whether the record points anywhere at all
    pub fn has_location(&self) -> bool {
        !self.primary_url.is_empty() || self.pdf_url.is_some()
    }

    /// Abstract shortened for display. The stored abstract is left intact.
    pub fn abstract_preview(&self, max_chars: usize) -> String {
        if self.abstract_text.chars().count() <= max_chars {
            return self.abstract_text.clone();
        }
        let cut: String = self
            .abstract_text
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect();
        format!("{}...", cut.trim_end())
    }
}

/// Builder for constructing PaperRecord values
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    record: PaperRecord,
    opaque_set: bool,
}

impl PaperBuilder {
    /// Start a record. An empty title becomes [`UNKNOWN_TITLE`].
    pub fn new(title: impl Into<String>, primary_url: impl Into<String>, source: SourceType) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            UNKNOWN_TITLE.to_string()
        } else {
            title
        };

        Self {
            record: PaperRecord {
                title,
                authors: String::new(),
                year: String::new(),
                abstract_text: String::new(),
                source,
                kind: RecordKind::Paper,
                primary_url: primary_url.into(),
                pdf_url: None,
                identifier: Identifier::default(),
                extra: BTreeMap::new(),
            },
            opaque_set: false,
        }
    }

    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.record.authors = authors.into();
        self
    }

    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.record.year = year.into();
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.record.abstract_text = text.into();
        self
    }

    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.record.kind = kind;
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.record.pdf_url = (!url.is_empty()).then_some(url);
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.record.identifier.doi = Some(doi.into());
        self
    }

    pub fn arxiv_id(mut self, id: impl Into<String>) -> Self {
        self.record.identifier.arxiv_id = Some(id.into());
        self
    }

    /// Set the opaque id directly
    pub fn opaque_id(mut self, id: impl Into<String>) -> Self {
        self.record.identifier.opaque_id = id.into();
        self.opaque_set = true;
        self
    }

    /// Derive the opaque id from arbitrary text
    pub fn opaque_from(self, seed: &str) -> Self {
        self.opaque_id(opaque_id(seed))
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.extra.insert(key.into(), value.into());
        self
    }

    /// Finish the record, filling sentinels for missing fields
    pub fn build(mut self) -> PaperRecord {
        if self.record.authors.trim().is_empty() {
            self.record.authors = UNKNOWN_AUTHORS.to_string();
        }
        if self.record.year.trim().is_empty() {
            self.record.year = UNKNOWN_YEAR.to_string();
        }
        if !self.opaque_set {
            let seed = format!("{}|{}", self.record.title, self.record.primary_url);
            self.record.identifier.opaque_id = opaque_id(&seed);
        }
        self.record
    }
}
