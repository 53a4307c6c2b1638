//! Mirror resolution: identifiers to ordered candidate URLs.

use url::Url;

use crate::config::MirrorConfig;
use crate::models::{DocumentId, DownloadRequest, PaperRecord};

/// Canonical arXiv PDF location
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";
const ARXIV_ABS_URL: &str = "https://arxiv.org/abs";

/// Maps DOIs and arXiv ids to the URLs the download engine should try.
///
/// Output depends only on the identifier and the configured mirror list, so
/// the same input always yields the same candidates in the same order.
#[derive(Debug, Clone)]
pub struct MirrorResolver {
    mirrors: Vec<String>,
}

impl MirrorResolver {
    pub fn new(mirrors: Vec<String>) -> Self {
        Self {
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim().trim_end_matches('/').to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.download.clone())
    }

    /// Candidate URLs for an identifier.
    ///
    /// A DOI yields `{mirror}/{doi}` then `{mirror}/doi/{doi}` for each mirror
    /// in order; an arXiv id yields exactly the canonical PDF URL.
    pub fn resolve(&self, id: &DocumentId) -> Vec<String> {
        match id {
            DocumentId::Doi(doi) => self
                .mirrors
                .iter()
                .flat_map(|m| [format!("{}/{}", m, doi), format!("{}/doi/{}", m, doi)])
                .collect(),
            DocumentId::Arxiv(arxiv_id) => vec![format!("{}/{}.pdf", ARXIV_PDF_URL, arxiv_id)],
        }
    }

    /// Whether `url` is served by a configured mirror or one of its subdomains
    pub fn is_mirror_url(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return false;
        };
        self.mirror_hosts()
            .any(|mirror| host == mirror || host.ends_with(&format!(".{}", mirror)))
    }

    /// Links the user can open by hand when every candidate failed
    pub fn fallback_links(&self, id: &DocumentId) -> Vec<String> {
        match id {
            DocumentId::Doi(doi) => vec![
                format!("https://doi.org/{}", doi),
                format!("https://search.crossref.org/?q={}", urlencoding::encode(doi)),
            ],
            DocumentId::Arxiv(arxiv_id) => vec![format!("{}/{}", ARXIV_ABS_URL, arxiv_id)],
        }
    }

    /// Build a download request for a search result.
    ///
    /// A known `pdf_url` is tried first. arXiv records go straight to arXiv;
    /// other records with a DOI continue through the mirrors. The landing page
    /// is tried last since wrapper pages often link to the file.
    pub fn request_for_record(&self, record: &PaperRecord) -> DownloadRequest {
        let mut candidates = Vec::new();
        if let Some(pdf) = &record.pdf_url {
            push_unique(&mut candidates, pdf.clone());
        }

        let identifier = if let Some(arxiv_id) = record.arxiv_id() {
            let id = DocumentId::Arxiv(arxiv_id.to_string());
            if candidates.is_empty() {
                candidates.extend(self.resolve(&id));
            }
            Some(id)
        } else if let Some(doi) = record.doi() {
            let id = DocumentId::Doi(doi.to_string());
            for url in self.resolve(&id) {
                push_unique(&mut candidates, url);
            }
            Some(id)
        } else {
            None
        };

        if !record.primary_url.is_empty() {
            push_unique(&mut candidates, record.primary_url.clone());
        }

        let request = DownloadRequest::new(candidates, record.title.clone());
        match identifier {
            Some(id) => request.with_identifier(id),
            None => request,
        }
    }

    /// Build a download request from a bare identifier
    pub fn request_for(&self, id: &DocumentId, title: &str) -> DownloadRequest {
        DownloadRequest::new(self.resolve(id), title).with_identifier(id.clone())
    }

    fn mirror_hosts(&self) -> impl Iterator<Item = String> + '_ {
        self.mirrors.iter().filter_map(|m| {
            Url::parse(m)
                .ok()
                .and_then(|u| u.host_str().map(str::to_lowercase))
        })
    }
}

impl Default for MirrorResolver {
    fn default() -> Self {
        Self::from_config(&MirrorConfig::default())
    }
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}
