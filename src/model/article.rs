use crate::config::ExtractionConfig;
use crate::extract::{split_sentences, ArticleContent};
use crate::state::{DownloadState, ParseState};
use crate::{NewzError, Result};
use chrono::{DateTime, Utc};

/// One page believed to hold a single news story
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub url: String,

    /// The category or feed page this article was discovered on
    pub source_url: Option<String>,

    pub title: Option<String>,

    /// Raw page, owned once downloaded
    pub html: Option<String>,

    /// Url the body was served from after redirects and meta refresh
    pub final_url: Option<String>,

    pub text: String,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub top_image: Option<String>,
    pub meta_type: Option<String>,
    pub meta_keywords: Vec<String>,
    pub language: Option<String>,

    pub keywords: Vec<String>,
    pub summary: Vec<String>,

    pub download_state: DownloadState,
    pub parse_state: ParseState,

    /// Why the download failed, when it did
    pub download_error: Option<String>,
}

impl Article {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Creates a candidate discovered on `source_url`
    pub fn discovered(
        url: impl Into<String>,
        source_url: impl Into<String>,
        title: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            source_url: Some(source_url.into()),
            title,
            ..Default::default()
        }
    }

    pub fn is_downloaded(&self) -> bool {
        self.download_state == DownloadState::Downloaded
    }

    pub fn is_parsed(&self) -> bool {
        self.parse_state.is_parsed()
    }

    pub fn is_nlp_done(&self) -> bool {
        !self.keywords.is_empty() || !self.summary.is_empty()
    }

    pub fn begin_download(&mut self) -> Result<()> {
        self.download_state = self.download_state.transition(DownloadState::Downloading)?;
        Ok(())
    }

    /// Stores the downloaded page
    pub fn set_html(&mut self, final_url: impl Into<String>, html: String) -> Result<()> {
        if self.download_state == DownloadState::NotStarted {
            self.begin_download()?;
        }
        self.download_state = self.download_state.transition(DownloadState::Downloaded)?;
        self.final_url = Some(final_url.into());
        self.html = Some(html);
        self.download_error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        self.download_state = self.download_state.transition(DownloadState::Failed)?;
        self.download_error = Some(reason.into());
        Ok(())
    }

    /// Copies extracted fields onto the article and marks it parsed
    ///
    /// A title found during discovery is kept when extraction finds none.
    pub fn apply_content(&mut self, content: ArticleContent) -> Result<()> {
        if !self.is_downloaded() {
            return Err(NewzError::ArticleNotReady {
                url: self.url.clone(),
                reason: format!("cannot parse in state {}", self.download_state),
            });
        }

        self.parse_state = self.parse_state.transition(ParseState::Parsed)?;
        if content.title.is_some() {
            self.title = content.title;
        }
        self.text = content.text;
        self.authors = content.authors;
        self.publish_date = content.publish_date;
        self.top_image = content.top_image;
        self.meta_type = content.meta_type;
        self.meta_keywords = content.meta_keywords;
        self.language = content.language;
        Ok(())
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Decides whether the parsed body is big enough to be a real story
    ///
    /// Pages tagged `og:type=article` only need more than `min_word_count`
    /// words. Anything else needs a title of two words or more, at least
    /// `min_word_count` words and `min_sentence_count` sentences.
    pub fn is_valid_body(&self, config: &ExtractionConfig) -> bool {
        if !self.is_parsed() {
            return false;
        }

        let words = self.word_count();
        if self.meta_type.as_deref() == Some("article") && words > config.min_word_count {
            return true;
        }

        let title_words = self
            .title
            .as_deref()
            .map(|t| t.split_whitespace().count())
            .unwrap_or(0);
        if title_words < 2 || words < config.min_word_count {
            return false;
        }

        split_sentences(&self.text).len() >= config.min_sentence_count
    }
}
