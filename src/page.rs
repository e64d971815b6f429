//! Handles for every piece of the window the workflow writes to.
//!
//! Rendering reads these; only the controllers write them.

pub const PLACEHOLDER_HOST: &str = "https://placehold.co/";
pub const ORIGINAL_PLACEHOLDER: &str =
    "https://placehold.co/400x300/e0e0e0/757575?text=Original+Image";
pub const ENHANCED_PLACEHOLDER: &str =
    "https://placehold.co/400x300/e0e0e0/757575?text=Enhanced+Result";
pub const FILE_LABEL_PROMPT: &str = "Choose an image...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Placeholder(&'static str),
    Remote(String),
}

impl ImageSource {
    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::Placeholder(url) => url,
            ImageSource::Remote(url) => url,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ImageSource::Placeholder(_))
    }
}

/// An image on the page that falls back to a fixed placeholder.
#[derive(Debug, Clone)]
pub struct ImageSlot {
    source: ImageSource,
    placeholder: &'static str,
}

impl ImageSlot {
    pub fn new(placeholder: &'static str) -> Self {
        Self {
            source: ImageSource::Placeholder(placeholder),
            placeholder,
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn show(&mut self, src: impl Into<String>) {
        self.source = ImageSource::Remote(src.into());
    }

    pub fn reset(&mut self) {
        self.source = ImageSource::Placeholder(self.placeholder);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadLink {
    pub visible: bool,
    pub href: Option<String>,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub original: ImageSlot,
    pub enhanced: ImageSlot,
    pub download: DownloadLink,
    /// Automatic trigger and the manual controls panel.
    pub controls_enabled: bool,
    pub file_label: String,
    pub notice: Option<Notice>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            original: ImageSlot::new(ORIGINAL_PLACEHOLDER),
            enhanced: ImageSlot::new(ENHANCED_PLACEHOLDER),
            download: DownloadLink::default(),
            controls_enabled: false,
            file_label: FILE_LABEL_PROMPT.to_string(),
            notice: None,
        }
    }

    pub fn show_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(%text, "error shown");
        self.notice = Some(Notice {
            level: NoticeLevel::Error,
            text,
        });
    }

    pub fn show_info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        });
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
