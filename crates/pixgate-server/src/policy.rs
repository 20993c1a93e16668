//! Media types the relay is willing to forward.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Image media types relayed when no explicit list is configured
pub const DEFAULT_CONTENT_TYPES: [&str; 43] = [
    "image/bmp",
    "image/cgm",
    "image/g3fax",
    "image/gif",
    "image/ief",
    "image/jp2",
    "image/jpeg",
    "image/jpg",
    "image/pict",
    "image/png",
    "image/prs.btif",
    "image/svg+xml",
    "image/tiff",
    "image/vnd.adobe.photoshop",
    "image/vnd.djvu",
    "image/vnd.dwg",
    "image/vnd.dxf",
    "image/vnd.fastbidsheet",
    "image/vnd.fpx",
    "image/vnd.fst",
    "image/vnd.fujixerox.edmics-mmr",
    "image/vnd.fujixerox.edmics-rlc",
    "image/vnd.microsoft.icon",
    "image/vnd.ms-modi",
    "image/vnd.net-fpx",
    "image/vnd.wap.wbmp",
    "image/vnd.xiff",
    "image/webp",
    "image/x-cmu-raster",
    "image/x-cmx",
    "image/x-icon",
    "image/x-macpaint",
    "image/x-pcx",
    "image/x-pict",
    "image/x-portable-anymap",
    "image/x-portable-bitmap",
    "image/x-portable-graymap",
    "image/x-portable-pixmap",
    "image/x-quicktime",
    "image/x-rgb",
    "image/x-xbitmap",
    "image/x-xpixmap",
    "image/x-xwindowdump",
];

/// Allowlist of relayable media types
///
/// Lookups are case-insensitive and expect a bare `type/subtype` (see
/// [`parse_media_type`]). The lookup set is built on first use and never
/// changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct ContentPolicy {
    content_types: Option<Vec<String>>,
    extra_content_types: Vec<String>,
    allowed: OnceLock<HashSet<String>>,
}

impl ContentPolicy {
    /// Policy over [`DEFAULT_CONTENT_TYPES`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default list
    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = Some(content_types.into_iter().map(Into::into).collect());
        self.allowed = OnceLock::new();
        self
    }

    /// Allow these in addition to the default (or replaced) list
    pub fn with_extra_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_content_types
            .extend(content_types.into_iter().map(Into::into));
        self.allowed = OnceLock::new();
        self
    }

    fn allowed(&self) -> &HashSet<String> {
        self.allowed.get_or_init(|| {
            let base: Box<dyn Iterator<Item = &str> + '_> = match &self.content_types {
                Some(types) => Box::new(types.iter().map(String::as_str)),
                None => Box::new(DEFAULT_CONTENT_TYPES.into_iter()),
            };
            base.chain(self.extra_content_types.iter().map(String::as_str))
                .map(str::to_ascii_lowercase)
                .collect()
        })
    }

    /// Whether a bare media type may be relayed
    pub fn is_allowed(&self, media_type: &str) -> bool {
        self.allowed().contains(&media_type.to_ascii_lowercase())
    }

    /// Whether a raw `Content-Type` header value may be relayed
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        parse_media_type(content_type).is_some_and(|media_type| self.is_allowed(&media_type))
    }
}

/// RFC 7230 `tchar`
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

fn take_token(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c| !is_token_char(c)).unwrap_or(s.len());
    (end > 0).then(|| s.split_at(end))
}

fn take_quoted(s: &str) -> Option<&str> {
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next()?;
            }
            '"' => return Some(&s[i + 1..]),
            _ => {}
        }
    }
    None
}

/// Parse a `Content-Type` value into its lowercase `type/subtype`
///
/// Parameters are validated and dropped. Returns `None` when the media type
/// or any parameter is malformed, or when a parameter name repeats.
pub fn parse_media_type(value: &str) -> Option<String> {
    let (media_type, mut rest) = value.split_at(value.find(';').unwrap_or(value.len()));
    let media_type = media_type.trim();
    let (kind, subtype) = media_type.split_once('/')?;
    if !is_token(kind) || !is_token(subtype) {
        return None;
    }

    let mut names = HashSet::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let param = rest.strip_prefix(';')?.trim_start();
        if param.is_empty() {
            // trailing semicolon
            break;
        }
        let (name, after_name) = take_token(param)?;
        let value = after_name.trim_start().strip_prefix('=')?.trim_start();
        rest = if value.starts_with('"') {
            take_quoted(value)?
        } else {
            take_token(value)?.1
        };
        if !names.insert(name.to_ascii_lowercase()) {
            return None;
        }
    }

    Some(media_type.to_ascii_lowercase())
}
