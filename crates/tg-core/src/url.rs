//! URL helpers for building match contexts
//!
//! These functions work directly on string slices; no full URL parsing.

use crate::types::ResourceType;

// =============================================================================
// Scheme
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    // Scheme-relative URL
    if bytes.starts_with(b"//") {
        return Some(2);
    }

    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    if colon_pos == 0 || !bytes[..colon_pos].iter().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')) {
        return None;
    }

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Scheme name without "://", empty for scheme-relative URLs.
pub fn extract_scheme(url: &str) -> Option<&str> {
    let scheme_end = get_scheme_end(url)?;
    Some(url[..scheme_end].trim_end_matches("//").trim_end_matches(':'))
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' || b == b'?' || b == b'#' {
            break;
        }
    }

    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Host of a URL, without userinfo or port.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    let host = &url[host_start..host_end];
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Host with port if present.
pub fn extract_authority(url: &str) -> Option<&str> {
    let (host_start, _) = get_host_position(url)?;
    let bytes = url.as_bytes();
    let end = bytes[host_start..]
        .iter()
        .position(|&b| b == b'/' || b == b'?' || b == b'#')
        .map_or(bytes.len(), |i| host_start + i);
    Some(&url[host_start..end])
}

/// Lower-cased `scheme://host[:port]`.
pub fn origin(url: &str) -> Option<String> {
    let scheme = extract_scheme(url)?;
    let authority = extract_authority(url)?;
    if authority.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme.to_ascii_lowercase(), authority.to_ascii_lowercase()))
}

/// A request is third-party when its origin differs from the page's origin.
pub fn is_third_party(request_url: &str, page_url: &str) -> bool {
    origin(request_url) != origin(page_url)
}

// =============================================================================
// Path Extraction
// =============================================================================

/// Extract the path portion of a URL.
pub fn extract_path(url: &str) -> &str {
    let start = match get_host_position(url) {
        Some((_, host_end)) => host_end,
        None => return "/",
    };
    let bytes = url.as_bytes();

    let path_start = match bytes[start..].iter().position(|&b| b == b'/' || b == b'?' || b == b'#') {
        Some(i) if bytes[start + i] == b'/' => start + i,
        _ => return "/",
    };

    let path_end = bytes[path_start..]
        .iter()
        .position(|&b| b == b'?' || b == b'#')
        .map_or(bytes.len(), |i| path_start + i);

    &url[path_start..path_end]
}

/// Lower-cased file extension of the URL path, if any.
pub fn file_extension(url: &str) -> Option<String> {
    let path = extract_path(url);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

// =============================================================================
// Resource Type Inference
// =============================================================================

impl ResourceType {
    /// Guess a resource type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ty = match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "avif" | "svg" | "ico" | "apng" | "bmp"
            | "tiff" | "tif" | "jfif" | "heif" | "heic" => Self::Image,
            "css" => Self::Stylesheet,
            "js" | "mjs" => Self::Script,
            "html" | "htm" | "xml" | "json" | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt"
            | "pptx" | "zip" | "rar" | "tar" => Self::Document,
            "mp4" | "mp3" | "avi" | "mov" | "wav" | "ogg" | "flac" | "mkv" | "webm" => Self::Media,
            "woff" | "woff2" | "ttf" | "otf" | "eot" | "svgz" => Self::Font,
            _ => return None,
        };
        Some(ty)
    }
}

/// Resource type implied by the URL's file extension.
pub fn infer_resource_type(url: &str) -> Option<ResourceType> {
    file_extension(url).and_then(|ext| ResourceType::from_extension(&ext))
}
