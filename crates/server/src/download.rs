use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::error;
use vidhook_core::error::ApiError;

use crate::error::AppError;
use crate::state::AppState;

/// A single inclusive byte range from a `Range` header.
#[derive(Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end_inclusive: u64,
}

/// Parse an HTTP Range header per RFC 7233.
/// Only supports single byte ranges: `bytes=start-end`, `bytes=start-` or `bytes=-suffix`.
pub fn parse_range_header(range_str: &str, file_size: u64) -> Result<ByteRange, ApiError> {
    let range_str = range_str.trim();
    let ranges = range_str
        .strip_prefix("bytes=")
        .ok_or_else(|| ApiError::BadRequest("only bytes ranges supported".into()))?;

    if ranges.contains(',') {
        return Err(ApiError::BadRequest("multi-range not supported".into()));
    }
    if file_size == 0 {
        return Err(ApiError::BadRequest("empty file".into()));
    }

    let (start_s, end_s) = ranges.split_once('-').unwrap_or((ranges, ""));

    if start_s.is_empty() {
        // Suffix range: bytes=-500 means last 500 bytes
        let suffix: u64 = end_s
            .parse()
            .map_err(|_| ApiError::BadRequest("bad range suffix".into()))?;
        if suffix == 0 {
            return Err(ApiError::BadRequest("empty suffix range".into()));
        }
        return Ok(ByteRange {
            start: file_size.saturating_sub(suffix),
            end_inclusive: file_size - 1,
        });
    }

    let start: u64 = start_s
        .parse()
        .map_err(|_| ApiError::BadRequest("bad range start".into()))?;

    let end: u64 = if end_s.is_empty() {
        file_size - 1
    } else {
        end_s
            .parse()
            .map_err(|_| ApiError::BadRequest("bad range end".into()))?
    };

    if start >= file_size {
        return Err(ApiError::BadRequest(format!(
            "range start {start} >= file size {file_size}"
        )));
    }

    let end = end.min(file_size - 1);
    if start > end {
        return Err(ApiError::BadRequest("range start > end".into()));
    }

    Ok(ByteRange {
        start,
        end_inclusive: end,
    })
}

/// Content-type guess from file extension.
fn content_type_for_name(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "flv" => "video/x-flv",
        "3gp" => "video/3gpp",
        _ => "application/octet-stream",
    }
}

fn not_found() -> AppError {
    ApiError::NotFound("File not found".into()).into()
}

fn download_failed(name: &str, e: impl std::fmt::Display) -> AppError {
    error!(file = %name, error = %e, "error downloading file");
    ApiError::Internal("Download failed".into()).into()
}

/// Stream a processed file as an attachment, honoring single byte ranges.
/// GET /download/{filename}
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let path = state
        .processor
        .processed_path(&filename)
        .ok_or_else(not_found)?;

    let meta = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        _ => return Err(not_found()),
    };
    let file_size = meta.len();
    let content_type = content_type_for_name(&filename);
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| download_failed(&filename, e))?;

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(range_header) => match parse_range_header(range_header, file_size) {
            Ok(range) => {
                let content_length = range.end_inclusive - range.start + 1;
                file.seek(std::io::SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| download_failed(&filename, e))?;
                let stream = tokio_util::io::ReaderStream::new(file.take(content_length));

                builder
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(header::CONTENT_LENGTH, content_length)
                    .header(
                        header::CONTENT_RANGE,
                        format!(
                            "bytes {}-{}/{}",
                            range.start, range.end_inclusive, file_size
                        ),
                    )
                    .body(Body::from_stream(stream))
            }
            Err(_) => Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
                .body(Body::empty()),
        },
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, file_size)
            .body(Body::from_stream(tokio_util::io::ReaderStream::new(file))),
    };

    response.map_err(|e| download_failed(&filename, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_basic() {
        let r = parse_range_header("bytes=0-999", 5000).unwrap();
        assert_eq!(r, ByteRange { start: 0, end_inclusive: 999 });
    }

    #[test]
    fn parse_range_open_end() {
        let r = parse_range_header("bytes=1000-", 5000).unwrap();
        assert_eq!(r.start, 1000);
        assert_eq!(r.end_inclusive, 4999);
    }

    #[test]
    fn parse_range_suffix() {
        let r = parse_range_header("bytes=-500", 5000).unwrap();
        assert_eq!(r.start, 4500);
        assert_eq!(r.end_inclusive, 4999);
    }

    #[test]
    fn parse_range_clamps_end() {
        let r = parse_range_header("bytes=0-99999", 5000).unwrap();
        assert_eq!(r.end_inclusive, 4999);
    }

    #[test]
    fn parse_range_rejections() {
        assert!(parse_range_header("bytes=5000-", 5000).is_err());
        assert!(parse_range_header("bytes=0-100, 200-300", 5000).is_err());
        assert!(parse_range_header("items=0-1", 5000).is_err());
        assert!(parse_range_header("bytes=0-", 0).is_err());
        assert!(parse_range_header("bytes=-0", 5000).is_err());
    }

    #[test]
    fn content_type_detection() {
        assert_eq!(content_type_for_name("movie_processed.mp4"), "video/mp4");
        assert_eq!(content_type_for_name("video.MKV"), "video/x-matroska");
        assert_eq!(content_type_for_name("clip.webm"), "video/webm");
        assert_eq!(content_type_for_name("noext"), "application/octet-stream");
    }
}
