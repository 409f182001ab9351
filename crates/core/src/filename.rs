use regex::Regex;
use std::sync::LazyLock;

/// Upload extensions accepted by the webhook endpoints.
pub static ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "webm", "mkv", "flv", "m4v", "3gp"];

static RE_UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

/// Check whether an uploaded filename carries an accepted video extension.
pub fn is_allowed_upload(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduce a client-supplied filename to a safe, flat ASCII name.
///
/// Directory separators become word breaks, whitespace runs become `_`,
/// anything outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_`
/// are trimmed. Falls back to `video` when nothing survives.
pub fn secure_filename(filename: &str) -> String {
    let flattened = filename.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = RE_UNSAFE.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c == '_');

    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split `name.ext` into `("name", ".ext")`. Leading dots do not start an extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    let lead = filename.len() - filename.trim_start_matches('.').len();
    match filename[lead..].rfind('.') {
        Some(i) => filename.split_at(lead + i),
        None => (filename, ""),
    }
}

/// Name under which an upload is staged: `<job_id>_<secured name>`.
pub fn unique_upload_name(job_id: &str, secured: &str) -> String {
    let (stem, ext) = split_extension(secured);
    format!("{job_id}_{stem}{ext}")
}

/// A download name must be a single plain path component.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_extensions() {
        for name in [
            "a.mp4", "b.AVI", "c.mov", "d.webm", "e.MKV", "f.flv", "g.m4v", "h.3gp", "x.y.mp4",
        ] {
            assert!(is_allowed_upload(name), "should accept {name}");
        }
        for name in ["notes.txt", "mp4", "clip.mp4.exe", "", "movie.ts", "poster.jpg"] {
            assert!(!is_allowed_upload(name), "should reject {name}");
        }
    }

    #[test]
    fn secures_names() {
        assert_eq!(secure_filename("My Movie.mp4"), "My_Movie.mp4");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\clips\\a b.mov"), "C_clips_a_b.mov");
        assert_eq!(secure_filename("  weird*<>name?.webm "), "weirdname.webm");
        assert_eq!(secure_filename("..."), "video");
        assert_eq!(secure_filename(".hidden.mkv"), "hidden.mkv");
    }

    #[test]
    fn splits_extensions() {
        assert_eq!(split_extension("clip.mp4"), ("clip", ".mp4"));
        assert_eq!(split_extension("a.b.mkv"), ("a.b", ".mkv"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
    }

    #[test]
    fn unique_names() {
        assert_eq!(unique_upload_name("abc", "clip.mp4"), "abc_clip.mp4");
        assert_eq!(unique_upload_name("abc", "video"), "abc_video");
    }

    #[test]
    fn plain_file_names() {
        assert!(is_plain_file_name("abc_clip_processed.mp4"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../secret"));
        assert!(!is_plain_file_name("a\\b"));
    }
}
