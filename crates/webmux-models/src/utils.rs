//! Naming helpers shared by the producer and the worker.

use crate::job::{JobId, VideoId};

/// Extension of every merged output (the remux keeps the WebM container).
pub const OUTPUT_EXTENSION: &str = "webm";

/// Directory under the mount root holding completed outputs.
pub const OUTPUT_DIR: &str = "outputs";

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// User-facing download filename derived from the resolved title.
///
/// Falls back to the video id when the title is empty.
pub fn user_filename(title: &str, video_id: &VideoId) -> String {
    let stem = if title.is_empty() {
        sanitize_filename(video_id.as_str())
    } else {
        sanitize_filename(title)
    };
    format!("{}.{}", stem, OUTPUT_EXTENSION)
}

/// File name of the merged output for a job.
pub fn output_file_name(job_id: &JobId, video_id: &VideoId) -> String {
    format!("{}-{}.{}", job_id, video_id, OUTPUT_EXTENSION)
}

/// Output location relative to the mount root, as stored in `outputPath`.
pub fn output_relative_path(job_id: &JobId, video_id: &VideoId) -> String {
    format!("{}/{}", OUTPUT_DIR, output_file_name(job_id, video_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Cool Video!"), "Cool_Video_");
        assert_eq!(sanitize_filename("abc123"), "abc123");
        assert_eq!(sanitize_filename("a/b\\c..d"), "a_b_c__d");
        assert_eq!(sanitize_filename("日本"), "__");
    }

    #[test]
    fn test_user_filename() {
        let video_id = VideoId::from_trusted("abcdefghijk");
        assert_eq!(user_filename("Cool Video!", &video_id), "Cool_Video_.webm");
        assert_eq!(user_filename("", &video_id), "abcdefghijk.webm");

        let dashed = VideoId::from_trusted("a-b_c-d_e-f");
        assert_eq!(user_filename("", &dashed), "a_b_c_d_e_f.webm");
    }

    #[test]
    fn test_output_paths_are_deterministic() {
        let job_id = JobId::from_string("j1");
        let video_id = VideoId::from_trusted("abcdefghijk");

        assert_eq!(output_file_name(&job_id, &video_id), "j1-abcdefghijk.webm");
        assert_eq!(
            output_relative_path(&job_id, &video_id),
            "outputs/j1-abcdefghijk.webm"
        );
    }
}
