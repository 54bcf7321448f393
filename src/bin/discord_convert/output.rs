use std::path::{Path, PathBuf};

use crate::planner::TARGET_EXTENSION;

const OUTPUT_SUFFIX: &str = "_discord";

/// Free output path `<stem>_discord.mp4` inside `output_dir`.
///
/// On collision a counter is added: `<stem>_discord_1.mp4`, `<stem>_discord_2.mp4`, ...
/// Existing files are never overwritten.
pub fn unique_output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = discord_tools::path_to_file_stem_string(input);
    let mut candidate = output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.{TARGET_EXTENSION}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = output_dir.join(format!("{stem}{OUTPUT_SUFFIX}_{counter}.{TARGET_EXTENSION}"));
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod output_tests {
    use super::*;

    use std::fs::File;

    use tempfile::tempdir;

    #[test]
    fn uses_stem_with_discord_suffix() {
        let dir = tempdir().unwrap();
        let path = unique_output_path(dir.path(), Path::new("/videos/My Clip.mkv"));
        assert_eq!(path, dir.path().join("My Clip_discord.mp4"));
    }

    #[test]
    fn adds_counter_on_collision() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("clip_discord.mp4")).unwrap();
        File::create(dir.path().join("clip_discord_1.mp4")).unwrap();

        let path = unique_output_path(dir.path(), Path::new("clip.mov"));
        assert_eq!(path, dir.path().join("clip_discord_2.mp4"));
    }

    #[test]
    fn missing_output_directory_is_not_created() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("output");
        let path = unique_output_path(&output_dir, Path::new("clip.mp4"));
        assert!(!output_dir.exists());
        assert_eq!(path, output_dir.join("clip_discord.mp4"));
    }
}
