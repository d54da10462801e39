use crate::frame_ops::FrameOps;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use std::path::Path;

pub struct DataLoader {
    show_progress: bool,
}

impl DataLoader {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }

    /// Read every path that exists into a DataFrame, in input order.
    ///
    /// Missing files are skipped with a warning; the rest of the batch still
    /// loads. A file that exists but fails to parse aborts the whole call.
    pub fn load_data<P: AsRef<Path>>(&self, file_paths: &[P]) -> Result<Vec<DataFrame>> {
        let pb = if self.show_progress {
            let pb = ProgressBar::new(file_paths.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                    .unwrap(),
            );
            Some(pb)
        } else {
            None
        };

        let mut frames = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            let path = path.as_ref();
            if let Some(pb) = &pb {
                pb.inc(1);
            }

            if !path.exists() {
                log::warn!("File not found at {}", path.display());
                continue;
            }

            let df = CsvReader::from_path(path)?.has_header(true).finish()?;
            println!("Loaded {} | Shape: {}", path.display(), df.shape_display());
            frames.push(df);
        }

        if let Some(pb) = pb {
            pb.finish_with_message("Files loaded");
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_csv(dir.path(), "a.csv", "CampusKey,SiteKey\n1,10\n1,11\n");
        let b = write_csv(dir.path(), "b.csv", "CampusKey,kWp\n1,5.5\n");
        let missing = dir.path().join("missing.csv");

        let loader = DataLoader::new(false);
        let frames = loader.load_data(&[a, missing, b]).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].shape(), (2, 2));
        assert_eq!(frames[1].shape(), (1, 2));
    }

    #[test]
    fn empty_path_list_loads_nothing() {
        let loader = DataLoader::new(false);
        let frames = loader.load_data::<&Path>(&[]).unwrap();
        assert!(frames.is_empty());
    }
}
