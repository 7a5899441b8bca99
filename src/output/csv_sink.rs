use super::{FrameRecord, ResultSink, FAILURE_SENTINEL};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Result file that is only created once the first bytes are written
pub struct DeferredFile {
    path: PathBuf,
    file: Option<File>,
}

impl DeferredFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    fn open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            tracing::info!("Writing results to {}", self.path.display());
            self.file = Some(File::create(&self.path)?);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("result file was not opened"))
    }
}

impl Write for DeferredFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.open()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// CSV result file: a baseline row, a column header, then one row per frame
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl CsvSink<DeferredFile> {
    /// Results for `video` in `<dir>/<video stem>.csv`.
    ///
    /// The file appears with the baseline row, so a run that never
    /// calibrates leaves nothing behind.
    pub fn for_video(dir: &Path, video: &Path) -> Result<(Self, PathBuf)> {
        let stem = video
            .file_stem()
            .with_context(|| format!("No file name in {}", video.display()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(format!("{}.csv", stem.to_string_lossy()));
        Ok((Self::new(DeferredFile::new(path.clone())), path))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            header_written: false,
        }
    }

    fn write_column_header(&mut self) -> Result<()> {
        if !self.header_written {
            self.writer
                .write_record(["Minute", "Second", "Frame", "R", "G", "B"])
                .context("Failed to write column header")?;
            self.header_written = true;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush results: {}", e.error()))
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn write_baseline(&mut self, rgb: Option<[u8; 3]>) -> Result<()> {
        let [r, g, b] = rgb.map_or(FAILURE_SENTINEL, |c| c.map(i16::from));
        self.writer
            .write_record([
                "Baseline".to_string(),
                "RGB".to_string(),
                "Color".to_string(),
                r.to_string(),
                g.to_string(),
                b.to_string(),
            ])
            .context("Failed to write baseline row")?;
        self.write_column_header()?;
        self.writer.flush().context("Failed to flush results")?;
        Ok(())
    }

    fn write_frame(&mut self, record: &FrameRecord) -> Result<()> {
        self.write_column_header()?;

        let [r, g, b] = record.columns();
        let ts = record.timestamp;
        self.writer
            .serialize((ts.minute, ts.second, ts.frame, r, g, b))
            .with_context(|| format!("Failed to write row for frame {}", ts))?;
        self.writer.flush().context("Failed to flush results")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.write_column_header()?;
        self.writer.flush().context("Failed to flush results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameTimestamp;

    fn record(second: u32, frame: u32, rgb: Option<[u8; 3]>) -> FrameRecord {
        FrameRecord {
            timestamp: FrameTimestamp {
                minute: 0,
                second,
                frame,
            },
            rgb,
        }
    }

    #[test]
    fn writes_baseline_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new());
        sink.write_baseline(Some([150, 118, 60])).unwrap();
        sink.write_frame(&record(0, 1, Some([160, 120, 90]))).unwrap();
        sink.write_frame(&record(0, 2, None)).unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "Baseline,RGB,Color,150,118,60\n\
             Minute,Second,Frame,R,G,B\n\
             0,0,1,160,120,90\n\
             0,0,2,-1,-1,-1\n"
        );
    }

    #[test]
    fn missing_baseline_uses_sentinel() {
        let mut sink = CsvSink::new(Vec::new());
        sink.write_baseline(None).unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert!(text.starts_with("Baseline,RGB,Color,-1,-1,-1\n"));
    }

    #[test]
    fn names_file_after_video() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sink, path) =
            CsvSink::for_video(&dir.path().join("out"), Path::new("/videos/arm.test.mp4")).unwrap();
        sink.write_baseline(Some([1, 2, 3])).unwrap();
        sink.finish().unwrap();
        drop(sink);

        assert_eq!(path, dir.path().join("out").join("arm.test.csv"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn file_is_not_created_before_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sink, path) = CsvSink::for_video(dir.path(), Path::new("arm.mp4")).unwrap();

        sink.writer.flush().unwrap();
        assert!(!path.exists());
        drop(sink);
        assert!(!path.exists());
    }
}
