//! Resolving byte offsets to file, line and column.

/// A resolved source position. Lines and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

/// Maps span offsets to human positions for the JSON dumper.
pub trait LocationResolver {
    fn resolve(&self, offset: u32) -> Option<Location>;
}

/// Line table of a single source file.
#[derive(Clone, Debug)]
pub struct LineIndex {
    filename: String,
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(filename: impl Into<String>, source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .filter_map(|(i, _)| u32::try_from(i + 1).ok()),
        );
        LineIndex {
            filename: filename.into(),
            line_starts,
            len: u32::try_from(source.len()).unwrap_or(u32::MAX),
        }
    }
}

impl LocationResolver for LineIndex {
    fn resolve(&self, offset: u32) -> Option<Location> {
        if offset > self.len {
            return None;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts.get(line.checked_sub(1)?)?;
        Some(Location {
            filename: self.filename.clone(),
            line: u32::try_from(line).ok()?,
            column: offset - start + 1,
        })
    }
}
