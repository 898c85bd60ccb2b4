//! Fragment extraction entry point
//!
//! [`FragmentReader`] names a document and a target tag. Nothing is read
//! until a fragment is requested from one of its sequences.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::options::ExtractOptions;
use crate::strategy::streaming::validate_tag;
use crate::strategy::{BackgroundFragments, Fragments, Source};

/// Extraction of every `tag` subtree from the XML file at `path`
///
/// ```no_run
/// use xmlsplit::FragmentReader;
///
/// let reader = FragmentReader::new("catalog.xml", "book")?;
/// for fragment in reader {
///     println!("{}", fragment?);
/// }
/// # Ok::<(), xmlsplit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct FragmentReader {
    path: PathBuf,
    tag: String,
    options: ExtractOptions,
}

impl FragmentReader {
    /// Validate the arguments; the file is not touched
    pub fn new(path: impl Into<PathBuf>, tag: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let tag = tag.into();

        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("path is not set"));
        }
        validate_tag(&tag)?;

        Ok(Self {
            path,
            tag,
            options: ExtractOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Lazy sequence scanned on the caller's thread
    pub fn fragments(self) -> Fragments {
        Fragments::new(Source::Path(self.path), self.tag.into(), self.options)
    }

    /// Lazy sequence scanned on a dedicated worker thread
    pub fn spawn(self) -> Result<BackgroundFragments> {
        BackgroundFragments::spawn(Source::Path(self.path), self.tag.into(), self.options)
    }
}

impl IntoIterator for FragmentReader {
    type Item = Result<String>;
    type IntoIter = Fragments;

    fn into_iter(self) -> Fragments {
        self.fragments()
    }
}

/// Shorthand for `FragmentReader::new(path, tag)?.fragments()`
pub fn fragments(path: impl Into<PathBuf>, tag: impl Into<String>) -> Result<Fragments> {
    Ok(FragmentReader::new(path, tag)?.fragments())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_arguments() {
        assert!(matches!(
            FragmentReader::new("", "item"),
            Err(Error::InvalidArgument("path is not set"))
        ));
        assert!(matches!(
            FragmentReader::new("doc.xml", ""),
            Err(Error::InvalidArgument("tag is not set"))
        ));
        assert!(matches!(
            FragmentReader::new("doc.xml", "<item>"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_new_does_no_io() {
        let reader = FragmentReader::new("/does/not/exist.xml", "ns:item").unwrap();
        assert_eq!(reader.tag(), "ns:item");
        assert!(reader.options().recover);
    }

    #[test]
    fn test_missing_file_reported_on_first_pull() {
        let mut stream = fragments("/does/not/exist.xml", "item").unwrap();
        assert!(matches!(stream.next(), Some(Err(Error::Io(_)))));
        assert!(stream.next().is_none());
    }
}
