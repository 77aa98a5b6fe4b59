//! Granted roots and relative path segments
//!
//! A document URI under a granted root is addressed as the root plus the
//! remaining path segments. Segments are percent-decoded one by one, so an
//! encoded `/` inside a file name stays part of that name.

use std::borrow::Cow;

/// Name of the database mirror at the volume root
pub const MIRROR_FILE_NAME: &str = ".musicdb";

/// Directory on the volume that holds the audio files
pub const MUSIC_DIR: &str = "Music";

/// The roots the user has granted access to, active root first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantedRoots {
    roots: Vec<String>,
}

/// A URI split into its granted root and decoded segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMatch<'a> {
    pub root: &'a str,
    pub segments: Vec<String>,
}

impl GrantedRoots {
    /// Build the candidate list; blanks and duplicates are dropped
    pub fn new<I, S>(active: Option<&str>, others: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roots: Vec<String> = Vec::new();
        let candidates = active
            .map(str::to_string)
            .into_iter()
            .chain(others.into_iter().map(Into::into));

        for root in candidates {
            let root = root.trim().trim_end_matches('/').to_string();
            if !root.is_empty() && !roots.contains(&root) {
                roots.push(root);
            }
        }

        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(String::as_str)
    }

    /// Match `uri` against the longest granted root that prefixes it.
    ///
    /// A root matches when `uri` equals it or continues with `/`.
    pub fn match_root<'a>(&'a self, uri: &str) -> Option<RootMatch<'a>> {
        let root = self
            .roots
            .iter()
            .filter(|root| {
                uri == root.as_str()
                    || uri
                        .strip_prefix(root.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|root| root.len())?;

        let relative = &uri[root.len()..];
        let segments = relative
            .split('/')
            .map(decode_segment)
            .filter(|segment| !segment.trim().is_empty())
            .collect();

        Some(RootMatch {
            root: root.as_str(),
            segments,
        })
    }
}

fn decode_segment(segment: &str) -> String {
    // Malformed escapes are kept literally
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string())
}

/// Append encoded segments to a root URI
pub fn join_uri<S: AsRef<str>>(root: &str, segments: &[S]) -> String {
    let mut uri = root.trim_end_matches('/').to_string();
    for segment in segments {
        uri.push('/');
        uri.push_str(&urlencoding::encode(segment.as_ref()));
    }
    uri
}

/// URI of the database mirror for a volume root
pub fn mirror_uri(root: &str) -> String {
    join_uri(root, &[MIRROR_FILE_NAME])
}

/// URI of an audio file in the volume's music directory
pub fn music_file_uri(root: &str, filename: &str) -> String {
    join_uri(root, &[MUSIC_DIR, filename])
}
