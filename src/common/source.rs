use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

/// `Source` is some literal source code, whether a repl line or a file on
/// disk. It's a string paired with a path, the path serving as the source's
/// name when errors are reported. Sources built from bare strings point to
/// `./source`.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: String,
    pub path: PathBuf,
}

impl Source {
    /// Creates a new `Source` from a string and the path it (nominally)
    /// came from. The contents are not checked against the file.
    pub fn new(source: &str, path: &Path) -> Rc<Source> {
        Rc::new(Source {
            contents: source.to_string(),
            path: path.to_owned(),
        })
    }

    /// Builds a `Source` containing just a string, pointing to `./source`.
    pub fn source(source: &str) -> Rc<Source> {
        Source::new(source, &PathBuf::from("./source"))
    }
}
