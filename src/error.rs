/// Failures of the index-to-publication pipeline that indicate the source index
/// does not look the way the parser expects.
///
/// Network and I/O failures are not part of this taxonomy; they travel as
/// `anyhow::Error` with context naming the URL or path involved.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("table {table}: single anchor does not declare a header: {text:?}")]
    MalformedHeader { table: usize, text: String },

    #[error("table {table}: cannot resolve href {href:?} against {base}")]
    UnresolvedLink {
        table: usize,
        href: String,
        base: String,
    },

    #[error("table {table}: serial range ends before it starts: {text:?}")]
    ReversedRange { table: usize, text: String },

    #[error("no content entries found for collection {collection}")]
    NoContent { collection: String },

    #[error("output path {path} is produced by more than one page")]
    DuplicatePath { path: String },
}
