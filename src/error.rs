use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that stop a run before (or instead of) processing anything.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not load the catalog (`shelf export` creates it)")]
    Catalog,
    #[display("required tools are unavailable")]
    Tools,
    #[display("could not read the working directory")]
    Scan,
    #[display("catalog export failed")]
    Export,
    /// The run finished, but some entries hit errors along the way.
    #[display("{_0} item(s) could not be processed")]
    Incomplete(#[error(not(source))] usize),
}
