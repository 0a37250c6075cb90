mod catalog;
mod entry;

pub use self::catalog::Catalog;
pub use self::entry::CatalogEntry;
pub(crate) use self::entry::RawEntry;
