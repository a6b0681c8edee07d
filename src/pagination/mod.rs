mod cursor;
mod errors;
mod paginator;

pub use cursor::{Cursor, Direction};
pub use errors::{CursorError, PaginationError};
pub use paginator::{Page, PageRequest, Paginator, PaginatorConfig, MAX_PAGE_LIMIT};
