//! Command implementations for the pagefeed CLI.

mod image;
mod list;
mod load;
mod status;

pub use image::execute as resolve_image;
pub use list::execute as list_sections;
pub use load::execute as load_page;
pub use status::execute as show_status;
