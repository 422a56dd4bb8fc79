pub mod flash;
pub mod ice40;

pub use flash::{Flash, FlashError};
pub use ice40::Ice40;
