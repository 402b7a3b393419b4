pub mod alert;
pub mod checkbox;
pub mod spinner;

// Re-export component symbols so callers can `use crate::components::ui::Checkbox` etc.
pub use alert::*;
pub use checkbox::*;
pub use spinner::*;
