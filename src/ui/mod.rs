/// Extension pages built with Yew
pub mod popup;
