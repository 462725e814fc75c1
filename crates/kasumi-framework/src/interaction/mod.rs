//! Reaction-driven interactions: generic [`Buttons`] and [`Pagination`].

pub mod buttons;
pub mod paginator;

pub use buttons::{ButtonPress, Buttons, CHECK, CROSS};
pub use paginator::{AutoCancel, Gesture, PaginateOptions, Pagination, Transition};
