//! Token model, token sources, and the user/account records discovered after sign-in.

pub mod source;
pub mod token;
pub mod user;

pub use source::*;
pub use token::{secret::*, *};
pub use user::*;
