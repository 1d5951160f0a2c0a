//! Identity adapters

mod gotrue;
mod static_token;

pub use gotrue::GoTrueAuth;
pub use static_token::StaticTokenAuth;
