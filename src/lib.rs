mod database {
    pub mod actions;
    pub mod error;
    pub mod filters;
    pub mod pagination;
    pub mod payload;
    pub mod schema;
}
mod constants;
mod media;

pub use constants::*;
pub use database::*;
pub use media::*;
