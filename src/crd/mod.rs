//! Custom Resource Definitions for the Maskinporten operator

mod maskinporten_client;
pub mod types;


pub use maskinporten_client::{
    MaskinportenClient, MaskinportenClientSpec, MaskinportenClientStatus, SpecValidationError,
};
pub use types::*;
