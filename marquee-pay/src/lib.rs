pub mod callback;
pub mod momo;

pub use callback::{CallbackVerifier, IpnPayload};
pub use momo::{MockGateway, MomoConfig, MomoGateway, PayError};
