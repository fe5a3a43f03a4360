//! `assetline` core: RPC envelope codec, span carrier, and message schemas.

pub mod carrier;
pub mod envelope;
pub mod messages;

pub use carrier::CarrierError;
pub use envelope::{Envelope, EnvelopeError};
pub use messages::kinds;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
