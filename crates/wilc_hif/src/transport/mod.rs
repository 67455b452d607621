//! Abstract out the bus so firmware can be simulated in tests.

#[cfg(test)]
mod test_imp;

#[allow(unused_imports)]
pub mod imp {
    #[cfg(test)]
    pub use super::test_imp::*;
}

/// Carries configuration frames to firmware and back (SPI, SDIO, ...).
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Send one request frame and write firmware's response frame into `response`.
    /// Returns the length of the response.
    #[allow(async_fn_in_trait)]
    async fn exchange(&mut self, request: &[u8], response: &mut [u8])
    -> Result<usize, Self::Error>;
}
