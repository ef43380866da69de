//! Application-side handler invoked by the request dispatcher.

/// Turns an inbound channel request into a response payload.
pub trait RequestHandler {
    /// Handle `request` received from `source` and write the response into
    /// `response`. Returns the response length; zero means no response is
    /// sent back.
    fn handle<'a>(
        &'a mut self,
        request: &'a [u8],
        source: u8,
        response: &'a mut [u8],
    ) -> impl core::future::Future<Output = usize> + 'a;
}
