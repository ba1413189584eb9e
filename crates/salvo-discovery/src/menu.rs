//! Choosing one of the discovered services.
//!
//! [`ServiceMenu`] polls a [`DiscoveryClient`] at a fixed rate and shows
//! each snapshot to a [`ServiceSelector`] until it picks one. The selector
//! is the UI: a console prompt, a game screen, or a test stub.

use std::time::Instant;

use crate::{CancelToken, DiscoveryClient, DiscoveryConfig, DiscoveryError, ServiceInfo};

/// Picks a service from the current list.
pub trait ServiceSelector {
    /// Called once per poll with everything found so far. Returns the index
    /// to connect to, or `None` to keep waiting.
    fn select(&mut self, services: &[ServiceInfo]) -> Option<usize>;
}

impl<F> ServiceSelector for F
where
    F: FnMut(&[ServiceInfo]) -> Option<usize>,
{
    fn select(&mut self, services: &[ServiceInfo]) -> Option<usize> {
        self(services)
    }
}

/// Takes the first service as soon as one shows up.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstService;

impl ServiceSelector for FirstService {
    fn select(&mut self, services: &[ServiceInfo]) -> Option<usize> {
        (!services.is_empty()).then_some(0)
    }
}

/// Polls discovery results until a selector picks one.
pub struct ServiceMenu {
    config: DiscoveryConfig,
    cancel: CancelToken,
}

impl ServiceMenu {
    /// A menu polling at `config.menu_poll_interval`.
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config: config.validated(),
            cancel: CancelToken::new(),
        }
    }

    /// A token that aborts [`pick`](Self::pick) / [`show`](Self::show) with
    /// [`DiscoveryError::Cancelled`] from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Starts a client, waits for a pick, stops the client, and returns
    /// the chosen `(ip, port)`.
    pub fn show(&self, selector: &mut dyn ServiceSelector) -> Result<(String, u16), DiscoveryError> {
        let mut client = DiscoveryClient::start(self.config.clone())?;
        let picked = self.pick(&client, selector);
        client.stop();
        picked
    }

    /// Polls `client` until `selector` picks a listed service.
    ///
    /// # Errors
    /// [`DiscoveryError::Timeout`] once `menu_timeout` elapses;
    /// [`DiscoveryError::Cancelled`] if the cancel token fires.
    pub fn pick(
        &self,
        client: &DiscoveryClient,
        selector: &mut dyn ServiceSelector,
    ) -> Result<(String, u16), DiscoveryError> {
        // A timeout too long to add to the clock never fires.
        let deadline = self
            .config
            .menu_timeout
            .and_then(|t| Instant::now().checked_add(t));

        loop {
            let services = client.services();
            if let Some(index) = selector.select(&services) {
                match services.get(index) {
                    Some(info) => {
                        tracing::info!(service = %info, "service selected");
                        return Ok(info.endpoint());
                    }
                    None => tracing::debug!(index, listed = services.len(), "selection out of range"),
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(DiscoveryError::Timeout);
            }
            if self.cancel.sleep(self.config.menu_poll_interval) {
                return Err(DiscoveryError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> Vec<ServiceInfo> {
        vec![
            ServiceInfo::new("10.0.0.2", 666, "deck"),
            ServiceInfo::new("10.0.0.3", 666, "bridge"),
        ]
    }

    #[test]
    fn test_first_service_waits_for_a_listing() {
        let mut selector = FirstService;
        assert_eq!(selector.select(&[]), None);
        assert_eq!(selector.select(&services()), Some(0));
    }

    #[test]
    fn test_closures_are_selectors() {
        let mut by_name = |list: &[ServiceInfo]| list.iter().position(|s| s.hostname == "bridge");
        assert_eq!(by_name.select(&services()), Some(1));
    }
}
