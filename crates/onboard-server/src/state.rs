use onboard_core::Platform;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub platform: Platform,
}

impl AppState {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}
