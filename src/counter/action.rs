// Action selection
// Maps a (possibly missing) proxy event onto the operation to run

use super::event::ProxyRequest;

/// Operation selected for an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read the count without mutating it
    Get,
    /// Atomically add one and return the new count
    Increment,
    /// CORS preflight
    Preflight,
    /// Anything else; carries the method as received
    Unsupported(String),
}

impl Action {
    /// Resolve the action for an event.
    ///
    /// A missing event, or an event without a method, counts as a visit
    /// (POST). Upstream integrations that drop the method still increment.
    pub fn from_request(request: Option<&ProxyRequest>) -> Self {
        Self::from_method(request.and_then(|r| r.http_method.as_deref()))
    }

    pub fn from_method(method: Option<&str>) -> Self {
        let Some(method) = method else {
            return Self::Increment;
        };

        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Increment,
            "OPTIONS" => Self::Preflight,
            _ => Self::Unsupported(method.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_event_increments() {
        assert_eq!(Action::from_request(None), Action::Increment);
    }

    #[test]
    fn test_missing_method_increments() {
        let req = ProxyRequest::default();
        assert_eq!(Action::from_request(Some(&req)), Action::Increment);
    }

    #[test]
    fn test_methods_are_case_insensitive() {
        assert_eq!(Action::from_method(Some("get")), Action::Get);
        assert_eq!(Action::from_method(Some("Post")), Action::Increment);
        assert_eq!(Action::from_method(Some("options")), Action::Preflight);
    }

    #[test]
    fn test_unknown_method_keeps_original_spelling() {
        assert_eq!(
            Action::from_method(Some("delete")),
            Action::Unsupported("delete".to_string())
        );
        assert_eq!(
            Action::from_method(Some("")),
            Action::Unsupported(String::new())
        );
    }
}
