use std::sync::Arc;

/// A handler attached to an [`Event`]
pub type EventHandler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Multicast event exposed by a module.
///
/// Handlers are only ever added; configuration never removes or replaces them.
pub struct Event<A> {
    handlers: Vec<EventHandler<A>>,
}

impl<A> Event<A> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Attach a handler
    pub fn subscribe(&mut self, handler: EventHandler<A>) {
        self.handlers.push(handler);
    }

    /// Attach a handler from a closure
    pub fn subscribe_fn<F>(&mut self, handler: F)
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(handler));
    }

    /// Invoke every handler in attach order
    pub fn emit(&self, args: &A) {
        for handler in &self.handlers {
            handler(args);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Event<A> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<A> std::fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_handlers_run_in_attach_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut event: Event<String> = Event::new();

        let first = Arc::clone(&calls);
        event.subscribe_fn(move |name: &String| {
            if let Ok(mut calls) = first.lock() {
                calls.push(format!("first:{}", name));
            }
        });
        let second = Arc::clone(&calls);
        event.subscribe_fn(move |name: &String| {
            if let Ok(mut calls) = second.lock() {
                calls.push(format!("second:{}", name));
            }
        });

        event.emit(&"cache".to_string());

        assert_eq!(event.handler_count(), 2);
        let calls = calls.lock().map(|c| c.clone()).unwrap_or_default();
        assert_eq!(calls, vec!["first:cache", "second:cache"]);
    }
}
