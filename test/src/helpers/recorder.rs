use std::sync::{Arc, Mutex, PoisonError};

/// Collects values handed to a callback so a test can inspect them later.
pub struct Recorder<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Handler that records a clone of every value it sees
    pub fn handler(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let recorder = self.clone();
        move |item: &T| recorder.push(item.clone())
    }

    /// Everything recorded so far, leaving the recorder empty
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn items(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder<String> {
    /// Handler for `&str` callbacks such as `on_left`
    pub fn str_handler(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let recorder = self.clone();
        move |item: &str| recorder.push(item.to_string())
    }
}
