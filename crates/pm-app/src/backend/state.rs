use std::sync::Arc;

use crate::generator::Generator;
use crate::generator::notify::NotificationFeed;

pub struct BackendState {
    pub generator: Generator,
    pub notifications: Arc<NotificationFeed>,
}

impl BackendState {
    pub fn new(generator: Generator, notifications: Arc<NotificationFeed>) -> Self {
        Self {
            generator,
            notifications,
        }
    }
}
