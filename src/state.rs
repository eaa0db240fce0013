//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The compositor wired to the FFmpeg prober and renderer
//! - Upload and artifact storage
//! - Renders in flight, with their progress
//! - The render concurrency limit
//! - Server configuration

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use mixdown_lib::{Compositor, FfmpegProber, FfmpegRenderer, ProgressFn};

use crate::config::ServerConfig;
use crate::storage::Storage;

pub type MixCompositor = Compositor<FfmpegProber, FfmpegRenderer>;

/// Snapshot of one render in flight
#[derive(Debug, Clone, Serialize)]
pub struct RenderStatus {
    pub id: String,
    pub output: String,
    pub backgrounds: usize,
    pub started_at: DateTime<Utc>,
    /// Completion fraction in `[0, 1]`
    pub progress: f64,
}

/// Application state shared across all handlers
pub struct AppState {
    pub compositor: MixCompositor,

    pub storage: Storage,

    /// Renders in flight (render id -> status)
    pub renders: Arc<DashMap<String, RenderStatus>>,

    /// Caps how many renders run at once
    pub render_slots: Semaphore,

    /// Server shutdown flag
    pub shutdown: AtomicBool,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let compositor = Compositor::new(
            FfmpegProber::new(),
            FfmpegRenderer::new(config.audio.render_settings()),
            config.compositor_options(),
        );
        Self {
            compositor,
            storage: Storage::new(&config.storage),
            renders: Arc::new(DashMap::new()),
            render_slots: Semaphore::new(config.limits.max_concurrent_renders.max(1)),
            shutdown: AtomicBool::new(false),
            config,
        }
    }

    /// Create AppState with default configuration
    #[cfg(test)]
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Register a render and get the ticket that tracks it.
    pub fn begin_render(&self, output: &str, backgrounds: usize) -> RenderTicket {
        let id = Uuid::new_v4().to_string();
        self.renders.insert(
            id.clone(),
            RenderStatus {
                id: id.clone(),
                output: output.to_string(),
                backgrounds,
                started_at: Utc::now(),
                progress: 0.0,
            },
        );
        RenderTicket {
            id,
            renders: self.renders.clone(),
        }
    }

    /// Renders in flight, oldest first
    pub fn active_renders(&self) -> Vec<RenderStatus> {
        let mut list: Vec<RenderStatus> = self.renders.iter().map(|e| e.value().clone()).collect();
        list.sort_by_key(|r| r.started_at);
        list
    }
}

/// Tracks one render in the in-flight table; the entry goes away on drop
pub struct RenderTicket {
    id: String,
    renders: Arc<DashMap<String, RenderStatus>>,
}

impl RenderTicket {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Progress callback that updates this render's entry.
    pub fn progress_fn(&self) -> ProgressFn {
        let id = self.id.clone();
        let renders = self.renders.clone();
        Arc::new(move |fraction| {
            if let Some(mut status) = renders.get_mut(&id) {
                status.progress = fraction;
            }
        })
    }
}

impl Drop for RenderTicket {
    fn drop(&mut self) {
        self.renders.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_ticket_lifecycle() {
        let state = AppState::with_defaults();
        let ticket = state.begin_render("mix-1234abcd.aac", 2);

        let active = state.active_renders();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, ticket.id());
        assert_eq!(active[0].backgrounds, 2);
        assert_eq!(active[0].progress, 0.0);

        (ticket.progress_fn())(0.25);
        assert_eq!(state.active_renders()[0].progress, 0.25);

        drop(ticket);
        assert!(state.active_renders().is_empty());
    }

    #[test]
    fn test_render_slots_follow_config() {
        let mut config = ServerConfig::default();
        config.limits.max_concurrent_renders = 2;
        let state = AppState::new(config);
        assert_eq!(state.render_slots.available_permits(), 2);
    }
}
