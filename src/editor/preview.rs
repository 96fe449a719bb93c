//! Preview surface: lays out each projection and reports its measured size
//! to the hosting layout.
//!
//! Pages are measured as A4 at 96 dpi, stacked with a fixed gap and scaled
//! to the container width. Listeners only hear about values that changed.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::projection::ProjectionSnapshot;
use super::state::FormState;
use super::GENERATION_FAILED_NOTICE;
use crate::documents::{layout_document, DocumentDefinition, LaidOutDocument};

pub const PAGE_WIDTH_PX: u32 = 794;
pub const PAGE_HEIGHT_PX: u32 = 1123;
pub const PAGE_GAP_PX: u32 = 16;

/// Upward callbacks of the preview surface.
pub trait PreviewListener: Send + Sync {
    fn on_height_change(&self, height_px: u32);

    fn on_page_count_change(&self, is_multi_page: bool);

    fn on_render_failed(&self, notice: &str) {
        let _ = notice;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub pages: usize,
    pub height_px: u32,
    pub is_multi_page: bool,
}

#[derive(Debug, Clone)]
pub enum PreviewOutcome {
    Rendered {
        report: PreviewReport,
        document: Arc<LaidOutDocument>,
    },
    Failed {
        notice: &'static str,
    },
}

/// Height of `pages` stacked pages at `container_width_px`.
pub fn measure(pages: usize, container_width_px: u32) -> u32 {
    let pages = pages.max(1) as u64;
    let natural = pages * PAGE_HEIGHT_PX as u64 + (pages - 1) * PAGE_GAP_PX as u64;
    let width = container_width_px.max(1) as u64;
    let scaled = (natural * width + PAGE_WIDTH_PX as u64 / 2) / PAGE_WIDTH_PX as u64;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

pub struct PreviewSurface {
    definition: Arc<dyn DocumentDefinition>,
    title: String,
    listener: Arc<dyn PreviewListener>,
    container_width_px: u32,
    last: Option<PreviewReport>,
}

impl PreviewSurface {
    pub fn new(
        definition: Arc<dyn DocumentDefinition>,
        title: impl Into<String>,
        listener: Arc<dyn PreviewListener>,
        container_width_px: u32,
    ) -> Self {
        Self {
            definition,
            title: title.into(),
            listener,
            container_width_px: container_width_px.max(1),
            last: None,
        }
    }

    pub fn last_report(&self) -> Option<PreviewReport> {
        self.last
    }

    /// Lay out `values` and report what changed. A failed layout keeps the
    /// previous report and shows the generation-failed notice.
    pub fn refresh(&mut self, values: &FormState) -> PreviewOutcome {
        let document = match layout_document(self.definition.as_ref(), &self.title, values) {
            Ok(document) => document,
            Err(e) => {
                log::error!(
                    "Preview of '{}' failed: {}",
                    self.definition.template_id(),
                    e
                );
                self.listener.on_render_failed(GENERATION_FAILED_NOTICE);
                return PreviewOutcome::Failed {
                    notice: GENERATION_FAILED_NOTICE,
                };
            }
        };

        let pages = document.page_count();
        let report = PreviewReport {
            pages,
            height_px: measure(pages, self.container_width_px),
            is_multi_page: pages > 1,
        };
        self.report(report);

        PreviewOutcome::Rendered {
            report,
            document: Arc::new(document),
        }
    }

    /// The hosting layout resized; re-measure the last rendered pages.
    pub fn set_container_width(&mut self, container_width_px: u32) {
        self.container_width_px = container_width_px.max(1);
        if let Some(last) = self.last {
            self.report(PreviewReport {
                height_px: measure(last.pages, self.container_width_px),
                ..last
            });
        }
    }

    fn report(&mut self, report: PreviewReport) {
        let previous = self.last.replace(report);
        if previous.map(|p| p.height_px) != Some(report.height_px) {
            self.listener.on_height_change(report.height_px);
        }
        if previous.map(|p| p.is_multi_page) != Some(report.is_multi_page) {
            self.listener.on_page_count_change(report.is_multi_page);
        }
    }
}

/// Refresh the surface with the current projection and again on every
/// projection update, until the projection is dropped.
pub fn spawn_preview_loop(
    mut surface: PreviewSurface,
    mut projection: watch::Receiver<ProjectionSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snapshot = projection.borrow_and_update().clone();
            log::debug!("Refreshing preview for projection version {}", snapshot.version);
            surface.refresh(&snapshot.values);

            if projection.changed().await.is_err() {
                break;
            }
        }
        log::debug!("Preview loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::layout::LaidOutDocument;
    use crate::documents::templates::Receipt;
    use crate::documents::DocumentError;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Height(u32),
        MultiPage(bool),
        Failed,
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl Recorder {
        fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl PreviewListener for Recorder {
        fn on_height_change(&self, height_px: u32) {
            self.0.lock().push(Event::Height(height_px));
        }

        fn on_page_count_change(&self, is_multi_page: bool) {
            self.0.lock().push(Event::MultiPage(is_multi_page));
        }

        fn on_render_failed(&self, _: &str) {
            self.0.lock().push(Event::Failed);
        }
    }

    struct Broken;

    impl DocumentDefinition for Broken {
        fn template_id(&self) -> &'static str {
            "broken"
        }

        fn layout(&self, _: &str, _: &FormState) -> Result<LaidOutDocument, DocumentError> {
            Err(DocumentError::UnexpectedValue {
                field: "x".into(),
                expected: "text",
            })
        }
    }

    fn items(n: usize) -> FormState {
        let items: Vec<_> = (0..n)
            .map(|i| json!({ "description": format!("Предмет {}", i) }))
            .collect();
        serde_json::from_value(json!({ "items": items })).unwrap()
    }

    #[test]
    fn test_measure() {
        assert_eq!(measure(1, PAGE_WIDTH_PX), 1123);
        assert_eq!(measure(2, PAGE_WIDTH_PX), 2 * 1123 + 16);
        assert_eq!(measure(1, 397), 562);
        assert_eq!(measure(0, PAGE_WIDTH_PX), 1123);
    }

    #[test]
    fn test_reports_only_changes() {
        let recorder = Arc::new(Recorder::default());
        let mut surface =
            PreviewSurface::new(Arc::new(Receipt), "Разписка", recorder.clone(), PAGE_WIDTH_PX);

        surface.refresh(&items(2));
        assert_eq!(
            recorder.take(),
            vec![Event::Height(1123), Event::MultiPage(false)]
        );

        surface.refresh(&items(3));
        assert!(recorder.take().is_empty());

        surface.refresh(&items(60));
        let events = recorder.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], Event::MultiPage(true));

        surface.set_container_width(PAGE_WIDTH_PX / 2);
        assert_eq!(recorder.take().len(), 1);
    }

    #[test]
    fn test_failed_layout_keeps_last_report() {
        let recorder = Arc::new(Recorder::default());
        let mut surface = PreviewSurface::new(Arc::new(Broken), "Х", recorder.clone(), 800);

        let outcome = surface.refresh(&FormState::default());

        assert!(matches!(
            outcome,
            PreviewOutcome::Failed { notice } if notice == GENERATION_FAILED_NOTICE
        ));
        assert_eq!(recorder.take(), vec![Event::Failed]);
        assert!(surface.last_report().is_none());
    }

    #[tokio::test]
    async fn test_loop_follows_projection() {
        let recorder = Arc::new(Recorder::default());
        let surface =
            PreviewSurface::new(Arc::new(Receipt), "Разписка", recorder.clone(), PAGE_WIDTH_PX);
        let (tx, rx) = watch::channel(ProjectionSnapshot {
            version: 0,
            values: Arc::new(items(1)),
        });

        let handle = spawn_preview_loop(surface, rx);
        tokio::task::yield_now().await;

        tx.send_modify(|s| {
            s.version = 1;
            s.values = Arc::new(items(60));
        });
        drop(tx);
        handle.await.unwrap();

        let events = recorder.take();
        assert_eq!(events.first(), Some(&Event::Height(1123)));
        assert_eq!(events.last(), Some(&Event::MultiPage(true)));
    }
}
